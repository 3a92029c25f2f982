//! Fixed-path projection of the captured document.
//!
//! The payload's shape is an externally controlled serialization convention:
//! an indexed list-of-lists with named boxed sub-results. The hop sequence
//! below is a contract with that unversioned shape and breaks silently if
//! the platform changes it. Every hop is type-checked, the walk stays
//! confined to this module, and the result is a tagged value; nothing here
//! panics or raises past the boundary.
//!
//! Hop sequence to the reel list:
//! `require[0][3][0].__bbox.require[0][3][1].__bbox.result.data.`
//! `xdt_api__v1__feed__reels_media.reels_media`
//! then per reel `user.username` and `items[]`, and per item
//! `story_link_stickers[].story_link.url`.

use serde_json::Value;

/// One prospective output row pulled out of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryLinkCandidate {
    pub username: String,
    pub story_id: String,
    pub url: String,
}

/// Tagged projection result. `Malformed` names the hop that failed so the
/// skip log points at the exact divergence from the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Projection {
    Projected(Vec<StoryLinkCandidate>),
    Malformed(String),
}

/// Walk the fixed path and collect every story-link candidate.
///
/// Never panics and never errors past this boundary: any shape mismatch
/// yields `Projection::Malformed`. Items without link stickers simply
/// contribute no candidates.
pub fn project(document: &Value) -> Projection {
    match walk(document) {
        Ok(candidates) => Projection::Projected(candidates),
        Err(hop) => Projection::Malformed(hop),
    }
}

fn walk(document: &Value) -> Result<Vec<StoryLinkCandidate>, String> {
    let reels = reels_media(document)?;
    let reels = reels
        .as_array()
        .ok_or_else(|| hop_error("reels_media", "expected a list"))?;

    let mut candidates = Vec::new();
    for (reel_index, reel) in reels.iter().enumerate() {
        let username = key(reel, "user", &format!("reels_media[{reel_index}].user"))?
            .get("username")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                hop_error(
                    &format!("reels_media[{reel_index}].user.username"),
                    "expected a string",
                )
            })?;

        // A reel with no items projects nothing; that is an empty story
        // tray, not a malformed document.
        let items = optional_list(reel, "items", &format!("reels_media[{reel_index}].items"))?;

        for (item_index, item) in items.iter().enumerate() {
            let item_hop = format!("reels_media[{reel_index}].items[{item_index}]");
            let story_id = story_identifier(item)
                .ok_or_else(|| hop_error(&format!("{item_hop}.id"), "no id or pk"))?;

            let stickers =
                optional_list(item, "story_link_stickers", &format!("{item_hop}.story_link_stickers"))?;

            for (sticker_index, sticker) in stickers.iter().enumerate() {
                let sticker_hop = format!("{item_hop}.story_link_stickers[{sticker_index}]");
                let url = key(sticker, "story_link", &format!("{sticker_hop}.story_link"))?
                    .get("url")
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        hop_error(&format!("{sticker_hop}.story_link.url"), "expected a string")
                    })?;

                candidates.push(StoryLinkCandidate {
                    username: username.to_string(),
                    story_id: story_id.clone(),
                    url: url.to_string(),
                });
            }
        }
    }

    Ok(candidates)
}

/// The twelve hops from the document root to the reel list.
fn reels_media(document: &Value) -> Result<&Value, String> {
    let v = key(document, "require", "require")?;
    let v = index(v, 0, "require[0]")?;
    let v = index(v, 3, "require[0][3]")?;
    let v = index(v, 0, "require[0][3][0]")?;
    let v = key(v, "__bbox", "require[0][3][0].__bbox")?;
    let v = key(v, "require", "….__bbox.require")?;
    let v = index(v, 0, "….__bbox.require[0]")?;
    let v = index(v, 3, "….__bbox.require[0][3]")?;
    let v = index(v, 1, "….__bbox.require[0][3][1]")?;
    let v = key(v, "__bbox", "….require[0][3][1].__bbox")?;
    let v = key(v, "result", "….__bbox.result")?;
    let v = key(v, "data", "….result.data")?;
    let v = key(v, "xdt_api__v1__feed__reels_media", "….data.xdt_api__v1__feed__reels_media")?;
    key(v, "reels_media", "….xdt_api__v1__feed__reels_media.reels_media")
}

fn hop_error(hop: &str, problem: &str) -> String {
    format!("{hop}: {problem}")
}

fn index<'a>(value: &'a Value, at: usize, hop: &str) -> Result<&'a Value, String> {
    let list = value
        .as_array()
        .ok_or_else(|| hop_error(hop, "expected a list"))?;
    list.get(at)
        .ok_or_else(|| hop_error(hop, &format!("list has {} element(s)", list.len())))
}

fn key<'a>(value: &'a Value, name: &str, hop: &str) -> Result<&'a Value, String> {
    value
        .as_object()
        .ok_or_else(|| hop_error(hop, "expected a map"))?
        .get(name)
        .ok_or_else(|| hop_error(hop, "key missing"))
}

/// A list-valued key that may be absent or null (both mean "empty"), but
/// must be a list when present.
fn optional_list<'a>(value: &'a Value, name: &str, hop: &str) -> Result<&'a [Value], String> {
    match value.get(name) {
        None | Some(Value::Null) => Ok(&[]),
        Some(Value::Array(list)) => Ok(list),
        Some(_) => Err(hop_error(hop, "expected a list")),
    }
}

/// Story items carry both `id` (a composite string) and `pk` (sometimes a
/// bare number); prefer `id`, fall back to `pk`.
fn story_identifier(item: &Value) -> Option<String> {
    for field in ["id", "pk"] {
        match item.get(field) {
            Some(Value::String(s)) => return Some(s.clone()),
            Some(Value::Number(n)) => return Some(n.to_string()),
            _ => continue,
        }
    }
    None
}
