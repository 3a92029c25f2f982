//! Extraction of the embedded stories payload from captured markup.
//!
//! The story page inlines its API responses as `<script type="application/json"
//! … data-sjs …>` blocks. Exactly one of them carries the reels-media feed,
//! identified by a signature substring; everything else on the page is
//! irrelevant. The extractor returns only the `require` sub-object of that
//! block; the rest of the payload is unrelated and would just bloat every
//! stored document.

use regex::Regex;

/// Substring identifying the reels-media feed among the inline JSON blocks.
pub const REELS_SIGNATURE: &str = "xdt_api__v1__feed__reels_media";

const SCRIPT_BLOCK: &str =
    r#"(?s)<script type="application/json"[^>]*data-sjs[^>]*>(.*?)</script>"#;

/// Find and parse the one embedded JSON block of interest.
///
/// Returns `{"require": …}` on success, `None` otherwise. The first block
/// containing the signature wins; given the signature's specificity multiple
/// true matches are not expected, and this function never errors on that
/// ambiguity. A signature block that fails to parse yields `None`; callers
/// treat unparseable exactly like absent.
pub fn extract_reels_payload(markup: &str) -> Option<serde_json::Value> {
    let re = Regex::new(SCRIPT_BLOCK).ok()?;
    for caps in re.captures_iter(markup) {
        let text = caps.get(1)?.as_str();
        if !text.contains(REELS_SIGNATURE) {
            continue;
        }
        let parsed: serde_json::Value = serde_json::from_str(text).ok()?;
        match parsed.get("require") {
            Some(require) => {
                return Some(serde_json::json!({ "require": require.clone() }));
            }
            // Signature present but no require list: keep scanning, another
            // block may carry the real payload.
            None => continue,
        }
    }
    None
}
