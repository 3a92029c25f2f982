//! Roster ingestion: delimited profile lists → unique usernames.
//!
//! Two inputs mirror the upstream process: a primary list of profile links
//! and an optional secondary list that also carries a network column and is
//! filtered to its Instagram rows before the union. The username is the
//! first path segment of the profile link. The parser is a deliberately
//! small delimited-text reader (the lists come out of a spreadsheet export);
//! quoted fields are unwrapped but embedded commas are not supported.

use anyhow::{bail, Context, Result};
use std::collections::HashSet;

const LINK_COLUMN: &str = "LINK";
const NETWORK_COLUMN: &str = "Rede";
const NETWORK_FILTER: &str = "Instagram";

/// Union both roster contents, dedupe preserving first-seen order.
pub fn from_contents(primary: &str, secondary: Option<&str>) -> Result<Vec<String>> {
    let mut usernames = Vec::new();
    let mut seen = HashSet::new();

    let mut push = |username: String| {
        if seen.insert(username.clone()) {
            usernames.push(username);
        }
    };

    for link in parse_links(primary, false).context("parsing primary roster")? {
        if let Some(username) = username_from_link(&link) {
            push(username);
        }
    }

    if let Some(content) = secondary {
        for link in parse_links(content, true).context("parsing secondary roster")? {
            if let Some(username) = username_from_link(&link) {
                push(username);
            }
        }
    }

    Ok(usernames)
}

/// Read the LINK column of one delimited document. With `filter_network`,
/// only rows whose network column equals `Instagram` are kept.
fn parse_links(content: &str, filter_network: bool) -> Result<Vec<String>> {
    let mut lines = content.lines();

    let header = lines.next().context("roster is empty")?;
    let columns: Vec<String> = split_row(header);

    let link_at = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(LINK_COLUMN))
        .context("roster has no LINK column")?;
    let network_at = columns
        .iter()
        .position(|c| c.eq_ignore_ascii_case(NETWORK_COLUMN));

    if filter_network && network_at.is_none() {
        bail!("roster has no {NETWORK_COLUMN} column to filter on");
    }

    let mut links = Vec::new();
    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        let fields = split_row(line);
        if filter_network {
            let keep = network_at
                .and_then(|at| fields.get(at))
                .is_some_and(|network| network == NETWORK_FILTER);
            if !keep {
                continue;
            }
        }
        if let Some(link) = fields.get(link_at) {
            if !link.is_empty() {
                links.push(link.clone());
            }
        }
    }
    Ok(links)
}

fn split_row(line: &str) -> Vec<String> {
    line.split(',')
        .map(|field| field.trim().trim_matches('"').to_string())
        .collect()
}

/// Extract the username as the first path segment of a profile link.
/// `https://www.instagram.com/ana.paula/` → `ana.paula`.
fn username_from_link(link: &str) -> Option<String> {
    let segment = link.split('/').nth(3)?;
    let segment = segment.trim();
    if segment.is_empty() {
        return None;
    }
    Some(segment.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unions_both_sources_and_dedupes_in_order() {
        let primary = "LINK\n\
             https://www.instagram.com/ana/\n\
             https://www.instagram.com/bia/\n";
        let secondary = "LINK,Rede\n\
             https://www.instagram.com/carla/,Instagram\n\
             https://www.tiktok.com/@dani,TikTok\n\
             https://www.instagram.com/ana/,Instagram\n";

        let roster = from_contents(primary, Some(secondary)).unwrap();
        assert_eq!(roster, vec!["ana", "bia", "carla"]);
    }

    #[test]
    fn secondary_rows_outside_instagram_are_dropped() {
        let roster = from_contents(
            "LINK\n",
            Some(
                "LINK,Rede\n\
                 https://www.tiktok.com/@x,TikTok\n\
                 https://www.instagram.com/only/,Instagram\n",
            ),
        )
        .unwrap();
        assert_eq!(roster, vec!["only"]);
    }

    #[test]
    fn malformed_links_are_skipped_not_fatal() {
        let roster = from_contents(
            "LINK\n\
             nonsense\n\
             https://www.instagram.com/ok/\n",
            None,
        )
        .unwrap();
        assert_eq!(roster, vec!["ok"]);
    }

    #[test]
    fn missing_link_column_is_an_error() {
        assert!(from_contents("URL\nhttps://www.instagram.com/x/\n", None).is_err());
    }

    #[test]
    fn quoted_fields_are_unwrapped() {
        let roster =
            from_contents("\"LINK\"\n\"https://www.instagram.com/quoted/\"\n", None).unwrap();
        assert_eq!(roster, vec!["quoted"]);
    }

    #[test]
    fn filtering_without_a_network_column_is_an_error() {
        let err = from_contents("LINK\n", Some("LINK\nhttps://www.instagram.com/x/\n"))
            .unwrap_err();
        assert!(err.to_string().contains("secondary"));
    }
}
