//! Downstream transformation: captured documents → classified tabular rows.
//!
//! - [`project`]: walk the fixed nested path to story-link candidates
//! - [`classify`]: map a link URL to its merchant origin
//! - [`export`]: render the per-batch delimited file
//!
//! Projection failures are per-document: a malformed tree is counted and
//! skipped, never fatal to its siblings.

pub mod classify;
pub mod export;
pub mod project;

pub use classify::{classify, LinkCategory};
pub use project::{project, Projection, StoryLinkCandidate};

use storysift_common::CapturedDocument;
use tracing::warn;

/// One row of final output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryLinkRecord {
    pub identity: String,
    pub story_id: String,
    pub url: String,
    pub category: LinkCategory,
}

/// What the transformation pass produced, with skip accounting.
#[derive(Debug, Clone, Default)]
pub struct TransformOutcome {
    pub records: Vec<StoryLinkRecord>,
    pub projected_documents: usize,
    pub skipped_documents: usize,
}

/// Project and classify every document. Documents whose tree does not match
/// the expected shape are skipped and counted.
pub fn build_records(documents: &[CapturedDocument]) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    for document in documents {
        match project(&document.payload) {
            Projection::Projected(candidates) => {
                outcome.projected_documents += 1;
                for candidate in candidates {
                    let category = classify(&candidate.url);
                    outcome.records.push(StoryLinkRecord {
                        identity: candidate.username,
                        story_id: candidate.story_id,
                        url: candidate.url,
                        category,
                    });
                }
            }
            Projection::Malformed(reason) => {
                outcome.skipped_documents += 1;
                warn!(
                    identity = %document.identity,
                    %reason,
                    "document shape mismatch; skipping"
                );
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::project::tests::full_fixture;
    use serde_json::json;

    #[test]
    fn malformed_documents_are_skipped_without_affecting_siblings() {
        let good = CapturedDocument::new("ana", full_fixture("ana", "https://s.shopee.com.br/xyz"));
        let bad = CapturedDocument::new("bia", json!({"require": "not-a-list"}));

        let outcome = build_records(&[bad, good]);

        assert_eq!(outcome.projected_documents, 1);
        assert_eq!(outcome.skipped_documents, 1);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].identity, "ana");
        assert_eq!(outcome.records[0].category, LinkCategory::Shopee);
    }
}
