//! Sequential batch orchestration.
//!
//! One authentication, then one capture per identity, in order, over the
//! same session. A failed identity is recorded and the loop moves on; only
//! a failed authentication aborts the run. The browser is closed on every
//! exit path once a session exists.

use crate::auth::{authenticate, ChromeLoginPortal, PortalConfig};
use crate::engine::{NetworkCaptureEngine, StoryCapturer};
use crate::snapshot::SnapshotSink;
use std::sync::Arc;
use std::time::Duration;
use storysift_common::{AuthFailure, BatchResult, CaptureFailure, CaptureStatus, Credentials};
use storysift_storage::BlobStore;
use tracing::{info, warn};

/// Object path for one identity's captured document.
pub fn document_path(json_prefix: &str, identity: &str) -> String {
    format!("{}/{identity}_stories.json", json_prefix.trim_end_matches('/'))
}

/// Run the capture loop over `identities` with an already-built capturer,
/// persisting each successful document before moving on.
///
/// Never returns early: every failure kind is folded into the result so the
/// caller can close the session unconditionally afterwards.
pub async fn run_batch<C: StoryCapturer + Send>(
    capturer: &mut C,
    identities: &[String],
    store: &dyn BlobStore,
    json_prefix: &str,
) -> BatchResult {
    let mut result = BatchResult::default();

    for (index, identity) in identities.iter().enumerate() {
        info!(
            %identity,
            position = index + 1,
            total = identities.len(),
            "capturing identity"
        );

        let status = match capturer.capture(identity).await {
            Ok(document) => persist_document(store, json_prefix, identity, &document.payload).await,
            Err(failure) => {
                warn!(%identity, %failure, "capture failed");
                CaptureStatus::Failed(failure)
            }
        };

        result.record(identity.clone(), status);
    }

    result
}

async fn persist_document(
    store: &dyn BlobStore,
    json_prefix: &str,
    identity: &str,
    payload: &serde_json::Value,
) -> CaptureStatus {
    let path = document_path(json_prefix, identity);
    let bytes = match serde_json::to_vec_pretty(payload) {
        Ok(bytes) => bytes,
        Err(err) => {
            return CaptureStatus::Failed(CaptureFailure::Storage(err.to_string()));
        }
    };
    match store.upload(&path, &bytes).await {
        Ok(()) => {
            info!(identity, %path, "document persisted");
            CaptureStatus::Captured
        }
        Err(err) => {
            warn!(identity, %path, %err, "document persistence failed");
            CaptureStatus::Failed(CaptureFailure::Storage(err.to_string()))
        }
    }
}

/// Everything the full capture phase needs, bundled so entry points stay
/// thin. Construction is cheap; the browser only exists inside [`run`].
///
/// [`run`]: Orchestrator::run
pub struct Orchestrator {
    pub portal_config: PortalConfig,
    pub credentials: Credentials,
    pub max_login_attempts: u32,
    pub login_backoff: Duration,
    pub observation_window: Duration,
    pub json_prefix: String,
    pub store: Arc<dyn BlobStore>,
    pub sink: Arc<dyn SnapshotSink>,
}

impl Orchestrator {
    /// Authenticate once, capture every identity, tear the browser down.
    ///
    /// An `Err` means no session was ever established; the batch produced
    /// zero captures and there is nothing to clean up.
    pub async fn run(&self, identities: &[String]) -> Result<BatchResult, AuthFailure> {
        let mut portal = ChromeLoginPortal::new(self.portal_config.clone(), self.sink.clone());
        let mut session = authenticate(
            &mut portal,
            &self.credentials,
            self.max_login_attempts,
            self.login_backoff,
        )
        .await?;

        let result = {
            let mut engine = NetworkCaptureEngine::new(
                &mut session,
                self.observation_window,
                self.sink.clone(),
            );
            run_batch(&mut engine, identities, self.store.as_ref(), &self.json_prefix).await
        };

        // The loop above cannot return early, so teardown always runs.
        if let Err(err) = session.close().await {
            warn!(%err, "browser teardown reported an error");
        }

        info!(
            captured = result.captured,
            failed = result.failed,
            total = result.total(),
            "batch finished"
        );
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::HashMap;
    use storysift_common::CapturedDocument;
    use storysift_storage::LocalStore;
    use tempfile::TempDir;

    /// Capturer scripted per identity.
    struct ScriptedCapturer {
        plan: HashMap<String, Result<serde_json::Value, CaptureFailure>>,
        calls: Vec<String>,
    }

    #[async_trait]
    impl StoryCapturer for ScriptedCapturer {
        async fn capture(&mut self, identity: &str) -> Result<CapturedDocument, CaptureFailure> {
            self.calls.push(identity.to_string());
            match self.plan.get(identity) {
                Some(Ok(payload)) => Ok(CapturedDocument::new(identity, payload.clone())),
                Some(Err(failure)) => Err(failure.clone()),
                None => Err(CaptureFailure::EndpointNotObserved),
            }
        }
    }

    #[tokio::test]
    async fn failures_do_not_stop_the_loop() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let mut capturer = ScriptedCapturer {
            plan: HashMap::from([
                ("alpha".to_string(), Ok(json!({"require": [1]}))),
                (
                    "beta".to_string(),
                    Err(CaptureFailure::EndpointNotObserved),
                ),
                ("gamma".to_string(), Ok(json!({"require": [2]}))),
            ]),
            calls: vec![],
        };
        let identities: Vec<String> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        let result = run_batch(&mut capturer, &identities, &store, "json_ext").await;

        // Every identity was visited, in order, despite the middle failure.
        assert_eq!(capturer.calls, identities);
        assert_eq!(result.captured, 2);
        assert_eq!(result.failed, 1);
        assert_eq!(
            result.outcomes[1].status,
            CaptureStatus::Failed(CaptureFailure::EndpointNotObserved)
        );

        // Successful documents are persisted under the json prefix.
        assert!(store.exists("json_ext/alpha_stories.json").await.unwrap());
        assert!(store.exists("json_ext/gamma_stories.json").await.unwrap());
        assert!(!store.exists("json_ext/beta_stories.json").await.unwrap());
    }

    #[tokio::test]
    async fn session_lost_is_reported_distinctly() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let mut capturer = ScriptedCapturer {
            plan: HashMap::from([("alpha".to_string(), Err(CaptureFailure::SessionLost))]),
            calls: vec![],
        };
        let identities = vec!["alpha".to_string()];

        let result = run_batch(&mut capturer, &identities, &store, "json_ext").await;
        assert_eq!(
            result.outcomes[0].status,
            CaptureStatus::Failed(CaptureFailure::SessionLost)
        );
    }

    #[tokio::test]
    async fn persisted_document_round_trips_bytes() {
        let tmp = TempDir::new().unwrap();
        let store = LocalStore::new(tmp.path());

        let payload = json!({"require": [[null, 3, [{"__bbox": {"require": []}}]]]});
        let mut capturer = ScriptedCapturer {
            plan: HashMap::from([("alpha".to_string(), Ok(payload.clone()))]),
            calls: vec![],
        };

        run_batch(&mut capturer, &["alpha".to_string()], &store, "json_ext").await;

        let bytes = store.download("json_ext/alpha_stories.json").await.unwrap();
        let read_back: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(read_back, payload);
    }

    #[test]
    fn document_paths_follow_the_identity_naming() {
        assert_eq!(
            document_path("json_ext/", "ana.paula"),
            "json_ext/ana.paula_stories.json"
        );
    }
}
