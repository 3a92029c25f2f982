//! Per-identity network capture.
//!
//! The story page never exposes the reels-media response in its rendered
//! DOM, so the engine watches the DevTools performance log instead: navigate,
//! let the page settle, find the one `Network.responseReceived` event whose
//! URL matches the identity's feed endpoint, then pull that response's body
//! out of band and hand it to the extractor.

use crate::extract::extract_reels_payload;
use crate::session::{story_page_url, Session, LOGIN_SURFACE};
use crate::snapshot::{snapshot_page, SnapshotSink};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::sync::Arc;
use std::time::Duration;
use storysift_common::{CaptureFailure, CapturedDocument};
use storysift_drivers::browser::cdp::{PerfLogEntry, ResponseBody, ResponseReceived};
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Anything that can produce a captured document for one identity. The
/// orchestrator only knows this trait; tests script it.
#[async_trait]
pub trait StoryCapturer {
    async fn capture(&mut self, identity: &str) -> Result<CapturedDocument, CaptureFailure>;
}

/// The production capturer: one live session, observed through the
/// performance log.
pub struct NetworkCaptureEngine<'a> {
    session: &'a mut Session,
    observation_window: Duration,
    sink: Arc<dyn SnapshotSink>,
}

impl<'a> NetworkCaptureEngine<'a> {
    pub fn new(
        session: &'a mut Session,
        observation_window: Duration,
        sink: Arc<dyn SnapshotSink>,
    ) -> Self {
        Self {
            session,
            observation_window,
            sink,
        }
    }
}

#[async_trait]
impl StoryCapturer for NetworkCaptureEngine<'_> {
    async fn capture(&mut self, identity: &str) -> Result<CapturedDocument, CaptureFailure> {
        // Re-verify liveness before touching the network; a dead session
        // must surface as SessionLost, not as a per-identity miss.
        if !self.session.is_live().await {
            warn!(identity, "session no longer live; skipping navigation");
            return Err(CaptureFailure::SessionLost);
        }

        let url = story_page_url(identity);
        info!(identity, %url, "navigating to story page");
        self.session
            .driver_mut()
            .goto(&url)
            .await
            .map_err(browser_fault)?;

        // First window: let the page render and issue its data requests.
        sleep(self.observation_window).await;

        let current = self
            .session
            .driver()
            .current_url()
            .await
            .map_err(browser_fault)?;
        if current.as_str().contains(LOGIN_SURFACE) {
            warn!(identity, "bounced to login surface after navigation");
            return Err(CaptureFailure::SessionLost);
        }

        snapshot_page(
            self.session.driver(),
            self.sink.as_ref(),
            &format!("{identity}_story_page"),
        )
        .await;

        // Second window: the feed request fires only after initial render
        // and can itself be slow, so one wait is not enough.
        sleep(self.observation_window).await;

        let log = self
            .session
            .driver()
            .performance_log()
            .await
            .map_err(browser_fault)?;
        info!(identity, events = log.len(), "performance log drained");
        self.dump_log(identity, &log).await;

        let target = format!("{identity}/?r=");
        let Some(matched) = find_target_response(&log, &target) else {
            let related = count_story_urls(&log);
            warn!(identity, related, "feed endpoint never observed");
            return Err(CaptureFailure::EndpointNotObserved);
        };
        debug!(identity, request_id = %matched.request_id, url = %matched.url, "feed endpoint matched");

        let raw = self
            .session
            .driver()
            .execute_cdp(
                "Network.getResponseBody",
                serde_json::json!({ "requestId": matched.request_id }),
            )
            .await
            .map_err(browser_fault)?;
        let body: ResponseBody = serde_json::from_value(raw)
            .map_err(|e| CaptureFailure::DecodeError(format!("response body shape: {e}")))?;

        let markup = decode_body(&body)?;
        self.sink
            .record(&format!("{identity}_response_raw.html"), markup.as_bytes())
            .await;

        let Some(payload) = extract_reels_payload(&markup) else {
            warn!(identity, body_len = markup.len(), "no embedded payload in response body");
            return Err(CaptureFailure::PayloadNotFound);
        };

        info!(identity, "payload extracted");
        Ok(CapturedDocument::new(identity, payload))
    }
}

impl NetworkCaptureEngine<'_> {
    /// Dump the raw performance log for post-mortem inspection.
    async fn dump_log(&self, identity: &str, log: &[PerfLogEntry]) {
        let envelopes: Vec<serde_json::Value> = log
            .iter()
            .filter_map(|entry| serde_json::from_str(&entry.message).ok())
            .collect();
        if let Ok(bytes) = serde_json::to_vec(&envelopes) {
            self.sink
                .record(&format!("{identity}_network_logs.json"), &bytes)
                .await;
        }
    }
}

fn browser_fault(err: anyhow::Error) -> CaptureFailure {
    CaptureFailure::Browser(err.to_string())
}

/// Scan the log, in event order, for the first `Network.responseReceived`
/// whose URL contains `target`. The type filter comes first: a busy page
/// logs thousands of events and only response-received entries carry the
/// URL/requestId pair we can act on. Entries that fail to parse are skipped.
pub fn find_target_response(log: &[PerfLogEntry], target: &str) -> Option<ResponseReceived> {
    log.iter()
        .filter_map(|entry| entry.devtools())
        .filter_map(|msg| msg.as_response_received())
        .find(|rr| rr.url.contains(target))
}

fn count_story_urls(log: &[PerfLogEntry]) -> usize {
    log.iter()
        .filter_map(|entry| entry.devtools())
        .filter_map(|msg| msg.as_response_received())
        .filter(|rr| rr.url.contains("instagram.com") && rr.url.contains("stories"))
        .count()
}

/// Recover the textual body, reversing the transport encoding when the
/// protocol flags it. Invalid UTF-8 inside a decoded body is replaced rather
/// than rejected; the extractor only needs the JSON block intact.
fn decode_body(body: &ResponseBody) -> Result<String, CaptureFailure> {
    if body.base64_encoded {
        let bytes = BASE64
            .decode(body.body.as_bytes())
            .map_err(|e| CaptureFailure::DecodeError(e.to_string()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    } else {
        Ok(body.body.clone())
    }
}
