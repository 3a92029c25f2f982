//! Diagnostic snapshots handed to the storage collaborator.
//!
//! Every interesting checkpoint (initial load, after fill, after submit, per
//! identity, on error) drops a screenshot and/or markup dump into the debug
//! area. These exist purely for post-mortem inspection: a sink failure is
//! logged at `warn` and the pipeline moves on.

use async_trait::async_trait;
use std::sync::Arc;
use storysift_drivers::browser::driver::SiftDriver;
use storysift_storage::BlobStore;

/// Receives diagnostic artifacts. Implementations must swallow their own
/// failures; recording is best-effort by contract.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    /// Persist one artifact under the debug area. `name` carries the
    /// extension (`login_step1_initial.png`, `ana_page.html`, …).
    async fn record(&self, name: &str, bytes: &[u8]);
}

/// Sink that uploads into a blob store under a fixed prefix.
pub struct BlobSnapshotSink {
    store: Arc<dyn BlobStore>,
    prefix: String,
}

impl BlobSnapshotSink {
    pub fn new(store: Arc<dyn BlobStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }
}

#[async_trait]
impl SnapshotSink for BlobSnapshotSink {
    async fn record(&self, name: &str, bytes: &[u8]) {
        let path = format!("{}/{}", self.prefix.trim_end_matches('/'), name);
        if let Err(err) = self.store.upload(&path, bytes).await {
            tracing::warn!(target: "capture.snapshot", %path, %err, "snapshot upload failed");
        } else {
            tracing::debug!(target: "capture.snapshot", %path, size = bytes.len(), "snapshot recorded");
        }
    }
}

/// Sink that drops everything. Used when no debug area is configured.
pub struct NullSnapshotSink;

#[async_trait]
impl SnapshotSink for NullSnapshotSink {
    async fn record(&self, _name: &str, _bytes: &[u8]) {}
}

/// Record a screenshot + page-source pair for the current browser state.
/// Browser faults while snapshotting are themselves swallowed: diagnostics
/// must never decide control flow.
pub async fn snapshot_page(driver: &SiftDriver, sink: &dyn SnapshotSink, stem: &str) {
    match driver.screenshot_png().await {
        Ok(png) => sink.record(&format!("{stem}.png"), &png).await,
        Err(err) => {
            tracing::warn!(target: "capture.snapshot", stem, %err, "screenshot unavailable")
        }
    }
    match driver.page_source().await {
        Ok(html) => sink.record(&format!("{stem}.html"), html.as_bytes()).await,
        Err(err) => {
            tracing::warn!(target: "capture.snapshot", stem, %err, "page source unavailable")
        }
    }
}
