//! Job wiring: configuration in, batch artifacts out.

use crate::roster;
use anyhow::{bail, Context, Result};
use chrono::Local;
use std::sync::Arc;
use std::time::Duration;
use storysift_capture::auth::PortalConfig;
use storysift_capture::batch::{document_path, Orchestrator};
use storysift_capture::snapshot::{BlobSnapshotSink, SnapshotSink};
use storysift_common::{CaptureStatus, CapturedDocument, Credentials};
use storysift_config::{SiftConfig, StorageBackend, StorageConfig};
use storysift_storage::{BlobStore, GcsStore, LocalStore};
use storysift_transform::export::{csv_filename, render_csv};
use storysift_transform::build_records;
use tracing::{info, warn};

/// Full batch: roster, capture, transform, export, upload.
pub async fn run(config: SiftConfig) -> Result<()> {
    let store = build_store(&config.storage)?;
    let sink: Arc<dyn SnapshotSink> = Arc::new(BlobSnapshotSink::new(
        store.clone(),
        config.storage.debug_prefix.clone(),
    ));

    let primary_content = load_roster_source(store.as_ref(), &config.roster.primary).await?;
    let secondary_content = match &config.roster.secondary {
        Some(path) => Some(load_roster_source(store.as_ref(), path).await?),
        None => None,
    };
    let identities = roster::from_contents(&primary_content, secondary_content.as_deref())?;
    if identities.is_empty() {
        bail!("roster produced no identities; nothing to capture");
    }
    info!(profiles = identities.len(), "roster loaded");

    let orchestrator = build_orchestrator(&config, store.clone(), sink);
    let result = orchestrator
        .run(&identities)
        .await
        .context("authentication failed; batch aborted with zero captures")?;

    // Re-read documents from storage rather than holding them in memory:
    // what the transform sees is exactly what a later run could see.
    let mut documents = Vec::new();
    for outcome in &result.outcomes {
        if outcome.status != CaptureStatus::Captured {
            continue;
        }
        let path = document_path(&config.storage.json_prefix, &outcome.identity);
        match store.download(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(payload) => {
                    documents.push(CapturedDocument::new(outcome.identity.clone(), payload))
                }
                Err(err) => warn!(identity = %outcome.identity, %err, "stored document unparseable"),
            },
            Err(err) => warn!(identity = %outcome.identity, %err, "stored document unreadable"),
        }
    }

    let transform = build_records(&documents);
    info!(
        rows = transform.records.len(),
        projected = transform.projected_documents,
        skipped = transform.skipped_documents,
        "transformation finished"
    );

    let csv = render_csv(&transform.records);
    let filename = csv_filename(Local::now().date_naive());
    let csv_path = format!(
        "{}/{}",
        config.storage.csv_prefix.trim_end_matches('/'),
        filename
    );
    store
        .upload(&csv_path, csv.as_bytes())
        .await
        .context("uploading batch export")?;
    info!(%csv_path, "export uploaded");

    println!("batch finished");
    println!("  captured: {}/{}", result.captured, result.total());
    println!("  failed:   {}/{}", result.failed, result.total());
    for outcome in &result.outcomes {
        println!("    {} -> {}", outcome.identity, outcome.status);
    }
    println!(
        "  rows exported: {} ({} document(s) skipped)",
        transform.records.len(),
        transform.skipped_documents
    );
    println!("  export: {csv_path}");

    Ok(())
}

/// Capture one identity with the same wiring as a batch, reporting the raw
/// outcome. The debug area ends up with the full snapshot trail.
pub async fn probe(config: SiftConfig, identity: &str) -> Result<()> {
    let store = build_store(&config.storage)?;
    let sink: Arc<dyn SnapshotSink> = Arc::new(BlobSnapshotSink::new(
        store.clone(),
        config.storage.debug_prefix.clone(),
    ));

    let json_prefix = config.storage.json_prefix.clone();
    let debug_prefix = config.storage.debug_prefix.clone();
    let orchestrator = build_orchestrator(&config, store, sink);
    let identities = vec![identity.to_string()];
    let result = orchestrator
        .run(&identities)
        .await
        .context("authentication failed")?;

    let outcome = result
        .outcomes
        .first()
        .context("orchestrator returned no outcome")?;
    println!("{} -> {}", outcome.identity, outcome.status);
    if outcome.status == CaptureStatus::Captured {
        println!("document: {}", document_path(&json_prefix, identity));
    }
    println!("diagnostics under: {debug_prefix}/");

    Ok(())
}

fn build_orchestrator(
    config: &SiftConfig,
    store: Arc<dyn BlobStore>,
    sink: Arc<dyn SnapshotSink>,
) -> Orchestrator {
    Orchestrator {
        portal_config: PortalConfig {
            webdriver_url: config.capture.webdriver_url.clone(),
            headless: config.capture.headless,
            ..PortalConfig::default()
        },
        credentials: Credentials::new(
            config.login.username.clone(),
            config.login.password.clone(),
        ),
        max_login_attempts: config.capture.max_login_attempts,
        login_backoff: Duration::from_secs(config.capture.login_backoff_secs),
        observation_window: Duration::from_secs(config.capture.observation_window_secs),
        json_prefix: config.storage.json_prefix.clone(),
        store,
        sink,
    }
}

/// Rosters usually sit next to the config file, but deployments keep them in
/// the bucket; a path that does not exist locally is fetched as an object key.
async fn load_roster_source(store: &dyn BlobStore, path: &std::path::Path) -> Result<String> {
    if path.exists() {
        return std::fs::read_to_string(path)
            .with_context(|| format!("reading roster {}", path.display()));
    }
    let key = path.to_string_lossy();
    info!(%key, "roster not found locally; fetching from storage");
    let bytes = store
        .download(&key)
        .await
        .with_context(|| format!("downloading roster {key}"))?;
    String::from_utf8(bytes).context("roster is not valid UTF-8")
}

fn build_store(storage: &StorageConfig) -> Result<Arc<dyn BlobStore>> {
    match &storage.backend {
        StorageBackend::Gcs { bucket, token } => {
            let token = token
                .clone()
                .or_else(|| std::env::var("STORYSIFT_STORAGE_TOKEN").ok());
            Ok(Arc::new(GcsStore::new(bucket.clone(), token)?))
        }
        StorageBackend::Local { root } => Ok(Arc::new(LocalStore::new(root.clone()))),
    }
}
