//! Common types and utilities shared across Storysift crates.
//!
//! This crate defines the shared data model, the error taxonomy used at
//! component boundaries, and observability helpers used throughout the
//! Storysift workspace. It is intentionally lightweight and
//! dependency‑minimal so that all crates can depend on it without
//! introducing heavy transitive costs.
//!
//! # Overview
//!
//! - [`Credentials`]: login credential pair (password is never printed)
//! - [`CapturedDocument`]: the JSON payload recovered for one profile
//! - [`BatchResult`] / [`IdentityOutcome`]: aggregate per-run reporting
//! - [`AuthFailure`] and [`CaptureFailure`]: typed boundary errors
//! - [`observability`]: centralised tracing/logging initialisation
//!
//! # Examples
//!
//! Credentials never leak the password through `Debug`:
//!
//! ```rust
//! use storysift_common::Credentials;
//!
//! let creds = Credentials::new("ana", "hunter2");
//! assert!(!format!("{creds:?}").contains("hunter2"));
//! ```
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod observability;

/// Username/password pair used to open the authenticated session.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

// Manual Debug: the password must never reach logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The JSON payload recovered from one profile's story page.
///
/// `payload` is the `{"require": …}` sub-object pulled out of the embedded
/// script block; it is kept opaque here and only interpreted by the
/// projection step. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapturedDocument {
    pub identity: String,
    pub payload: serde_json::Value,
    pub captured_at: DateTime<Utc>,
}

impl CapturedDocument {
    pub fn new(identity: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            identity: identity.into(),
            payload,
            captured_at: Utc::now(),
        }
    }
}

/// Why the login flow failed to produce an authenticated session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthFailure {
    /// Every attempt ended back on the login surface.
    #[error("login did not stick after {attempts} attempt(s)")]
    StillAnonymous { attempts: u32 },

    /// The target presented a human-verification gate. Retrying a challenge
    /// is pointless and raises suspicion, so this aborts all remaining
    /// attempts.
    #[error("bot challenge presented during login")]
    ChallengeDetected,

    /// The credential input fields never appeared.
    #[error("credential fields not found on the login surface")]
    FieldNotFound,

    /// The WebDriver transport itself failed.
    #[error("browser error during login: {0}")]
    Browser(String),
}

/// Why capture failed for one profile. Always per-identity; never aborts
/// the batch.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureFailure {
    /// The session cookie vanished or we were bounced back to the login
    /// surface. Distinct from a per-identity miss so the orchestrator can
    /// surface it separately.
    #[error("authenticated session lost")]
    SessionLost,

    /// No network event matching the target endpoint appeared in the log.
    #[error("target endpoint never observed in the network log")]
    EndpointNotObserved,

    /// The endpoint fired but its body carried no embedded payload.
    #[error("response body did not contain the expected payload")]
    PayloadNotFound,

    /// The response body could not be decoded into text.
    #[error("response body decode failed: {0}")]
    DecodeError(String),

    /// The WebDriver transport itself failed.
    #[error("browser error during capture: {0}")]
    Browser(String),

    /// Persisting the captured document failed.
    #[error("storing captured document failed: {0}")]
    Storage(String),
}

/// Final status for one identity in a batch run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureStatus {
    Captured,
    Failed(CaptureFailure),
}

impl std::fmt::Display for CaptureStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CaptureStatus::Captured => write!(f, "captured"),
            CaptureStatus::Failed(err) => write!(f, "failed: {err}"),
        }
    }
}

/// One identity's finalized outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityOutcome {
    pub identity: String,
    pub status: CaptureStatus,
}

/// Aggregate of outcomes across all identities in one run.
///
/// Each identity's outcome is finalized independently; the counters are
/// always the exact partition of `outcomes`.
#[derive(Debug, Clone, Default)]
pub struct BatchResult {
    pub outcomes: Vec<IdentityOutcome>,
    pub captured: usize,
    pub failed: usize,
}

impl BatchResult {
    pub fn record(&mut self, identity: impl Into<String>, status: CaptureStatus) {
        match status {
            CaptureStatus::Captured => self.captured += 1,
            CaptureStatus::Failed(_) => self.failed += 1,
        }
        self.outcomes.push(IdentityOutcome {
            identity: identity.into(),
            status,
        });
    }

    pub fn total(&self) -> usize {
        self.outcomes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_result_counters_partition_outcomes() {
        let mut result = BatchResult::default();
        result.record("alpha", CaptureStatus::Captured);
        result.record(
            "beta",
            CaptureStatus::Failed(CaptureFailure::EndpointNotObserved),
        );
        result.record("gamma", CaptureStatus::Failed(CaptureFailure::SessionLost));

        assert_eq!(result.total(), 3);
        assert_eq!(result.captured, 1);
        assert_eq!(result.failed, 2);
        assert_eq!(result.captured + result.failed, result.total());
    }

    #[test]
    fn credentials_debug_redacts_password() {
        let creds = Credentials::new("ana", "s3cret");
        let printed = format!("{creds:?}");
        assert!(printed.contains("ana"));
        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("s3cret"));
    }
}
