//! Capture side of the pipeline: authenticated session, network
//! observation, payload extraction, batch orchestration.
//!
//! The flow is strictly sequential: one browser, one session, one identity
//! at a time. Rate limiting and automation detection on the target make
//! parallel captures counter-productive, so nothing here spawns tasks.
//!
//! - [`auth`]: login state machine with retry/backoff and challenge short-circuit
//! - [`session`]: the authenticated browser session and its liveness probe
//! - [`engine`]: per-identity network capture off the DevTools performance log
//! - [`extract`]: embedded-JSON extraction from captured markup
//! - [`snapshot`]: fire-and-forget diagnostic artifacts
//! - [`batch`]: the sequential orchestrator producing a [`storysift_common::BatchResult`]

pub mod auth;
pub mod batch;
pub mod engine;
pub mod extract;
pub mod session;
pub mod snapshot;
