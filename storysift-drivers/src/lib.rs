//! Driver layer for browser automation and network instrumentation.
//!
//! This crate exposes the stealth browser driver the capture pipeline uses to
//! hold an authenticated session and observe the traffic a page generates.
//!
//! - [`browser::driver::SiftDriver`]: WebDriver client wrapper with stealth applied
//! - [`browser::cdp`]: chromedriver vendor endpoints (performance log, raw CDP)
//! - [`browser::behavioral::BehavioralEngine`]: human‑like timings and typing
//! - [`browser::stealth`]: stealth profiles and JS evasions
pub mod browser;
