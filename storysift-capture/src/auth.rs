//! Login state machine.
//!
//! One attempt walks `Anonymous → Submitting` and lands on exactly one of
//! `Authenticated`, `ChallengeDetected`, or `StillAnonymous`. The retry loop
//! in [`authenticate`] opens a fresh browser for every attempt (a failed
//! instance may carry poisoned client-side detection state and is never
//! reused) and stops the moment a challenge is seen; a human-verification
//! gate does not go away on retry.

use crate::session::{Session, BASE_URL, LOGIN_SURFACE, SESSION_COOKIE};
use crate::snapshot::{snapshot_page, SnapshotSink};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use storysift_common::{AuthFailure, Credentials};
use storysift_drivers::browser::driver::SiftDriver;
use storysift_drivers::browser::stealth::StealthProfile;
use tokio::time::sleep;
use tracing::{info, warn};

const USERNAME_FIELD: &str = "input[name='username']";
const PASSWORD_FIELD: &str = "input[name='password']";
const SUBMIT_BUTTON: &str = "button[type='submit']";
const SHOW_PASSWORD_TOGGLE: &str =
    "button[aria-label='Show password'], button[aria-label='Mostrar senha']";

/// Content markers that indicate a human-verification gate. Checked against
/// the raw page source after submission; the URL is checked separately for
/// the challenge path segment.
const CHALLENGE_MARKERS: &[&str] = &[
    "recaptcha",
    "I'm not a robot",
    "não sou um robô",
    "Unusual activity",
    "Atividade incomum",
];
const CHALLENGE_URL_MARKER: &str = "challenge";

/// Where one attempt currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Anonymous,
    Submitting,
    Authenticated,
    ChallengeDetected,
    StillAnonymous,
}

impl std::fmt::Display for LoginState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LoginState::Anonymous => "anonymous",
            LoginState::Submitting => "submitting",
            LoginState::Authenticated => "authenticated",
            LoginState::ChallengeDetected => "challenge-detected",
            LoginState::StillAnonymous => "still-anonymous",
        };
        f.write_str(name)
    }
}

/// Terminal classification of one attempt. `S` is the session type so the
/// retry loop can be exercised without a browser.
#[derive(Debug)]
pub enum AttemptOutcome<S> {
    Authenticated(S),
    StillAnonymous,
    ChallengeDetected,
    FieldNotFound,
    /// The WebDriver transport failed mid-attempt; retryable like
    /// `StillAnonymous` since the next attempt gets a fresh browser anyway.
    Browser(String),
}

/// One login surface. The production implementation drives chromedriver;
/// tests script outcome sequences.
#[async_trait]
pub trait LoginPortal {
    type Session: Send;

    async fn attempt(&mut self, credentials: &Credentials) -> AttemptOutcome<Self::Session>;
}

/// Drive `portal` until it authenticates, the attempt budget runs out, or a
/// challenge forces an early stop.
pub async fn authenticate<P: LoginPortal + Send>(
    portal: &mut P,
    credentials: &Credentials,
    max_attempts: u32,
    backoff: Duration,
) -> Result<P::Session, AuthFailure> {
    let mut last_failure = AuthFailure::StillAnonymous { attempts: 0 };

    for attempt in 1..=max_attempts {
        info!(attempt, max_attempts, "login attempt starting");

        match portal.attempt(credentials).await {
            AttemptOutcome::Authenticated(session) => {
                info!(attempt, "login validated");
                return Ok(session);
            }
            AttemptOutcome::ChallengeDetected => {
                warn!(attempt, "challenge presented; abandoning all further attempts");
                return Err(AuthFailure::ChallengeDetected);
            }
            AttemptOutcome::StillAnonymous => {
                warn!(attempt, "login did not stick");
                last_failure = AuthFailure::StillAnonymous { attempts: attempt };
            }
            AttemptOutcome::FieldNotFound => {
                warn!(attempt, "credential fields not found");
                last_failure = AuthFailure::FieldNotFound;
            }
            AttemptOutcome::Browser(message) => {
                warn!(attempt, %message, "browser fault during attempt");
                last_failure = AuthFailure::Browser(message);
            }
        }

        if attempt < max_attempts {
            sleep(backoff).await;
        }
    }

    Err(match last_failure {
        AuthFailure::StillAnonymous { .. } => AuthFailure::StillAnonymous {
            attempts: max_attempts,
        },
        other => other,
    })
}

/// Tuning for the concrete login flow.
#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub stealth: StealthProfile,
    /// Bounded wait for the username field to appear.
    pub field_timeout: Duration,
    /// Settle time after initial navigation and after re-visiting home.
    pub settle: Duration,
    /// Observation window after submitting, letting the target process the
    /// submission before validation.
    pub submit_wait: Duration,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            stealth: StealthProfile::Balanced,
            field_timeout: Duration::from_secs(30),
            settle: Duration::from_secs(3),
            submit_wait: Duration::from_secs(15),
        }
    }
}

/// The real login surface, driven through chromedriver.
pub struct ChromeLoginPortal {
    config: PortalConfig,
    sink: Arc<dyn SnapshotSink>,
}

impl ChromeLoginPortal {
    pub fn new(config: PortalConfig, sink: Arc<dyn SnapshotSink>) -> Self {
        Self { config, sink }
    }

    /// Walk the login flow inside an already-open browser. Separated from
    /// [`LoginPortal::attempt`] so browser teardown stays in one place.
    async fn drive_login(
        &self,
        driver: &mut SiftDriver,
        credentials: &Credentials,
    ) -> anyhow::Result<AttemptOutcome<()>> {
        let mut state = LoginState::Anonymous;
        info!(%state, "opening login surface");

        driver.goto(BASE_URL).await?;
        sleep(self.config.settle).await;
        snapshot_page(driver, self.sink.as_ref(), "login_step1_initial").await;

        let username_input = match driver
            .wait_for_css(USERNAME_FIELD, self.config.field_timeout)
            .await
        {
            Ok(el) => el,
            Err(err) => {
                warn!(%err, "username field never appeared");
                snapshot_page(driver, self.sink.as_ref(), "login_error_no_username_field").await;
                return Ok(AttemptOutcome::FieldNotFound);
            }
        };
        username_input.refill(&credentials.username).await?;

        let Some(password_input) = driver.find_css(PASSWORD_FIELD).await? else {
            snapshot_page(driver, self.sink.as_ref(), "login_error_no_password_field").await;
            return Ok(AttemptOutcome::FieldNotFound);
        };
        password_input.refill(&credentials.password).await?;

        // Revealing the password lets the post-fill snapshot confirm what was
        // actually typed; the toggle not being there is fine.
        if let Some(toggle) = driver.find_css(SHOW_PASSWORD_TOGGLE).await? {
            if let Err(err) = toggle.click().await {
                warn!(%err, "show-password toggle did not respond");
            }
        }
        snapshot_page(driver, self.sink.as_ref(), "login_step3_filled").await;

        let Some(submit) = driver.find_css(SUBMIT_BUTTON).await? else {
            snapshot_page(driver, self.sink.as_ref(), "login_error_no_submit_button").await;
            return Ok(AttemptOutcome::FieldNotFound);
        };
        submit.click().await?;

        state = LoginState::Submitting;
        info!(%state, wait_secs = self.config.submit_wait.as_secs(), "submission sent");
        sleep(self.config.submit_wait).await;
        snapshot_page(driver, self.sink.as_ref(), "login_step4_after_submit").await;

        // Validation order: login surface, then challenge, then cookie.
        let current = driver.current_url().await?;
        if current.as_str().contains(LOGIN_SURFACE) {
            state = LoginState::StillAnonymous;
            warn!(%state, url = %current, "still on the login surface after submit");
            return Ok(AttemptOutcome::StillAnonymous);
        }

        let source = driver.page_source().await?;
        let challenged = current.as_str().contains(CHALLENGE_URL_MARKER)
            || CHALLENGE_MARKERS.iter().any(|m| source.contains(m));
        if challenged {
            state = LoginState::ChallengeDetected;
            warn!(%state, url = %current, "human-verification gate detected");
            snapshot_page(driver, self.sink.as_ref(), "login_challenge_page").await;
            return Ok(AttemptOutcome::ChallengeDetected);
        }

        // Re-visit home before trusting the session: a redirect bounce or a
        // missing session cookie only shows up there.
        driver.goto(BASE_URL).await?;
        sleep(self.config.settle).await;
        snapshot_page(driver, self.sink.as_ref(), "login_step5_validation").await;

        let home = driver.current_url().await?;
        let has_session_cookie = driver.has_cookie(SESSION_COOKIE).await?;
        if home.as_str().contains(LOGIN_SURFACE) || !has_session_cookie {
            state = LoginState::StillAnonymous;
            warn!(%state, has_session_cookie, "session did not validate");
            return Ok(AttemptOutcome::StillAnonymous);
        }

        state = LoginState::Authenticated;
        info!(%state, "session cookie present and home reachable");
        Ok(AttemptOutcome::Authenticated(()))
    }
}

#[async_trait]
impl LoginPortal for ChromeLoginPortal {
    type Session = Session;

    async fn attempt(&mut self, credentials: &Credentials) -> AttemptOutcome<Session> {
        let mut driver = match SiftDriver::new(
            &self.config.webdriver_url,
            self.config.headless,
            self.config.stealth.clone(),
        )
        .await
        {
            Ok(driver) => driver,
            Err(err) => return AttemptOutcome::Browser(err.to_string()),
        };

        let verdict = self.drive_login(&mut driver, credentials).await;

        match verdict {
            Ok(AttemptOutcome::Authenticated(())) => {
                AttemptOutcome::Authenticated(Session::new(driver))
            }
            Ok(other) => {
                let _ = driver.close().await;
                match other {
                    AttemptOutcome::StillAnonymous => AttemptOutcome::StillAnonymous,
                    AttemptOutcome::ChallengeDetected => AttemptOutcome::ChallengeDetected,
                    AttemptOutcome::FieldNotFound => AttemptOutcome::FieldNotFound,
                    AttemptOutcome::Browser(message) => AttemptOutcome::Browser(message),
                    AttemptOutcome::Authenticated(()) => unreachable!("handled above"),
                }
            }
            Err(err) => {
                snapshot_page(&driver, self.sink.as_ref(), "login_error_critical").await;
                let _ = driver.close().await;
                AttemptOutcome::Browser(err.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Portal that replays a scripted sequence of attempt outcomes.
    struct ScriptedPortal {
        outcomes: VecDeque<AttemptOutcome<u32>>,
        attempts_made: u32,
    }

    impl ScriptedPortal {
        fn new(outcomes: Vec<AttemptOutcome<u32>>) -> Self {
            Self {
                outcomes: outcomes.into(),
                attempts_made: 0,
            }
        }
    }

    #[async_trait]
    impl LoginPortal for ScriptedPortal {
        type Session = u32;

        async fn attempt(&mut self, _credentials: &Credentials) -> AttemptOutcome<u32> {
            self.attempts_made += 1;
            self.outcomes
                .pop_front()
                .unwrap_or(AttemptOutcome::StillAnonymous)
        }
    }

    fn creds() -> Credentials {
        Credentials::new("ana", "pw")
    }

    #[tokio::test]
    async fn succeeds_when_budget_covers_the_failures() {
        // Two misses then a success; budget of three reaches it.
        let mut portal = ScriptedPortal::new(vec![
            AttemptOutcome::StillAnonymous,
            AttemptOutcome::StillAnonymous,
            AttemptOutcome::Authenticated(7),
        ]);

        let session = authenticate(&mut portal, &creds(), 3, Duration::from_millis(1))
            .await
            .expect("authenticates");
        assert_eq!(session, 7);
        assert_eq!(portal.attempts_made, 3);
    }

    #[tokio::test]
    async fn reports_exhaustion_when_budget_is_too_small() {
        let mut portal = ScriptedPortal::new(vec![
            AttemptOutcome::StillAnonymous,
            AttemptOutcome::StillAnonymous,
            AttemptOutcome::Authenticated(7),
        ]);

        let err = authenticate(&mut portal, &creds(), 2, Duration::from_millis(1))
            .await
            .expect_err("budget of two cannot reach the third outcome");
        assert_eq!(err, AuthFailure::StillAnonymous { attempts: 2 });
        assert_eq!(portal.attempts_made, 2);
    }

    #[tokio::test]
    async fn challenge_stops_all_remaining_attempts() {
        let mut portal = ScriptedPortal::new(vec![
            AttemptOutcome::StillAnonymous,
            AttemptOutcome::ChallengeDetected,
            // Would succeed, but must never be reached.
            AttemptOutcome::Authenticated(7),
        ]);

        let err = authenticate(&mut portal, &creds(), 5, Duration::from_millis(1))
            .await
            .expect_err("challenge aborts");
        assert_eq!(err, AuthFailure::ChallengeDetected);
        assert_eq!(portal.attempts_made, 2);
    }

    #[tokio::test]
    async fn missing_fields_surface_after_exhaustion() {
        let mut portal = ScriptedPortal::new(vec![
            AttemptOutcome::FieldNotFound,
            AttemptOutcome::FieldNotFound,
        ]);

        let err = authenticate(&mut portal, &creds(), 2, Duration::from_millis(1))
            .await
            .expect_err("fields never appeared");
        assert_eq!(err, AuthFailure::FieldNotFound);
    }

    #[tokio::test]
    async fn browser_faults_are_retryable() {
        let mut portal = ScriptedPortal::new(vec![
            AttemptOutcome::Browser("connection reset".into()),
            AttemptOutcome::Authenticated(3),
        ]);

        let session = authenticate(&mut portal, &creds(), 3, Duration::from_millis(1))
            .await
            .expect("second attempt wins");
        assert_eq!(session, 3);
    }
}
