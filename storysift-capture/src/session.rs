//! The authenticated browser session.
//!
//! A [`Session`] only comes out of [`crate::auth::authenticate`]; holding one
//! is the proof that login validation passed. The capture engine re-checks
//! [`Session::is_live`] before every identity because the target can expire
//! the session server-side at any point.

use storysift_drivers::browser::driver::SiftDriver;

pub const BASE_URL: &str = "https://www.instagram.com/";
pub const LOGIN_SURFACE: &str = "/accounts/login/";
pub const SESSION_COOKIE: &str = "sessionid";

/// Build the story page URL for one identity.
pub fn story_page_url(identity: &str) -> String {
    format!("{BASE_URL}stories/{identity}/")
}

/// One authenticated browser context, reused across the whole batch.
pub struct Session {
    driver: SiftDriver,
}

impl Session {
    pub(crate) fn new(driver: SiftDriver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> &SiftDriver {
        &self.driver
    }

    pub fn driver_mut(&mut self) -> &mut SiftDriver {
        &mut self.driver
    }

    /// Cheap liveness probe: the session cookie must still exist and the
    /// browser must not have been bounced back to the login surface. Any
    /// transport error counts as lost: a session we cannot inspect is a
    /// session we cannot use.
    pub async fn is_live(&self) -> bool {
        match self.driver.current_url().await {
            Ok(url) if url.as_str().contains(LOGIN_SURFACE) => return false,
            Ok(_) => {}
            Err(_) => return false,
        }
        self.driver.has_cookie(SESSION_COOKIE).await.unwrap_or(false)
    }

    /// Tear the browser down. Callers must reach this on every exit path.
    pub async fn close(self) -> anyhow::Result<()> {
        self.driver.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn story_page_url_targets_the_identity() {
        assert_eq!(
            story_page_url("ana.paula"),
            "https://www.instagram.com/stories/ana.paula/"
        );
    }
}
