use anyhow::Result;
use fantoccini::elements::Element;
use rand::rngs::OsRng;
use rand::Rng;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Default)]
/// Produces human‑like delays, typing, and clicking to reduce automation
/// signals.
pub struct BehavioralEngine {}

impl BehavioralEngine {
    pub fn new() -> Self {
        Self {}
    }

    /// Sleep for a random duration between `min` and `max` milliseconds.
    pub async fn random_delay(&self, min: u64, max: u64) {
        let mut rng = OsRng;
        let ms = rng.gen_range(min..=max);
        sleep(Duration::from_millis(ms)).await;
    }

    /// Type the provided text with small random delays between characters.
    pub async fn type_text_human_like(&self, element: &Element, text: &str) -> Result<()> {
        for ch in text.chars() {
            element.send_keys(&ch.to_string()).await?;
            self.random_delay(30, 150).await;
        }
        Ok(())
    }

    /// Clear a field, pause, then type into it, the way a person would
    /// replace a pre-filled value.
    pub async fn refill_field(&self, element: &Element, text: &str) -> Result<()> {
        element.clear().await?;
        self.random_delay(300, 700).await;
        self.type_text_human_like(element, text).await
    }

    /// Click with a small pre-click hesitation.
    pub async fn click_like_human(&self, element: &Element) -> Result<()> {
        self.random_delay(200, 900).await;
        element.clone().click().await?;
        Ok(())
    }
}
