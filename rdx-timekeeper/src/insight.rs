//! The productivity tip panel's collaborator.
//!
//! A tip source answers a fixed prompt with a title and a tip. Sources may
//! fail; callers go through [`tip_or_fallback`], which never does.

use crate::config::TipConfig;
use serde::Deserialize;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::warn;

/// The prompt every tip source is asked.
pub const TIP_PROMPT: &str = "Give me a short, unique productivity tip or focus exercise \
for someone using a timer or stopwatch right now.";

/// A titled productivity tip.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Tip {
    pub title: String,
    pub tip: String,
}

impl Tip {
    pub fn fallback() -> Self {
        Self {
            title: "Focus Hack".to_string(),
            tip: "Try the 50/10 rule: 50 minutes of deep work followed by a 10-minute movement break."
                .to_string(),
        }
    }
}

/// Something that can answer [`TIP_PROMPT`].
pub trait TipSource {
    fn fetch_tip(&self) -> impl Future<Output = anyhow::Result<Tip>> + Send;
}

/// Fetches one tip, substituting [`Tip::fallback`] on any failure. No retry.
pub async fn tip_or_fallback<S: TipSource>(source: &S) -> Tip {
    match source.fetch_tip().await {
        Ok(tip) => tip,
        Err(err) => {
            warn!("tip source failed, using fallback: {err:#}");
            Tip::fallback()
        }
    }
}

/// A local source cycling through a configured list.
#[derive(Debug, Default)]
pub struct TipDeck {
    tips: Vec<Tip>,
    cursor: AtomicUsize,
}

impl TipDeck {
    pub fn new(tips: Vec<Tip>) -> Self {
        Self {
            tips,
            cursor: AtomicUsize::new(0),
        }
    }
}

impl From<&TipConfig> for TipDeck {
    fn from(config: &TipConfig) -> Self {
        Self::new(
            config
                .deck
                .iter()
                .map(|entry| Tip {
                    title: entry.title.clone(),
                    tip: entry.tip.clone(),
                })
                .collect(),
        )
    }
}

impl TipSource for TipDeck {
    fn fetch_tip(&self) -> impl Future<Output = anyhow::Result<Tip>> + Send {
        let next = if self.tips.is_empty() {
            Err(anyhow::anyhow!("tip deck is empty"))
        } else {
            let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.tips.len();
            Ok(self.tips[index].clone())
        };
        std::future::ready(next)
    }
}
