use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::{Slide, SlideContent};
use crate::session::store::KeyValueStore;

pub const CONTENT_CACHE_KEY: &str = "deckcoach.slide_content";

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedContent {
    version: String,
    saved_at: DateTime<Utc>,
    slides: Vec<SlideContent>,
}

/// Versioned, time-limited cache of extracted slide text.
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn KeyValueStore>,
    version: String,
    ttl: ChronoDuration,
}

impl ContentCache {
    pub fn new(store: Arc<dyn KeyValueStore>, version: impl Into<String>, ttl_days: i64) -> Self {
        Self {
            store,
            version: version.into(),
            ttl: ChronoDuration::days(ttl_days.max(0)),
        }
    }

    /// Cached slides, if present, same version, younger than the TTL and
    /// extracted from the same deck (ids and titles in catalog order).
    pub fn load(&self, slides: &[Slide]) -> Option<Vec<SlideContent>> {
        self.load_at(slides, Utc::now())
    }

    pub fn load_at(&self, slides: &[Slide], now: DateTime<Utc>) -> Option<Vec<SlideContent>> {
        let raw = match self.store.get(CONTENT_CACHE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!("Failed to read slide content cache: {:#}", e);
                return None;
            }
        };

        let cached: CachedContent = match serde_json::from_str(&raw) {
            Ok(cached) => cached,
            Err(e) => {
                tracing::warn!("Discarding unreadable slide content cache: {}", e);
                return None;
            }
        };

        if cached.version != self.version {
            tracing::info!(
                "Slide content cache version {} != {}, will re-extract",
                cached.version,
                self.version
            );
            return None;
        }

        let age = now - cached.saved_at;
        if age > self.ttl {
            tracing::info!("Slide content cache expired ({} hours old)", age.num_hours());
            return None;
        }

        if cached.slides.len() != slides.len() {
            tracing::info!(
                "Slide content cache holds {} slides, catalog has {}",
                cached.slides.len(),
                slides.len()
            );
            return None;
        }

        let same_deck = cached
            .slides
            .iter()
            .zip(slides)
            .all(|(content, slide)| content.slide_id == slide.id && content.title == slide.title);
        if !same_deck {
            tracing::info!("Slide content cache belongs to a different deck, will re-extract");
            return None;
        }

        tracing::info!(
            "Loaded {} slides from content cache ({} hours old)",
            cached.slides.len(),
            age.num_hours()
        );
        Some(cached.slides)
    }

    pub fn save(&self, slides: &[SlideContent]) -> Result<()> {
        self.save_at(slides, Utc::now())
    }

    pub fn save_at(&self, slides: &[SlideContent], now: DateTime<Utc>) -> Result<()> {
        let payload = CachedContent {
            version: self.version.clone(),
            saved_at: now,
            slides: slides.to_vec(),
        };
        let raw = serde_json::to_string(&payload).context("Failed to serialize content cache")?;
        self.store.set(CONTENT_CACHE_KEY, &raw)?;
        tracing::info!("Saved {} slides to content cache", slides.len());
        Ok(())
    }

    pub fn clear(&self) -> Result<()> {
        self.store.clear(CONTENT_CACHE_KEY)?;
        tracing::info!("Slide content cache cleared");
        Ok(())
    }
}
