//! Batched extraction of slide text through an external vision collaborator.

use anyhow::{Context, Result};
use async_trait::async_trait;
use base64::Engine;
use futures_util::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::time::{sleep, Duration};

use crate::content::cache::ContentCache;
use crate::domain::{Slide, SlideContent};
use crate::llm_client::LlmClient;

const MAX_IMAGE_BYTES: usize = 15 * 1024 * 1024;

/// Turns a slide image pointer into its visible text.
#[async_trait]
pub trait SlideTextSource: Send + Sync {
    async fn extract_text(&self, image_pointer: &str) -> Result<String>;
}

/// Vision-model backed source. Pointers may be data URLs, http(s) URLs, or
/// paths relative to `base_dir`.
pub struct VisionTextSource {
    llm: LlmClient,
    http: reqwest::Client,
    base_dir: PathBuf,
}

impl VisionTextSource {
    pub fn new(llm: LlmClient, http: reqwest::Client, base_dir: impl Into<PathBuf>) -> Self {
        Self {
            llm,
            http,
            base_dir: base_dir.into(),
        }
    }

    async fn load_image_bytes(&self, pointer: &str) -> Result<Vec<u8>> {
        let bytes = if pointer.starts_with("http://") || pointer.starts_with("https://") {
            let response = self
                .http
                .get(pointer)
                .send()
                .await
                .with_context(|| format!("Failed to fetch slide image {}", pointer))?;
            if !response.status().is_success() {
                anyhow::bail!("Slide image {} returned {}", pointer, response.status());
            }
            response
                .bytes()
                .await
                .with_context(|| format!("Failed to read slide image body {}", pointer))?
                .to_vec()
        } else {
            let path = resolve_path(&self.base_dir, pointer);
            tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read slide image {:?}", path))?
        };

        if bytes.is_empty() {
            anyhow::bail!("Slide image {} is empty", pointer);
        }
        if bytes.len() > MAX_IMAGE_BYTES {
            anyhow::bail!(
                "Slide image {} too large ({} bytes, max {})",
                pointer,
                bytes.len(),
                MAX_IMAGE_BYTES
            );
        }
        Ok(bytes)
    }
}

#[async_trait]
impl SlideTextSource for VisionTextSource {
    async fn extract_text(&self, image_pointer: &str) -> Result<String> {
        let data_url = if image_pointer.starts_with("data:") {
            image_pointer.to_string()
        } else {
            let bytes = self.load_image_bytes(image_pointer).await?;
            to_data_url(&bytes, image_pointer)
        };

        let text = self.llm.extract_image_text(&data_url).await?;
        tracing::debug!("Extracted {} characters from {}", text.len(), image_pointer);
        Ok(text)
    }
}

fn resolve_path(base_dir: &Path, pointer: &str) -> PathBuf {
    let candidate = Path::new(pointer.trim_start_matches('/'));
    if Path::new(pointer).is_absolute() && Path::new(pointer).exists() {
        PathBuf::from(pointer)
    } else {
        base_dir.join(candidate)
    }
}

fn mime_type_from_pointer(pointer: &str) -> &'static str {
    let lower = pointer.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".gif") {
        "image/gif"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "image/jpeg"
    }
}

/// Base64 data URL with the MIME type sniffed from the bytes, falling back to the extension.
pub fn to_data_url(bytes: &[u8], pointer: &str) -> String {
    let mime = image::guess_format(bytes)
        .map(|format| format.to_mime_type())
        .unwrap_or_else(|_| mime_type_from_pointer(pointer));
    let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{};base64,{}", mime, encoded)
}

pub struct ContentSummarizer {
    source: Option<Arc<dyn SlideTextSource>>,
    cache: Option<ContentCache>,
    batch_size: usize,
    batch_delay: Duration,
}

impl ContentSummarizer {
    pub fn new(
        source: Option<Arc<dyn SlideTextSource>>,
        cache: Option<ContentCache>,
        batch_size: usize,
        batch_delay: Duration,
    ) -> Self {
        Self {
            source,
            cache,
            batch_size: batch_size.max(1),
            batch_delay,
        }
    }

    pub fn is_available(&self) -> bool {
        self.source.is_some()
    }

    pub fn cache(&self) -> Option<&ContentCache> {
        self.cache.as_ref()
    }

    /// Extract text for every catalog slide, in catalog order.
    ///
    /// Never fails: an unavailable source or a failed slide yields empty text.
    pub async fn summarize(&self, slides: &[Slide]) -> Vec<SlideContent> {
        if let Some(cached) = self.cache.as_ref().and_then(|c| c.load(slides)) {
            return cached;
        }

        let Some(source) = self.source.as_ref() else {
            tracing::warn!("Slide content source not configured; continuing without slide text");
            return empty_contents(slides);
        };

        let total_batches = slides.len().div_ceil(self.batch_size);
        tracing::info!(
            "Extracting text from {} slides in {} batches",
            slides.len(),
            total_batches
        );

        let mut results = Vec::with_capacity(slides.len());
        for (batch_index, batch) in slides.chunks(self.batch_size).enumerate() {
            let offset = batch_index * self.batch_size;
            let extractions = batch.iter().enumerate().map(|(i, slide)| {
                let source = source.clone();
                let slide_number = (offset + i + 1) as u32;
                async move {
                    let extracted_text = match source.extract_text(&slide.image_pointer).await {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::warn!(
                                "Text extraction failed for slide {} ({}): {:#}",
                                slide.id,
                                slide.title,
                                e
                            );
                            String::new()
                        }
                    };
                    SlideContent {
                        slide_number,
                        slide_id: slide.id,
                        title: slide.title.clone(),
                        extracted_text,
                    }
                }
            });

            results.extend(join_all(extractions).await);
            tracing::debug!("Completed batch {}/{}", batch_index + 1, total_batches);

            if batch_index + 1 < total_batches && !self.batch_delay.is_zero() {
                sleep(self.batch_delay).await;
            }
        }

        if results.iter().any(|c| !c.extracted_text.trim().is_empty()) {
            if let Some(cache) = &self.cache {
                if let Err(e) = cache.save(&results) {
                    tracing::warn!("Failed to save slide content cache: {:#}", e);
                }
            }
        } else {
            tracing::warn!("No slide produced any text; not caching");
        }

        results
    }
}

fn empty_contents(slides: &[Slide]) -> Vec<SlideContent> {
    slides
        .iter()
        .enumerate()
        .map(|(i, slide)| SlideContent {
            slide_number: (i + 1) as u32,
            slide_id: slide.id,
            title: slide.title.clone(),
            extracted_text: String::new(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::session::store::{KeyValueStore, MemoryStore};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedSource {
        calls: AtomicUsize,
        fail_on: Option<&'static str>,
    }

    #[async_trait]
    impl SlideTextSource for ScriptedSource {
        async fn extract_text(&self, image_pointer: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(image_pointer) == self.fail_on {
                anyhow::bail!("rate limited");
            }
            Ok(format!("text for {}", image_pointer))
        }
    }

    fn scripted(fail_on: Option<&'static str>) -> Arc<ScriptedSource> {
        Arc::new(ScriptedSource {
            calls: AtomicUsize::new(0),
            fail_on,
        })
    }

    fn memory_cache() -> ContentCache {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        ContentCache::new(store, "v1", 7)
    }

    #[tokio::test]
    async fn unconfigured_source_yields_empty_text() {
        let summarizer = ContentSummarizer::new(None, Some(memory_cache()), 3, Duration::ZERO);
        let slides = sample_catalog();
        let contents = summarizer.summarize(&slides).await;

        assert_eq!(contents.len(), slides.len());
        assert!(contents.iter().all(|c| c.extracted_text.is_empty()));
        assert_eq!(contents[2].slide_number, 3);
        assert!(summarizer.cache().unwrap().load(&slides).is_none());
    }

    #[tokio::test]
    async fn failed_slide_does_not_abort_later_batches() {
        let source = scripted(Some("slides/Slide02.JPG"));
        let summarizer =
            ContentSummarizer::new(Some(source.clone()), None, 3, Duration::from_millis(1));
        let contents = summarizer.summarize(&sample_catalog()).await;

        assert_eq!(contents.len(), 4);
        assert_eq!(source.calls.load(Ordering::SeqCst), 4);
        assert_eq!(contents[1].extracted_text, "");
        assert_eq!(contents[3].extracted_text, "text for slides/Slide04.JPG");
        let numbers: Vec<u32> = contents.iter().map(|c| c.slide_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn second_run_is_served_from_cache() {
        let source = scripted(None);
        let summarizer =
            ContentSummarizer::new(Some(source.clone()), Some(memory_cache()), 2, Duration::ZERO);
        let slides = sample_catalog();

        let first = summarizer.summarize(&slides).await;
        let second = summarizer.summarize(&slides).await;

        assert_eq!(first, second);
        assert_eq!(source.calls.load(Ordering::SeqCst), slides.len());
    }

    #[tokio::test]
    async fn other_deck_of_same_size_is_re_extracted() {
        let source = scripted(None);
        let summarizer =
            ContentSummarizer::new(Some(source.clone()), Some(memory_cache()), 4, Duration::ZERO);
        let first_deck = sample_catalog();
        let mut second_deck = sample_catalog();
        for (i, slide) in second_deck.iter_mut().enumerate() {
            slide.id = 100 + i as u32;
            slide.image_pointer = format!("other/Slide{:02}.png", i + 1);
        }

        summarizer.summarize(&first_deck).await;
        let contents = summarizer.summarize(&second_deck).await;

        assert_eq!(source.calls.load(Ordering::SeqCst), 8);
        assert_eq!(contents[0].slide_id, 100);
        assert_eq!(contents[0].extracted_text, "text for other/Slide01.png");
    }

    #[test]
    fn data_url_sniffs_png_magic() {
        let png_header = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];
        let url = to_data_url(&png_header, "slides/Slide01.JPG");
        assert!(url.starts_with("data:image/png;base64,"));

        let unknown = to_data_url(b"plain bytes", "slides/Slide01.JPG");
        assert!(unknown.starts_with("data:image/jpeg;base64,"));
    }
}
