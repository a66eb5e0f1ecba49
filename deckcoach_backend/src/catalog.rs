use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use crate::domain::Slide;

const SAMPLE_SLIDE_COUNT: u32 = 4;

const DEFAULT_KEY_POINTS: [&str; 4] = [
    "Focus on customer value and business outcomes",
    "Connect technical details to their specific pain points",
    "Use concrete examples and real-world scenarios",
    "Address concerns proactively before they become objections",
];

const DEFAULT_OBJECTIONS: [&str; 4] = [
    "How does this specifically apply to our situation?",
    "What are the risks involved?",
    "Can you provide concrete examples or case studies?",
    "How long will this take and what resources are needed?",
];

const DEFAULT_TALKING_POINTS: [&str; 4] = [
    "Based on the assessment, we've identified specific areas where this applies to your environment",
    "We've built in risk mitigation strategies at every phase",
    "I can share similar successful projects with comparable complexity",
    "The timeline is based on similar engagements, with built-in flexibility",
];

const DEFAULT_RED_FLAGS: [&str; 4] = [
    "Don't make promises you can't keep",
    "Avoid dismissing their concerns",
    "Don't oversimplify complex technical challenges",
    "Never criticize their current setup without offering solutions",
];

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// The built-in sample deck with generic coaching metadata.
pub fn sample_catalog() -> Vec<Slide> {
    (1..=SAMPLE_SLIDE_COUNT)
        .map(|id| Slide {
            id,
            title: format!("Slide {}", id),
            image_pointer: format!("slides/Slide{:02}.JPG", id),
            key_points: owned(&DEFAULT_KEY_POINTS),
            potential_objections: owned(&DEFAULT_OBJECTIONS),
            talking_points: owned(&DEFAULT_TALKING_POINTS),
            red_flags: owned(&DEFAULT_RED_FLAGS),
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    slides: Vec<Slide>,
}

/// Parse a TOML catalog made of `[[slides]]` tables.
pub fn parse_catalog(contents: &str) -> Result<Vec<Slide>> {
    let file: CatalogFile = toml::from_str(contents).context("Failed to parse slide catalog")?;
    validate_catalog(&file.slides)?;
    Ok(file.slides)
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<Vec<Slide>> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read slide catalog {:?}", path))?;
    let slides = parse_catalog(&contents)?;
    tracing::info!("Loaded {} slides from {:?}", slides.len(), path);
    Ok(slides)
}

/// Ids must be positive and unique; the deck must not be empty.
pub fn validate_catalog(slides: &[Slide]) -> Result<()> {
    if slides.is_empty() {
        anyhow::bail!("Slide catalog is empty");
    }

    let mut seen = HashSet::new();
    for slide in slides {
        if slide.id == 0 {
            anyhow::bail!("Slide '{}' has id 0; ids must be positive", slide.title);
        }
        if !seen.insert(slide.id) {
            anyhow::bail!("Duplicate slide id {} in catalog", slide.id);
        }
        if slide.talking_points.len() != slide.potential_objections.len() {
            tracing::warn!(
                "Slide {} has {} objections but {} talking points",
                slide.id,
                slide.potential_objections.len(),
                slide.talking_points.len()
            );
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_is_valid() {
        let slides = sample_catalog();
        assert_eq!(slides.len(), 4);
        assert_eq!(slides[0].image_pointer, "slides/Slide01.JPG");
        validate_catalog(&slides).expect("valid");
    }

    #[test]
    fn parses_toml_catalog() {
        let slides = parse_catalog(
            r#"
            [[slides]]
            id = 8
            title = "Investment Summary"
            imagePointer = "slides/Slide08.JPG"
            redFlags = ["Never quote a number you cannot defend"]

            [[slides]]
            id = 9
            title = "Roadmap"
            imageUrl = "slides/Slide09.JPG"
            "#,
        )
        .expect("catalog");

        assert_eq!(slides.len(), 2);
        assert_eq!(slides[0].red_flags.len(), 1);
        assert_eq!(slides[1].image_pointer, "slides/Slide09.JPG");
        assert!(slides[1].potential_objections.is_empty());
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut slides = sample_catalog();
        slides[1].id = 1;
        let err = validate_catalog(&slides).unwrap_err();
        assert!(err.to_string().contains("Duplicate slide id 1"));
    }
}
