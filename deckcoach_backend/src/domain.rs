//! Core value types shared by the coaching engine, the flow personalizer and
//! the conversation tracker.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Immediate,
    Planned,
    Exploratory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModernizationAppetite {
    Conservative,
    Balanced,
    Aggressive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AudienceType {
    Technical,
    Business,
    Mixed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetSensitivity {
    High,
    Medium,
    Low,
}

macro_rules! impl_as_str {
    ($ty:ty { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $ty {
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

impl_as_str!(Urgency { Immediate => "immediate", Planned => "planned", Exploratory => "exploratory" });
impl_as_str!(ModernizationAppetite { Conservative => "conservative", Balanced => "balanced", Aggressive => "aggressive" });
impl_as_str!(AudienceType { Technical => "technical", Business => "business", Mixed => "mixed" });
impl_as_str!(BudgetSensitivity { High => "high", Medium => "medium", Low => "low" });

/// Situational attributes captured during discovery. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerProfile {
    pub urgency: Urgency,
    #[serde(default)]
    pub timeline: Option<String>,
    pub modernization_appetite: ModernizationAppetite,
    pub audience_type: AudienceType,
    pub pain_points: Vec<String>,
    pub budget_sensitivity: BudgetSensitivity,
}

impl CustomerProfile {
    /// Parse a discovery result stored as TOML (camelCase keys).
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let profile: Self = toml::from_str(contents).context("Failed to parse customer profile")?;
        if profile.pain_points.iter().all(|p| p.trim().is_empty()) {
            anyhow::bail!("Customer profile needs at least one pain point");
        }
        Ok(profile)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read customer profile {:?}", path))?;
        Self::from_toml_str(&contents)
    }

    pub fn first_pain_point(&self) -> &str {
        self.pain_points
            .iter()
            .map(|p| p.trim())
            .find(|p| !p.is_empty())
            .unwrap_or("pain points")
    }

    pub fn timeline_or_unspecified(&self) -> &str {
        self.timeline
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or("Not specified")
    }

    /// Bullet block used in every generation prompt.
    pub fn prompt_block(&self) -> String {
        format!(
            "- Audience Type: {}\n\
             - Urgency: {}\n\
             - Timeline: {}\n\
             - Modernization Appetite: {}\n\
             - Pain Points: {}\n\
             - Budget Sensitivity: {}",
            self.audience_type,
            self.urgency,
            self.timeline_or_unspecified(),
            self.modernization_appetite,
            self.pain_points.join(", "),
            self.budget_sensitivity,
        )
    }
}

/// One deck entry with its coaching metadata. Read-only to the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Slide {
    pub id: u32,
    pub title: String,
    #[serde(alias = "imageUrl")]
    pub image_pointer: String,
    #[serde(default)]
    pub key_points: Vec<String>,
    #[serde(default)]
    pub potential_objections: Vec<String>,
    /// Index-aligned with `potential_objections`.
    #[serde(default)]
    pub talking_points: Vec<String>,
    #[serde(default)]
    pub red_flags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SlideContent {
    /// 1-based position in the catalog.
    pub slide_number: u32,
    /// Catalog id of the slide the text belongs to.
    #[serde(default)]
    pub slide_id: u32,
    pub title: String,
    #[serde(default)]
    pub extracted_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresentationFlow {
    pub ordered_slide_ids: Vec<u32>,
    #[serde(default)]
    pub reasoning: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TalkingPoints {
    pub slide_id: u32,
    #[serde(default)]
    pub slide_title: String,
    pub key_message1: String,
    #[serde(default)]
    pub key_message2: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Coach,
    Seller,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Challenging,
    Supportive,
    Neutral,
}

impl_as_str!(Role { Coach => "coach", Seller => "seller" });
impl_as_str!(Sentiment { Challenging => "challenging", Supportive => "supportive", Neutral => "neutral" });

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    /// Always set on coach messages, never on seller messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<Sentiment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoachResponse {
    pub content: String,
    pub sentiment: Sentiment,
}

impl CoachResponse {
    pub fn new(content: impl Into<String>, sentiment: Sentiment) -> Self {
        Self {
            content: content.into(),
            sentiment,
        }
    }

    pub fn challenging(content: impl Into<String>) -> Self {
        Self::new(content, Sentiment::Challenging)
    }

    pub fn neutral(content: impl Into<String>) -> Self {
        Self::new(content, Sentiment::Neutral)
    }
}
