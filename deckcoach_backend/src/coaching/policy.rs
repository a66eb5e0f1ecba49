//! Local feedback policy: turns a feature set plus profile and history into a
//! single coach reply.
//!
//! Precedence is fixed and the first matching rule wins:
//!
//! 1. red-flag collision
//! 2. hedging
//! 3. brevity
//! 4. praise (strength or objection addressed), always followed by a question
//! 5. contextual challenge (audience + urgency pools) with a configurable probability
//! 6. profile overrides (ROI for budget-sensitive investment slides, "read the
//!    room" for conservative customers hearing cloud-native)
//! 7. generic challenge, throttled into a neutral "workable" reply when the
//!    recent coach turns were already mostly challenging
//!
//! The engine never fails: every path ends in a `CoachResponse`.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::coaching::features::FeatureSet;
use crate::coaching::pools::{self, ResponseCategory};
use crate::config::CoachConfig;
use crate::domain::{
    BudgetSensitivity, CoachResponse, CustomerProfile, Message, ModernizationAppetite,
    Role, Sentiment, Slide,
};

const INVESTMENT_KEYWORD: &str = "investment";

/// Which rule produced the reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyBranch {
    RedFlag,
    Hedging,
    Brevity,
    Praise,
    RoiOverride,
    ReadTheRoom,
    Contextual,
    Generic,
    Workable,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PolicySettings {
    pub contextual_challenge_probability: f64,
    pub throttle_window: usize,
    pub throttle_threshold: usize,
    pub throttle_escape_probability: f64,
}

impl Default for PolicySettings {
    fn default() -> Self {
        Self::from(&CoachConfig::default())
    }
}

impl From<&CoachConfig> for PolicySettings {
    fn from(config: &CoachConfig) -> Self {
        Self {
            contextual_challenge_probability: config.contextual_challenge_probability,
            throttle_window: config.throttle_window,
            throttle_threshold: config.throttle_threshold,
            throttle_escape_probability: config.throttle_escape_probability,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    pub branch: PolicyBranch,
    pub response: CoachResponse,
}

#[derive(Debug, Clone, Default)]
pub struct FeedbackPolicy {
    settings: PolicySettings,
}

impl FeedbackPolicy {
    pub fn new(settings: PolicySettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &PolicySettings {
        &self.settings
    }

    pub fn evaluate<R: Rng + ?Sized>(
        &self,
        features: &FeatureSet,
        profile: &CustomerProfile,
        slide: &Slide,
        history: &[Message],
        rng: &mut R,
    ) -> CoachResponse {
        self.decide(features, profile, slide, history, rng).response
    }

    pub fn decide<R: Rng + ?Sized>(
        &self,
        features: &FeatureSet,
        profile: &CustomerProfile,
        slide: &Slide,
        history: &[Message],
        rng: &mut R,
    ) -> PolicyDecision {
        let decision = self.select(features, profile, slide, history, rng);
        tracing::debug!(
            "Policy branch {:?} -> {} (slide {})",
            decision.branch,
            decision.response.sentiment,
            slide.id
        );
        decision
    }

    fn select<R: Rng + ?Sized>(
        &self,
        features: &FeatureSet,
        profile: &CustomerProfile,
        slide: &Slide,
        history: &[Message],
        rng: &mut R,
    ) -> PolicyDecision {
        if let Some(flag) = &features.red_flag {
            return decision(
                PolicyBranch::RedFlag,
                CoachResponse::challenging(pools::red_flag_warning(flag)),
            );
        }

        if features.hedging {
            return decision(
                PolicyBranch::Hedging,
                CoachResponse::challenging(pools::hedging_callout(&features.hedge_terms)),
            );
        }

        if features.brief {
            return decision(
                PolicyBranch::Brevity,
                CoachResponse::challenging(pools::brevity_push(profile.budget_sensitivity)),
            );
        }

        if earns_praise(features) {
            let praise = pools::sample_category(rng, ResponseCategory::Praise);
            let follow_up = pools::sample_category(rng, ResponseCategory::PraiseFollowUp);
            return decision(
                PolicyBranch::Praise,
                CoachResponse::new(format!("{} {}", praise, follow_up), Sentiment::Supportive),
            );
        }

        if roll(rng, self.settings.contextual_challenge_probability) {
            let pool = pools::contextual_pool(profile.audience_type, profile.urgency);
            return decision(
                PolicyBranch::Contextual,
                CoachResponse::challenging(pools::sample(rng, &pool)),
            );
        }

        if profile.budget_sensitivity == BudgetSensitivity::High
            && slide.title.to_lowercase().contains(INVESTMENT_KEYWORD)
        {
            return decision(
                PolicyBranch::RoiOverride,
                CoachResponse::challenging(pools::ROI_CHALLENGE),
            );
        }

        if profile.modernization_appetite == ModernizationAppetite::Conservative
            && features.mentions_cloud_native
        {
            return decision(
                PolicyBranch::ReadTheRoom,
                CoachResponse::challenging(pools::READ_THE_ROOM),
            );
        }

        let recent_challenges =
            recent_challenging_count(history, self.settings.throttle_window);
        if recent_challenges >= self.settings.throttle_threshold
            && !roll(rng, self.settings.throttle_escape_probability)
        {
            return decision(
                PolicyBranch::Workable,
                CoachResponse::neutral(pools::workable(profile.first_pain_point())),
            );
        }

        decision(
            PolicyBranch::Generic,
            CoachResponse::challenging(pools::sample_category(
                rng,
                ResponseCategory::GenericChallenge,
            )),
        )
    }
}

fn decision(branch: PolicyBranch, response: CoachResponse) -> PolicyDecision {
    PolicyDecision { branch, response }
}

// Jargon disqualifies an otherwise strong answer whatever the audience.
fn earns_praise(features: &FeatureSet) -> bool {
    (features.strength && !features.jargon) || features.objection_addressed
}

fn roll<R: Rng + ?Sized>(rng: &mut R, probability: f64) -> bool {
    let p = if probability.is_finite() {
        probability.clamp(0.0, 1.0)
    } else {
        0.0
    };
    rng.gen_bool(p)
}

/// Challenging tags among the last `window` coach messages.
pub fn recent_challenging_count(history: &[Message], window: usize) -> usize {
    history
        .iter()
        .rev()
        .filter(|m| m.role == Role::Coach)
        .take(window)
        .filter(|m| m.sentiment == Some(Sentiment::Challenging))
        .count()
}
