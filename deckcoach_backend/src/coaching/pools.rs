//! Canned coaching lines grouped by category, plus the sampling helper.

use rand::Rng;

use crate::domain::{AudienceType, BudgetSensitivity, Urgency};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResponseCategory {
    GenericChallenge,
    Praise,
    PraiseFollowUp,
    Audience(AudienceType),
    Urgency(Urgency),
}

const GENERIC_CHALLENGES: &[&str] = &[
    "That's surface-level. Your customer is going to see right through that. What's the REAL story here?",
    "Stop dancing around it. If you were sitting across from this customer right now, would that answer actually close the deal?",
    "I've heard better answers from first-year reps. You know this material - now PROVE it.",
    "Weak. You're letting them control the narrative. How do you flip this conversation?",
    "That sounds rehearsed and hollow. Give me authenticity, not a script.",
    "You're avoiding the hard part of this objection. Address it head-on.",
    "If I'm the customer, I just tuned out. You lost me. Try again with conviction.",
    "Too many qualifiers, not enough confidence. Own this answer.",
];

const PRAISE: &[&str] = &[
    "Now we're talking. That's the energy this customer needs to see. Keep that momentum.",
    "Solid. You're connecting the technical details to business outcomes. That's what wins deals.",
    "Good. You acknowledged their concern without getting defensive. That builds trust.",
    "Exactly. You're not just selling a migration - you're selling transformation. They need to feel that.",
    "That's the kind of answer that makes a CTO lean forward in their chair. Well done.",
    "Perfect. You've turned their objection into an opportunity. That's advanced selling.",
    "Yes. You're speaking their language now. This is how you build credibility.",
];

// Every follow-up ends in a question so praise never stands alone.
const PRAISE_FOLLOW_UPS: &[&str] = &[
    "But don't get comfortable - what happens when they push back on this?",
    "Now, what's the customer's next objection going to be?",
    "Good start. But how do you handle it if they're not buying it?",
    "But I want to see you go deeper. What's the implication of what you just said?",
];

const TECHNICAL_AUDIENCE: &[&str] = &[
    "Your audience knows their stuff. That answer isn't technical enough. Give me architecture, not buzzwords.",
    "A technical audience will grill you on implementation. How does this ACTUALLY work?",
    "They're going to ask about edge cases and failure scenarios. Are you ready for that?",
];

const BUSINESS_AUDIENCE: &[&str] = &[
    "Business stakeholders care about one thing: ROI. Where's the money story in your answer?",
    "You're getting too technical. Translate that into business value or lose them.",
    "CFOs don't care about your tech stack. They care about risk and return. Connect those dots.",
];

const MIXED_AUDIENCE: &[&str] = &[
    "You need to satisfy both technical and business people in the room. That answer only hits one side.",
    "Split audience means you need to bridge technical execution with business value. Try again.",
];

const IMMEDIATE_URGENCY: &[&str] = &[
    "This customer has a deadline breathing down their neck. Your answer needs urgency and confidence.",
    "They're looking for someone who can move fast without cutting corners. Does your response show that?",
];

const PLANNED_URGENCY: &[&str] = &[
    "This is strategic for them. Show me you understand the long game, not just the quick win.",
    "They're planning ahead - that means they'll scrutinize every detail. Is your answer bulletproof?",
];

const EXPLORATORY_URGENCY: &[&str] = &[
    "They're gathering information, which means you need to educate AND inspire. Are you doing both?",
    "Exploratory doesn't mean low-stakes. This is your chance to shape their entire approach.",
];

impl ResponseCategory {
    pub fn templates(self) -> &'static [&'static str] {
        match self {
            ResponseCategory::GenericChallenge => GENERIC_CHALLENGES,
            ResponseCategory::Praise => PRAISE,
            ResponseCategory::PraiseFollowUp => PRAISE_FOLLOW_UPS,
            ResponseCategory::Audience(AudienceType::Technical) => TECHNICAL_AUDIENCE,
            ResponseCategory::Audience(AudienceType::Business) => BUSINESS_AUDIENCE,
            ResponseCategory::Audience(AudienceType::Mixed) => MIXED_AUDIENCE,
            ResponseCategory::Urgency(Urgency::Immediate) => IMMEDIATE_URGENCY,
            ResponseCategory::Urgency(Urgency::Planned) => PLANNED_URGENCY,
            ResponseCategory::Urgency(Urgency::Exploratory) => EXPLORATORY_URGENCY,
        }
    }
}

/// Uniform pick from a non-empty template list.
pub fn sample<'a, R: Rng + ?Sized>(rng: &mut R, templates: &[&'a str]) -> &'a str {
    if templates.is_empty() {
        return "";
    }
    templates[rng.gen_range(0..templates.len())]
}

pub fn sample_category<R: Rng + ?Sized>(rng: &mut R, category: ResponseCategory) -> &'static str {
    sample(rng, category.templates())
}

/// Audience pool followed by urgency pool for the profile pair.
pub fn contextual_pool(audience: AudienceType, urgency: Urgency) -> Vec<&'static str> {
    let mut pool = ResponseCategory::Audience(audience).templates().to_vec();
    pool.extend_from_slice(ResponseCategory::Urgency(urgency).templates());
    pool
}

pub fn red_flag_warning(flag: &str) -> String {
    format!(
        "STOP. You just said something that's on the red flag list for this slide. \"{}\". \
         That's exactly what NOT to do. Let's try this again, and this time, think about what \
         you're actually trying to achieve here.",
        flag
    )
}

pub fn hedging_callout(hedge_terms: &[String]) -> String {
    let quoted = if hedge_terms.is_empty() {
        "\"Maybe\"? \"I think\"? \"Probably\"?".to_string()
    } else {
        hedge_terms
            .iter()
            .map(|term| format!("\"{}\"?", capitalize(term)))
            .collect::<Vec<_>>()
            .join(" ")
    };
    format!(
        "{} This is a sales conversation, not a college essay. Confidence sells. Uncertainty kills \
         deals. Remove the hedging and give me a statement your customer can believe in.",
        quoted
    )
}

pub fn brevity_push(budget: BudgetSensitivity) -> String {
    let stakes = match budget {
        BudgetSensitivity::High => "serious money",
        BudgetSensitivity::Medium | BudgetSensitivity::Low => "hundreds of thousands",
    };
    format!(
        "That's it? You're giving me a one-liner when your customer needs substance. They're \
         investing {} and you think that level of detail is sufficient? Elaborate.",
        stakes
    )
}

pub const ROI_CHALLENGE: &str = "This customer is watching every dollar. Your answer needs to scream ROI, \
not just list features. How quickly do they see returns? What happens if they DON'T invest? \
Make me feel the cost of inaction.";

pub const READ_THE_ROOM: &str = "Hold up. This customer wants CONSERVATIVE modernization and you're \
pushing cloud-native everything? Read the room. How do you deliver value without scaring them off?";

pub fn workable(pain_point: &str) -> String {
    format!(
        "Okay, that's workable. Not great, but workable. You're on the right track, but you need \
         to connect this more directly to their {}. How does what you just said solve THEIR \
         problem specifically?",
        pain_point
    )
}

fn capitalize(term: &str) -> String {
    let mut chars = term.chars();
    match chars.next() {
        Some(first) => {
            let rest: String = chars.collect();
            // "i think" reads as "I think"
            format!("{}{}", first.to_uppercase(), rest)
        }
        None => String::new(),
    }
}
