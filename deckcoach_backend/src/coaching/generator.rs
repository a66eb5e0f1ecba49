use anyhow::Result;
use async_trait::async_trait;

use crate::content::format_for_prompt;
use crate::domain::{CustomerProfile, Message, Role, Slide, SlideContent};
use crate::llm_client::{ChatMessage, ChatOptions, LlmClient};

/// Everything a remote coach sees for one seller turn.
#[derive(Debug, Clone, Copy)]
pub struct CoachRequest<'a> {
    pub profile: &'a CustomerProfile,
    pub slide: &'a Slide,
    /// Full session log, oldest first.
    pub history: &'a [Message],
    pub utterance: &'a str,
    pub slide_contents: &'a [SlideContent],
    /// 0-based catalog position of `slide`, marked in the slide content block.
    pub slide_index: usize,
}

#[async_trait]
pub trait CoachGenerator: Send + Sync {
    /// Raw coach reply text for the seller's turn.
    async fn generate(&self, request: &CoachRequest<'_>) -> Result<String>;
}

pub struct LlmCoachGenerator {
    llm: LlmClient,
    history_window: usize,
}

impl LlmCoachGenerator {
    /// `history_window` is the number of trailing turns sent with each request.
    pub fn new(llm: LlmClient, history_window: usize) -> Self {
        Self {
            llm,
            history_window,
        }
    }
}

#[async_trait]
impl CoachGenerator for LlmCoachGenerator {
    async fn generate(&self, request: &CoachRequest<'_>) -> Result<String> {
        let messages = build_coach_messages(request, self.history_window);
        tracing::debug!(
            "Coach request to {}: {} messages",
            self.llm.model(),
            messages.len()
        );

        let options = ChatOptions {
            temperature: 0.8,
            max_tokens: 300,
            top_p: Some(0.95),
            json_response: false,
        };
        self.llm.chat(messages, options).await
    }
}

fn bullet_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn coach_system_prompt(request: &CoachRequest<'_>) -> String {
    let profile = request.profile;
    let slide = request.slide;

    let mut prompt = format!(
        "You are an elite sales coach training a seller to present a migration assessment to a customer. \
Your coaching style is ASSERTIVE and CHALLENGING - you push sellers to excellence and don't accept mediocre answers.

CUSTOMER CONTEXT:
- Urgency: {}
- Timeline: {}
- Modernization Appetite: {}
- Audience Type: {}
- Budget Sensitivity: {}
- Pain Points: {}

CURRENT SLIDE: {}

KEY POINTS FOR THIS SLIDE:
{}

POTENTIAL OBJECTIONS:
{}

RED FLAGS (what NOT to say):
{}",
        profile.urgency,
        profile.timeline_or_unspecified(),
        profile.modernization_appetite,
        profile.audience_type,
        profile.budget_sensitivity,
        profile.pain_points.join(", "),
        slide.title,
        bullet_list(&slide.key_points),
        bullet_list(&slide.potential_objections),
        bullet_list(&slide.red_flags),
    );

    if !request.slide_contents.is_empty() {
        prompt.push_str("\n\n");
        prompt.push_str(&format_for_prompt(request.slide_contents, request.slide_index));
    }

    prompt.push_str(
        "\n\nYOUR COACHING APPROACH:
1. Be DIRECT and CHALLENGING - don't coddle the seller
2. Call out weak language (\"maybe\", \"I think\", \"probably\")
3. Demand specificity and confidence
4. Connect their answer to the customer's specific context
5. If they hit a red flag, call it out immediately
6. When they do well, acknowledge it but then push them further
7. Keep responses conversational and realistic (100-150 words)
8. Use tough love - you want them to succeed by being excellent

Respond to the seller's answer with coaching feedback. Be tough but fair.",
    );

    prompt
}

/// System prompt, then the last `history_window` turns as assistant/user
/// messages, then the utterance.
pub fn build_coach_messages(request: &CoachRequest<'_>, history_window: usize) -> Vec<ChatMessage> {
    let start = request.history.len().saturating_sub(history_window);
    let history = &request.history[start..];

    let mut messages = Vec::with_capacity(history.len() + 2);
    messages.push(ChatMessage::system(coach_system_prompt(request)));
    messages.extend(history.iter().map(|m| match m.role {
        Role::Coach => ChatMessage::assistant(m.content.clone()),
        Role::Seller => ChatMessage::user(m.content.clone()),
    }));
    messages.push(ChatMessage::user(request.utterance));
    messages
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::domain::{
        AudienceType, BudgetSensitivity, ModernizationAppetite, Sentiment, Urgency,
    };
    use crate::llm_client::MessageContent;
    use chrono::Utc;

    #[test]
    fn messages_map_roles_and_end_with_utterance() {
        let profile = CustomerProfile {
            urgency: Urgency::Planned,
            timeline: None,
            modernization_appetite: ModernizationAppetite::Balanced,
            audience_type: AudienceType::Business,
            pain_points: vec!["licensing".to_string()],
            budget_sensitivity: BudgetSensitivity::Low,
        };
        let slide = sample_catalog().remove(0);
        let history = vec![
            Message {
                id: "0".to_string(),
                role: Role::Seller,
                content: "Dropped by the window".to_string(),
                timestamp: Utc::now(),
                sentiment: None,
            },
            Message {
                id: "1".to_string(),
                role: Role::Coach,
                content: "Opening line?".to_string(),
                timestamp: Utc::now(),
                sentiment: Some(Sentiment::Challenging),
            },
            Message {
                id: "2".to_string(),
                role: Role::Seller,
                content: "We start with cost.".to_string(),
                timestamp: Utc::now(),
                sentiment: None,
            },
        ];
        let request = CoachRequest {
            profile: &profile,
            slide: &slide,
            history: &history,
            utterance: "Here is my pitch",
            slide_contents: &[],
            slide_index: 0,
        };

        let messages = build_coach_messages(&request, 2);
        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["system", "assistant", "user", "user"]);
        assert_eq!(
            messages[3].content,
            MessageContent::Text("Here is my pitch".to_string())
        );

        let MessageContent::Text(system) = &messages[0].content else {
            panic!("system prompt should be text");
        };
        assert!(system.contains("- Timeline: Not specified"));
        assert!(system.contains("- Avoid dismissing their concerns"));
        assert!(!system.contains("PRESENTATION SLIDES CONTENT"));
    }
}
