use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use deckcoach_backend::catalog::sample_catalog;
use deckcoach_backend::coaching::generator::{CoachGenerator, CoachRequest};
use deckcoach_backend::coaching::policy::PolicyBranch;
use deckcoach_backend::coaching::ReplySource;
use deckcoach_backend::collaborator::FallbackCause;
use deckcoach_backend::config::CoachConfig;
use deckcoach_backend::content::summarizer::SlideTextSource;
use deckcoach_backend::domain::{
    AudienceType, BudgetSensitivity, CustomerProfile, ModernizationAppetite, Role, Sentiment,
    Slide, Urgency,
};
use deckcoach_backend::flow::generator::PlanGenerator;
use deckcoach_backend::runtime::{CoachRuntime, CoachRuntimeBuilder};
use deckcoach_backend::session::store::{KeyValueStore, MemoryStore};

fn offline_config() -> CoachConfig {
    CoachConfig {
        llm_api_url: String::new(),
        llm_api_key: None,
        thinking_delay_ms: 0,
        extraction_batch_delay_ms: 0,
        random_seed: Some(42),
        ..CoachConfig::default()
    }
}

fn technical_profile() -> CustomerProfile {
    CustomerProfile {
        urgency: Urgency::Immediate,
        timeline: None,
        modernization_appetite: ModernizationAppetite::Aggressive,
        audience_type: AudienceType::Technical,
        pain_points: vec!["cost".to_string()],
        budget_sensitivity: BudgetSensitivity::High,
    }
}

fn five_slide_catalog() -> Vec<Slide> {
    let mut slides = sample_catalog();
    let mut fifth = slides[3].clone();
    fifth.id = 5;
    fifth.title = "Slide 5".to_string();
    slides.push(fifth);
    slides
}

fn offline_runtime(store: Arc<dyn KeyValueStore>) -> CoachRuntime {
    CoachRuntimeBuilder::new(offline_config())
        .with_store(store)
        .build()
        .unwrap()
}

struct CannedPlanner {
    flow: String,
    talking_points: String,
}

#[async_trait]
impl PlanGenerator for CannedPlanner {
    async fn generate_flow(&self, _system_prompt: &str) -> Result<String> {
        Ok(self.flow.clone())
    }

    async fn generate_talking_points(&self, _system_prompt: &str) -> Result<String> {
        Ok(self.talking_points.clone())
    }
}

/// Returns the pointer as text, failing for slide 2's image.
struct CountingSource {
    calls: AtomicUsize,
}

#[async_trait]
impl SlideTextSource for CountingSource {
    async fn extract_text(&self, image_pointer: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if image_pointer.contains("Slide02") {
            anyhow::bail!("vision request timed out");
        }
        Ok(format!("text of {}", image_pointer))
    }
}

struct FailingCoach;

#[async_trait]
impl CoachGenerator for FailingCoach {
    async fn generate(&self, _request: &CoachRequest<'_>) -> Result<String> {
        anyhow::bail!("503 Service Unavailable")
    }
}

#[tokio::test]
async fn unconfigured_collaborators_degrade_to_defaults() {
    let runtime = offline_runtime(Arc::new(MemoryStore::new()));
    let catalog = sample_catalog();
    let session = runtime
        .start_session(technical_profile(), &catalog)
        .await
        .unwrap();

    assert!(session
        .slide_contents()
        .iter()
        .all(|c| c.extracted_text.is_empty()));
    assert_eq!(session.flow().ordered_slide_ids, vec![1, 2, 3, 4]);
    assert!(session.flow().reasoning.contains("not configured"));
    assert!(session.talking_points().is_empty());
    assert!(session.current_talking_points().is_none());

    let opening = &session.messages()[0];
    assert_eq!(opening.role, Role::Coach);
    assert_eq!(opening.sentiment, Some(Sentiment::Challenging));
}

#[tokio::test]
async fn hedging_wins_over_cloud_native_for_aggressive_customers() {
    let runtime = offline_runtime(Arc::new(MemoryStore::new()));
    let mut session = runtime
        .start_session(technical_profile(), &sample_catalog())
        .await
        .unwrap();

    let reply = session
        .submit("maybe we could try cloud-native stuff")
        .await
        .unwrap();
    assert_eq!(reply.response.sentiment, Sentiment::Challenging);
    assert!(reply.response.content.contains("\"Maybe\"?"));
    assert_eq!(
        reply.source,
        ReplySource::Local {
            branch: PolicyBranch::Hedging,
            cause: FallbackCause::Unconfigured,
        }
    );

    let last = session.messages().last().unwrap();
    assert_eq!(last.content, reply.response.content);
    assert!(session.tracker().has_responded_to(1));
}

#[tokio::test]
async fn red_flag_reply_quotes_the_flag() {
    let runtime = CoachRuntimeBuilder::new(offline_config())
        .with_store(Arc::new(MemoryStore::new()))
        .with_coach_generator(Arc::new(FailingCoach))
        .build()
        .unwrap();
    let mut session = runtime
        .start_session(technical_profile(), &sample_catalog())
        .await
        .unwrap();

    let reply = session
        .submit("Honestly, I'd say avoid dismissing their concerns is not my style at all here")
        .await
        .unwrap();
    assert_eq!(reply.response.sentiment, Sentiment::Challenging);
    assert!(reply
        .response
        .content
        .contains("Avoid dismissing their concerns"));
    assert!(matches!(
        reply.source,
        ReplySource::Local {
            branch: PolicyBranch::RedFlag,
            cause: FallbackCause::Request(_),
        }
    ));
}

#[tokio::test]
async fn untrusted_flow_is_repaired_into_a_permutation() {
    let planner = CannedPlanner {
        flow: r#"{"orderedSlideIds": [3, 3, 5], "reasoning": "Lead with cost"}"#.to_string(),
        talking_points: "not json at all".to_string(),
    };
    let runtime = CoachRuntimeBuilder::new(offline_config())
        .with_store(Arc::new(MemoryStore::new()))
        .with_plan_generator(Arc::new(planner))
        .build()
        .unwrap();

    let mut session = runtime
        .start_session(technical_profile(), &five_slide_catalog())
        .await
        .unwrap();

    let order: Vec<u32> = session.tracker().slides().iter().map(|s| s.id).collect();
    assert_eq!(order, vec![3, 5, 1, 2, 4]);
    assert_eq!(session.flow().reasoning, "Lead with cost");
    assert_eq!(session.current_slide().id, 3);
    assert!(session.talking_points().is_empty());

    assert!(session.next_slide());
    assert_eq!(session.current_slide().id, 5);
}

#[tokio::test]
async fn slide_text_is_extracted_once_then_cached() {
    let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
    let source = Arc::new(CountingSource {
        calls: AtomicUsize::new(0),
    });
    let runtime = CoachRuntimeBuilder::new(offline_config())
        .with_store(store.clone())
        .with_text_source(source.clone())
        .build()
        .unwrap();
    let catalog = sample_catalog();

    let first = runtime
        .start_session(technical_profile(), &catalog)
        .await
        .unwrap();
    let texts: Vec<&str> = first
        .slide_contents()
        .iter()
        .map(|c| c.extracted_text.as_str())
        .collect();
    assert_eq!(
        texts,
        vec![
            "text of slides/Slide01.JPG",
            "",
            "text of slides/Slide03.JPG",
            "text of slides/Slide04.JPG",
        ]
    );
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);

    let second = runtime
        .start_session(technical_profile(), &catalog)
        .await
        .unwrap();
    assert_eq!(second.slide_contents(), first.slide_contents());
    assert_eq!(source.calls.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn seeded_sessions_reply_identically() {
    let utterances = [
        "We will phase the migration in three waves so nothing breaks on day one",
        "Your team keeps its current tooling during the first phase of the rollout",
        "The platform team owns the landing zone and we own the application moves",
    ];

    let mut transcripts = Vec::new();
    for _ in 0..2 {
        let runtime = offline_runtime(Arc::new(MemoryStore::new()));
        let mut session = runtime
            .start_session(technical_profile(), &sample_catalog())
            .await
            .unwrap();
        let mut replies = Vec::new();
        for utterance in utterances {
            replies.push(session.submit(utterance).await.unwrap().response);
        }
        transcripts.push(replies);
    }
    assert_eq!(transcripts[0], transcripts[1]);
}
