use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Utc;
use flume::Sender;
use tokio::time::{sleep, Duration};

use crate::catalog::validate_catalog;
use crate::coaching::generator::{CoachGenerator, CoachRequest, LlmCoachGenerator};
use crate::coaching::policy::{FeedbackPolicy, PolicySettings};
use crate::coaching::{Coach, CoachReply, ReplySource};
use crate::config::CoachConfig;
use crate::content::cache::ContentCache;
use crate::content::summarizer::{ContentSummarizer, SlideTextSource, VisionTextSource};
use crate::domain::{
    CoachResponse, CustomerProfile, Message, PresentationFlow, Slide, SlideContent, TalkingPoints,
};
use crate::flow::generator::{LlmPlanGenerator, PlanGenerator};
use crate::flow::{reorder, talking_points_for, FlowPersonalizer};
use crate::http_client::build_http_client;
use crate::llm_client::LlmClient;
use crate::session::store::{KeyValueStore, MemoryStore, SqliteStore};
use crate::session::tracker::ConversationTracker;
use crate::session::{self, SessionSnapshot};

const REFOCUS_MESSAGE: &str = "Let's refocus. Tell me more about how you'd address this slide.";

/// Progress notifications for a front end.
#[derive(Debug, Clone, PartialEq)]
pub enum CoachEvent {
    /// A seller turn was accepted and the coach is composing a reply.
    Thinking,
    MessageAppended(Message),
    SlideChanged { index: usize, slide_id: u32 },
}

pub struct CoachRuntime {
    pub config: CoachConfig,
    store: Arc<dyn KeyValueStore>,
    summarizer: ContentSummarizer,
    personalizer: FlowPersonalizer,
    coach_generator: Option<Arc<dyn CoachGenerator>>,
    event_tx: Option<Sender<CoachEvent>>,
}

pub struct CoachRuntimeBuilder {
    config: CoachConfig,
    store: Option<Arc<dyn KeyValueStore>>,
    text_source: Option<Arc<dyn SlideTextSource>>,
    plan_generator: Option<Arc<dyn PlanGenerator>>,
    coach_generator: Option<Arc<dyn CoachGenerator>>,
    asset_dir: Option<PathBuf>,
    event_tx: Option<Sender<CoachEvent>>,
}

impl CoachRuntimeBuilder {
    pub fn new(config: CoachConfig) -> Self {
        Self {
            config,
            store: None,
            text_source: None,
            plan_generator: None,
            coach_generator: None,
            asset_dir: None,
            event_tx: None,
        }
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_text_source(mut self, source: Arc<dyn SlideTextSource>) -> Self {
        self.text_source = Some(source);
        self
    }

    pub fn with_plan_generator(mut self, generator: Arc<dyn PlanGenerator>) -> Self {
        self.plan_generator = Some(generator);
        self
    }

    pub fn with_coach_generator(mut self, generator: Arc<dyn CoachGenerator>) -> Self {
        self.coach_generator = Some(generator);
        self
    }

    /// Directory relative slide image paths are resolved against.
    pub fn with_asset_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.asset_dir = Some(dir.into());
        self
    }

    pub fn with_events(mut self, event_tx: Sender<CoachEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn build(self) -> Result<CoachRuntime> {
        let config = self.config;

        let store = match self.store {
            Some(store) => store,
            None => open_default_store(&config),
        };

        let llm = LlmClient::from_config(&config).context("Failed to build LLM client")?;
        match &llm {
            Some(llm) => tracing::info!(
                "Generation service configured: {} (model {}, key set)",
                config.llm_api_url,
                llm.model()
            ),
            None => tracing::info!("Generation service not configured; using local coaching"),
        }

        let text_source = match (self.text_source, &llm) {
            (Some(source), _) => Some(source),
            (None, Some(llm)) => {
                let asset_dir = self.asset_dir.unwrap_or_else(|| default_asset_dir(&config));
                let source: Arc<dyn SlideTextSource> = Arc::new(VisionTextSource::new(
                    llm.clone(),
                    build_http_client()?,
                    asset_dir,
                ));
                Some(source)
            }
            (None, None) => None,
        };

        let plan_generator = self.plan_generator.or_else(|| {
            llm.clone()
                .map(|llm| Arc::new(LlmPlanGenerator::new(llm)) as Arc<dyn PlanGenerator>)
        });

        let coach_generator = self.coach_generator.or_else(|| {
            llm.map(|llm| {
                Arc::new(LlmCoachGenerator::new(llm, config.history_window))
                    as Arc<dyn CoachGenerator>
            })
        });

        let cache = ContentCache::new(
            store.clone(),
            config.content_cache_version.clone(),
            config.content_cache_ttl_days,
        );
        let summarizer = ContentSummarizer::new(
            text_source,
            Some(cache),
            config.extraction_batch_size,
            Duration::from_millis(config.extraction_batch_delay_ms),
        );

        Ok(CoachRuntime {
            personalizer: FlowPersonalizer::new(plan_generator),
            summarizer,
            coach_generator,
            store,
            event_tx: self.event_tx,
            config,
        })
    }
}

fn open_default_store(config: &CoachConfig) -> Arc<dyn KeyValueStore> {
    match SqliteStore::open(&config.content_cache_path) {
        Ok(store) => {
            tracing::info!("Using store at {}", config.content_cache_path);
            Arc::new(store)
        }
        Err(e) => {
            tracing::warn!(
                "Failed to open store at {} ({:#}); state will not persist",
                config.content_cache_path,
                e
            );
            Arc::new(MemoryStore::new())
        }
    }
}

fn default_asset_dir(config: &CoachConfig) -> PathBuf {
    config
        .catalog_path
        .as_deref()
        .and_then(|path| Path::new(path).parent())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."))
}

impl CoachRuntime {
    pub fn bootstrap(config: CoachConfig) -> Result<Self> {
        CoachRuntimeBuilder::new(config).build()
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    pub fn summarizer(&self) -> &ContentSummarizer {
        &self.summarizer
    }

    pub fn personalizer(&self) -> &FlowPersonalizer {
        &self.personalizer
    }

    /// Extract slide text, personalize the order, draft talking points and
    /// open the conversation.
    pub async fn start_session(
        &self,
        profile: CustomerProfile,
        catalog: &[Slide],
    ) -> Result<CoachingSession> {
        validate_catalog(catalog)?;
        if profile.pain_points.iter().all(|p| p.trim().is_empty()) {
            tracing::warn!("Customer profile has no pain points");
        }

        let contents = self.summarizer.summarize(catalog).await;
        let flow = self.personalizer.plan(&profile, catalog, &contents).await;
        let ordered = reorder(catalog, &flow);
        let talking_points = self
            .personalizer
            .talking_points(&profile, &ordered, &contents)
            .await;
        tracing::info!(
            "Session prepared: {} slides, {} talking point entries",
            ordered.len(),
            talking_points.len()
        );

        let mut tracker = ConversationTracker::new(ordered)?;
        let opening = tracker.opening(&profile).clone();

        let session = self.session(profile, contents, flow, talking_points, tracker);
        session.emit(CoachEvent::MessageAppended(opening));
        Ok(session)
    }

    /// Resume the saved session, if any, against `catalog`.
    pub async fn resume_session(&self, catalog: &[Slide]) -> Result<Option<CoachingSession>> {
        validate_catalog(catalog)?;
        let Some(snapshot) = session::load_snapshot(self.store.as_ref())? else {
            return Ok(None);
        };

        let ordered = reorder(catalog, &snapshot.flow);
        let tracker = match ConversationTracker::restore(ordered, snapshot.tracker) {
            Ok(tracker) => tracker,
            Err(e) => {
                tracing::warn!("Discarding saved session that no longer fits: {:#}", e);
                session::clear_snapshot(self.store.as_ref())?;
                return Ok(None);
            }
        };
        let contents = self.summarizer.summarize(catalog).await;
        tracing::info!(
            "Resumed session at slide {} with {} messages",
            tracker.current_index() + 1,
            tracker.messages().len()
        );

        Ok(Some(self.session(
            snapshot.profile,
            contents,
            snapshot.flow,
            snapshot.talking_points,
            tracker,
        )))
    }

    fn session(
        &self,
        profile: CustomerProfile,
        contents: Vec<SlideContent>,
        flow: PresentationFlow,
        talking_points: Vec<TalkingPoints>,
        tracker: ConversationTracker,
    ) -> CoachingSession {
        let coach = Coach::new(
            FeedbackPolicy::new(PolicySettings::from(&self.config)),
            self.coach_generator.clone(),
            self.config.random_seed,
        );
        CoachingSession {
            profile,
            contents,
            flow,
            talking_points,
            tracker,
            coach,
            thinking_delay: Duration::from_millis(self.config.thinking_delay_ms),
            store: self.store.clone(),
            event_tx: self.event_tx.clone(),
        }
    }
}

/// One seller's practice run over a personalized deck.
pub struct CoachingSession {
    profile: CustomerProfile,
    contents: Vec<SlideContent>,
    flow: PresentationFlow,
    talking_points: Vec<TalkingPoints>,
    tracker: ConversationTracker,
    coach: Coach,
    thinking_delay: Duration,
    store: Arc<dyn KeyValueStore>,
    event_tx: Option<Sender<CoachEvent>>,
}

impl CoachingSession {
    pub fn profile(&self) -> &CustomerProfile {
        &self.profile
    }

    pub fn flow(&self) -> &PresentationFlow {
        &self.flow
    }

    pub fn slide_contents(&self) -> &[SlideContent] {
        &self.contents
    }

    pub fn talking_points(&self) -> &[TalkingPoints] {
        &self.talking_points
    }

    pub fn tracker(&self) -> &ConversationTracker {
        &self.tracker
    }

    pub fn messages(&self) -> &[Message] {
        self.tracker.messages()
    }

    pub fn current_slide(&self) -> &Slide {
        self.tracker.current_slide()
    }

    /// `None` means not generated (yet) for the current slide.
    pub fn current_talking_points(&self) -> Option<&TalkingPoints> {
        talking_points_for(&self.talking_points, self.tracker.current_slide().id)
    }

    /// Handle one seller turn. Blank input is ignored. The seller message and
    /// the coach reply are appended together once the reply is ready, so a
    /// dropped future leaves the log untouched.
    pub async fn submit(&mut self, utterance: &str) -> Option<CoachReply> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            tracing::debug!("Ignoring empty seller input");
            return None;
        }

        self.emit(CoachEvent::Thinking);
        if !self.thinking_delay.is_zero() {
            sleep(self.thinking_delay).await;
        }

        let slide = self.tracker.current_slide();
        let slide_index = self
            .contents
            .iter()
            .position(|c| c.slide_id == slide.id)
            .unwrap_or_else(|| self.tracker.current_index());
        let request = CoachRequest {
            profile: &self.profile,
            slide,
            history: self.tracker.messages(),
            utterance,
            slide_contents: &self.contents,
            slide_index,
        };
        let mut reply = self.coach.respond(&request).await;

        if reply.response.content.trim().is_empty() {
            tracing::error!("Coach produced an empty reply; substituting refocus prompt");
            reply.response = CoachResponse::neutral(REFOCUS_MESSAGE);
        }
        if let ReplySource::Local { branch, .. } = &reply.source {
            tracing::debug!("Local coach reply via {:?}", branch);
        }

        let seller = self.tracker.append_seller(utterance).clone();
        self.emit(CoachEvent::MessageAppended(seller));
        let coach = self.tracker.append_coach(reply.response.clone()).clone();
        self.emit(CoachEvent::MessageAppended(coach));

        Some(reply)
    }

    /// `false` when already on the last slide.
    pub fn next_slide(&mut self) -> bool {
        let narration = self.tracker.advance_slide().cloned();
        self.after_navigation(narration)
    }

    /// `false` when already on the first slide.
    pub fn previous_slide(&mut self) -> bool {
        let narration = self.tracker.retreat_slide().cloned();
        self.after_navigation(narration)
    }

    /// Jump to a 0-based position (clamped). `false` when nothing changed.
    pub fn jump_to(&mut self, index: usize) -> bool {
        let narration = self.tracker.jump_to(index).cloned();
        self.after_navigation(narration)
    }

    fn after_navigation(&self, narration: Option<Message>) -> bool {
        let Some(narration) = narration else {
            return false;
        };
        let slide = self.tracker.current_slide();
        tracing::debug!(
            "Slide {} of {}: {}",
            self.tracker.current_index() + 1,
            self.tracker.slide_count(),
            slide.title
        );
        self.emit(CoachEvent::MessageAppended(narration));
        self.emit(CoachEvent::SlideChanged {
            index: self.tracker.current_index(),
            slide_id: slide.id,
        });
        true
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            profile: self.profile.clone(),
            flow: self.flow.clone(),
            talking_points: self.talking_points.clone(),
            tracker: self.tracker.snapshot(),
            saved_at: Utc::now(),
        }
    }

    pub fn save(&self) -> Result<()> {
        session::save_snapshot(self.store.as_ref(), &self.snapshot())
    }

    /// Forget the saved session and the cached slide text.
    pub fn reset_saved_state(&self) -> Result<()> {
        session::clear_snapshot(self.store.as_ref())?;
        self.store.clear(crate::content::cache::CONTENT_CACHE_KEY)
    }

    fn emit(&self, event: CoachEvent) {
        if let Some(tx) = &self.event_tx {
            if tx.send(event).is_err() {
                tracing::debug!("Event receiver dropped");
            }
        }
    }
}
