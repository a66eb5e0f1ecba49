use anyhow::{bail, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::domain::{CoachResponse, CustomerProfile, Message, Role, Sentiment, Slide};

/// Serializable tracker state: cursor, message log and slide progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackerSnapshot {
    pub current_index: usize,
    pub messages: Vec<Message>,
    #[serde(default)]
    pub slide_progress: Vec<u32>,
}

/// Owns the append-only message log and the slide cursor for one session.
#[derive(Debug, Clone)]
pub struct ConversationTracker {
    slides: Vec<Slide>,
    current_index: usize,
    messages: Vec<Message>,
    slide_progress: BTreeSet<u32>,
}

impl ConversationTracker {
    /// `slides` is the presentation order; it must not be empty.
    pub fn new(slides: Vec<Slide>) -> Result<Self> {
        if slides.is_empty() {
            bail!("Cannot start a session without slides");
        }
        Ok(Self {
            slides,
            current_index: 0,
            messages: Vec::new(),
            slide_progress: BTreeSet::new(),
        })
    }

    pub fn restore(slides: Vec<Slide>, snapshot: TrackerSnapshot) -> Result<Self> {
        let mut tracker = Self::new(slides)?;
        if snapshot.current_index >= tracker.slides.len() {
            bail!(
                "Saved slide index {} is outside a deck of {} slides",
                snapshot.current_index,
                tracker.slides.len()
            );
        }
        if snapshot
            .messages
            .windows(2)
            .any(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            bail!("Saved message log is not in timestamp order");
        }
        if let Some(bad) = snapshot
            .messages
            .iter()
            .find(|m| (m.role == Role::Coach) != m.sentiment.is_some())
        {
            bail!(
                "Saved {} message {} has an invalid sentiment tag",
                bad.role,
                bad.id
            );
        }

        let known: BTreeSet<u32> = tracker.slides.iter().map(|s| s.id).collect();
        tracker.current_index = snapshot.current_index;
        tracker.messages = snapshot.messages;
        tracker.slide_progress = snapshot
            .slide_progress
            .into_iter()
            .filter(|id| known.contains(id))
            .collect();
        Ok(tracker)
    }

    pub fn snapshot(&self) -> TrackerSnapshot {
        TrackerSnapshot {
            current_index: self.current_index,
            messages: self.messages.clone(),
            slide_progress: self.slide_progress.iter().copied().collect(),
        }
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn current_slide(&self) -> &Slide {
        &self.slides[self.current_index]
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Last `n` messages, oldest first.
    pub fn recent(&self, n: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(n);
        &self.messages[start..]
    }

    /// Slide ids that have received at least one seller response.
    pub fn progress(&self) -> impl Iterator<Item = u32> + '_ {
        self.slide_progress.iter().copied()
    }

    pub fn has_responded_to(&self, slide_id: u32) -> bool {
        self.slide_progress.contains(&slide_id)
    }

    /// First coach message of a session.
    pub fn opening(&mut self, profile: &CustomerProfile) -> &Message {
        let content = format!(
            "Alright, let's get you ready for this presentation. I see you're dealing with a {} audience who's {} about this migration. Let me be clear - I'm not here to coddle you. I'm here to make sure you don't fumble this opportunity.\n\nWe're starting with the {} slide. Tell me, what's your opening line going to be?",
            profile.audience_type,
            profile.urgency,
            self.current_slide().title
        );
        self.append_coach(CoachResponse::challenging(content))
    }

    pub fn append_seller(&mut self, text: impl Into<String>) -> &Message {
        let slide_id = self.current_slide().id;
        self.slide_progress.insert(slide_id);
        self.push(Role::Seller, text.into(), None)
    }

    pub fn append_coach(&mut self, response: CoachResponse) -> &Message {
        self.push(Role::Coach, response.content, Some(response.sentiment))
    }

    /// Move forward one slide. `None` on the last slide.
    pub fn advance_slide(&mut self) -> Option<&Message> {
        if self.current_index + 1 >= self.slides.len() {
            return None;
        }
        self.current_index += 1;
        let content = format!(
            "Good. Moving on to {}. This is where it gets interesting. Your customer's sitting across from you, and you flip to this slide. What's going through their mind right now? More importantly, what's coming out of YOUR mouth?",
            self.current_slide().title
        );
        Some(self.append_coach(CoachResponse::challenging(content)))
    }

    /// Move back one slide. `None` on the first slide.
    pub fn retreat_slide(&mut self) -> Option<&Message> {
        if self.current_index == 0 {
            return None;
        }
        self.current_index -= 1;
        let content = format!(
            "We're going back to review {}. Let's make sure you've got this one locked down.",
            self.current_slide().title
        );
        Some(self.append_coach(CoachResponse::neutral(content)))
    }

    /// Jump to a 0-based position, clamped to the deck. `None` when the
    /// clamped target is the current slide.
    pub fn jump_to(&mut self, index: usize) -> Option<&Message> {
        let target = index.min(self.slides.len() - 1);
        if target == self.current_index {
            return None;
        }
        self.current_index = target;
        let content = format!(
            "Jumping to {}. Show me you're ready for this one.",
            self.current_slide().title
        );
        Some(self.append_coach(CoachResponse::neutral(content)))
    }

    fn push(&mut self, role: Role, content: String, sentiment: Option<Sentiment>) -> &Message {
        let timestamp = self.next_timestamp(Utc::now());
        self.messages.push(Message {
            id: uuid::Uuid::new_v4().to_string(),
            role,
            content,
            timestamp,
            sentiment,
        });
        &self.messages[self.messages.len() - 1]
    }

    // Strictly increasing even when the clock stalls or steps backwards.
    fn next_timestamp(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.messages.last() {
            Some(last) if now <= last.timestamp => last.timestamp + ChronoDuration::milliseconds(1),
            _ => now,
        }
    }
}
