//! Conversation state and its persistence.

pub mod store;
pub mod tracker;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{CustomerProfile, PresentationFlow, TalkingPoints};
use store::KeyValueStore;
use tracker::TrackerSnapshot;

pub const SESSION_STATE_KEY: &str = "deckcoach.session";

/// Everything needed to resume a session against the same catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub profile: CustomerProfile,
    pub flow: PresentationFlow,
    #[serde(default)]
    pub talking_points: Vec<TalkingPoints>,
    pub tracker: TrackerSnapshot,
    pub saved_at: DateTime<Utc>,
}

pub fn save_snapshot(store: &dyn KeyValueStore, snapshot: &SessionSnapshot) -> Result<()> {
    let json = serde_json::to_string(snapshot).context("Failed to serialize session")?;
    store.set(SESSION_STATE_KEY, &json)?;
    tracing::debug!(
        "Saved session with {} messages at slide {}",
        snapshot.tracker.messages.len(),
        snapshot.tracker.current_index + 1
    );
    Ok(())
}

/// `Ok(None)` when nothing was saved. An unreadable entry is dropped and
/// reported as absent.
pub fn load_snapshot(store: &dyn KeyValueStore) -> Result<Option<SessionSnapshot>> {
    let Some(raw) = store.get(SESSION_STATE_KEY)? else {
        return Ok(None);
    };

    match serde_json::from_str::<SessionSnapshot>(&raw) {
        Ok(snapshot) => Ok(Some(snapshot)),
        Err(e) => {
            tracing::warn!("Discarding unreadable saved session: {}", e);
            store.clear(SESSION_STATE_KEY)?;
            Ok(None)
        }
    }
}

pub fn clear_snapshot(store: &dyn KeyValueStore) -> Result<()> {
    store.clear(SESSION_STATE_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::domain::{AudienceType, BudgetSensitivity, ModernizationAppetite, Urgency};
    use super::store::MemoryStore;
    use super::tracker::ConversationTracker;

    fn snapshot() -> SessionSnapshot {
        let profile = CustomerProfile {
            urgency: Urgency::Immediate,
            timeline: Some("Q3".to_string()),
            modernization_appetite: ModernizationAppetite::Conservative,
            audience_type: AudienceType::Business,
            pain_points: vec!["cost".to_string()],
            budget_sensitivity: BudgetSensitivity::High,
        };
        let mut tracker = ConversationTracker::new(sample_catalog()).unwrap();
        tracker.opening(&profile);
        tracker.append_seller("We cut your hosting bill by 30%");
        SessionSnapshot {
            profile,
            flow: PresentationFlow {
                ordered_slide_ids: vec![1, 2, 3, 4],
                reasoning: "Default order (generation service not configured)".to_string(),
            },
            talking_points: Vec::new(),
            tracker: tracker.snapshot(),
            saved_at: Utc::now(),
        }
    }

    #[test]
    fn save_load_and_clear() {
        let store = MemoryStore::new();
        assert!(load_snapshot(&store).unwrap().is_none());

        let saved = snapshot();
        save_snapshot(&store, &saved).unwrap();
        assert_eq!(load_snapshot(&store).unwrap(), Some(saved));

        clear_snapshot(&store).unwrap();
        assert!(load_snapshot(&store).unwrap().is_none());
    }

    #[test]
    fn corrupt_entry_is_discarded() {
        let store = MemoryStore::new();
        store.set(SESSION_STATE_KEY, "{not json").unwrap();
        assert!(load_snapshot(&store).unwrap().is_none());
        assert!(store.get(SESSION_STATE_KEY).unwrap().is_none());
    }
}
