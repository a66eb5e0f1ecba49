//! Customer-specific slide ordering and per-slide talking points.
//!
//! The planner collaborator is not trusted: every ordering it proposes is
//! repaired into a full permutation of the catalog, and every failure turns
//! into the catalog order (flow) or an empty list (talking points).

pub mod generator;
pub mod prompts;

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::collaborator::FallbackCause;
use crate::domain::{CustomerProfile, PresentationFlow, Slide, SlideContent, TalkingPoints};
use crate::llm_client::parse_json_payload;

use generator::PlanGenerator;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TalkingPointsPayload {
    #[serde(default)]
    talking_points: Vec<TalkingPoints>,
}

pub struct FlowPersonalizer {
    generator: Option<Arc<dyn PlanGenerator>>,
}

impl FlowPersonalizer {
    pub fn new(generator: Option<Arc<dyn PlanGenerator>>) -> Self {
        Self { generator }
    }

    pub fn is_available(&self) -> bool {
        self.generator.is_some()
    }

    /// Propose a slide order for this customer. Always returns a full permutation.
    pub async fn plan(
        &self,
        profile: &CustomerProfile,
        slides: &[Slide],
        contents: &[SlideContent],
    ) -> PresentationFlow {
        match self.try_plan(profile, slides, contents).await {
            Ok(flow) => {
                tracing::info!(
                    "Personalized flow: [{}] ({})",
                    join_ids(&flow.ordered_slide_ids),
                    flow.reasoning
                );
                flow
            }
            Err(cause) => {
                tracing::warn!("Using catalog slide order: {}", cause);
                identity_flow(slides, &cause)
            }
        }
    }

    async fn try_plan(
        &self,
        profile: &CustomerProfile,
        slides: &[Slide],
        contents: &[SlideContent],
    ) -> Result<PresentationFlow, FallbackCause> {
        let generator = self.generator.as_ref().ok_or(FallbackCause::Unconfigured)?;

        let prompt = prompts::flow_system_prompt(profile, slides, contents);
        tracing::debug!("Flow prompt:\n{}", prompt);

        let raw = generator
            .generate_flow(&prompt)
            .await
            .map_err(|e| FallbackCause::request(&e))?;
        let proposed: PresentationFlow =
            parse_json_payload(&raw).map_err(|e| FallbackCause::malformed(&e))?;

        if proposed.ordered_slide_ids.is_empty() {
            return Err(FallbackCause::Malformed(
                "orderedSlideIds was empty".to_string(),
            ));
        }

        let catalog_ids: Vec<u32> = slides.iter().map(|s| s.id).collect();
        let ordered_slide_ids = repair_order(&catalog_ids, &proposed.ordered_slide_ids);
        Ok(PresentationFlow {
            ordered_slide_ids,
            reasoning: proposed.reasoning,
        })
    }

    /// Talking points for the ordered deck. Empty means "not available yet".
    pub async fn talking_points(
        &self,
        profile: &CustomerProfile,
        ordered: &[Slide],
        contents: &[SlideContent],
    ) -> Vec<TalkingPoints> {
        match self.try_talking_points(profile, ordered, contents).await {
            Ok(points) => {
                tracing::info!(
                    "Talking points ready for {}/{} slides",
                    points.len(),
                    ordered.len()
                );
                points
            }
            Err(cause) => {
                tracing::warn!("Talking points unavailable: {}", cause);
                Vec::new()
            }
        }
    }

    async fn try_talking_points(
        &self,
        profile: &CustomerProfile,
        ordered: &[Slide],
        contents: &[SlideContent],
    ) -> Result<Vec<TalkingPoints>, FallbackCause> {
        let generator = self.generator.as_ref().ok_or(FallbackCause::Unconfigured)?;

        let prompt = prompts::talking_points_system_prompt(profile, ordered, contents);
        let raw = generator
            .generate_talking_points(&prompt)
            .await
            .map_err(|e| FallbackCause::request(&e))?;
        let payload: TalkingPointsPayload =
            parse_json_payload(&raw).map_err(|e| FallbackCause::malformed(&e))?;

        Ok(sanitize_talking_points(ordered, payload.talking_points))
    }
}

fn identity_flow(slides: &[Slide], cause: &FallbackCause) -> PresentationFlow {
    PresentationFlow {
        ordered_slide_ids: slides.iter().map(|s| s.id).collect(),
        reasoning: format!("Default order ({})", cause),
    }
}

/// Requested ids first (unknown and repeated ids dropped), then every missing
/// catalog id in catalog order.
pub fn repair_order(catalog_ids: &[u32], requested: &[u32]) -> Vec<u32> {
    let known: HashSet<u32> = catalog_ids.iter().copied().collect();
    let mut seen = HashSet::with_capacity(catalog_ids.len());
    let mut ordered = Vec::with_capacity(catalog_ids.len());

    for id in requested {
        if known.contains(id) && seen.insert(*id) {
            ordered.push(*id);
        }
    }

    let missing: Vec<u32> = catalog_ids
        .iter()
        .copied()
        .filter(|id| !seen.contains(id))
        .collect();
    if !missing.is_empty() {
        tracing::warn!("Missing slides appended at end: [{}]", join_ids(&missing));
    }
    ordered.extend(missing);
    ordered
}

/// Apply `flow` to the catalog. Output is always a permutation of `slides`.
pub fn reorder(slides: &[Slide], flow: &PresentationFlow) -> Vec<Slide> {
    let catalog_ids: Vec<u32> = slides.iter().map(|s| s.id).collect();
    let by_id: HashMap<u32, &Slide> = slides.iter().map(|s| (s.id, s)).collect();

    let reordered: Vec<Slide> = repair_order(&catalog_ids, &flow.ordered_slide_ids)
        .into_iter()
        .filter_map(|id| by_id.get(&id).map(|slide| (*slide).clone()))
        .collect();

    tracing::debug!(
        "Reordered {} slides: [{}]",
        reordered.len(),
        join_ids(&reordered.iter().map(|s| s.id).collect::<Vec<_>>())
    );
    reordered
}

fn sanitize_talking_points(ordered: &[Slide], points: Vec<TalkingPoints>) -> Vec<TalkingPoints> {
    let titles: HashMap<u32, &str> = ordered.iter().map(|s| (s.id, s.title.as_str())).collect();
    let mut seen = HashSet::new();

    points
        .into_iter()
        .filter(|p| titles.contains_key(&p.slide_id) && !p.key_message1.trim().is_empty())
        .filter(|p| seen.insert(p.slide_id))
        .map(|mut p| {
            if p.slide_title.trim().is_empty() {
                p.slide_title = titles
                    .get(&p.slide_id)
                    .map(|t| t.to_string())
                    .unwrap_or_default();
            }
            p
        })
        .collect()
}

/// Talking points for one slide, if the planner produced any.
pub fn talking_points_for(points: &[TalkingPoints], slide_id: u32) -> Option<&TalkingPoints> {
    points.iter().find(|p| p.slide_id == slide_id)
}

fn join_ids(ids: &[u32]) -> String {
    ids.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::sample_catalog;
    use crate::domain::{AudienceType, BudgetSensitivity, ModernizationAppetite, Urgency};
    use anyhow::Result;
    use async_trait::async_trait;

    struct CannedPlanner {
        flow: Result<String, String>,
        points: Result<String, String>,
    }

    #[async_trait]
    impl PlanGenerator for CannedPlanner {
        async fn generate_flow(&self, _system_prompt: &str) -> Result<String> {
            self.flow.clone().map_err(|e| anyhow::anyhow!(e))
        }

        async fn generate_talking_points(&self, _system_prompt: &str) -> Result<String> {
            self.points.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    fn planner(flow: Result<&str, &str>, points: Result<&str, &str>) -> FlowPersonalizer {
        FlowPersonalizer::new(Some(Arc::new(CannedPlanner {
            flow: flow.map(str::to_string).map_err(str::to_string),
            points: points.map(str::to_string).map_err(str::to_string),
        })))
    }

    fn five_slides() -> Vec<Slide> {
        let template = sample_catalog().remove(0);
        (1..=5)
            .map(|id| Slide {
                id,
                title: format!("Slide {}", id),
                ..template.clone()
            })
            .collect()
    }

    fn profile() -> CustomerProfile {
        CustomerProfile {
            urgency: Urgency::Immediate,
            timeline: None,
            modernization_appetite: ModernizationAppetite::Aggressive,
            audience_type: AudienceType::Technical,
            pain_points: vec!["cost".to_string()],
            budget_sensitivity: BudgetSensitivity::High,
        }
    }

    fn ids(slides: &[Slide]) -> Vec<u32> {
        slides.iter().map(|s| s.id).collect()
    }

    #[test]
    fn reorder_dedupes_then_appends_missing_in_catalog_order() {
        let flow = PresentationFlow {
            ordered_slide_ids: vec![3, 3, 5],
            reasoning: String::new(),
        };
        assert_eq!(ids(&reorder(&five_slides(), &flow)), vec![3, 5, 1, 2, 4]);
    }

    #[test]
    fn reorder_is_a_bijection_for_hostile_inputs() {
        let slides = five_slides();
        let hostile = [
            vec![],
            vec![99, 0, 42],
            vec![5, 4, 3, 2, 1, 1, 2, 3],
            vec![2, 77, 2, 4],
        ];
        for requested in hostile {
            let flow = PresentationFlow {
                ordered_slide_ids: requested.clone(),
                reasoning: String::new(),
            };
            let out = ids(&reorder(&slides, &flow));
            let mut sorted = out.clone();
            sorted.sort_unstable();
            assert_eq!(out.len(), slides.len(), "{:?}", requested);
            assert_eq!(sorted, vec![1, 2, 3, 4, 5], "{:?}", requested);
        }
    }

    #[tokio::test]
    async fn unconfigured_plan_is_identity_with_reason() {
        let personalizer = FlowPersonalizer::new(None);
        let flow = personalizer.plan(&profile(), &five_slides(), &[]).await;
        assert_eq!(flow.ordered_slide_ids, vec![1, 2, 3, 4, 5]);
        assert!(flow.reasoning.contains("not configured"));

        let points = personalizer
            .talking_points(&profile(), &five_slides(), &[])
            .await;
        assert!(points.is_empty());
    }

    #[tokio::test]
    async fn plan_repairs_partial_proposal() {
        let personalizer = planner(
            Ok(r#"{"orderedSlideIds": [3, 3, 5], "reasoning": "cost first"}"#),
            Err("unused"),
        );
        let flow = personalizer.plan(&profile(), &five_slides(), &[]).await;
        assert_eq!(flow.ordered_slide_ids, vec![3, 5, 1, 2, 4]);
        assert_eq!(flow.reasoning, "cost first");
    }

    #[tokio::test]
    async fn plan_failures_fall_back_with_cause() {
        let failing = planner(Err("503 Service Unavailable"), Err("x"));
        let flow = failing.plan(&profile(), &five_slides(), &[]).await;
        assert_eq!(flow.ordered_slide_ids, vec![1, 2, 3, 4, 5]);
        assert!(flow.reasoning.contains("request failed"));

        let garbled = planner(Ok("I'd start with slide three."), Err("x"));
        let flow = garbled.plan(&profile(), &five_slides(), &[]).await;
        assert_eq!(flow.ordered_slide_ids, vec![1, 2, 3, 4, 5]);
        assert!(flow.reasoning.contains("malformed"));

        let empty = planner(Ok(r#"{"orderedSlideIds": []}"#), Err("x"));
        let flow = empty.plan(&profile(), &five_slides(), &[]).await;
        assert!(flow.reasoning.contains("malformed"));
    }

    #[tokio::test]
    async fn talking_points_are_filtered_and_titled() {
        let personalizer = planner(
            Err("unused"),
            Ok(r#"```json
            {"talkingPoints": [
                {"slideId": 2, "keyMessage1": "Lead with the outage history", "keyMessage2": "Offer a pilot"},
                {"slideId": 2, "slideTitle": "dup", "keyMessage1": "ignored"},
                {"slideId": 99, "slideTitle": "ghost", "keyMessage1": "ignored"},
                {"slideId": 4, "slideTitle": "Costs", "keyMessage1": ""}
            ]}
            ```"#),
        );
        let points = personalizer
            .talking_points(&profile(), &five_slides(), &[])
            .await;

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].slide_title, "Slide 2");
        assert!(talking_points_for(&points, 2).is_some());
        assert!(talking_points_for(&points, 3).is_none());
    }

    #[tokio::test]
    async fn talking_points_errors_become_empty() {
        let personalizer = planner(Err("unused"), Err("timeout"));
        assert!(personalizer
            .talking_points(&profile(), &five_slides(), &[])
            .await
            .is_empty());
    }
}
