//! Coach replies: a remote generator when one is configured, the local
//! feedback policy otherwise (and whenever the generator fails).

pub mod features;
pub mod generator;
pub mod policy;
pub mod pools;
pub mod sentiment;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::collaborator::FallbackCause;
use crate::domain::CoachResponse;

use generator::{CoachGenerator, CoachRequest};
use policy::{FeedbackPolicy, PolicyBranch};

/// Where a reply came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "source")]
pub enum ReplySource {
    Generated,
    Local {
        branch: PolicyBranch,
        cause: FallbackCause,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoachReply {
    pub response: CoachResponse,
    pub source: ReplySource,
}

pub struct Coach {
    generator: Option<Arc<dyn CoachGenerator>>,
    policy: FeedbackPolicy,
    rng: StdRng,
}

impl Coach {
    pub fn new(
        policy: FeedbackPolicy,
        generator: Option<Arc<dyn CoachGenerator>>,
        seed: Option<u64>,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            generator,
            policy,
            rng,
        }
    }

    pub fn policy(&self) -> &FeedbackPolicy {
        &self.policy
    }

    /// Produce a reply for the seller's turn. Never fails.
    pub async fn respond(&mut self, request: &CoachRequest<'_>) -> CoachReply {
        let cause = match self.generator.as_ref() {
            None => FallbackCause::Unconfigured,
            Some(generator) => match generator.generate(request).await {
                Ok(content) if !content.trim().is_empty() => {
                    let content = content.trim().to_string();
                    let sentiment = sentiment::classify(&content);
                    return CoachReply {
                        response: CoachResponse::new(content, sentiment),
                        source: ReplySource::Generated,
                    };
                }
                Ok(_) => FallbackCause::Malformed("empty coach reply".to_string()),
                Err(e) => FallbackCause::request(&e),
            },
        };

        if cause != FallbackCause::Unconfigured {
            tracing::warn!("Coach generator unavailable, using local policy: {}", cause);
        }
        self.respond_locally(request, cause)
    }

    fn respond_locally(&mut self, request: &CoachRequest<'_>, cause: FallbackCause) -> CoachReply {
        let features = features::extract(request.utterance, request.slide);
        let decision = self.policy.decide(
            &features,
            request.profile,
            request.slide,
            request.history,
            &mut self.rng,
        );
        CoachReply {
            response: decision.response,
            source: ReplySource::Local {
                branch: decision.branch,
                cause,
            },
        }
    }
}
