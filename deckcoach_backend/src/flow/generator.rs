use anyhow::Result;
use async_trait::async_trait;

use crate::flow::prompts::{FLOW_INSTRUCTION, TALKING_POINTS_INSTRUCTION};
use crate::llm_client::{ChatMessage, ChatOptions, LlmClient};

/// External planner that answers flow and talking-point prompts with raw JSON text.
#[async_trait]
pub trait PlanGenerator: Send + Sync {
    async fn generate_flow(&self, system_prompt: &str) -> Result<String>;
    async fn generate_talking_points(&self, system_prompt: &str) -> Result<String>;
}

pub struct LlmPlanGenerator {
    llm: LlmClient,
}

impl LlmPlanGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }

    async fn ask(&self, system_prompt: &str, instruction: &str, max_tokens: u32) -> Result<String> {
        let messages = vec![
            ChatMessage::system(system_prompt),
            ChatMessage::user(instruction),
        ];
        let options = ChatOptions {
            temperature: 0.7,
            max_tokens,
            top_p: None,
            json_response: true,
        };
        self.llm.chat(messages, options).await
    }
}

#[async_trait]
impl PlanGenerator for LlmPlanGenerator {
    async fn generate_flow(&self, system_prompt: &str) -> Result<String> {
        tracing::debug!("Requesting presentation flow from {}", self.llm.model());
        self.ask(system_prompt, FLOW_INSTRUCTION, 2000).await
    }

    async fn generate_talking_points(&self, system_prompt: &str) -> Result<String> {
        tracing::debug!("Requesting talking points from {}", self.llm.model());
        self.ask(system_prompt, TALKING_POINTS_INSTRUCTION, 4000).await
    }
}
