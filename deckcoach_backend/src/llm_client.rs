use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::{ApiFlavor, CoachConfig};
use crate::http_client::build_http_client_with_timeout;

#[derive(Clone)]
pub struct LlmClient {
    api_url: String,
    api_key: String,
    model: String,
    flavor: ApiFlavor,
    azure_api_version: String,
    client: reqwest::Client,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: String,
    pub content: MessageContent,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: MessageContent::Text(content.into()),
        }
    }
}

/// Sampling knobs for one request.
#[derive(Debug, Clone, Copy)]
pub struct ChatOptions {
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: Option<f32>,
    pub json_response: bool,
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 2000,
            top_p: None,
            json_response: false,
        }
    }
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<String>,
    messages: Vec<ChatMessage>,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

const SLIDE_EXTRACTION_INSTRUCTION: &str = "Extract ALL text content from this presentation slide. \
Include all headings, bullet points, numbers, labels, and any other text visible on the slide. \
Preserve the structure and hierarchy. Return only the extracted text, no additional commentary.";

impl LlmClient {
    pub fn new(api_url: String, api_key: String, model: String, flavor: ApiFlavor) -> Self {
        Self {
            api_url: api_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            flavor,
            azure_api_version: "2024-02-15-preview".to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Build a client from config. Returns `None` when endpoint or key is missing.
    pub fn from_config(config: &CoachConfig) -> Result<Option<Self>> {
        if !config.is_llm_configured() {
            return Ok(None);
        }

        let client = build_http_client_with_timeout(Some(Duration::from_secs(
            config.request_timeout_secs.max(1),
        )))?;

        Ok(Some(Self {
            api_url: config.llm_api_url.trim_end_matches('/').to_string(),
            api_key: config.llm_api_key.clone().unwrap_or_default(),
            model: config.llm_model.clone(),
            flavor: config.llm_api_flavor,
            azure_api_version: config.azure_api_version.clone(),
            client,
        }))
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn completions_url(&self) -> String {
        match self.flavor {
            ApiFlavor::Openai => format!("{}/chat/completions", self.api_url),
            ApiFlavor::Azure => format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.api_url, self.model, self.azure_api_version
            ),
        }
    }

    fn build_request(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> ChatCompletionRequest {
        let (model, max_tokens, max_completion_tokens) = match self.flavor {
            ApiFlavor::Openai => (Some(self.model.clone()), Some(options.max_tokens), None),
            ApiFlavor::Azure => (None, None, Some(options.max_tokens)),
        };

        ChatCompletionRequest {
            model,
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens,
            max_completion_tokens,
            response_format: options.json_response.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        }
    }

    /// Send one chat completion and return the first choice's text.
    pub async fn chat(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<String> {
        let url = self.completions_url();
        let request = self.build_request(messages, options);

        let mut req = self.client.post(&url).json(&request);
        req = match self.flavor {
            ApiFlavor::Openai => req.header("Authorization", format!("Bearer {}", self.api_key)),
            ApiFlavor::Azure => req.header("api-key", &self.api_key),
        };

        let response = req.send().await.context("Failed to send LLM request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read body".to_string());
            anyhow::bail!("LLM API returned error {}: {}", status, body);
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM response")?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No content in LLM response"))?;

        Ok(content)
    }

    /// Request a JSON object and deserialize it.
    pub async fn generate_json<T>(&self, messages: Vec<ChatMessage>, options: ChatOptions) -> Result<T>
    where
        T: for<'de> Deserialize<'de>,
    {
        let options = ChatOptions {
            json_response: true,
            ..options
        };
        let response = self.chat(messages, options).await?;
        parse_json_payload(&response)
    }

    /// Ask a vision-capable deployment to transcribe a slide image.
    pub async fn extract_image_text(&self, image_data_url: &str) -> Result<String> {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: SLIDE_EXTRACTION_INSTRUCTION.to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: image_data_url.to_string(),
                    },
                },
            ]),
        }];

        let options = ChatOptions {
            temperature: 0.0,
            max_tokens: 1000,
            top_p: None,
            json_response: false,
        };

        self.chat(messages, options)
            .await
            .context("Vision extraction request failed")
    }
}

/// Parse a JSON payload out of model output, tolerating `<think>` preambles,
/// markdown fences, and prose around the object.
pub fn parse_json_payload<T>(response: &str) -> Result<T>
where
    T: for<'de> Deserialize<'de>,
{
    if let Ok(parsed) = serde_json::from_str::<T>(response) {
        return Ok(parsed);
    }

    let cleaned = if let Some(think_end) = response.rfind("</think>") {
        &response[think_end + 8..]
    } else {
        response
    };

    if let Ok(parsed) = serde_json::from_str::<T>(cleaned.trim()) {
        return Ok(parsed);
    }

    let json_content = if let Some(start) = cleaned.find("```json") {
        let after_start = &cleaned[start + 7..];
        if let Some(end) = after_start.find("```") {
            after_start[..end].trim()
        } else {
            cleaned
        }
    } else if let Some(start) = cleaned.find('{') {
        if let Some(end) = cleaned.rfind('}') {
            &cleaned[start..=end]
        } else {
            cleaned
        }
    } else {
        cleaned
    };

    serde_json::from_str::<T>(json_content.trim()).context(format!(
        "Failed to parse JSON. Extracted: {} | Original: {}",
        json_content,
        response.chars().take(500).collect::<String>()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        value: u32,
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Here you go:\n```json\n{\"value\": 7}\n```\nthanks";
        let probe: Probe = parse_json_payload(raw).expect("fenced json");
        assert_eq!(probe.value, 7);
    }

    #[test]
    fn parses_after_think_block() {
        let raw = "<think>{\"value\": 1}</think>\n{\"value\": 2}";
        let probe: Probe = parse_json_payload(raw).expect("think json");
        assert_eq!(probe.value, 2);
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_json_payload::<Probe>("no braces at all").is_err());
    }

    #[test]
    fn azure_request_uses_completion_tokens_and_deployment_url() {
        let client = LlmClient::new(
            "https://example.openai.azure.com/".to_string(),
            "key".to_string(),
            "gpt-4o".to_string(),
            ApiFlavor::Azure,
        );
        assert_eq!(
            client.completions_url(),
            "https://example.openai.azure.com/openai/deployments/gpt-4o/chat/completions?api-version=2024-02-15-preview"
        );

        let request = client.build_request(
            vec![ChatMessage::user("hi")],
            ChatOptions {
                json_response: true,
                ..ChatOptions::default()
            },
        );
        let json = serde_json::to_value(&request).expect("serialize");
        assert!(json.get("model").is_none());
        assert_eq!(json["max_completion_tokens"], 2000);
        assert_eq!(json["response_format"]["type"], "json_object");
    }

    #[test]
    fn vision_parts_serialize_in_openai_shape() {
        let message = ChatMessage {
            role: "user".to_string(),
            content: MessageContent::Parts(vec![
                ContentPart::Text {
                    text: "read".to_string(),
                },
                ContentPart::ImageUrl {
                    image_url: ImageUrl {
                        url: "data:image/png;base64,AAAA".to_string(),
                    },
                },
            ]),
        };
        let json = serde_json::to_value(&message).expect("serialize");
        assert_eq!(json["content"][0]["type"], "text");
        assert_eq!(json["content"][1]["type"], "image_url");
        assert_eq!(json["content"][1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }
}
