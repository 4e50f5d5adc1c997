//! Hosted language model boundary
//!
//! Agents and document helpers talk to the model through the `LanguageModel`
//! trait. `OpenAiClient` is the production implementation; tests plug in a
//! scripted model instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::Result;

pub mod openai;
pub use openai::OpenAiClient;

#[cfg(test)]
pub(crate) mod mock;

/// Trait for the hosted model (responses + file store)
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Create a model response.
    async fn respond(&self, request: &ResponseRequest) -> Result<ModelResponse>;

    /// Upload a file for later reference and return its file id.
    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String>;
}

//
// ================= Request =================
//

/// Reference to a vendor-hosted prompt template
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PromptRef {
    pub id: String,
    pub version: String,
}

impl PromptRef {
    pub fn new(id: &str, version: &str) -> Self {
        Self {
            id: id.to_string(),
            version: version.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum ResponseInput {
    Text(String),
    Messages(Vec<InputMessage>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InputMessage {
    pub role: String,
    pub content: MessageContent,
}

impl InputMessage {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Text(text.into()),
        }
    }

    pub fn user_parts(parts: Vec<InputPart>) -> Self {
        Self {
            role: "user".to_string(),
            content: MessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<InputPart>),
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputPart {
    InputText { text: String },
    InputFile { file_id: String },
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: String,
}

impl Tool {
    pub fn web_search() -> Self {
        Self {
            kind: "web_search_preview".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ResponseRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptRef>,
    pub input: ResponseInput,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

impl ResponseRequest {
    /// Request against a stored prompt; the model comes from the prompt.
    pub fn stored(prompt: PromptRef, input: ResponseInput) -> Self {
        Self {
            model: None,
            prompt: Some(prompt),
            input,
            tools: Vec::new(),
            temperature: None,
        }
    }

    /// Request against a named model with an inline prompt.
    pub fn with_model(model: &str, input: ResponseInput) -> Self {
        Self {
            model: Some(model.to_string()),
            prompt: None,
            input,
            tools: Vec::new(),
            temperature: None,
        }
    }

    pub fn web_search(mut self) -> Self {
        self.tools.push(Tool::web_search());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

//
// ================= Response =================
//

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub output: Vec<OutputItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub content: Vec<OutputContent>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputContent {
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

impl ModelResponse {
    /// Single assistant message carrying `text`.
    pub fn from_text(text: &str) -> Self {
        Self {
            id: String::new(),
            output: vec![OutputItem {
                kind: "message".to_string(),
                content: vec![OutputContent {
                    kind: "output_text".to_string(),
                    text: Some(text.to_string()),
                }],
            }],
        }
    }

    /// Text of the first `message` item, or None when the model produced none.
    pub fn message_text(&self) -> Option<String> {
        self.output
            .iter()
            .find(|item| item.kind == "message")
            .map(|item| {
                item.content
                    .iter()
                    .filter_map(|part| part.text.as_deref())
                    .collect::<String>()
            })
    }

    /// Concatenation of every `output_text` part across all messages.
    pub fn output_text(&self) -> String {
        self.output
            .iter()
            .filter(|item| item.kind == "message")
            .flat_map(|item| item.content.iter())
            .filter(|part| part.kind == "output_text")
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}
