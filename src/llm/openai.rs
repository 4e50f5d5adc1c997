//! OpenAI Responses / Files API client
//!
//! Uses a long-lived reqwest::Client for connection pooling.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{LanguageModel, ModelResponse, ResponseRequest};
use crate::config::AppConfig;
use crate::error::ResearchError;
use crate::Result;

/// Reusable OpenAI client (connection-pooled)
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UploadedFile {
    id: String,
}

impl OpenAiClient {
    pub fn new(api_key: String, base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .build()?;

        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::new(config.api_key.clone(), &config.base_url)
    }

    fn ensure_key(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(ResearchError::ConfigError(
                "OPENAI_API_KEY not configured".to_string(),
            ));
        }
        Ok(())
    }

    async fn check_status(response: Response) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ResearchError::RateLimited(body));
        }

        error!("Model API error response ({}): {}", status, body);
        Err(ResearchError::LlmError(format!("{}: {}", status, body)))
    }
}

#[async_trait]
impl LanguageModel for OpenAiClient {
    async fn respond(&self, request: &ResponseRequest) -> Result<ModelResponse> {
        self.ensure_key()?;

        debug!(
            prompt = ?request.prompt.as_ref().map(|p| p.id.as_str()),
            model = ?request.model,
            "Calling Responses API"
        );

        let response = self
            .client
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| {
                error!("Responses API request failed: {}", e);
                ResearchError::LlmError(format!("Responses API error: {}", e))
            })?;

        let response = Self::check_status(response).await?;

        let parsed: ModelResponse = response.json().await.map_err(|e| {
            error!("Failed to parse model response: {}", e);
            ResearchError::LlmError(format!("Response parse error: {}", e))
        })?;

        Ok(parsed)
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        self.ensure_key()?;

        let size = bytes.len();
        let part = Part::bytes(bytes)
            .file_name(filename.to_string())
            .mime_str("application/pdf")?;
        let form = Form::new().text("purpose", "user_data").part("file", part);

        let response = self
            .client
            .post(format!("{}/files", self.base_url))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ResearchError::LlmError(format!("File upload failed: {}", e)))?;

        let uploaded: UploadedFile = Self::check_status(response).await?.json().await?;
        info!(file_id = %uploaded.id, size, "Uploaded file {}", filename);

        Ok(uploaded.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{PromptRef, ResponseInput};

    #[tokio::test]
    async fn test_missing_api_key() {
        let client = OpenAiClient::new(String::new(), "http://127.0.0.1:9/v1/").unwrap();
        assert_eq!(client.base_url, "http://127.0.0.1:9/v1");

        let request = ResponseRequest::stored(
            PromptRef::new("pmpt_x", "1"),
            ResponseInput::Text("Plastics".to_string()),
        );
        let result = client.respond(&request).await;

        let error_msg = result.unwrap_err().to_string();
        assert!(error_msg.contains("OPENAI_API_KEY"));
    }
}
