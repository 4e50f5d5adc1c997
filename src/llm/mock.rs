//! Scripted model for unit tests

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use super::{LanguageModel, ModelResponse, ResponseRequest};
use crate::error::ResearchError;
use crate::Result;

#[derive(Debug, Clone)]
pub(crate) enum Scripted {
    Text(String),
    NoMessage,
    RateLimited,
    Fail(String),
}

/// Replays a queue of outcomes, then answers with a fixed text.
pub(crate) struct ScriptedModel {
    script: Mutex<VecDeque<Scripted>>,
    fallback: String,
    requests: Mutex<Vec<ResponseRequest>>,
    uploads: Mutex<Vec<(String, usize)>>,
}

impl ScriptedModel {
    pub(crate) fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: "| Segment | Share |\n|---|---|\n| Default | 100% |\n".to_string(),
            requests: Mutex::new(Vec::new()),
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn answering(text: &str) -> Self {
        let mut model = Self::new(Vec::new());
        model.fallback = text.to_string();
        model
    }

    pub(crate) fn requests(&self) -> Vec<ResponseRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    async fn respond(&self, request: &ResponseRequest) -> Result<ModelResponse> {
        self.requests.lock().unwrap().push(request.clone());

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Text(text)) => Ok(ModelResponse::from_text(&text)),
            Some(Scripted::NoMessage) => Ok(ModelResponse::default()),
            Some(Scripted::RateLimited) => {
                Err(ResearchError::RateLimited("slow down".to_string()))
            }
            Some(Scripted::Fail(message)) => Err(ResearchError::LlmError(message)),
            None => Ok(ModelResponse::from_text(&self.fallback)),
        }
    }

    async fn upload_file(&self, filename: &str, bytes: Vec<u8>) -> Result<String> {
        let mut uploads = self.uploads.lock().unwrap();
        uploads.push((filename.to_string(), bytes.len()));
        Ok(format!("file-{}", uploads.len()))
    }
}
