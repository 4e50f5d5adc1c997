//! Market research agents
//!
//! Every agent is the same ask-and-retry loop around one model call. They
//! differ only in the prompt they send and the text they fall back to.
//!
//! Rate limits are retried with a linearly increasing sleep; any other error
//! abandons the loop and the agent's failure sentinel is returned instead.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::config::AppConfig;
use crate::error::ResearchError;
use crate::llm::{
    InputMessage, InputPart, LanguageModel, PromptRef, ResponseInput, ResponseRequest,
};
use crate::Result;

pub mod catalog;

const TEMPERATURE: f32 = 0.3;

//
// ================= Analysis kinds =================
//

/// Cached analysis dimensions. The tag is what the cache table stores.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisKind {
    Global,
    Vertical,
    Horizontal,
    Applications,
    TechnologySegments,
    Regional,
    EndUser,
    ProductCategories,
    RelatedMarkets,
}

impl AnalysisKind {
    pub const ALL: [AnalysisKind; 9] = [
        AnalysisKind::Global,
        AnalysisKind::Vertical,
        AnalysisKind::Horizontal,
        AnalysisKind::Applications,
        AnalysisKind::TechnologySegments,
        AnalysisKind::Regional,
        AnalysisKind::EndUser,
        AnalysisKind::ProductCategories,
        AnalysisKind::RelatedMarkets,
    ];

    pub fn tag(&self) -> &'static str {
        match self {
            AnalysisKind::Global => "global",
            AnalysisKind::Vertical => "vertical",
            AnalysisKind::Horizontal => "horizontal",
            AnalysisKind::Applications => "applications",
            AnalysisKind::TechnologySegments => "technology_segments",
            AnalysisKind::Regional => "regional",
            AnalysisKind::EndUser => "end_user",
            AnalysisKind::ProductCategories => "product_categories",
            AnalysisKind::RelatedMarkets => "related_markets",
        }
    }

    pub fn spec(&self) -> &'static AgentSpec {
        match self {
            AnalysisKind::Global => &catalog::GLOBAL_OVERVIEW,
            AnalysisKind::Vertical => &catalog::VERTICAL,
            AnalysisKind::Horizontal => &catalog::HORIZONTAL,
            AnalysisKind::Applications => &catalog::APPLICATIONS,
            AnalysisKind::TechnologySegments => &catalog::TECHNOLOGY_SEGMENTS,
            AnalysisKind::Regional => &catalog::REGIONAL,
            AnalysisKind::EndUser => &catalog::END_USER,
            AnalysisKind::ProductCategories => &catalog::PRODUCT_CATEGORIES,
            AnalysisKind::RelatedMarkets => &catalog::RELATED_MARKETS,
        }
    }
}

impl fmt::Display for AnalysisKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tag())
    }
}

impl FromStr for AnalysisKind {
    type Err = ResearchError;

    /// Accepts the stored tag or its kebab-case spelling.
    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        AnalysisKind::ALL
            .into_iter()
            .find(|kind| kind.tag() == normalized)
            .ok_or_else(|| ResearchError::InvalidInput(format!("unknown analysis kind '{}'", s)))
    }
}

//
// ================= Agent specs =================
//

#[derive(Clone, Copy)]
pub enum PromptSource {
    /// Vendor-hosted prompt; the user input is sent as-is.
    Stored {
        id: &'static str,
        version: &'static str,
    },
    /// Inline prompt rendered from the market name, sent to the default model.
    Template(fn(&str) -> String),
}

#[derive(Clone, Copy)]
pub struct AgentSpec {
    pub name: &'static str,
    pub source: PromptSource,
    pub web_search: bool,
    pub retry_rate_limits: bool,
    /// (base, step) in backoff units: delay before retry n is `base + n * step`.
    pub backoff: (u32, u32),
    pub no_output: &'static str,
    pub failure: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    /// One second in production; tests shrink it to zero.
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff_unit: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn delay(&self, spec: &AgentSpec, attempt: u32) -> Duration {
        let (base, step) = spec.backoff;
        self.backoff_unit * (base + attempt * step)
    }
}

//
// ================= Researcher =================
//

pub struct MarketResearcher {
    model: Arc<dyn LanguageModel>,
    default_model: String,
    retry: RetryPolicy,
}

impl MarketResearcher {
    pub fn new(model: Arc<dyn LanguageModel>, default_model: &str, retry: RetryPolicy) -> Self {
        Self {
            model,
            default_model: default_model.to_string(),
            retry,
        }
    }

    pub fn from_config(model: Arc<dyn LanguageModel>, config: &AppConfig) -> Self {
        Self::new(
            model,
            &config.default_model,
            RetryPolicy {
                attempts: config.max_retries.max(1),
                ..RetryPolicy::default()
            },
        )
    }

    pub fn model(&self) -> Arc<dyn LanguageModel> {
        Arc::clone(&self.model)
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    /// Run one of the cached segment analyses for a market.
    pub async fn analyze(&self, kind: AnalysisKind, market: &str) -> String {
        let spec = kind.spec();
        let request = self.build_request(spec, market);
        self.ask(spec, &request).await
    }

    /// M&A deals table for a market over a timeframe.
    pub async fn mergers(&self, market: &str, timeframe: &str) -> String {
        let spec = &catalog::MERGERS;
        let request = self.build_request(spec, market);
        let request = ResponseRequest {
            input: ResponseInput::Messages(vec![InputMessage::user_parts(vec![
                InputPart::InputText {
                    text: market.to_string(),
                },
                InputPart::InputText {
                    text: timeframe.to_string(),
                },
            ])]),
            ..request
        };
        self.ask(spec, &request).await
    }

    /// Free-form web research; single attempt, errors folded into the text.
    pub async fn web_insights(&self, query: &str) -> String {
        let (id, version) = catalog::WEB_INSIGHTS;
        let request = ResponseRequest::stored(
            PromptRef::new(id, version),
            ResponseInput::Text(query.to_string()),
        )
        .temperature(TEMPERATURE);

        match self.model.respond(&request).await {
            Ok(response) => response.output_text().trim().to_string(),
            Err(e) => {
                warn!("Web search failed: {}", e);
                format!("Web search failed: {}", e)
            }
        }
    }

    /// Leading companies in a submarket. Errors propagate.
    pub async fn top_companies(&self, submarket: &str) -> Result<String> {
        self.single_shot(catalog::TOP_COMPANIES, submarket, catalog::TOP_COMPANIES_NO_OUTPUT)
            .await
    }

    /// Size, CAGR and forecast metrics for a market. Errors propagate.
    pub async fn detailed_metrics(&self, market: &str) -> Result<String> {
        self.single_shot(
            catalog::DETAILED_METRICS,
            market,
            catalog::DETAILED_METRICS_NO_OUTPUT,
        )
        .await
    }

    async fn single_shot(
        &self,
        (id, version): (&str, &str),
        input: &str,
        no_output: &str,
    ) -> Result<String> {
        let request = ResponseRequest::stored(
            PromptRef::new(id, version),
            ResponseInput::Text(input.to_string()),
        )
        .temperature(TEMPERATURE);

        let response = self.model.respond(&request).await?;
        Ok(response
            .message_text()
            .unwrap_or_else(|| no_output.to_string()))
    }

    fn build_request(&self, spec: &AgentSpec, input: &str) -> ResponseRequest {
        let request = match spec.source {
            PromptSource::Stored { id, version } => ResponseRequest::stored(
                PromptRef::new(id, version),
                ResponseInput::Text(input.to_string()),
            ),
            PromptSource::Template(render) => ResponseRequest::with_model(
                &self.default_model,
                ResponseInput::Messages(vec![InputMessage::user_text(render(input))]),
            ),
        };

        let request = request.temperature(TEMPERATURE);
        if spec.web_search {
            request.web_search()
        } else {
            request
        }
    }

    /// Fixed-count retry loop. Never fails: the sentinel stands in for errors.
    pub async fn ask(&self, spec: &AgentSpec, request: &ResponseRequest) -> String {
        let attempts = self.retry.attempts;

        for attempt in 0..attempts {
            info!(agent = spec.name, "Fetching {} [attempt {}]", spec.name, attempt + 1);

            match self.model.respond(request).await {
                Ok(response) => {
                    return response
                        .message_text()
                        .map(|text| text.trim().to_string())
                        .unwrap_or_else(|| spec.no_output.to_string());
                }
                Err(e) if e.is_rate_limit() && spec.retry_rate_limits => {
                    if attempt + 1 < attempts {
                        let delay = self.retry.delay(spec, attempt);
                        warn!(agent = spec.name, "Rate limit. Retrying in {:?}", delay);
                        tokio::time::sleep(delay).await;
                    } else {
                        warn!(agent = spec.name, "Rate limit on final attempt");
                    }
                }
                Err(e) => {
                    error!(agent = spec.name, "Error fetching {}: {}", spec.name, e);
                    break;
                }
            }
        }

        spec.failure.to_string()
    }
}
