use crate::config::LlmSettings;
use crate::error::NarrativeError;
use crate::models::Metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use tracing::warn;

const SYSTEM_PROMPT: &str = "You are a helpful financial CFO.";
const TEMPERATURE: f32 = 0.7;
const MAX_TOKENS: u32 = 800;

/// Produces the commentary attached to each report.
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, metrics: &Metrics) -> Result<String, NarrativeError>;
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    model: String,
}

impl ChatCompletionClient {
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to build HTTP client for completion service")?;

        Ok(Self {
            client,
            api_key: settings.api_key.clone(),
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl NarrativeGenerator for ChatCompletionClient {
    async fn generate(&self, metrics: &Metrics) -> Result<String, NarrativeError> {
        let api_key = self.api_key.as_deref().ok_or(NarrativeError::MissingApiKey)?;

        let prompt = build_prompt(metrics);
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        };

        let url = format!("{}/chat/completions", self.base_url);
        let res = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(NarrativeError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body: ChatCompletionResponse = res.json().await?;
        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|text| !text.trim().is_empty())
            .ok_or(NarrativeError::EmptyResponse)
    }
}

pub fn build_prompt(metrics: &Metrics) -> String {
    format!(
        "Act as a CFO. Analyze this consolidated financial data from multiple sources:
- Revenue: ${:.2}
- Expenses: ${:.2}
- Net Profit: ${:.2}
- Margin: {:.2}%

Provide:
1. Health assessment.
2. 3 Recommendations.
3. Risk warning.
Keep it professional and concise.",
        metrics.revenue, metrics.expenses, metrics.net_profit, metrics.margin
    )
}

/// Formats `1234.5` as `$1,234.50`; negatives keep the sign after the symbol.
pub fn format_currency(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (whole, cents) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("${}{}.{}", sign, grouped, cents)
}

pub fn fallback_narrative(metrics: &Metrics, error: &dyn Display) -> String {
    format!(
        "Financial Analysis:
- Revenue: {}
- Expenses: {}
- Net Profit: {}
- Margin: {:.2}%

AI analysis unavailable. Error: {}",
        format_currency(metrics.revenue),
        format_currency(metrics.expenses),
        format_currency(metrics.net_profit),
        metrics.margin,
        error
    )
}

/// Asks the generator for commentary and degrades to the fallback text on any failure.
pub async fn narrate(generator: &dyn NarrativeGenerator, metrics: &Metrics) -> String {
    match generator.generate(metrics).await {
        Ok(text) => text,
        Err(e) => {
            warn!("Completion service error: {}", e);
            fallback_narrative(metrics, &e)
        }
    }
}
