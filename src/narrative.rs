//! Narrative Generator - strategic commentary on KPIs and the revenue trend.
//!
//! Generation never fails the caller: any error (authentication, network,
//! quota, malformed response) comes back as [`NarrativeOutcome::Failed`]
//! holding a displayable message.

use crate::analytics::kpi::{Kpi, KpiSet};
use crate::analytics::TimeSeries;
use crate::error::{DashboardError, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum NarrativeOutcome {
    Generated(String),
    Failed(String),
}

impl NarrativeOutcome {
    pub fn text(&self) -> &str {
        match self {
            NarrativeOutcome::Generated(text) | NarrativeOutcome::Failed(text) => text,
        }
    }

    pub fn is_generated(&self) -> bool {
        matches!(self, NarrativeOutcome::Generated(_))
    }
}

#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, kpis: &KpiSet, trend: &TimeSeries) -> NarrativeOutcome;
}

/// Chat-completions client for an OpenAI-compatible endpoint.
pub struct OpenAiNarrator {
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl OpenAiNarrator {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            model,
            base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ]
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| DashboardError::Narrative(format!("LLM API call failed: {}", e)))?
            .error_for_status()
            .map_err(|e| {
                DashboardError::Narrative(format!("LLM API rejected the request: {}", e))
            })?;

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| {
                DashboardError::Narrative(format!("Failed to parse LLM response: {}", e))
            })?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| DashboardError::Narrative("No content in LLM response".to_string()))?;

        Ok(content.to_string())
    }
}

#[async_trait]
impl NarrativeGenerator for OpenAiNarrator {
    async fn generate(&self, kpis: &KpiSet, trend: &TimeSeries) -> NarrativeOutcome {
        let prompt = build_prompt(kpis, trend);
        info!("Requesting strategic analysis from {}", self.model);
        match self.call_llm(&prompt).await {
            Ok(text) => NarrativeOutcome::Generated(text),
            Err(e) => {
                warn!("Narrative generation failed: {}", e);
                NarrativeOutcome::Failed(format!("Error generating insights: {}", e))
            }
        }
    }
}

/// Canned analysis for running without a credential.
pub struct DemoNarrator;

#[async_trait]
impl NarrativeGenerator for DemoNarrator {
    async fn generate(&self, kpis: &KpiSet, _trend: &TimeSeries) -> NarrativeOutcome {
        NarrativeOutcome::Generated(format!(
            concat!(
                "**Strategic Analysis:**\n",
                "- **Growth**: Revenue has shown consistent performance with a profit margin ",
                "of {:.1}%.\n",
                "- **Efficiency**: Expenses are tracked closely; further reduction in fixed ",
                "costs could boost overall margin.\n",
                "- **Forecast**: Based on current trends, the next quarter looks promising if ",
                "current sales volume is maintained."
            ),
            kpis.get_or_zero(Kpi::ProfitMargin)
        ))
    }
}

pub fn build_prompt(kpis: &KpiSet, trend: &TimeSeries) -> String {
    let metrics: Vec<String> = kpis
        .iter()
        .map(|(kpi, value)| format!("- {}: {:.2}", kpi, value))
        .collect();
    let points: Vec<String> = trend
        .iter()
        .map(|p| format!("- {}: {:.2}", p.date, p.value))
        .collect();

    format!(
        r#"You are a strategic business consultant. Analyze the following business performance data:

KEY METRICS:
{}

TREND DATA (Revenue over time):
{}

Please provide:
1. A summary of overall performance.
2. Identification of any worrying trends or risks.
3. Three actionable strategic recommendations to improve profitability or growth.
4. A concise forward-looking forecast summary.

Format the response in clean Markdown with bold headers."#,
        metrics.join("\n"),
        points.join("\n")
    )
}
