use std::fmt;

use anyhow::Context as _;
use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};

use crate::config::OpenAiConfig;

/// Estimated best-drinking year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Apogee {
    Year(u16),
    Unknown,
}

impl fmt::Display for Apogee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Year(year) => write!(f, "{year}"),
            Self::Unknown => f.write_str("unknown"),
        }
    }
}

impl Serialize for Apogee {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Year(year) => serializer.serialize_u16(*year),
            Self::Unknown => serializer.serialize_str("unknown"),
        }
    }
}

/// Anything other than a bare four-digit year is `Unknown`.
pub fn parse_apogee_answer(answer: &str) -> Apogee {
    let answer = answer.trim();
    if answer.len() != 4 || !answer.bytes().all(|b| b.is_ascii_digit()) {
        return Apogee::Unknown;
    }
    answer.parse().map(Apogee::Year).unwrap_or(Apogee::Unknown)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApogeeRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub winery: String,
    #[serde(default)]
    pub year: Option<i32>,
}

#[async_trait]
pub trait ApogeeEstimator: Send + Sync {
    async fn estimate(&self, wine: &ApogeeRequest) -> anyhow::Result<Apogee>;
}

pub fn build_prompt(wine: &ApogeeRequest) -> String {
    let year = wine.year.map(|y| y.to_string()).unwrap_or_default();
    format!(
        "You are a wine expert. I will give you information about a wine.\n\
         Reply only with the estimated peak-drinking year for this wine, formatted YYYY, \
         with no sentence or punctuation, even if the information is uncertain. \
         If you do not know, reply \"unknown\".\n\n\
         Expected example: 2027\n\n\
         The wine: {}, {}, {year}\n",
        wine.name, wine.winery
    )
}

/// Asks an OpenAI Responses endpoint for the apogee year.
#[derive(Debug, Clone)]
pub struct OpenAiApogeeEstimator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
    model: String,
}

impl OpenAiApogeeEstimator {
    pub fn new(config: &OpenAiConfig) -> Self {
        let base_url = config.base_url.trim_end_matches('/');
        Self {
            client: reqwest::Client::new(),
            endpoint: format!("{base_url}/responses"),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }

    async fn complete(&self, input: &str) -> anyhow::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "input": input,
            "temperature": 0.2,
            "text": { "format": { "type": "text" } },
            "store": false,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .with_context(|| format!("POST {}", self.endpoint))?;

        let status = response.status();
        let raw = response.text().await.context("read OpenAI response body")?;
        if !status.is_success() {
            let message = error_message(&raw).unwrap_or(raw);
            anyhow::bail!("OpenAI API error ({status}): {message}");
        }

        let value: serde_json::Value =
            serde_json::from_str(&raw).context("parse OpenAI response")?;
        output_text(&value).ok_or_else(|| anyhow::anyhow!("OpenAI response has no output text"))
    }
}

#[async_trait]
impl ApogeeEstimator for OpenAiApogeeEstimator {
    async fn estimate(&self, wine: &ApogeeRequest) -> anyhow::Result<Apogee> {
        let answer = self.complete(&build_prompt(wine)).await?;
        let apogee = parse_apogee_answer(&answer);
        tracing::debug!(name = %wine.name, answer = %answer.trim(), %apogee, "apogee estimated");
        Ok(apogee)
    }
}

fn error_message(raw_json: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(raw_json).ok()?;
    Some(value.get("error")?.get("message")?.as_str()?.to_owned())
}

fn output_text(value: &serde_json::Value) -> Option<String> {
    let text = value
        .get("output")?
        .as_array()?
        .iter()
        .filter(|item| item.get("type").and_then(|v| v.as_str()) == Some("message"))
        .filter_map(|item| item.get("content").and_then(|v| v.as_array()))
        .flatten()
        .filter(|part| part.get("type").and_then(|v| v.as_str()) == Some("output_text"))
        .filter_map(|part| part.get("text").and_then(|v| v.as_str()))
        .collect::<String>();

    (!text.trim().is_empty()).then_some(text)
}
