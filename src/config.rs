use std::fmt;

use anyhow::Context as _;

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4.1";

/// Settings read from the process environment.
#[derive(Clone, Default)]
pub struct AppConfig {
    /// Secret the session cookie must match (`CELLAR_API_KEY`).
    pub api_key: Option<String>,
    pub openai: Option<OpenAiConfig>,
    pub refresh_concurrency: Option<usize>,
}

#[derive(Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let openai = var("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
            api_key,
            base_url: var("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: var("CELLAR_OPENAI_MODEL").unwrap_or_else(|| DEFAULT_OPENAI_MODEL.to_string()),
        });

        let refresh_concurrency = var("CELLAR_REFRESH_CONCURRENCY")
            .map(|raw| -> anyhow::Result<usize> {
                let limit = raw.parse::<usize>().with_context(|| {
                    format!("invalid CELLAR_REFRESH_CONCURRENCY={raw:?}. expected a positive integer")
                })?;
                if limit == 0 {
                    anyhow::bail!("CELLAR_REFRESH_CONCURRENCY must be at least 1");
                }
                Ok(limit)
            })
            .transpose()?;

        Ok(Self {
            api_key: var("CELLAR_API_KEY"),
            openai,
            refresh_concurrency,
        })
    }

    pub fn require_api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .context("CELLAR_API_KEY is required to serve the catalog")
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("openai", &self.openai)
            .field("refresh_concurrency", &self.refresh_concurrency)
            .finish()
    }
}

impl fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}
