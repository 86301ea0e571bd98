use anyhow::{anyhow, Result};
use std::env;

/// Page cap for the transcript feed; a polling consumer keeps asking with
/// the last seen seq until it gets an empty page.
pub const TRANSCRIPT_PAGE_LIMIT: i64 = 500;

/// Character cap applied to the transcript before it is sent to the
/// summarization model.
pub const SUMMARY_INPUT_CHAR_CAP: usize = 50_000;

pub const DEFAULT_LIST_LIMIT: i64 = 50;
pub const MAX_LIST_LIMIT: i64 = 100;

const RECALL_REGION_URLS: &[(&str, &str)] = &[
    ("us-west-2", "https://us-west-2.recall.ai/api/v1"),
    ("us-east-1", "https://us-east-1.recall.ai/api/v1"),
    ("eu-central-1", "https://eu-central-1.recall.ai/api/v1"),
    ("ap-northeast-1", "https://ap-northeast-1.recall.ai/api/v1"),
];

const DEFAULT_RECALL_REGION: &str = "us-west-2";

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_url: String,
    pub recall: RecallConfig,
    pub openai: OpenAiConfig,
}

#[derive(Debug, Clone)]
pub struct RecallConfig {
    pub api_base: String,
    pub api_key: String,
    pub webhook_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse::<u16>()
            .map_err(|_| anyhow!("PORT must be a valid port number"))?;

        let database_url =
            env::var("DATABASE_URL").map_err(|_| anyhow!("DATABASE_URL is not set"))?;

        Ok(Self {
            port,
            database_url,
            recall: RecallConfig::from_env(port)?,
            openai: OpenAiConfig::from_env()?,
        })
    }
}

impl RecallConfig {
    fn from_env(port: u16) -> Result<Self> {
        let api_key = env::var("RECALL_API_KEY").map_err(|_| anyhow!("RECALL_API_KEY is not set"))?;

        let api_base = match env::var("RECALL_REGION") {
            Ok(region) => region_base_url(&region)
                .ok_or_else(|| anyhow!("unknown RECALL_REGION: {}", region))?
                .to_string(),
            Err(_) => env::var("RECALL_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| {
                    region_base_url(DEFAULT_RECALL_REGION)
                        .expect("default region is in the table")
                        .to_string()
                }),
        };

        let webhook_url = env::var("RECALL_WEBHOOK_URL").unwrap_or_else(|_| {
            let public_url = env::var("PUBLIC_URL")
                .unwrap_or_else(|_| format!("http://localhost:{port}"));
            format!("{}/webhooks/recall", public_url.trim_end_matches('/'))
        });

        Ok(Self {
            api_base,
            api_key,
            webhook_url,
        })
    }
}

impl OpenAiConfig {
    fn from_env() -> Result<Self> {
        let api_key = env::var("OPENAI_API_KEY").map_err(|_| anyhow!("OPENAI_API_KEY is not set"))?;

        Ok(Self {
            api_base: env::var("OPENAI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            api_key,
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4.1-mini".to_string()),
        })
    }
}

fn region_base_url(region: &str) -> Option<&'static str> {
    let region = region.to_lowercase();
    RECALL_REGION_URLS
        .iter()
        .find(|(name, _)| *name == region)
        .map(|(_, url)| *url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn region_lookup_is_case_insensitive() {
        assert_eq!(
            region_base_url("EU-CENTRAL-1"),
            Some("https://eu-central-1.recall.ai/api/v1")
        );
        assert_eq!(region_base_url("mars-north-1"), None);
    }
}
