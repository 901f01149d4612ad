use std::{env, net::SocketAddr, path::PathBuf};

use anyhow::{bail, Result};

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub incoming_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub output_dir: PathBuf,
    pub scan_interval_seconds: u64,
    pub explain_concurrency: usize,
    pub model: String,
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub request_timeout_seconds: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let bind_raw =
            env::var("DECK_EXPLAIN_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
        let bind_normalized = bind_raw
            .trim()
            .trim_matches('"')
            .trim_matches('\'')
            .to_string();
        let bind_addr = bind_normalized
            .parse::<SocketAddr>()
            .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 8080)));

        let data_root = PathBuf::from(
            env::var("DECK_EXPLAIN_DATA_ROOT").unwrap_or_else(|_| "./data".to_string()),
        );

        let scan_interval_seconds = env::var("DECK_EXPLAIN_SCAN_INTERVAL_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(10)
            .max(1);

        let explain_concurrency = env::var("DECK_EXPLAIN_CONCURRENCY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(4)
            .max(1);

        let model = env::var("DECK_EXPLAIN_MODEL").unwrap_or_else(|_| "gpt-3.5-turbo".to_string());

        let openai_base_url = env::var("DECK_EXPLAIN_OPENAI_BASE_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1".to_string())
            .trim_end_matches('/')
            .to_string();

        let openai_api_key = env::var("OPENAI_API_KEY")
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let request_timeout_seconds = env::var("DECK_EXPLAIN_REQUEST_TIMEOUT_SECONDS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(60)
            .max(1);

        Ok(Self {
            bind_addr,
            incoming_dir: data_root.join("incoming"),
            archive_dir: data_root.join("archive"),
            output_dir: data_root.join("explanations"),
            scan_interval_seconds,
            explain_concurrency,
            model,
            openai_base_url,
            openai_api_key,
            request_timeout_seconds,
        })
    }

    pub fn require_api_key(&self) -> Result<String> {
        match &self.openai_api_key {
            Some(key) => Ok(key.clone()),
            None => bail!("OPENAI_API_KEY must be set before the explanation worker can start."),
        }
    }
}
