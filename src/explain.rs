use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use tokio::process::Command;

use crate::config::Config;

const SYSTEM_PROMPT: &str =
    "Explain the content of this presentation slide in basic English. Give short examples when they make the idea clearer.";

#[derive(Debug, Clone)]
pub struct ExplainerClient {
    base_url: String,
    api_key: String,
    model: String,
    request_timeout_seconds: u64,
}

impl ExplainerClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            base_url: config.openai_base_url.clone(),
            api_key: config.require_api_key()?,
            model: config.model.clone(),
            request_timeout_seconds: config.request_timeout_seconds,
        })
    }

    pub async fn explain_slide(&self, slide_text: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": slide_text }
            ]
        });

        let response = execute_curl_json(
            &url,
            &self.api_key,
            self.request_timeout_seconds,
            body.to_string(),
        )
        .await?;
        let content = extract_message_content(&response, &url)?;
        Ok(normalize_explanation(&content))
    }
}

async fn execute_curl_json(
    url: &str,
    api_key: &str,
    timeout_seconds: u64,
    body: String,
) -> Result<Value> {
    let mut command = Command::new("curl");
    command
        .arg("-sS")
        .arg("--max-time")
        .arg(timeout_seconds.to_string())
        .arg("-X")
        .arg("POST")
        .arg(url)
        .arg("-H")
        .arg(format!("Authorization: Bearer {}", api_key))
        .arg("-H")
        .arg("Content-Type: application/json")
        .arg("-d")
        .arg(body);

    let output = command
        .output()
        .await
        .with_context(|| format!("Failed to execute curl for chat completion request to {url}"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("Chat completion request failed: {}", stderr.trim());
    }

    let stdout =
        String::from_utf8(output.stdout).context("Chat completion response was not UTF-8")?;
    let parsed = serde_json::from_str::<Value>(&stdout).with_context(|| {
        format!(
            "Chat completion response was not valid JSON for {url}: {}",
            stdout.trim()
        )
    })?;

    if let Some(error) = parsed.get("error") {
        bail!("Chat completion provider returned error: {error}");
    }

    Ok(parsed)
}

fn extract_message_content(response: &Value, url: &str) -> Result<String> {
    response
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("message"))
        .and_then(|message| message.get("content"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .with_context(|| format!("Chat completion response from {url} had no message content"))
}

pub fn normalize_explanation(text: &str) -> String {
    text.chars()
        .filter(|c| !matches!(c, '\n' | '\r'))
        .filter(|c| c.is_ascii())
        .collect::<String>()
        .trim()
        .to_string()
}
