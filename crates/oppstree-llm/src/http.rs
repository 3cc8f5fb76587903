//! The HTTP side shared by both providers.
//!
//! [`Endpoint`] owns the client, the config and an optional explicit key.
//! [`Endpoint::post_json`] sends one request and returns the parsed body of
//! a 2xx reply, or a classified [`ProviderError`].

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::LlmProviderConfig;
use crate::error::{ProviderError, Result};

/// Used when a 429 carries no usable hint.
const DEFAULT_RETRY_AFTER_MS: u64 = 1000;

pub(crate) struct Endpoint {
    pub(crate) config: LlmProviderConfig,
    client: reqwest::Client,
    api_key: Option<String>,
}

impl Endpoint {
    pub(crate) fn new(config: LlmProviderConfig, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_default();
        Self {
            config,
            client,
            api_key,
        }
    }

    /// Explicit key, else the configured environment variable.
    pub(crate) fn api_key(&self) -> Result<String> {
        if let Some(key) = &self.api_key {
            return Ok(key.clone());
        }
        std::env::var(&self.config.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ProviderError::MissingApiKey {
                provider: self.config.name.clone(),
                env_var: self.config.api_key_env.clone(),
            })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    pub(crate) fn has_explicit_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// POST `body` to `path` with the given auth headers plus the
    /// configured extra headers.
    pub(crate) async fn post_json<B, R>(
        &self,
        path: &str,
        model: &str,
        auth: &[(&str, String)],
        body: &B,
    ) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.url(path);
        debug!(provider = %self.config.name, %url, model, "provider request");

        let mut req = self.client.post(&url).json(body);
        for (name, value) in auth {
            req = req.header(*name, value.as_str());
        }
        for (name, value) in &self.config.headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let response = req.send().await.map_err(|e| {
            if e.is_timeout() {
                ProviderError::Timeout
            } else {
                ProviderError::Transport(e)
            }
        })?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            let retry_header = retry_after_header(&response);
            let body = response.text().await.unwrap_or_default();
            return Err(classify(&self.config.name, model, status, retry_header, &body));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(e.to_string()))
    }
}

/// Turn a non-2xx status and its body into an error.
fn classify(
    provider: &str,
    model: &str,
    status: u16,
    retry_header: Option<u64>,
    body: &str,
) -> ProviderError {
    let detail = error_message(body).unwrap_or_else(|| body.trim().to_string());

    match status {
        401 | 403 => ProviderError::Unauthorized(detail),
        404 => ProviderError::UnknownModel {
            model: model.to_string(),
            detail,
        },
        402 => ProviderError::QuotaExhausted(detail),
        429 if mentions_quota(body) => {
            warn!(provider, "account quota exhausted");
            ProviderError::QuotaExhausted(detail)
        }
        429 => {
            let retry_after_ms = retry_header
                .or_else(|| retry_after_body(body))
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            warn!(provider, retry_after_ms, "rate limited");
            ProviderError::RateLimited { retry_after_ms }
        }
        _ => ProviderError::Status { status, detail },
    }
}

fn mentions_quota(body: &str) -> bool {
    let lower = body.to_lowercase();
    ["insufficient_quota", "quota exceeded", "spending limit", "credit balance", "billing"]
        .iter()
        .any(|needle| lower.contains(needle))
}

/// `error.message` (OpenAI and Anthropic) or a bare string `error`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    let error = value.get("error")?;
    error
        .get("message")
        .and_then(Value::as_str)
        .or_else(|| error.as_str())
        .map(str::to_string)
}

/// Seconds in `retry-after`. The HTTP-date form is ignored.
fn retry_after_header(response: &reqwest::Response) -> Option<u64> {
    let raw = response.headers().get("retry-after")?.to_str().ok()?;
    seconds_to_ms(raw.trim().parse().ok()?)
}

fn retry_after_body(body: &str) -> Option<u64> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .get("retry_after_ms")
        .and_then(Value::as_u64)
        .or_else(|| seconds_to_ms(value.get("retry_after")?.as_f64()?))
}

fn seconds_to_ms(secs: f64) -> Option<u64> {
    (secs.is_finite() && secs >= 0.0).then(|| (secs * 1000.0).round() as u64)
}
