//! HTTP client for OpenAI-style chat-completion APIs.

use super::Provider;
use crate::error::ProviderErrorKind;
use crate::types::{next_response_id, GenerationRequest, GenerationResponse, ResponseMetadata, TokenUsage};
use crate::{Error, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;
use uuid::Uuid;

const COMPLETIONS_PATH: &str = "/v1/chat/completions";
/// Cap on raw payload carried inside parse errors, to keep logs bounded.
const RAW_SNIPPET_LIMIT: usize = 2048;

pub struct HttpProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    messages: [WireMessage<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct WireCompletion {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct WireChoice {
    message: WireChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct WireChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl HttpProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::configuration(format!("failed to build http client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Provider for HttpProvider {
    async fn generate(
        &self,
        request: &GenerationRequest,
        model: &str,
    ) -> Result<GenerationResponse> {
        let body = WireRequest {
            model,
            messages: [WireMessage {
                role: "user",
                content: &request.prompt,
            }],
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stop: request.stop.as_deref(),
        };

        let url = format!("{}{}", self.base_url.trim_end_matches('/'), COMPLETIONS_PATH);
        let correlation_id = Uuid::new_v4().to_string();
        let started = Instant::now();

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("x-request-id", &correlation_id)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = parse_retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status.as_u16(), retry_after, &text));
        }

        let raw = response.text().await.map_err(map_send_error)?;
        let completion: WireCompletion = serde_json::from_str(&raw).map_err(|e| Error::Parse {
            reason: format!("invalid completion payload: {e}"),
            raw: snippet(&raw),
        })?;

        let choice = completion.choices.into_iter().next().ok_or_else(|| Error::Parse {
            reason: "completion contained no choices".into(),
            raw: snippet(&raw),
        })?;
        let content = choice.message.content.ok_or_else(|| Error::Parse {
            reason: "first choice contained no content".into(),
            raw: snippet(&raw),
        })?;

        let usage = completion.usage.unwrap_or_default();
        let latency = started.elapsed();
        debug!(
            model,
            correlation_id = %correlation_id,
            latency_ms = latency.as_millis() as u64,
            tokens = usage.total_tokens,
            "provider call completed"
        );

        Ok(GenerationResponse {
            id: next_response_id(),
            content,
            model: completion.model.unwrap_or_else(|| model.to_string()),
            usage: TokenUsage {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: if usage.total_tokens > 0 {
                    usage.total_tokens
                } else {
                    usage.prompt_tokens + usage.completion_tokens
                },
            },
            finish_reason: choice.finish_reason.unwrap_or_else(|| "stop".into()),
            metadata: ResponseMetadata {
                latency_ms: latency.as_millis() as u64,
                timestamp: Utc::now(),
                from_cache: false,
            },
        })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

fn map_send_error(err: reqwest::Error) -> Error {
    let detail = if err.is_timeout() {
        "request timed out"
    } else if err.is_connect() {
        "connection failed"
    } else {
        "transport failure"
    };
    Error::transient(format!("{detail}: {err}"), None)
}

fn map_status_error(status: u16, retry_after: Option<Duration>, body: &str) -> Error {
    match status {
        429 => {
            let quota = body.contains("insufficient_quota") || body.contains("billing");
            Error::Provider {
                kind: if quota {
                    ProviderErrorKind::QuotaExceeded
                } else {
                    ProviderErrorKind::RateLimited
                },
                status: Some(status),
                message: if quota {
                    "provider quota exceeded".into()
                } else {
                    "provider rate limited".into()
                },
                retry_after,
            }
        }
        401 | 403 => Error::permanent("provider authentication failed", Some(status)),
        400 | 404 | 413 | 422 => Error::permanent(
            format!("provider rejected the request: {}", snippet(body)),
            Some(status),
        ),
        500..=599 => Error::Provider {
            kind: ProviderErrorKind::Transient,
            status: Some(status),
            message: format!("provider server error: {}", snippet(body)),
            retry_after,
        },
        _ => Error::permanent(
            format!("unexpected provider status: {}", snippet(body)),
            Some(status),
        ),
    }
}

fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn snippet(raw: &str) -> String {
    if raw.len() <= RAW_SNIPPET_LIMIT {
        raw.to_string()
    } else {
        let mut end = RAW_SNIPPET_LIMIT;
        while !raw.is_char_boundary(end) {
            end -= 1;
        }
        raw[..end].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_the_taxonomy() {
        assert!(matches!(
            map_status_error(429, None, "{\"error\":\"rate\"}"),
            Error::Provider {
                kind: ProviderErrorKind::RateLimited,
                ..
            }
        ));
        assert!(matches!(
            map_status_error(429, None, "{\"error\":\"insufficient_quota\"}"),
            Error::Provider {
                kind: ProviderErrorKind::QuotaExceeded,
                ..
            }
        ));
        assert!(matches!(
            map_status_error(401, None, ""),
            Error::Provider {
                kind: ProviderErrorKind::Permanent,
                ..
            }
        ));
        assert!(matches!(
            map_status_error(503, None, ""),
            Error::Provider {
                kind: ProviderErrorKind::Transient,
                ..
            }
        ));
        assert!(matches!(
            map_status_error(400, None, ""),
            Error::Provider {
                kind: ProviderErrorKind::Permanent,
                ..
            }
        ));
    }

    #[test]
    fn retry_after_survives_status_mapping() {
        let err = map_status_error(429, Some(Duration::from_secs(7)), "");
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
    }

    #[test]
    fn snippet_respects_char_boundaries() {
        let raw = "é".repeat(RAW_SNIPPET_LIMIT);
        let s = snippet(&raw);
        assert!(s.len() <= RAW_SNIPPET_LIMIT);
    }
}
