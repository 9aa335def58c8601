use crate::config::Config;
use crate::errors::AppError;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Total attempt ceiling for one logical call, first try included.
pub const MAX_ATTEMPTS: u32 = 5;

const BACKOFF_BASE_MS: u64 = 500;
const BACKOFF_CAP_MS: u64 = 8_000;

/// Client for the Gemini `generateContent` REST endpoint.
///
/// Two call paths share the transport: schema-constrained structured calls at
/// temperature 0, and free-text calls at caller-chosen temperature. Transient
/// failures (transport errors, non-200 statuses, non-JSON bodies, and on the
/// structured path non-JSON generated text) are retried with exponential
/// backoff up to [`MAX_ATTEMPTS`]. A 200 body that lacks the candidates path
/// is terminal: callers substitute their documented default.
///
/// The client holds no state across calls beyond configuration, so concurrent
/// invocations cannot interfere.
#[derive(Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::InternalError(format!("Failed to create Gemini client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.gemini_base_url.clone(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Structured call: asks the endpoint to emit JSON conforming to `schema`
    /// at deterministic sampling, and returns the decoded value.
    pub async fn generate_structured(
        &self,
        prompt: &str,
        system_instruction: &str,
        schema: &Value,
    ) -> Result<Value, AppError> {
        let payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "systemInstruction": {"parts": [{"text": system_instruction}]},
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": schema,
                "temperature": 0.0,
            },
        });

        let span = tracing::info_span!("generation", call_type = "structured", model = %self.model);
        async {
            let text = self.call_with_retry(&payload, true).await?;
            // The retry loop already validated the text as JSON.
            serde_json::from_str::<Value>(&text).map_err(|e| {
                AppError::MalformedResponse(format!("Structured output is not JSON: {}", e))
            })
        }
        .instrument(span)
        .await
    }

    /// Free-text call. No schema constraint; the text may wrap JSON in prose
    /// (the offer-evaluation path scans for it afterwards).
    pub async fn generate_text(
        &self,
        prompt: &str,
        system_instruction: Option<&str>,
        temperature: f32,
    ) -> Result<String, AppError> {
        let mut payload = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"temperature": temperature},
        });
        if let Some(instruction) = system_instruction {
            payload["systemInstruction"] = json!({"parts": [{"text": instruction}]});
        }

        let span = tracing::info_span!("generation", call_type = "text", model = %self.model);
        self.call_with_retry(&payload, false).instrument(span).await
    }

    /// Sequential retry loop around [`attempt`]. Only `RemoteApi` failures
    /// are retried; `MissingApiKey` and `MalformedResponse` are terminal.
    async fn call_with_retry(
        &self,
        payload: &Value,
        structured: bool,
    ) -> Result<String, AppError> {
        let url = self.endpoint_url()?;
        let started = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let outcome = self.attempt(url.clone(), payload, structured).await;

            match outcome {
                Ok(text) => {
                    tracing::debug!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        success = true,
                        "Gemini call finished"
                    );
                    return Ok(text);
                }
                Err(AppError::RemoteApi(msg)) if attempt < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = MAX_ATTEMPTS,
                        delay_ms = delay.as_millis() as u64,
                        error = %msg,
                        "Gemini call failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        attempt,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        success = false,
                        error = %e,
                        "Gemini call failed"
                    );
                    return Err(e);
                }
            }
        }
    }

    /// One request/response cycle: POST, navigate the candidates path, and on
    /// the structured path verify the generated text is JSON.
    async fn attempt(
        &self,
        url: url::Url,
        payload: &Value,
        structured: bool,
    ) -> Result<String, AppError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| AppError::RemoteApi(format!("Request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::RemoteApi(format!(
                "Gemini returned {}: {}",
                status,
                truncate(&error_text, 200)
            )));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::RemoteApi(format!("Failed to parse Gemini response body: {}", e))
        })?;

        let text = body
            .get("candidates")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("content"))
            .and_then(|c| c.get("parts"))
            .and_then(|p| p.get(0))
            .and_then(|p| p.get("text"))
            .and_then(|t| t.as_str())
            .ok_or_else(|| {
                AppError::MalformedResponse(
                    "Response body has no candidates[0].content.parts[0].text".to_string(),
                )
            })?;

        if structured {
            // A non-JSON structured answer is as transient as a 500: the
            // endpoint occasionally truncates, so it goes through the retry
            // path. A navigable-but-empty answer does not.
            serde_json::from_str::<Value>(text).map_err(|e| {
                AppError::RemoteApi(format!("Structured output is not valid JSON: {}", e))
            })?;
        }

        Ok(text.to_string())
    }

    /// Builds `{base_url}/{model}:generateContent?key=...` with proper
    /// parameter encoding.
    fn endpoint_url(&self) -> Result<url::Url, AppError> {
        let key = self.api_key.as_deref().ok_or(AppError::MissingApiKey)?;
        url::Url::parse_with_params(
            &format!("{}/{}:generateContent", self.base_url, self.model),
            &[("key", key)],
        )
        .map_err(|e| AppError::InternalError(format!("Failed to build Gemini URL: {}", e)))
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_BASE_MS.saturating_mul(1u64 << (attempt - 1).min(16));
    Duration::from_millis(exp.min(BACKOFF_CAP_MS))
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
