//! Google Gemini backend over the `generateContent` REST endpoint.

use std::path::Path;
use std::time::Duration;

use base64::Engine;
use serde_json::{json, Value};

use splitbill_config::settings::GeminiSettings;

use crate::backend::InferenceRunner;
use crate::decode::RawOutput;
use crate::error::ExtractError;
use crate::retry::{with_retry, AttemptError, RetryPolicy};

const USER_AGENT: &str = concat!("splitbill/", env!("CARGO_PKG_VERSION"));

pub const PROMPT: &str = r#"You are given an image of a receipt. Read its content into JSON format:

{
    "menus": [
        {
            "name": <item_name>,
            "count": <purchased_count>,
            "price": <total_price_for_this_item>
        }
    ],
    "total": <total_price_in_receipt>
}

Return only JSON."#;

pub struct GeminiRunner {
    http: reqwest::blocking::Client,
    endpoint: String,
    model: String,
    api_key: String,
    policy: RetryPolicy,
}

impl GeminiRunner {
    pub fn new(
        settings: &GeminiSettings,
        api_key: String,
        policy: RetryPolicy,
    ) -> Result<Self, ExtractError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            policy,
        })
    }

    pub fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

/// Request body with the prompt and the image as inline base64 data.
pub fn request_body(image: &[u8], mime_type: &str) -> Value {
    json!({
        "contents": [{
            "parts": [
                { "text": PROMPT },
                {
                    "inline_data": {
                        "mime_type": mime_type,
                        "data": base64::engine::general_purpose::STANDARD.encode(image),
                    }
                }
            ]
        }],
        "generationConfig": { "temperature": 0.0 }
    })
}

pub fn mime_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        _ => "image/jpeg",
    }
}

/// Concatenated text parts of the first candidate.
pub fn reply_text(body: &Value) -> Option<String> {
    let parts = body
        .pointer("/candidates/0/content/parts")?
        .as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

fn error_message(body: &Value, status: u16) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {status}"))
}

impl InferenceRunner for GeminiRunner {
    fn name(&self) -> &str {
        "gemini"
    }

    fn run(&self, image: &Path) -> Result<RawOutput, ExtractError> {
        let bytes = std::fs::read(image)
            .map_err(|e| ExtractError::Io(format!("{}: {e}", image.display())))?;
        let body = request_body(&bytes, mime_type_for(image));
        let url = self.url();
        log::info!("gemini: {} ({} bytes) via {}", image.display(), bytes.len(), self.model);

        let reply: Value = with_retry(self.policy, "gemini", |_| {
            let resp = self
                .http
                .post(&url)
                .header("x-goog-api-key", &self.api_key)
                .json(&body)
                .send()
                .map_err(|e| AttemptError::transient(e.to_string()))?;

            let status = resp.status().as_u16();

            // Auth, bad request, other 4xx: fail immediately
            if (400..500).contains(&status) && status != 429 {
                let body: Value = resp.json().unwrap_or(Value::Null);
                let msg = error_message(&body, status);
                let err = match status {
                    401 | 403 => ExtractError::Configuration(format!("gemini auth failed ({status}): {msg}")),
                    _ => ExtractError::Backend(format!("gemini rejected the request ({status}): {msg}")),
                };
                return Err(AttemptError::Fatal(err));
            }

            if status == 429 || status >= 500 {
                let retry_after = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .map(Duration::from_secs);
                return Err(AttemptError::Transient {
                    reason: format!("HTTP {status}"),
                    retry_after,
                });
            }

            let text = resp
                .text()
                .map_err(|e| AttemptError::transient(format!("failed to read response body: {e}")))?;
            serde_json::from_str(text.trim_start_matches('\u{feff}')).map_err(|e| {
                AttemptError::Fatal(ExtractError::Backend(format!(
                    "failed to parse gemini response: {e} (body: {})",
                    text.chars().take(200).collect::<String>()
                )))
            })
        })?;

        reply_text(&reply)
            .map(RawOutput::Text)
            .ok_or_else(|| ExtractError::Backend("gemini returned no text".to_string()))
    }
}
