use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{classify_failure, http_client, ClientSettings, ModelCaller, ModelRequest};
use crate::config::Credentials;
use crate::errors::{PipelineError, PipelineResult};

const PROVIDER: &str = "gemini";

/// Google Generative Language `generateContent` backend.
pub struct GeminiClient {
    settings: ClientSettings,
    credentials: Credentials,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(settings: ClientSettings, credentials: Credentials) -> PipelineResult<Self> {
        let client = http_client(settings.timeout)?;
        Ok(Self {
            settings,
            credentials,
            client,
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.settings.base_url, self.settings.model
        )
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let mut generation = json!({
            "temperature": self.settings.temperature,
            "maxOutputTokens": self.settings.max_output_tokens,
        });
        if let Some(schema) = &request.schema {
            generation["responseMimeType"] = json!("application/json");
            generation["responseSchema"] = to_gemini_schema(schema);
        }

        let mut body = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.prompt }]
            }],
            "generationConfig": generation,
        });
        if let Some(system) = &request.system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system }] });
        }
        body
    }
}

#[async_trait]
impl ModelCaller for GeminiClient {
    async fn complete(&self, request: &ModelRequest) -> PipelineResult<String> {
        let url = self.endpoint();
        debug!(model = %self.settings.model, structured = request.schema.is_some(), "calling gemini");

        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.credentials.api_key())
            .json(&self.body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(PROVIDER, status.as_u16(), &body));
        }

        let json: Value = resp.json().await?;
        let text = candidate_text(&json).ok_or_else(|| {
            let reason = json
                .pointer("/candidates/0/finishReason")
                .or_else(|| json.pointer("/promptFeedback/blockReason"))
                .and_then(Value::as_str)
                .unwrap_or("no candidates");
            PipelineError::malformed_output(format!("gemini returned no text ({})", reason))
                .with_provider(PROVIDER)
        })?;
        Ok(text)
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}

/// Concatenated text parts of the first candidate.
fn candidate_text(json: &Value) -> Option<String> {
    let parts = json.pointer("/candidates/0/content/parts")?.as_array()?;
    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect();
    (!text.trim().is_empty()).then_some(text)
}

/// Gemini takes an OpenAPI-style subset: upper-case `type` names and no
/// `additionalProperties`.
fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (key, value) in map {
                match key.as_str() {
                    "additionalProperties" | "$schema" => {}
                    "type" => {
                        let ty = value
                            .as_str()
                            .map(|s| Value::String(s.to_ascii_uppercase()))
                            .unwrap_or_else(|| value.clone());
                        out.insert(key.clone(), ty);
                    }
                    // Property names are data, not schema keywords.
                    "properties" => {
                        let props = value
                            .as_object()
                            .map(|p| {
                                p.iter()
                                    .map(|(k, v)| (k.clone(), to_gemini_schema(v)))
                                    .collect::<serde_json::Map<_, _>>()
                            })
                            .map(Value::Object)
                            .unwrap_or_else(|| value.clone());
                        out.insert(key.clone(), props);
                    }
                    _ => {
                        out.insert(key.clone(), to_gemini_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}
