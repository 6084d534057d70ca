use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use super::{classify_failure, http_client, ClientSettings, ModelCaller, ModelRequest};
use crate::config::Credentials;
use crate::errors::{PipelineError, PipelineResult};

const PROVIDER: &str = "openai";

/// OpenAI-compatible chat completions backend.
pub struct OpenAiClient {
    settings: ClientSettings,
    credentials: Credentials,
    client: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(settings: ClientSettings, credentials: Credentials) -> PipelineResult<Self> {
        let client = http_client(settings.timeout)?;
        Ok(Self {
            settings,
            credentials,
            client,
        })
    }

    fn body(&self, request: &ModelRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": request.prompt }));

        let mut body = json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_output_tokens,
        });
        if let Some(schema) = &request.schema {
            body["response_format"] = json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "response",
                    "strict": true,
                    "schema": strict_schema(schema.clone())
                }
            });
        }
        body
    }
}

/// Strict structured outputs reject objects that allow extra keys or leave
/// properties optional, so every object node is closed and all its properties
/// become required.
fn strict_schema(mut schema: Value) -> Value {
    close_objects(&mut schema);
    schema
}

fn close_objects(node: &mut Value) {
    match node {
        Value::Object(map) => {
            let keys: Option<Vec<Value>> = map
                .get("properties")
                .and_then(Value::as_object)
                .map(|props| props.keys().cloned().map(Value::String).collect());
            if let Some(keys) = keys {
                map.insert("required".into(), Value::Array(keys));
                map.insert("additionalProperties".into(), Value::Bool(false));
            }
            for child in map.values_mut() {
                close_objects(child);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

#[async_trait]
impl ModelCaller for OpenAiClient {
    async fn complete(&self, request: &ModelRequest) -> PipelineResult<String> {
        let url = format!("{}/chat/completions", self.settings.base_url);
        debug!(model = %self.settings.model, structured = request.schema.is_some(), "calling openai");

        let resp = self
            .client
            .post(&url)
            .header(
                "Authorization",
                format!("Bearer {}", self.credentials.api_key()),
            )
            .header("Content-Type", "application/json")
            .json(&self.body(request))
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(classify_failure(PROVIDER, status.as_u16(), &body));
        }

        let json: Value = resp.json().await?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::malformed_output("openai response missing message content")
                    .with_provider(PROVIDER)
            })
    }

    fn provider_name(&self) -> &'static str {
        PROVIDER
    }
}
