// SPDX-License-Identifier: MIT

//! OpenAI-compatible chat completions client

use super::{Content, Generation, GenerationConfig, Model, Part, Usage};
use crate::adk::error::{ModelError, Result, WeaveError};
use crate::adk::tool::ToolSpec;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::env;

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Chat completions model reachable over an OpenAI-compatible HTTP API
pub struct OpenAIModel {
    client: Client,
    api_key: String,
    model_name: String,
    base_url: String,
}

impl OpenAIModel {
    pub fn new(
        model_name: impl Into<String>,
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model_name: model_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Build from the environment: the key is read from `api_key_env`,
    /// the endpoint from `OPENAI_BASE_URL` unless `base_url` is given.
    pub fn from_env(
        model_name: impl Into<String>,
        api_key_env: &str,
        base_url: Option<&str>,
    ) -> Result<Self> {
        let api_key = env::var(api_key_env)
            .map_err(|_| ModelError::ApiKeyMissing(api_key_env.to_string()))?;
        let base_url = base_url
            .map(str::to_string)
            .or_else(|| env::var("OPENAI_BASE_URL").ok())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        Ok(Self::new(model_name, api_key, base_url))
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    fn message_json(content: &Content) -> Value {
        let role = match content.role.as_str() {
            "model" => "assistant",
            other => other,
        };

        for part in &content.parts {
            if let Part::FunctionResponse { id, name, response } = part {
                let body = match response {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                return json!({
                    "role": "tool",
                    "tool_call_id": id.clone().unwrap_or_else(|| name.clone()),
                    "content": body
                });
            }
        }

        let mut tool_calls = Vec::new();
        let mut text = String::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::FunctionCall { id, name, args } => tool_calls.push(json!({
                    "id": id.clone().unwrap_or_else(|| name.clone()),
                    "type": "function",
                    "function": { "name": name, "arguments": args.to_string() }
                })),
                Part::FunctionResponse { .. } => {}
            }
        }

        if tool_calls.is_empty() {
            json!({ "role": role, "content": text })
        } else {
            json!({
                "role": role,
                "content": if text.is_empty() { Value::Null } else { json!(text) },
                "tool_calls": tool_calls
            })
        }
    }

    fn tools_json(tools: &[ToolSpec]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.schema
                    }
                })
            })
            .collect()
    }

    fn request_body(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Value {
        let messages: Vec<Value> = history.iter().map(Self::message_json).collect();
        let mut body = json!({ "model": self.model_name, "messages": messages });

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                body["temperature"] = json!(temp);
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                body["max_tokens"] = json!(max_tokens);
            }
            if let Some(top_p) = cfg.top_p {
                body["top_p"] = json!(top_p);
            }
            if let Some(schema) = &cfg.response_schema {
                let mut schema = schema.clone();
                schema["strict"] = json!(true);
                schema["schema"]["additionalProperties"] = json!(false);
                body["response_format"] = json!({ "type": "json_schema", "json_schema": schema });
            }
        }

        if let Some(tools) = tools.filter(|t| !t.is_empty()) {
            body["tools"] = json!(Self::tools_json(tools));
            let required = config.map(|c| c.require_tool_call).unwrap_or(false);
            body["tool_choice"] = json!(if required { "required" } else { "auto" });
        }

        body
    }

    fn parse_response(response: &Value) -> Result<Generation> {
        let message = response["choices"]
            .as_array()
            .and_then(|c| c.first())
            .map(|choice| &choice["message"])
            .ok_or_else(|| ModelError::InvalidResponse("no choices in response".to_string()))?;

        let mut parts = Vec::new();
        if let Some(text) = message["content"].as_str().filter(|t| !t.is_empty()) {
            parts.push(Part::Text(text.to_string()));
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let name = tc["function"]["name"].as_str().ok_or_else(|| {
                    ModelError::InvalidResponse("tool call without a function name".to_string())
                })?;
                let raw_args = tc["function"]["arguments"].as_str().unwrap_or("{}");
                let args: Value = serde_json::from_str(raw_args).map_err(|e| {
                    ModelError::InvalidResponse(format!(
                        "arguments for {} are not JSON: {}",
                        name, e
                    ))
                })?;
                parts.push(Part::FunctionCall {
                    id: tc["id"].as_str().map(str::to_string),
                    name: name.to_string(),
                    args,
                });
            }
        }

        let usage = serde_json::from_value::<Usage>(response["usage"].clone()).unwrap_or_default();

        Ok(Generation {
            content: Content {
                role: "model".to_string(),
                parts,
            },
            usage,
        })
    }
}

#[async_trait]
impl Model for OpenAIModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[ToolSpec]>,
    ) -> Result<Generation> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.request_body(history, config, tools);

        log::debug!(
            "OpenAI request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        match resp.status() {
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after_secs = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok());
                return Err(ModelError::RateLimited { retry_after_secs }.into());
            }
            status if !status.is_success() => {
                let text = resp.text().await?;
                return Err(WeaveError::api("openai", format!("{}: {}", status, text)));
            }
            _ => {}
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("OpenAI response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model() -> OpenAIModel {
        OpenAIModel::new("gpt-4o-mini", "sk-test", "http://localhost:9/v1/")
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(model().base_url, "http://localhost:9/v1");
    }

    #[test]
    fn test_model_role_maps_to_assistant() {
        let msg = OpenAIModel::message_json(&Content::text("model", "I can help"));
        assert_eq!(msg["role"], "assistant");
        assert_eq!(msg["content"], "I can help");
    }

    #[test]
    fn test_function_response_message() {
        let content = Content {
            role: "tool".to_string(),
            parts: vec![Part::FunctionResponse {
                id: Some("call_1".to_string()),
                name: "get_weather".to_string(),
                response: json!({"temp": 12}),
            }],
        };
        let msg = OpenAIModel::message_json(&content);
        assert_eq!(msg["role"], "tool");
        assert_eq!(msg["tool_call_id"], "call_1");
        assert_eq!(msg["content"], r#"{"temp":12}"#);
    }

    #[test]
    fn test_request_body_with_schema_and_required_tools() {
        let config = GenerationConfig {
            max_output_tokens: Some(50),
            response_schema: Some(json!({"name": "response", "schema": {"type": "object"}})),
            require_tool_call: true,
            ..Default::default()
        };
        let tools = vec![ToolSpec::new("search", "Search", json!({"type": "object"}))];
        let body = model().request_body(
            &[Content::text("user", "hi")],
            Some(&config),
            Some(&tools),
        );

        assert_eq!(body["max_tokens"], 50);
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["strict"], true);
        assert_eq!(
            body["response_format"]["json_schema"]["schema"]["additionalProperties"],
            false
        );
        assert_eq!(body["tool_choice"], "required");
        assert_eq!(body["tools"][0]["function"]["name"], "search");
    }

    #[test]
    fn test_parse_tool_calls_and_usage() {
        let response = json!({
            "choices": [{
                "message": {
                    "role": "assistant",
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function",
                         "function": {"name": "get_weather", "arguments": "{\"city\": \"London\"}"}},
                        {"id": "call_2", "type": "function",
                         "function": {"name": "get_weather", "arguments": "{\"city\": \"Paris\"}"}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 30, "completion_tokens": 12, "total_tokens": 42}
        });

        let generation = OpenAIModel::parse_response(&response).unwrap();
        assert_eq!(generation.usage, Usage::new(30, 12));
        assert_eq!(generation.content.parts.len(), 2);
        match &generation.content.parts[1] {
            Part::FunctionCall { id, name, args } => {
                assert_eq!(id.as_deref(), Some("call_2"));
                assert_eq!(name, "get_weather");
                assert_eq!(args["city"], "Paris");
            }
            _ => panic!("Expected FunctionCall part"),
        }
    }

    #[test]
    fn test_parse_rejects_bad_arguments() {
        let response = json!({
            "choices": [{"message": {"tool_calls": [
                {"id": "c", "function": {"name": "x", "arguments": "{not json"}}
            ]}}]
        });
        assert!(OpenAIModel::parse_response(&response).is_err());
    }

    #[test]
    fn test_parse_without_choices() {
        assert!(OpenAIModel::parse_response(&json!({"choices": []})).is_err());
    }
}
