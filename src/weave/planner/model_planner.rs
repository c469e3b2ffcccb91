// SPDX-License-Identifier: MIT

//! [`Planner`] backed by a language model

use super::retry::RetryPolicy;
use super::{Classification, Planner};
use crate::adk::error::{ModelError, Result};
use crate::adk::model::{Content, GenerationConfig, Model, Part, Usage};
use crate::adk::tool::ToolSpec;
use crate::weave::context::{ConversationContext, MemoryTurn, Role};
use crate::weave::graph::{Plan, SubTaskDescriptor};
use crate::weave::node::{NodeStatus, SubTaskNode};
use crate::weave::outcome::ToolCall;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::Arc;

const DECOMPOSE_PROMPT: &str = "You split a user request into sub-tasks. Each sub-task must be \
solvable by exactly one of the listed tools, or by no tool when it is only conversational. \
Give every sub-task an `index` starting at 0, the `description` in the user's words, a \
self-contained `rewritten_task`, the `tool_name` (empty when none), `depends_on` (index of the \
sub-task whose output it needs, or -1) and `dependency_attribute` (the argument fed by that \
output, or empty). Never invent tools.";

const SELECT_PROMPT: &str = "Call the provided tool to carry out the task. If the task covers \
several items, call the tool once per item. Use the conversation for argument values and never \
guess values the user has not given.";

const CLASSIFY_PROMPT: &str = "Decide whether the user's latest message continues the ongoing \
task (for example answering a question it asked) or starts a new discussion. When unsure, \
prefer continuation.";

const INTERIM_PROMPT: &str = "Write a short, friendly message telling the user what still needs \
their attention. Mention what is needed, not how the system works.";

static DECOMPOSE_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "name": "decomposition",
        "schema": {
            "type": "object",
            "properties": {
                "sub_tasks": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "index": {"type": "integer"},
                            "description": {"type": "string"},
                            "rewritten_task": {"type": "string"},
                            "tool_name": {"type": "string"},
                            "depends_on": {"type": "integer"},
                            "dependency_attribute": {"type": "string"}
                        },
                        "required": [
                            "index", "description", "rewritten_task",
                            "tool_name", "depends_on", "dependency_attribute"
                        ],
                        "additionalProperties": false
                    }
                }
            },
            "required": ["sub_tasks"]
        }
    })
});

static CLASSIFY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "name": "classification",
        "schema": {
            "type": "object",
            "properties": {
                "classification": {
                    "type": "string",
                    "enum": ["new_discussion", "continuation"]
                }
            },
            "required": ["classification"]
        }
    })
});

static REPLY_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "name": "reply",
        "schema": {
            "type": "object",
            "properties": {"reply": {"type": "string"}},
            "required": ["reply"]
        }
    })
});

/// Planner that prompts a [`Model`] for every decision
pub struct ModelPlanner {
    model: Arc<dyn Model>,
    temperature: Option<f32>,
    max_tokens: u32,
    retry: RetryPolicy,
}

impl ModelPlanner {
    pub fn new(model: Arc<dyn Model>) -> Self {
        Self {
            model,
            temperature: None,
            max_tokens: 1024,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn config(&self, schema: Option<&Value>, max_tokens: u32) -> GenerationConfig {
        GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: Some(max_tokens),
            top_p: None,
            response_schema: schema.cloned(),
            require_tool_call: false,
        }
    }

    async fn generate_json(
        &self,
        history: &[Content],
        schema: &Value,
        max_tokens: u32,
    ) -> Result<(Value, Usage)> {
        let config = self.config(Some(schema), max_tokens);
        let generation = self
            .model
            .generate_content(history, Some(&config), None)
            .await?;
        let value = parse_json_reply(&generation.content.joined_text())?;
        Ok((value, generation.usage))
    }
}

/// Parse a JSON reply, tolerating a surrounding markdown fence
fn parse_json_reply(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let body = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .and_then(|rest| rest.strip_suffix("```"))
        .unwrap_or(trimmed)
        .trim();
    serde_json::from_str(body)
        .map_err(|e| ModelError::InvalidResponse(format!("expected JSON reply: {}", e)).into())
}

/// Map memory turns onto chat messages; tool turns become assistant text
fn memory_to_history(memory: &[MemoryTurn]) -> Vec<Content> {
    memory
        .iter()
        .map(|turn| match turn.role {
            Role::System => Content::text("system", &turn.content),
            Role::User => Content::text("user", &turn.content),
            Role::Assistant => Content::text("assistant", &turn.content),
            Role::Tool => {
                let name = turn.tool_name.as_deref().unwrap_or("tool");
                let status = turn.status.unwrap_or(NodeStatus::Success);
                Content::text(
                    "assistant",
                    format!("[{} -> {}] {}", name, status, turn.content),
                )
            }
            Role::Error => Content::text("assistant", format!("[error] {}", turn.content)),
        })
        .collect()
}

fn render_memory(memory: &[MemoryTurn]) -> String {
    memory
        .iter()
        .map(|turn| format!("{:?}: {}", turn.role, turn.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[async_trait]
impl Planner for ModelPlanner {
    async fn decompose(
        &self,
        query: &str,
        tool_catalog_markdown: &str,
    ) -> Result<(Vec<SubTaskDescriptor>, Usage)> {
        let history = vec![
            Content::text("system", DECOMPOSE_PROMPT),
            Content::text(
                "user",
                format!(
                    "<tools>\n{}</tools>\n\nRequest: {}",
                    tool_catalog_markdown, query
                ),
            ),
        ];

        let history = &history;
        let (plan, usage) = self
            .retry
            .run("decompose", || async move {
                let (value, usage) = self
                    .generate_json(history, &DECOMPOSE_SCHEMA, self.max_tokens)
                    .await?;
                let plan: Plan = serde_json::from_value(value).map_err(|e| {
                    ModelError::InvalidResponse(format!("malformed decomposition: {}", e))
                })?;
                Ok((plan, usage))
            })
            .await?;

        log::info!("Decomposed request into {} sub-tasks", plan.sub_tasks.len());
        Ok((plan.sub_tasks, usage))
    }

    async fn select_tools(
        &self,
        task: &str,
        eligible_tools: &[ToolSpec],
        memory: &[MemoryTurn],
    ) -> Result<(Vec<ToolCall>, Usage)> {
        let mut history = vec![Content::text("system", SELECT_PROMPT)];
        history.extend(memory_to_history(memory));
        if !memory.iter().any(|t| t.role == Role::User && t.content == task) {
            history.push(Content::text("user", task));
        }

        let mut config = self.config(None, self.max_tokens);
        config.require_tool_call = true;

        let generation = self
            .model
            .generate_content(&history, Some(&config), Some(eligible_tools))
            .await?;

        let calls = generation
            .content
            .parts
            .into_iter()
            .filter_map(|part| match part {
                Part::FunctionCall { id, name, args } => Some(ToolCall {
                    id,
                    name,
                    arguments: args,
                }),
                _ => None,
            })
            .collect();
        Ok((calls, generation.usage))
    }

    async fn classify(
        &self,
        user_input: &str,
        recent_memory: &[MemoryTurn],
    ) -> Result<(Classification, Usage)> {
        let history = vec![
            Content::text("system", CLASSIFY_PROMPT),
            Content::text(
                "user",
                format!(
                    "Conversation so far:\n{}\n\nLatest message: {}",
                    render_memory(recent_memory),
                    user_input
                ),
            ),
        ];

        let (value, usage) = self.generate_json(&history, &CLASSIFY_SCHEMA, 50).await?;
        let classification = match value.get("classification").and_then(Value::as_str) {
            Some("new_discussion") => Classification::NewDiscussion,
            _ => Classification::Continuation,
        };
        log::debug!("Resume input classified as {:?}", classification);
        Ok((classification, usage))
    }

    async fn summarize_interim(
        &self,
        level_nodes: &[SubTaskNode],
        context: &ConversationContext,
    ) -> Result<(String, Usage)> {
        let waiting: Vec<&SubTaskNode> = level_nodes
            .iter()
            .filter(|n| n.status.is_paused())
            .collect();
        let human = waiting
            .iter()
            .filter(|n| n.status == NodeStatus::Human)
            .count();

        let mut details: Vec<String> = waiting
            .iter()
            .take(3)
            .map(|n| format!("- {}: {}", n.task(), n.attention_text().unwrap_or("no details")))
            .collect();
        if waiting.len() > 3 {
            details.push(format!("- and {} more", waiting.len() - 3));
        }

        let mut request = format!(
            "{} task(s) need the user's input and {} failed.\n{}",
            human,
            waiting.len() - human,
            details.join("\n")
        );
        if let Some(name) = context.user_name() {
            request.push_str(&format!("\nAddress the user as {}.", name));
        }

        let history = vec![
            Content::text("system", INTERIM_PROMPT),
            Content::text("user", request),
        ];
        let (value, usage) = self
            .generate_json(&history, &REPLY_SCHEMA, self.max_tokens)
            .await?;
        let reply = value
            .get("reply")
            .and_then(Value::as_str)
            .ok_or_else(|| ModelError::InvalidResponse("reply field missing".to_string()))?;
        Ok((reply.to_string(), usage))
    }

    async fn respond(&self, memory: &[MemoryTurn], prompt: &str) -> Result<(String, Usage)> {
        let mut history = memory_to_history(memory);
        history.push(Content::text("user", prompt));

        let config = self.config(None, self.max_tokens);
        let generation = self
            .model
            .generate_content(&history, Some(&config), None)
            .await?;
        Ok((generation.content.joined_text(), generation.usage))
    }
}
