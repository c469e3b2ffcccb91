// SPDX-License-Identifier: MIT

//! Tool calls and their decoded outcomes

use crate::weave::node::NodeStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A concrete invocation chosen by the planner for a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeStatus {
    Success,
    Failed,
    Human,
    Partial,
}

impl From<OutcomeStatus> for NodeStatus {
    fn from(status: OutcomeStatus) -> Self {
        match status {
            OutcomeStatus::Success => NodeStatus::Success,
            OutcomeStatus::Failed => NodeStatus::Failed,
            OutcomeStatus::Human => NodeStatus::Human,
            OutcomeStatus::Partial => NodeStatus::Partial,
        }
    }
}

/// What a single tool invocation reported
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub status: OutcomeStatus,
    #[serde(default, alias = "return")]
    pub payload: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub help: Option<String>,
    #[serde(default)]
    pub issue: Option<String>,
}

impl ToolOutcome {
    pub fn success(payload: Value) -> Self {
        Self {
            status: OutcomeStatus::Success,
            payload,
            message: None,
            help: None,
            issue: None,
        }
    }

    pub fn failed(issue: impl Into<String>) -> Self {
        let issue = issue.into();
        Self {
            status: OutcomeStatus::Failed,
            payload: Value::Null,
            message: Some(issue.clone()),
            help: None,
            issue: Some(issue),
        }
    }

    pub fn human(help: impl Into<String>) -> Self {
        let help = help.into();
        Self {
            status: OutcomeStatus::Human,
            payload: Value::Null,
            message: Some(help.clone()),
            help: Some(help.clone()),
            issue: Some(help),
        }
    }

    /// Decode whatever a tool returned.
    ///
    /// Objects carrying a recognised `status` are read as outcomes (a JSON
    /// string holding such an object is unwrapped first); any other value is a
    /// successful payload.
    pub fn from_value(value: Value) -> Self {
        if let Value::String(s) = &value {
            if let Ok(inner @ Value::Object(_)) = serde_json::from_str::<Value>(s) {
                if inner.get("status").is_some() {
                    return Self::from_value(inner);
                }
            }
        }

        let has_status = value
            .get("status")
            .and_then(Value::as_str)
            .map(|s| serde_json::from_value::<OutcomeStatus>(Value::String(s.to_string())).is_ok())
            .unwrap_or(false);

        if !has_status {
            return Self::success(value);
        }

        match serde_json::from_value::<ToolOutcome>(value) {
            Ok(outcome) => outcome.normalized(),
            Err(e) => Self::failed(format!("malformed tool outcome: {}", e)),
        }
    }

    /// Non-success outcomes always carry an issue; human ones also a help text
    fn normalized(mut self) -> Self {
        if self.status != OutcomeStatus::Success && self.issue.is_none() {
            self.issue = self.message.clone();
        }
        if self.status == OutcomeStatus::Human && self.help.is_none() {
            self.help = self.message.clone().or_else(|| self.issue.clone());
        }
        self
    }

    pub fn node_status(&self) -> NodeStatus {
        self.status.into()
    }

    /// Payload serialized for storage on the node
    pub fn payload_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Text recorded as the tool's turn in memory
    pub fn response_text(&self) -> String {
        match self.status {
            OutcomeStatus::Success => self.payload_text(),
            _ => self
                .message
                .clone()
                .or_else(|| self.issue.clone())
                .unwrap_or_else(|| self.payload_text()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_value_is_success() {
        let outcome = ToolOutcome::from_value(json!({"movies": ["Alien"]}));
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.payload["movies"][0], "Alien");
    }

    #[test]
    fn test_status_object_with_return_alias() {
        let outcome = ToolOutcome::from_value(json!({
            "status": "success",
            "return": {"id": 7}
        }));
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.payload_text(), r#"{"id":7}"#);
    }

    #[test]
    fn test_human_message_becomes_help_and_issue() {
        let outcome = ToolOutcome::from_value(json!({
            "status": "human",
            "message": "Which list should I use?"
        }));
        assert_eq!(outcome.node_status(), NodeStatus::Human);
        assert_eq!(outcome.help.as_deref(), Some("Which list should I use?"));
        assert_eq!(outcome.issue.as_deref(), Some("Which list should I use?"));
        assert_eq!(outcome.response_text(), "Which list should I use?");
    }

    #[test]
    fn test_json_string_is_unwrapped() {
        let raw = json!(r#"{"status": "failed", "message": "quota exceeded"}"#);
        let outcome = ToolOutcome::from_value(raw);
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.issue.as_deref(), Some("quota exceeded"));
    }

    #[test]
    fn test_unknown_status_is_payload() {
        let outcome = ToolOutcome::from_value(json!({"status": "shipped"}));
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.payload["status"], "shipped");
    }

    #[test]
    fn test_plain_string_payload() {
        let outcome = ToolOutcome::from_value(json!("done"));
        assert_eq!(outcome.status, OutcomeStatus::Success);
        assert_eq!(outcome.payload_text(), "done");
    }
}
