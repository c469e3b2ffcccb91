// SPDX-License-Identifier: MIT

use crate::adk::error::{Result, WeaveError};
use crate::adk::tool::Tool;
use crate::weave::config::CommandToolConfig;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Tool backed by an external program.
///
/// The arguments are written to stdin as JSON. Stdout is read as JSON (a bare
/// payload or an outcome object); non-JSON output is passed on as a string.
/// A non-zero exit is reported as a failed outcome carrying stderr.
pub struct CommandTool {
    config: CommandToolConfig,
}

impl CommandTool {
    pub fn new(config: CommandToolConfig) -> Self {
        Self { config }
    }

    fn timeout(&self) -> Option<Duration> {
        self.config.timeout_secs.map(Duration::from_secs)
    }

    async fn run(&self, input: &Value) -> Result<std::process::Output> {
        let mut child = Command::new(&self.config.command)
            .args(&self.config.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                WeaveError::other(format!(
                    "failed to start tool {} ({}): {}",
                    self.config.name, self.config.command, e
                ))
            })?;

        // feed stdin while stdout and stderr drain
        let writer = child.stdin.take().map(|mut stdin| {
            let payload = input.to_string().into_bytes();
            tokio::spawn(async move {
                stdin.write_all(&payload).await?;
                stdin.shutdown().await
            })
        });

        let output = child.wait_with_output().await?;

        if let Some(writer) = writer {
            match writer.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.kind() == ErrorKind::BrokenPipe => {
                    log::debug!("Tool {} exited before reading all of its input", self.config.name);
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(e) => {
                    return Err(WeaveError::other(format!(
                        "stdin writer for tool {} aborted: {}",
                        self.config.name, e
                    )))
                }
            }
        }

        Ok(output)
    }
}

#[async_trait]
impl Tool for CommandTool {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn description(&self) -> &str {
        &self.config.description
    }

    fn schema(&self) -> &Value {
        &self.config.schema
    }

    async fn execute(&self, input: Value) -> Result<Value> {
        let output = match self.timeout() {
            Some(limit) => match tokio::time::timeout(limit, self.run(&input)).await {
                Ok(output) => output?,
                Err(_) => {
                    return Ok(json!({
                        "status": "failed",
                        "message": format!("{} timed out after {:?}", self.config.name, limit)
                    }))
                }
            },
            None => self.run(&input).await?,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            log::warn!("Tool {} exited with {}: {}", self.config.name, output.status, stderr);
            return Ok(json!({
                "status": "failed",
                "message": if stderr.is_empty() {
                    format!("{} exited with {}", self.config.name, output.status)
                } else {
                    stderr
                }
            }));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok(serde_json::from_str(&stdout).unwrap_or(Value::String(stdout)))
    }
}

/// Build the configured command tools
pub fn create_tools(configs: &[CommandToolConfig]) -> Vec<Arc<dyn Tool>> {
    configs
        .iter()
        .cloned()
        .map(|config| Arc::new(CommandTool::new(config)) as Arc<dyn Tool>)
        .collect()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::weave::outcome::{OutcomeStatus, ToolOutcome};

    fn sh(name: &str, script: &str, timeout_secs: Option<u64>) -> CommandTool {
        CommandTool::new(CommandToolConfig {
            name: name.to_string(),
            description: format!("runs {}", name),
            schema: json!({"type": "object", "properties": {}}),
            command: "sh".to_string(),
            args: vec!["-c".to_string(), script.to_string()],
            timeout_secs,
        })
    }

    #[tokio::test]
    async fn test_echoes_stdin_json() {
        let tool = sh("echo", "cat", None);
        let value = tool.execute(json!({"title": "Alien"})).await.unwrap();
        assert_eq!(value["title"], "Alien");
    }

    fn large_input() -> Value {
        json!({"blob": "x".repeat(1 << 20)})
    }

    #[tokio::test]
    async fn test_large_input_is_streamed_back() {
        let tool = sh("echo_big", "cat", Some(10));
        let input = large_input();
        let value = tool.execute(input.clone()).await.unwrap();
        assert_eq!(value, input);
    }

    #[tokio::test]
    async fn test_tool_ignoring_large_input_still_succeeds() {
        let tool = sh("quick", r#"echo '{"ok": 1}'"#, Some(10));
        let value = tool.execute(large_input()).await.unwrap();
        assert_eq!(value["ok"], 1);
    }

    #[tokio::test]
    async fn test_plain_stdout_is_string() {
        let tool = sh("hello", "cat > /dev/null; echo hello", None);
        let value = tool.execute(json!({})).await.unwrap();
        assert_eq!(value, json!("hello"));
    }

    #[tokio::test]
    async fn test_outcome_object_passes_through() {
        let tool = sh(
            "ask",
            r#"cat > /dev/null; echo '{"status": "human", "message": "Which list?"}'"#,
            None,
        );
        let outcome = ToolOutcome::from_value(tool.execute(json!({})).await.unwrap());
        assert_eq!(outcome.status, OutcomeStatus::Human);
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_failed_outcome() {
        let tool = sh("broken", "cat > /dev/null; echo boom >&2; exit 3", None);
        let outcome = ToolOutcome::from_value(tool.execute(json!({})).await.unwrap());
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert_eq!(outcome.issue.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_timeout_is_failed_outcome() {
        let tool = sh("slow", "sleep 5", Some(1));
        let outcome = ToolOutcome::from_value(tool.execute(json!({})).await.unwrap());
        assert_eq!(outcome.status, OutcomeStatus::Failed);
        assert!(outcome.issue.unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_missing_program_is_error() {
        let tool = CommandTool::new(CommandToolConfig {
            name: "ghost".to_string(),
            description: String::new(),
            schema: json!({}),
            command: "/definitely/not/here".to_string(),
            args: vec![],
            timeout_secs: None,
        });
        assert!(tool.execute(json!({})).await.is_err());
    }

    #[test]
    fn test_create_tools() {
        let tools = create_tools(&[CommandToolConfig {
            name: "a".to_string(),
            description: "first".to_string(),
            schema: json!({}),
            command: "true".to_string(),
            args: vec![],
            timeout_secs: None,
        }]);
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].name(), "a");
        assert_eq!(tools[0].description(), "first");
    }
}
