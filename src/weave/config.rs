// SPDX-License-Identifier: MIT

//! Settings loading - YAML file loading and parsing
//!
//! Every field has a default so an empty file is a valid configuration.

use crate::adk::error::{Result, WeaveError};
use crate::weave::graph::Plan;
use crate::weave::planner::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub engine: EngineSettings,
    pub planner: PlannerSettings,
    pub storage: StorageSettings,
    pub tools: Vec<CommandToolConfig>,
}

/// Knobs of the execution engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    /// Upper bound on nodes of one level running at the same time
    pub max_concurrency: usize,
    pub invocation_timeout_secs: Option<u64>,
    /// Stop in-flight siblings once a node of the level fails
    pub cancel_on_failure: bool,
    pub generate_interim_messages: bool,
    /// Merge memories of failed/human nodes when a level halts
    pub add_human_failed_memory: bool,
    pub classify_resume_input: bool,
    /// Report informational nodes as a trailing level
    pub include_non_actionable: bool,
    /// Prompt for a closing reply once the graph succeeds
    pub final_prompt: Option<String>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            invocation_timeout_secs: None,
            cancel_on_failure: false,
            generate_interim_messages: false,
            add_human_failed_memory: false,
            classify_resume_input: true,
            include_non_actionable: false,
            final_prompt: None,
        }
    }
}

impl EngineSettings {
    pub fn invocation_timeout(&self) -> Option<Duration> {
        self.invocation_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlannerSettings {
    pub model: String,
    /// Falls back to `OPENAI_BASE_URL`, then the public endpoint
    pub base_url: Option<String>,
    pub api_key_env: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub retry: RetryPolicy,
}

impl Default for PlannerSettings {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key_env: "OPENAI_API_KEY".to_string(),
            max_tokens: 1024,
            temperature: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub dir: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            dir: PathBuf::from(".taskweave/runs"),
        }
    }
}

/// A tool implemented by an external program
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CommandToolConfig {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// JSON schema of the arguments; an empty object schema when omitted
    #[serde(default = "empty_schema")]
    pub schema: Value,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn empty_schema() -> Value {
    serde_json::json!({"type": "object", "properties": {}})
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            WeaveError::config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::parse_yaml(&content)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Parse settings from a YAML string
    pub fn parse_yaml(content: &str) -> Result<Self> {
        let settings: Settings = if content.trim().is_empty() {
            Settings::default()
        } else {
            serde_yaml::from_str(content)?
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.max_concurrency == 0 {
            return Err(WeaveError::config("engine.max_concurrency must be at least 1"));
        }
        if self.planner.retry.max_attempts == 0 {
            return Err(WeaveError::config("planner.retry.max_attempts must be at least 1"));
        }
        let mut seen = HashSet::new();
        for tool in &self.tools {
            if !seen.insert(tool.name.as_str()) {
                return Err(WeaveError::config(format!("duplicate tool name: {}", tool.name)));
            }
        }
        Ok(())
    }
}

/// Load a decomposition from a YAML (or JSON) plan file
pub fn load_plan<P: AsRef<Path>>(path: P) -> Result<Plan> {
    let content = fs::read_to_string(path)?;
    let plan: Plan = serde_yaml::from_str(&content)?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let settings = Settings::parse_yaml("").unwrap();
        assert_eq!(settings.engine, EngineSettings::default());
        assert_eq!(settings.engine.max_concurrency, 8);
        assert!(settings.engine.classify_resume_input);
        assert_eq!(settings.planner.model, "gpt-4o-mini");
        assert_eq!(settings.planner.retry, RetryPolicy::default());
        assert_eq!(settings.storage.dir, PathBuf::from(".taskweave/runs"));
        assert!(settings.tools.is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let yaml = r#"
engine:
  max_concurrency: 2
  invocation_timeout_secs: 30
  cancel_on_failure: true
  final_prompt: "Summarize what was done."
planner:
  model: gpt-4o
  retry:
    max_attempts: 5
storage:
  dir: /tmp/runs
tools:
  - name: search_movie
    description: Search a movie by title
    command: ./tools/search.sh
    args: ["--json"]
    timeout_secs: 10
"#;
        let settings = Settings::parse_yaml(yaml).unwrap();
        assert_eq!(settings.engine.max_concurrency, 2);
        assert_eq!(settings.engine.invocation_timeout(), Some(Duration::from_secs(30)));
        assert!(settings.engine.cancel_on_failure);
        assert!(!settings.engine.generate_interim_messages);
        assert_eq!(settings.planner.retry.max_attempts, 5);
        assert_eq!(settings.planner.retry.base_delay_secs, 4);
        assert_eq!(settings.tools[0].args, vec!["--json"]);
        assert_eq!(settings.tools[0].schema["type"], "object");
    }

    #[test]
    fn test_rejects_zero_concurrency() {
        let err = Settings::parse_yaml("engine:\n  max_concurrency: 0\n").unwrap_err();
        assert!(matches!(err, WeaveError::Config(_)));
    }

    #[test]
    fn test_rejects_duplicate_tools() {
        let yaml = r#"
tools:
  - {name: a, command: "true"}
  - {name: a, command: "false"}
"#;
        assert!(matches!(
            Settings::parse_yaml(yaml).unwrap_err(),
            WeaveError::Config(_)
        ));
    }

    #[test]
    fn test_load_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.yaml");
        fs::write(
            &path,
            "sub_tasks:\n  - {index: 0, description: find, tool_name: search}\n",
        )
        .unwrap();

        let plan = load_plan(&path).unwrap();
        assert_eq!(plan.sub_tasks.len(), 1);
        assert_eq!(plan.sub_tasks[0].tool_name.as_deref(), Some("search"));
    }
}
