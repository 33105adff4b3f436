//! Task description loaded from `task.yaml`.
//!
//! The task is read once at startup and never mutated afterwards.

use std::path::Path;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::TaskError;

/// A bug-fix task: what is broken, where to look, and how to check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    /// Stable task identifier.
    pub task_id: String,
    /// Short human-readable title.
    #[serde(default)]
    pub title: String,
    /// Problem statement shown to the agent.
    #[serde(default)]
    pub description: String,
    /// Behavioural requirements the fix must satisfy.
    #[serde(default, deserialize_with = "text_or_list")]
    pub requirements: String,
    /// Interface the fix must expose or preserve.
    #[serde(default, deserialize_with = "text_or_list")]
    pub interface: String,
    /// Ordered list of paths that likely need changes.
    #[serde(default)]
    pub files_to_modify: Vec<String>,
    /// How to run the verification tests.
    pub tests: TaskTests,
    /// Optional per-task turn budget, overriding the run configuration.
    #[serde(default)]
    pub max_turns: Option<usize>,
}

/// Test section of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskTests {
    /// Shell command that runs the failing test(s).
    pub test_command: String,
}

impl Task {
    /// Load a task from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self, TaskError> {
        let content = std::fs::read_to_string(path).map_err(|source| TaskError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let task: Task = serde_yaml::from_str(&content).map_err(|source| TaskError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        task.validate()?;
        Ok(task)
    }

    /// Parse a task from a YAML string.
    pub fn from_yaml_str(content: &str) -> Result<Self, TaskError> {
        let task: Task = serde_yaml::from_str(content).map_err(|source| TaskError::Parse {
            path: "<inline>".to_string(),
            source,
        })?;
        task.validate()?;
        Ok(task)
    }

    fn validate(&self) -> Result<(), TaskError> {
        if self.task_id.trim().is_empty() {
            return Err(TaskError::MissingField("task_id"));
        }
        if self.tests.test_command.trim().is_empty() {
            return Err(TaskError::MissingField("tests.test_command"));
        }
        Ok(())
    }
}

/// Accept either a block of text or a YAML list of lines.
fn text_or_list<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum TextOrList {
        Text(String),
        List(Vec<String>),
    }

    Ok(match Option::<TextOrList>::deserialize(deserializer)? {
        Some(TextOrList::Text(text)) => text,
        Some(TextOrList::List(items)) => items
            .iter()
            .map(|item| format!("- {}", item))
            .collect::<Vec<_>>()
            .join("\n"),
        None => String::new(),
    })
}
