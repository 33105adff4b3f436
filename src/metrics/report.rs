//! The final `result.json` report.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::resolution::{PostVerificationStatus, PreVerificationStatus};
use super::test_output::VerificationRecord;
use super::usage::{TokenTotals, ToolUsage};
use super::MetricsError;

/// File name of the report inside the output directory.
pub const RESULT_FILE: &str = "result.json";

/// Terminal artifact of a run. Built once and written once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub task_id: String,
    pub resolved: bool,
    pub pre_verification_status: PreVerificationStatus,
    pub post_verification_status: PostVerificationStatus,
    pub pre: VerificationRecord,
    pub post: VerificationRecord,
    pub duration_seconds: u64,
    pub total_cost_usd: f64,
    pub tokens: TokenTotals,
    pub tool_usage: ToolUsage,
    #[serde(default)]
    pub model_used: Option<String>,
    pub agent_actions: u64,
    /// Turns taken by the agent; unknown when recomputed from artifacts.
    #[serde(default)]
    pub turns: Option<u64>,
    /// `completed`, `budget_exhausted` or `error`.
    #[serde(default)]
    pub termination: Option<String>,
    /// Why the run or the agent loop stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MetricsReport {
    /// A report with every measurement zeroed and `resolved = false`.
    pub fn empty(task_id: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            resolved: false,
            pre_verification_status: PreVerificationStatus::MissingLog,
            post_verification_status: PostVerificationStatus::MissingLog,
            pre: VerificationRecord::unparsed(),
            post: VerificationRecord::unparsed(),
            duration_seconds: 0,
            total_cost_usd: 0.0,
            tokens: TokenTotals::default(),
            tool_usage: ToolUsage::default(),
            model_used: None,
            agent_actions: 0,
            turns: None,
            termination: None,
            error: None,
        }
    }

    /// Write the report as pretty-printed JSON.
    pub fn write_to(&self, path: &Path) -> Result<(), MetricsError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json + "\n").map_err(|source| MetricsError::Io {
            path: path.display().to_string(),
            source,
        })
    }

    /// Read a report previously written with [`MetricsReport::write_to`].
    pub fn read_from(path: &Path) -> Result<Self, MetricsError> {
        let content = fs::read_to_string(path).map_err(|source| MetricsError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RESULT_FILE);

        let report = MetricsReport {
            resolved: true,
            pre_verification_status: PreVerificationStatus::FailureReproduced,
            post_verification_status: PostVerificationStatus::Fixed,
            pre: VerificationRecord::new(3, 2),
            post: VerificationRecord::new(5, 0),
            duration_seconds: 84,
            total_cost_usd: 0.123457,
            tokens: TokenTotals {
                input: 41_200,
                output: 1_875,
                cache_read: 0,
                cache_write: 0,
            },
            tool_usage: ToolUsage {
                read: 4,
                write: 1,
                edit: 2,
                bash: 3,
                unclassified: 0,
            },
            model_used: Some("claude-3-5-sonnet-20241022".to_string()),
            agent_actions: 22,
            turns: Some(6),
            termination: Some("completed".to_string()),
            ..MetricsReport::empty("openlibrary-42")
        };

        report.write_to(&path).unwrap();
        assert_eq!(MetricsReport::read_from(&path).unwrap(), report);
    }

    #[test]
    fn test_empty_report_shape() {
        let json = serde_json::to_value(MetricsReport::empty("t")).unwrap();
        assert_eq!(json["resolved"], false);
        assert_eq!(json["pre_verification_status"], "missing_log");
        assert_eq!(json["tokens"]["cache_write"], 0);
        assert_eq!(json["tool_usage"]["bash"], 0);
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = MetricsReport::read_from(&dir.path().join(RESULT_FILE)).unwrap_err();
        assert!(matches!(err, MetricsError::Io { .. }));
    }
}
