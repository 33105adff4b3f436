//! Builds a [`MetricsReport`] from the artifacts of a run.

use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use tracing::{debug, info};

use super::report::MetricsReport;
use super::resolution::{is_resolved, PostVerificationStatus, PreVerificationStatus};
use super::test_output::{parse_test_output, VerificationRecord};
use super::usage::summarize;
use super::MetricsError;
use crate::llm::PriceTable;
use crate::runner::verifier::VerificationPhase;
use crate::transcript::{read_entries, AGENT_LOG};

/// Reads verification logs and the transcript from an output directory.
#[derive(Debug, Clone, Default)]
pub struct MetricsExtractor {
    prices: PriceTable,
}

impl MetricsExtractor {
    pub fn new(prices: PriceTable) -> Self {
        Self { prices }
    }

    /// Compute the report for the run whose artifacts live in `output_dir`.
    ///
    /// Missing verification logs yield `missing_log` statuses and parse-error
    /// records; a missing transcript yields zero usage.
    pub fn extract(&self, output_dir: &Path, task_id: &str) -> Result<MetricsReport, MetricsError> {
        let pre = read_record(&output_dir.join(VerificationPhase::Pre.log_file()))?;
        let post = read_record(&output_dir.join(VerificationPhase::Post.log_file()))?;
        let entries = read_entries(&output_dir.join(AGENT_LOG))?;
        debug!(entries = entries.len(), "Loaded transcript");

        let usage = summarize(&entries, &self.prices);
        let pre_record = pre.unwrap_or_else(VerificationRecord::unparsed);
        let post_record = post.unwrap_or_else(VerificationRecord::unparsed);
        let resolved = is_resolved(&pre_record, &post_record);

        info!(
            task_id,
            resolved,
            pre_failed = pre_record.failed,
            post_passed = post_record.passed,
            post_failed = post_record.failed,
            cost_usd = usage.total_cost_usd,
            "Extracted metrics"
        );

        Ok(MetricsReport {
            resolved,
            pre_verification_status: PreVerificationStatus::from_record(pre.as_ref()),
            post_verification_status: PostVerificationStatus::from_record(post.as_ref()),
            pre: pre_record,
            post: post_record,
            duration_seconds: usage.duration_seconds,
            total_cost_usd: usage.total_cost_usd,
            tokens: usage.tokens,
            tool_usage: usage.tool_usage,
            model_used: usage.model_used,
            agent_actions: usage.agent_actions,
            ..MetricsReport::empty(task_id)
        })
    }
}

/// Parse a verification log; `None` if it does not exist.
fn read_record(path: &Path) -> Result<Option<VerificationRecord>, MetricsError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(parse_test_output(&String::from_utf8_lossy(&bytes)))),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(source) => Err(MetricsError::Io {
            path: path.display().to_string(),
            source,
        }),
    }
}
