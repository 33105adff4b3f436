//! Token, cost, tool-usage and duration aggregation over the transcript.

use serde::{Deserialize, Serialize};

use crate::llm::cost::{round_cost, PriceTable};
use crate::transcript::{EntryKind, TranscriptEntry};

/// Tool names with a fixed bucket. Anything else goes through
/// [`ToolBucket::classify`]'s substring rules.
const KNOWN_TOOLS: &[(&str, ToolBucket)] = &[
    ("read_file", ToolBucket::Read),
    ("write_file", ToolBucket::Write),
    ("edit_file", ToolBucket::Edit),
    ("run_command", ToolBucket::Bash),
    ("run_bash", ToolBucket::Bash),
    ("bash", ToolBucket::Bash),
];

/// Tool usage category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolBucket {
    Read,
    Write,
    Edit,
    Bash,
    Unclassified,
}

impl ToolBucket {
    /// Bucket for a declared tool name.
    ///
    /// Exact names first, then case-insensitive substrings in the order
    /// `read`, `write`, `edit`, `bash`/`command`.
    pub fn classify(tool: &str) -> Self {
        if let Some((_, bucket)) = KNOWN_TOOLS.iter().find(|(name, _)| *name == tool) {
            return *bucket;
        }
        let lower = tool.to_lowercase();
        if lower.contains("read") {
            ToolBucket::Read
        } else if lower.contains("write") {
            ToolBucket::Write
        } else if lower.contains("edit") {
            ToolBucket::Edit
        } else if lower.contains("bash") || lower.contains("command") {
            ToolBucket::Bash
        } else {
            ToolBucket::Unclassified
        }
    }
}

/// Tool invocation counts by bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolUsage {
    pub read: u64,
    pub write: u64,
    pub edit: u64,
    pub bash: u64,
    #[serde(default)]
    pub unclassified: u64,
}

impl ToolUsage {
    pub fn record(&mut self, bucket: ToolBucket) {
        match bucket {
            ToolBucket::Read => self.read += 1,
            ToolBucket::Write => self.write += 1,
            ToolBucket::Edit => self.edit += 1,
            ToolBucket::Bash => self.bash += 1,
            ToolBucket::Unclassified => self.unclassified += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.read + self.write + self.edit + self.bash + self.unclassified
    }
}

/// Token totals across all responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenTotals {
    pub input: u64,
    pub output: u64,
    pub cache_read: u64,
    pub cache_write: u64,
}

/// Everything derived from the transcript alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UsageSummary {
    pub tokens: TokenTotals,
    pub total_cost_usd: f64,
    /// Model of the first response.
    pub model_used: Option<String>,
    pub tool_usage: ToolUsage,
    pub duration_seconds: u64,
    /// Number of transcript entries.
    pub agent_actions: u64,
}

/// Aggregate transcript entries.
///
/// Cost is computed per response with that response's model, summed, then
/// rounded. Responses for models missing from `prices` cost nothing.
pub fn summarize(entries: &[TranscriptEntry], prices: &PriceTable) -> UsageSummary {
    let mut summary = UsageSummary {
        agent_actions: entries.len() as u64,
        duration_seconds: duration_seconds(entries),
        ..Default::default()
    };
    let mut cost = 0.0;

    for entry in entries {
        match entry.kind {
            EntryKind::ToolUse => {
                if let Some(payload) = entry.tool_use() {
                    summary.tool_usage.record(ToolBucket::classify(&payload.tool));
                }
            }
            EntryKind::Response => {
                let Some(response) = entry.response() else {
                    continue;
                };
                if summary.model_used.is_none() {
                    summary.model_used = Some(response.model.clone());
                }
                if let Some(usage) = response.usage {
                    summary.tokens.input += usage.input_tokens;
                    summary.tokens.output += usage.output_tokens;
                    summary.tokens.cache_read += usage.cache_read_input_tokens.unwrap_or(0);
                    summary.tokens.cache_write +=
                        usage.cache_creation_input_tokens.unwrap_or(0);
                    cost += prices.cost(&response.model, usage.input_tokens, usage.output_tokens);
                }
            }
            EntryKind::Request => {}
        }
    }

    summary.total_cost_usd = round_cost(cost);
    summary
}

/// Whole seconds between the earliest and latest entry; 0 with fewer than
/// two entries.
pub fn duration_seconds(entries: &[TranscriptEntry]) -> u64 {
    if entries.len() < 2 {
        return 0;
    }
    let first = entries.iter().map(|e| e.timestamp).min();
    let last = entries.iter().map(|e| e.timestamp).max();
    match (first, last) {
        (Some(first), Some(last)) => (last - first).num_seconds().max(0) as u64,
        _ => 0,
    }
}
