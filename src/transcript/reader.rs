//! Reading `agent.log` back for metrics extraction.

use std::path::Path;

use tracing::warn;

use super::{TranscriptEntry, TranscriptError};

/// Read every well-formed entry from a transcript file.
///
/// Malformed lines are skipped with a warning; a missing file yields an
/// empty transcript.
pub fn read_entries(path: &Path) -> Result<Vec<TranscriptEntry>, TranscriptError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    Ok(parse_entries(&content))
}

/// Parse newline-delimited transcript entries from a string.
pub fn parse_entries(content: &str) -> Vec<TranscriptEntry> {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(idx, line)| match serde_json::from_str(line) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(line = idx + 1, error = %e, "Skipping malformed transcript line");
                None
            }
        })
        .collect()
}
