//! Resolution verdict and run metrics.
//!
//! Consumes the verification logs and the transcript of a finished run and
//! produces the [`MetricsReport`] written to `result.json`.

pub mod extractor;
pub mod report;
pub mod resolution;
pub mod test_output;
pub mod usage;

pub use extractor::MetricsExtractor;
pub use report::{MetricsReport, RESULT_FILE};
pub use resolution::{is_resolved, PostVerificationStatus, PreVerificationStatus};
pub use test_output::{parse_test_output, VerificationRecord};
pub use usage::{summarize, TokenTotals, ToolBucket, ToolUsage, UsageSummary};

use thiserror::Error;

use crate::transcript::TranscriptError;

/// Errors raised while reading artifacts or writing the report.
#[derive(Debug, Error)]
pub enum MetricsError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcript error: {0}")]
    Transcript(#[from] TranscriptError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
