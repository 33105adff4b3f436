//! swe-resolve: autonomous fix-the-bug agent with pass/fail verification.
//!
//! Given a failing test in a repository, the agent converses with a
//! tool-augmented model in a bounded loop, re-runs the test and reports
//! whether the bug was resolved along with cost, tokens, tool usage and
//! duration.

pub mod cli;
pub mod error;
pub mod llm;
pub mod metrics;
pub mod runner;
pub mod scaffold;
pub mod task;
pub mod transcript;

// Re-export commonly used types
pub use error::{LlmError, TaskError};
pub use metrics::{MetricsReport, VerificationRecord};
pub use runner::{PipelineRunner, RunConfig, RunnerError};
pub use task::Task;
