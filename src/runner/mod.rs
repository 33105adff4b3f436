//! Run orchestration.
//!
//! ```text
//! pre-verification → agent loop → post-verification → changes.patch → result.json
//! ```
//!
//! # Example
//!
//! ```ignore
//! use swe_resolve::runner::{PipelineRunner, RunConfig};
//!
//! let config = RunConfig::new("/testbed").with_output_dir("./out");
//! let runner = PipelineRunner::new(config, Arc::new(AnthropicClient::from_env()?));
//! let report = runner.run(&task).await?;
//! println!("resolved: {}", report.resolved);
//! ```

pub mod config;
pub mod executor;
pub mod verifier;

pub use config::RunConfig;
pub use executor::{PipelineRunner, RunnerError, CHANGES_PATCH, PROMPTS_MD};
pub use verifier::{VerificationPhase, Verifier, VerifierError};
