//! CLI command definitions for swe-resolve.

use crate::llm::anthropic::ANTHROPIC_BASE_URL;
use crate::llm::client::DEFAULT_MAX_TOKENS;
use crate::llm::{AnthropicClient, PriceTable};
use crate::metrics::{MetricsExtractor, MetricsReport, RESULT_FILE};
use crate::runner::config::DEFAULT_TEST_TIMEOUT_SECS;
use crate::runner::{PipelineRunner, RunConfig};
use crate::scaffold::tools::{DEFAULT_COMMAND_TIMEOUT_SECS, DEFAULT_MAX_RESULT_CHARS};
use crate::task::Task;
use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Task id recorded when the task file itself could not be loaded.
const UNKNOWN_TASK_ID: &str = "unknown";

/// Autonomous fix-the-bug agent with pass/fail verification.
#[derive(Parser)]
#[command(name = "swe-resolve")]
#[command(about = "Run a tool-using model against a failing test and measure whether it fixes it")]
#[command(version)]
#[command(
    long_about = "swe-resolve runs the task's test command, lets a model inspect and edit the repository through a small tool sandbox, re-runs the test and writes result.json with the resolution verdict, cost, tokens and tool usage.\n\nExample usage:\n  swe-resolve run --task task.yaml --workdir /testbed --output-dir ./out"
)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info", global = true)]
    pub log_level: String,
}

/// Available CLI subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Run the agent on a task and write all artifacts.
    Run(RunArgs),

    /// Recompute result.json from an existing output directory.
    Metrics(MetricsArgs),
}

/// Arguments for `swe-resolve run`.
#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Task description file.
    #[arg(short, long, default_value = "task.yaml")]
    pub task: PathBuf,

    /// Repository checkout the agent works in.
    #[arg(short, long, default_value = "/testbed")]
    pub workdir: PathBuf,

    /// Directory for agent.log, prompts.log, verification logs, changes.patch and result.json.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Candidate models in fallback order (comma-separated).
    #[arg(short, long, value_delimiter = ',')]
    pub models: Vec<String>,

    /// Turn budget (overrides the task's max_turns).
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// Timeout for agent commands in seconds.
    #[arg(long, default_value_t = DEFAULT_COMMAND_TIMEOUT_SECS)]
    pub command_timeout: u64,

    /// Timeout for each verification run in seconds.
    #[arg(long, default_value_t = DEFAULT_TEST_TIMEOUT_SECS)]
    pub test_timeout: u64,

    /// Maximum tokens per model response.
    #[arg(long, default_value_t = DEFAULT_MAX_TOKENS)]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Maximum characters of each tool result sent back to the model.
    #[arg(long, default_value_t = DEFAULT_MAX_RESULT_CHARS)]
    pub max_tool_result_chars: usize,

    /// YAML price table replacing the built-in one.
    #[arg(long)]
    pub pricing: Option<PathBuf>,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Anthropic API base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = ANTHROPIC_BASE_URL)]
    pub api_base: String,
}

/// Arguments for `swe-resolve metrics`.
#[derive(Parser, Debug)]
pub struct MetricsArgs {
    /// Output directory of a previous run.
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// Task identifier recorded in the report.
    #[arg(long, default_value = UNKNOWN_TASK_ID)]
    pub task_id: String,

    /// YAML price table replacing the built-in one.
    #[arg(long)]
    pub pricing: Option<PathBuf>,
}

/// Parse CLI arguments.
pub fn parse_cli() -> Cli {
    Cli::parse()
}

/// Run the CLI by parsing arguments and executing the command.
pub async fn run() -> anyhow::Result<()> {
    run_with_cli(parse_cli()).await
}

/// Run the CLI with the parsed arguments.
pub async fn run_with_cli(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run(args) => run_agent_command(args).await,
        Commands::Metrics(args) => run_metrics_command(args),
    }
}

impl RunArgs {
    fn to_config(&self) -> RunConfig {
        let mut config = RunConfig::new(&self.workdir)
            .with_output_dir(&self.output_dir)
            .with_models(self.models.clone())
            .with_command_timeout(self.command_timeout)
            .with_test_timeout(self.test_timeout)
            .with_max_tokens(self.max_tokens)
            .with_max_tool_result_chars(self.max_tool_result_chars);
        if let Some(max_turns) = self.max_turns {
            config = config.with_max_turns(max_turns);
        }
        if let Some(temperature) = self.temperature {
            config = config.with_temperature(temperature);
        }
        if let Some(path) = &self.pricing {
            config = config.with_pricing_path(path);
        }
        config
    }
}

async fn run_agent_command(args: RunArgs) -> anyhow::Result<()> {
    let config = args.to_config();

    let task = match Task::from_yaml_file(&args.task) {
        Ok(task) => task,
        Err(e) => {
            return Err(record_setup_failure(&config.output_dir, UNKNOWN_TASK_ID, e.into()))
        }
    };
    let prices = match config.price_table().context("Failed to load price table") {
        Ok(prices) => prices,
        Err(e) => return Err(record_setup_failure(&config.output_dir, &task.task_id, e)),
    };
    let api_key = args.api_key.clone().unwrap_or_default();
    let provider = match AnthropicClient::new(api_key, &args.api_base)
        .context("Failed to create Anthropic client (set ANTHROPIC_API_KEY or --api-key)")
    {
        Ok(provider) => provider,
        Err(e) => return Err(record_setup_failure(&config.output_dir, &task.task_id, e)),
    };

    info!(
        task_id = %task.task_id,
        models = ?config.models,
        "Loaded task"
    );

    let runner = PipelineRunner::new(config, Arc::new(provider)).with_prices(prices);
    let report = runner.run(&task).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Write an empty `result.json` carrying `error` before giving up on a run
/// that never started, then hand the error back.
fn record_setup_failure(output_dir: &Path, task_id: &str, error: anyhow::Error) -> anyhow::Error {
    let mut report = MetricsReport::empty(task_id);
    report.error = Some(format!("{:#}", error));

    let path = output_dir.join(RESULT_FILE);
    let written = std::fs::create_dir_all(output_dir)
        .map_err(anyhow::Error::from)
        .and_then(|_| report.write_to(&path).map_err(anyhow::Error::from));
    if let Err(e) = written {
        warn!(path = %path.display(), error = %e, "Failed to write report for failed run");
    }
    error
}

fn run_metrics_command(args: MetricsArgs) -> anyhow::Result<()> {
    let prices = PriceTable::load(args.pricing.as_deref())
        .context("Failed to load price table")?;
    let report = MetricsExtractor::new(prices)
        .extract(&args.output_dir, &args.task_id)
        .with_context(|| format!("Failed to extract metrics from {}", args.output_dir.display()))?;

    let path = args.output_dir.join(RESULT_FILE);
    report.write_to(&path)?;
    info!(path = %path.display(), resolved = report.resolved, "Wrote report");

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_args_to_config() {
        let cli = Cli::try_parse_from([
            "swe-resolve",
            "run",
            "--task",
            "t.yaml",
            "--workdir",
            "/repo",
            "--output-dir",
            "/out",
            "--models",
            "m1,m2",
            "--max-turns",
            "4",
            "--api-key",
            "k",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run subcommand");
        };
        let config = args.to_config();
        assert_eq!(config.working_dir, PathBuf::from("/repo"));
        assert_eq!(config.output_dir, PathBuf::from("/out"));
        assert_eq!(config.models, vec!["m1", "m2"]);
        assert_eq!(config.max_turns, Some(4));
        assert_eq!(config.command_timeout_secs, DEFAULT_COMMAND_TIMEOUT_SECS);
    }

    #[test]
    fn test_metrics_subcommand_defaults() {
        let cli = Cli::try_parse_from(["swe-resolve", "metrics"]).unwrap();
        let Commands::Metrics(args) = cli.command else {
            panic!("expected metrics subcommand");
        };
        assert_eq!(args.output_dir, PathBuf::from("."));
        assert_eq!(args.task_id, "unknown");
        assert_eq!(cli.log_level, "info");
    }

    fn write_task(dir: &Path) -> PathBuf {
        let path = dir.join("task.yaml");
        std::fs::write(&path, "task_id: cli-task\ntests:\n  test_command: 'true'\n").unwrap();
        path
    }

    async fn run_and_read_report(argv: Vec<String>, out: &Path) -> (anyhow::Result<()>, MetricsReport) {
        let cli = Cli::try_parse_from(argv).unwrap();
        let result = run_with_cli(cli).await;
        let report = MetricsReport::read_from(&out.join(RESULT_FILE)).unwrap();
        (result, report)
    }

    fn run_argv(task: &Path, out: &Path, extra: &[&str]) -> Vec<String> {
        let mut argv: Vec<String> = ["swe-resolve", "run", "--task"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        argv.push(task.display().to_string());
        argv.push("--output-dir".to_string());
        argv.push(out.display().to_string());
        argv.extend(extra.iter().map(|s| s.to_string()));
        argv
    }

    #[tokio::test]
    async fn test_blank_api_key_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let task = write_task(dir.path());

        let (result, report) =
            run_and_read_report(run_argv(&task, &out, &["--api-key", " "]), &out).await;

        assert!(result.is_err());
        assert_eq!(report.task_id, "cli-task");
        assert!(!report.resolved);
        assert!(report.error.unwrap().contains("Failed to create Anthropic client"));
    }

    #[tokio::test]
    async fn test_missing_task_file_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let task = dir.path().join("nope.yaml");

        let (result, report) =
            run_and_read_report(run_argv(&task, &out, &["--api-key", "k"]), &out).await;

        assert!(result.is_err());
        assert_eq!(report.task_id, UNKNOWN_TASK_ID);
        assert!(report.error.unwrap().contains("nope.yaml"));
    }

    #[tokio::test]
    async fn test_bad_price_table_still_writes_report() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");
        let task = write_task(dir.path());
        let pricing = dir.path().join("prices.yaml");
        std::fs::write(&pricing, "m: {input_per_1k: -1.0, output_per_1k: 0.0}\n").unwrap();
        let pricing = pricing.display().to_string();

        let (result, report) = run_and_read_report(
            run_argv(&task, &out, &["--api-key", "k", "--pricing", &pricing]),
            &out,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(report.task_id, "cli-task");
        assert!(report.error.unwrap().contains("price table"));
    }
}
