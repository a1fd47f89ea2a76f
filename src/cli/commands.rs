//! CLI command definitions for writeforge.
//!
//! `generate` pushes a JSONL file of queries through the staged writing
//! pipeline; `judge` scores generated candidates stored as JSON documents.

use crate::input::load_work_items;
use crate::judge::{JudgeConfig, JudgeRunner, JudgeSummary};
use crate::llm::{CompletionClient, LlmProvider};
use crate::metrics::{export_metrics, init_metrics};
use crate::pipeline::{PipelineConfig, PipelineOrchestrator};
use crate::scheduler::{
    stats_path_for, write_stats_file, BatchStatistics, Scheduler, StatsSummary,
};
use crate::sink::{recorded_results, JsonlSink, ResultSink};
use chrono::Utc;
use clap::{Args, Parser};
use serde::Serialize;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Staged long-form writing and judging over an OpenAI-compatible endpoint.
#[derive(Parser)]
#[command(name = "writeforge")]
#[command(about = "Generate long-form documents through a validated plan/write/refine pipeline")]
#[command(version)]
#[command(
    long_about = "writeforge drives an LLM through plan, write and refine stages for every query in a JSONL file, \
validating each stage before moving on, and appends one result per query to a JSONL output.\n\n\
Example usage:\n  writeforge generate -i queries.jsonl -o results/out.jsonl -w 64\n  writeforge judge -d results/candidates"
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
    /// Run every query in a JSONL file through the staged pipeline.
    #[command(alias = "gen")]
    Generate(GenerateArgs),

    /// Score unscored candidates in a folder of JSON documents.
    Judge(JudgeArgs),
}

/// Endpoint options shared by every command. Unset flags fall back to the
/// `WRITEFORGE_*` environment, then to built-in defaults.
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Full chat-completions URL.
    #[arg(long)]
    pub endpoint: Option<String>,

    /// Model name sent with every request.
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Bearer token for the endpoint.
    #[arg(long, env = "WRITEFORGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Per-request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl EndpointArgs {
    fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(endpoint) = &self.endpoint {
            config.endpoint_url = endpoint.clone();
        }
        if let Some(model) = &self.model {
            config.model = model.clone();
        }
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone()).filter(|k| !k.is_empty());
        }
        if let Some(secs) = self.timeout_secs {
            config.request_timeout = Duration::from_secs(secs);
        }
        config
    }
}

/// Arguments for the generate command.
#[derive(Parser, Debug)]
pub struct GenerateArgs {
    /// Input JSONL file, one `{"index", "query"}` object per line.
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Output JSONL file for per-item results.
    #[arg(short = 'o', long)]
    pub output: PathBuf,

    /// Number of items processed concurrently.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Attempts per stage before an item fails at that stage.
    #[arg(long)]
    pub stage_attempts: Option<u32>,

    /// Requests per completion before the attempt counts as no response.
    #[arg(long)]
    pub request_attempts: Option<u32>,

    /// Skip items already present in the output and append to it.
    #[arg(long)]
    pub resume: bool,

    /// Write Prometheus metrics to this file when the run ends.
    #[arg(long)]
    pub metrics_file: Option<PathBuf>,

    /// Output a JSON summary to stdout instead of the text report.
    #[arg(short = 'j', long)]
    pub json: bool,
}

impl GenerateArgs {
    /// Layer the flags that were given over `config`.
    pub fn apply(&self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(workers) = self.workers {
            config.max_concurrent_items = workers;
        }
        if let Some(attempts) = self.stage_attempts {
            config.stage_max_attempts = attempts;
        }
        if let Some(attempts) = self.request_attempts {
            config.request_max_attempts = attempts;
        }
        self.endpoint.apply(config)
    }
}

/// Arguments for the judge command.
#[derive(Parser, Debug)]
pub struct JudgeArgs {
    /// Folder of JSON documents holding candidates to score.
    #[arg(short = 'd', long, env = "WRITEFORGE_DATA_FOLDER")]
    pub data_dir: PathBuf,

    /// Number of candidates evaluated concurrently.
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    /// Parsable verdicts to collect per candidate.
    #[arg(long, default_value_t = 3)]
    pub verdicts: usize,

    /// Judge completions allowed per candidate.
    #[arg(long, default_value_t = 5)]
    pub attempts: u32,

    /// Output a JSON summary to stdout.
    #[arg(short = 'j', long)]
    pub json: bool,
}

/// JSON output of the generate command.
#[derive(Debug, Clone, Serialize)]
pub struct GenerateOutput {
    pub output_file: String,
    pub stats_file: String,
    pub saved: usize,
    pub processed: usize,
    pub skipped: usize,
    pub total_duration_ms: u64,
    pub statistics: StatsSummary,
}

/// Parse CLI arguments and return the Cli struct.
///
/// This allows main.rs to access CLI arguments (like log_level) before running commands.
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
        Commands::Generate(args) => run_generate_command(args).await,
        Commands::Judge(args) => run_judge_command(args).await,
    }
}

fn build_client(config: &PipelineConfig) -> anyhow::Result<Arc<dyn LlmProvider>> {
    let client = CompletionClient::new(
        &config.endpoint_url,
        config.api_key.clone(),
        config.request_timeout,
    )?;
    info!(
        endpoint = %client.endpoint(),
        model = %config.model,
        authenticated = client.has_api_key(),
        "Using completion endpoint"
    );
    Ok(Arc::new(client))
}

async fn run_generate_command(args: GenerateArgs) -> anyhow::Result<()> {
    let config = args.apply(PipelineConfig::from_env()?);
    config.validate()?;

    if args.metrics_file.is_some() {
        init_metrics()?;
    }

    let output = execute_generate(&args, &config, build_client(&config)?).await?;

    if let Some(path) = &args.metrics_file {
        tokio::fs::write(path, export_metrics()).await?;
        info!(path = %path.display(), "Metrics written");
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!(
            "Completed {}: {} processed, {} saved{}",
            args.input.display(),
            output.processed,
            output.saved,
            if output.skipped > 0 {
                format!(", {} skipped from previous run", output.skipped)
            } else {
                String::new()
            }
        );
        print!("{}", output.statistics.render());
        println!("Statistics saved to {}", output.stats_file);
    }

    Ok(())
}

/// Run the generate pipeline against `provider` and persist results and
/// statistics.
///
/// On resume the statistics cover every record in the output file, not just
/// the items processed by this run.
pub async fn execute_generate(
    args: &GenerateArgs,
    config: &PipelineConfig,
    provider: Arc<dyn LlmProvider>,
) -> anyhow::Result<GenerateOutput> {
    let mut batch = load_work_items(&args.input).await?;

    let (skipped, previous) = if args.resume {
        let recorded = recorded_results(&args.output).await?;
        let done: HashSet<u64> = recorded.iter().map(|r| r.index).collect();
        let skipped = batch.skip_indices(&done);
        info!(
            skipped = skipped,
            remaining = batch.items.len(),
            "Resuming from existing output"
        );
        (skipped, BatchStatistics::from_results(&recorded))
    } else {
        (0, BatchStatistics::new())
    };

    let sink = if args.resume {
        JsonlSink::append(&args.output, config.sink_batch_size).await?
    } else {
        JsonlSink::create(&args.output, config.sink_batch_size).await?
    };
    let sink = Arc::new(sink);

    let orchestrator = PipelineOrchestrator::from_config(provider, config);
    let scheduler = Scheduler::new(orchestrator, sink.clone(), config.max_concurrent_items)
        .with_progress_interval(config.progress_interval);

    let run_id = Uuid::new_v4();
    let started_at = Utc::now();
    let start = std::time::Instant::now();

    let mut stats = scheduler.run_batch(batch.items).await;
    stats.record_malformed(batch.rejected.len());
    stats.merge(&previous);

    let totals = sink.finalize().await?;
    let summary = stats.summary(run_id, started_at, Utc::now());

    let stats_path = stats_path_for(&args.output);
    write_stats_file(&stats_path, &summary).await?;
    info!(path = %stats_path.display(), total = summary.total, "Statistics written");

    Ok(GenerateOutput {
        output_file: args.output.display().to_string(),
        stats_file: stats_path.display().to_string(),
        saved: totals.saved,
        processed: totals.processed,
        skipped,
        total_duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        statistics: summary,
    })
}

async fn run_judge_command(args: JudgeArgs) -> anyhow::Result<()> {
    let endpoint_config = args.endpoint.apply(PipelineConfig::from_env()?);
    endpoint_config.validate()?;

    let mut config = JudgeConfig::default()
        .with_required_verdicts(args.verdicts)
        .with_max_attempts(args.attempts)
        .with_model(endpoint_config.model.clone());
    if let Some(workers) = args.workers {
        config = config.with_max_concurrent(workers);
    }
    config.validate()?;

    let runner = JudgeRunner::new(build_client(&endpoint_config)?, config);
    let summary: JudgeSummary = runner.run_folder(&args.data_dir).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else if summary.pending == 0 {
        println!("No pending candidates in {}", args.data_dir.display());
    } else {
        println!(
            "Done: {} processed, {} succeeded, {} failed ({} documents updated)",
            summary.processed, summary.succeeded, summary.failed, summary.documents_written
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::llm::{GenerationRequest, GenerationResponse};
    use crate::pipeline::PipelineResult;
    use async_trait::async_trait;
    use clap::CommandFactory;
    use tempfile::TempDir;

    /// An endpoint that refuses every request.
    struct DownProvider;

    #[async_trait]
    impl LlmProvider for DownProvider {
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
            Err(LlmError::RequestFailed("connection refused".to_string()))
        }
    }

    fn write_input(path: &std::path::Path, count: u64) {
        let lines: Vec<String> = (0..count)
            .map(|i| format!(r#"{{"index": {}, "query": "topic {}"}}"#, i, i))
            .collect();
        std::fs::write(path, lines.join("\n")).unwrap();
    }

    fn generate_args(
        input: &std::path::Path,
        output: &std::path::Path,
        resume: bool,
    ) -> GenerateArgs {
        let mut argv = vec![
            "writeforge".to_string(),
            "generate".to_string(),
            "-i".to_string(),
            input.display().to_string(),
            "-o".to_string(),
            output.display().to_string(),
        ];
        if resume {
            argv.push("--resume".to_string());
        }
        let Commands::Generate(args) = Cli::try_parse_from(argv).unwrap().command else {
            panic!("Expected Generate command");
        };
        args
    }

    async fn run_once(
        input: &std::path::Path,
        output: &std::path::Path,
        resume: bool,
        config: &PipelineConfig,
    ) -> GenerateOutput {
        let args = generate_args(input, output, resume);
        execute_generate(&args, config, Arc::new(DownProvider))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_resumed_stats_cover_whole_output() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("queries.jsonl");
        let output = temp.path().join("out.jsonl");
        let config = PipelineConfig::default()
            .with_stage_max_attempts(2)
            .with_request_max_attempts(1);

        write_input(&input, 3);
        let first = run_once(&input, &output, false, &config).await;
        assert_eq!(first.statistics.total, 3);

        write_input(&input, 6);
        let resumed = run_once(&input, &output, true, &config).await;

        assert_eq!(resumed.skipped, 3);
        assert_eq!(resumed.processed, 3);
        assert_eq!(resumed.statistics.total, 6);
        assert_eq!(resumed.statistics.plan_success, 0);
        assert_eq!(resumed.statistics.avg_plan_attempts, 2.0);

        let persisted: StatsSummary =
            serde_json::from_str(&std::fs::read_to_string(&resumed.stats_file).unwrap()).unwrap();
        assert_eq!(persisted.total, 6);

        let lines = std::fs::read_to_string(&output).unwrap();
        let records: Vec<PipelineResult> = lines
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(records.len(), persisted.total);
    }

    #[tokio::test]
    async fn test_fresh_run_replaces_previous_output() {
        let temp = TempDir::new().unwrap();
        let input = temp.path().join("queries.jsonl");
        let output = temp.path().join("out.jsonl");
        let config = PipelineConfig::default()
            .with_stage_max_attempts(1)
            .with_request_max_attempts(1);

        write_input(&input, 4);
        for _ in 0..2 {
            let run = run_once(&input, &output, false, &config).await;
            assert_eq!(run.statistics.total, 4);
        }
        assert_eq!(std::fs::read_to_string(&output).unwrap().lines().count(), 4);
    }

    #[test]
    fn test_cli_parses() {
        // Verify CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_generate_requires_paths() {
        assert!(Cli::try_parse_from(["writeforge", "generate"]).is_err());
        assert!(Cli::try_parse_from(["writeforge", "generate", "-i", "in.jsonl"]).is_err());
    }

    #[test]
    fn test_generate_command_defaults() {
        let cli = Cli::try_parse_from(["writeforge", "generate", "-i", "in.jsonl", "-o", "out.jsonl"])
            .expect("should parse");

        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.input, PathBuf::from("in.jsonl"));
                assert_eq!(args.output, PathBuf::from("out.jsonl"));
                assert!(args.workers.is_none());
                assert!(args.endpoint.endpoint.is_none());
                assert!(!args.resume);
                assert!(!args.json);
            }
            _ => panic!("Expected Generate command"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_generate_command_with_all_options() {
        let cli = Cli::try_parse_from([
            "writeforge",
            "gen",
            "-i",
            "in.jsonl",
            "-o",
            "out.jsonl",
            "-w",
            "8",
            "--endpoint",
            "http://10.0.0.5:9000/v1/chat/completions",
            "-m",
            "writer-32b",
            "--timeout-secs",
            "60",
            "--stage-attempts",
            "4",
            "--request-attempts",
            "3",
            "--resume",
            "--metrics-file",
            "metrics.prom",
            "-j",
            "--log-level",
            "debug",
        ])
        .expect("should parse");

        assert_eq!(cli.log_level, "debug");
        let Commands::Generate(args) = cli.command else {
            panic!("Expected Generate command");
        };
        assert!(args.resume);
        assert!(args.json);
        assert_eq!(args.metrics_file, Some(PathBuf::from("metrics.prom")));

        let config = args.apply(PipelineConfig::default());
        assert_eq!(config.max_concurrent_items, 8);
        assert_eq!(config.endpoint_url, "http://10.0.0.5:9000/v1/chat/completions");
        assert_eq!(config.model, "writer-32b");
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.stage_max_attempts, 4);
        assert_eq!(config.request_max_attempts, 3);
    }

    #[test]
    fn test_unset_flags_keep_config_values() {
        let cli = Cli::try_parse_from(["writeforge", "generate", "-i", "a", "-o", "b"]).unwrap();
        let Commands::Generate(args) = cli.command else {
            panic!("Expected Generate command");
        };
        let base = PipelineConfig::default()
            .with_max_concurrent_items(5)
            .with_model("from-env");
        let config = args.apply(base);
        assert_eq!(config.max_concurrent_items, 5);
        assert_eq!(config.model, "from-env");
    }

    #[test]
    fn test_judge_command() {
        let cli = Cli::try_parse_from(["writeforge", "judge", "-d", "./docs", "-w", "16"])
            .expect("should parse");
        let Commands::Judge(args) = cli.command else {
            panic!("Expected Judge command");
        };
        assert_eq!(args.data_dir, PathBuf::from("./docs"));
        assert_eq!(args.workers, Some(16));
        assert_eq!(args.verdicts, 3);
        assert_eq!(args.attempts, 5);
    }
}
