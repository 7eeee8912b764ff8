//! @ai:module:intent CLI for the extraction evaluation harness
//! @ai:module:layer presentation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use extraction_eval::{
    config::{EvalConfig, LlmConfig, ModelPricing},
    corpus::{Suite, SuiteLoader, SuiteLoaderTrait, TestCase, EXAMPLE_SUITE},
    evaluator::{preflight, EvalRequest, Evaluator},
    metrics::EvalReport,
    report::ReportGenerator,
    runner::{
        Executor, ExtractionWorkflow, FnWorkflow, HttpLlmClient, LlmClientTrait, MockLlmClient,
        PricingCostMapper, TokenUsage, WorkflowTrait,
    },
};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_FILE: &str = "eval.toml";

#[derive(Parser)]
#[command(name = "extraction-eval")]
#[command(about = "Evaluate LLM document extraction field by field against labeled suites")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one suite file or every suite in a directory
    Run {
        /// Suite file (.toml or .json) or directory of suites
        #[arg(short, long)]
        suite: PathBuf,

        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Maximum number of test cases evaluated at once
        #[arg(long)]
        concurrency: Option<usize>,

        /// Replay expected values and judge with a mock model, no API calls
        #[arg(long)]
        dry_run: bool,

        /// Output directory for results
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check suites against their comparators without running anything
    Validate {
        #[arg(short, long)]
        suite: PathBuf,
    },

    /// List suites and their test cases
    List {
        #[arg(short, long)]
        suite: PathBuf,
    },

    /// Write a default configuration and an example suite
    Init {
        /// Output path for config file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        output: PathBuf,

        /// Output path for the example suite
        #[arg(long, default_value = "suites/invoices.toml")]
        suite: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("extraction_eval=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            suite,
            config,
            concurrency,
            dry_run,
            output,
        } => {
            run_suites(RunArgs {
                suite,
                config,
                concurrency,
                dry_run,
                output,
            })
            .await
        }
        Commands::Validate { suite } => validate(suite),
        Commands::List { suite } => list_suites(suite),
        Commands::Init { output, suite } => init(output, suite),
    }
}

struct RunArgs {
    suite: PathBuf,
    config: Option<PathBuf>,
    concurrency: Option<usize>,
    dry_run: bool,
    output: Option<PathBuf>,
}

/// @ai:intent Run every loaded suite and write its reports
/// @ai:effects network, fs:read, fs:write
async fn run_suites(args: RunArgs) -> Result<()> {
    let mut config = load_or_default_config(args.config)?;

    if let Some(concurrency) = args.concurrency {
        config.run.concurrency = concurrency;
    }
    config.run.dry_run |= args.dry_run;

    let suites = SuiteLoader::new().load(&args.suite)?;
    tracing::info!("Loaded {} suite(s) from {}", suites.len(), args.suite.display());

    let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
    let output_root = args
        .output
        .unwrap_or_else(|| config.paths.results_dir.clone())
        .join(timestamp.to_string());

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling evaluation");
            on_interrupt.cancel();
        }
    });

    let reporter = ReportGenerator::new();
    for suite in &suites {
        tracing::info!("Running suite {} ({} cases)", suite.name, suite.cases.len());

        let report = if config.run.dry_run {
            run_dry(&config, suite, &cancel).await?
        } else {
            run_live(&config, suite, &cancel).await?
        };

        reporter.generate_all(&report, &suite.name, &output_root.join(&suite.name))?;
        print_summary(&suite.name, &report);
    }

    Ok(())
}

/// @ai:intent Evaluate a suite with the extraction workflow against the configured provider
/// @ai:effects network
async fn run_live(config: &EvalConfig, suite: &Suite, cancel: &CancellationToken) -> Result<EvalReport> {
    let key_var = config.llm.provider.api_key_env();
    let api_key = std::env::var(key_var)
        .with_context(|| format!("{} must be set (or use --dry-run)", key_var))?;
    let llm_config = config.llm.to_llm_config(api_key);

    let client = Arc::new(HttpLlmClient::new(config.llm.clone())?);

    let mut workflow = ExtractionWorkflow::new(client.clone());
    if let Some(prompt) = &suite.system_prompt {
        workflow = workflow.with_system_prompt(prompt.clone());
    }
    if let Some(model) = &suite.model {
        workflow = workflow.with_model(model.clone());
    }

    let model = workflow.model(&llm_config).to_string();
    let executor = match PricingCostMapper::for_model(&llm_config, &model) {
        Some(mapper) => Executor::with_cost_mapper(workflow, mapper),
        None => {
            tracing::warn!("No pricing known for model {}; workflow cost will be zero", model);
            Executor::new(workflow)
        }
    };

    let evaluator = Evaluator::new(client).with_concurrency(config.run.concurrency);
    evaluate_suite(&evaluator, &executor, &suite.cases, suite, &llm_config, cancel).await
}

/// @ai:intent Evaluate a suite by replaying its expected values, judged by a mock that always agrees
/// @ai:effects pure
async fn run_dry(config: &EvalConfig, suite: &Suite, cancel: &CancellationToken) -> Result<EvalReport> {
    tracing::info!("Running in dry-run mode");

    let replay_cases = suite.replay_cases();
    let recorded: Arc<Vec<Value>> = Arc::new(suite.cases.iter().map(|case| case.expected.clone()).collect());
    let executor = Executor::new(FnWorkflow::new(move |index: usize| {
        let recorded = recorded.clone();
        async move {
            recorded
                .get(index)
                .cloned()
                .with_context(|| format!("No recorded output for test case #{}", index))
        }
    }));

    let llm_config = LlmConfig::new("dry-run", config.llm.provider).with_pricing(ModelPricing::new(0.0, 0.0));
    let judge = Arc::new(
        MockLlmClient::new(r#"{"passed": true, "rationale": "dry run"}"#).with_usage(TokenUsage::default()),
    );

    let evaluator = Evaluator::new(judge).with_concurrency(config.run.concurrency);
    evaluate_suite(&evaluator, &executor, &replay_cases, suite, &llm_config, cancel).await
}

async fn evaluate_suite<C, W>(
    evaluator: &Evaluator<C>,
    executor: &Executor<W>,
    test_cases: &[TestCase<W::Input, Value>],
    suite: &Suite,
    llm_config: &LlmConfig,
    cancel: &CancellationToken,
) -> Result<EvalReport>
where
    C: LlmClientTrait,
    W: WorkflowTrait<Output = Value>,
{
    tracing::debug!(
        "Evaluating suite {} with up to {} cases in flight",
        suite.name,
        evaluator.concurrency()
    );

    let report = evaluator
        .evaluate_with_cancel(
            EvalRequest {
                executor,
                test_cases,
                comparators: &suite.comparators,
                llm_config: Some(llm_config),
            },
            cancel,
        )
        .await
        .with_context(|| format!("Suite {} failed", suite.name))?;

    Ok(report)
}

/// @ai:intent Validate suites load and fit their comparators
/// @ai:effects fs:read
fn validate(path: PathBuf) -> Result<()> {
    let suites = SuiteLoader::new().load(&path)?;
    // any key satisfies the llm requirement; nothing is called
    let placeholder = LlmConfig::new("", Default::default());

    for suite in &suites {
        let prepared = preflight(&suite.cases, &suite.comparators, Some(&placeholder))
            .with_context(|| format!("Suite {} is invalid", suite.name))?;
        let fields: usize = prepared.iter().map(|p| p.leaf_count).sum();

        println!(
            "  - {}: {} cases, {} scored fields{}",
            suite.name,
            suite.cases.len(),
            fields,
            if suite.comparators.contains_llm() {
                " (uses llm comparators)"
            } else {
                ""
            }
        );
    }

    println!("Suite validation passed!");
    Ok(())
}

/// @ai:intent List suites and their cases
/// @ai:effects fs:read
fn list_suites(path: PathBuf) -> Result<()> {
    let suites = SuiteLoader::new().load(&path)?;

    println!("{:<30} {:>6}  {}", "Suite", "Cases", "File");
    println!("{}", "-".repeat(70));

    for suite in &suites {
        println!(
            "{:<30} {:>6}  {}",
            suite.name,
            suite.cases.len(),
            suite.path.display()
        );
        for (index, case) in suite.cases.iter().enumerate() {
            println!(
                "    #{:<4} {:<30} {} chars",
                index,
                case.name.as_deref().unwrap_or("-"),
                case.input.chars().count()
            );
        }
    }

    Ok(())
}

/// @ai:intent Write a default configuration file and an example suite
/// @ai:effects fs:write
fn init(output: PathBuf, suite: PathBuf) -> Result<()> {
    EvalConfig::default().save(&output)?;
    println!("Configuration saved to {}", output.display());

    if suite.exists() {
        println!("Suite {} already exists, leaving it untouched", suite.display());
        return Ok(());
    }

    if let Some(parent) = suite.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&suite, EXAMPLE_SUITE)?;
    println!("Example suite saved to {}", suite.display());
    Ok(())
}

/// @ai:intent Load configuration or use defaults
/// @ai:effects fs:read
fn load_or_default_config(path: Option<PathBuf>) -> Result<EvalConfig> {
    match path {
        Some(p) => EvalConfig::load(&p),
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);

            if default_path.exists() {
                EvalConfig::load(default_path)
            } else {
                Ok(EvalConfig::default())
            }
        }
    }
}

/// @ai:intent Print a run summary to stdout
/// @ai:effects io
fn print_summary(suite: &str, report: &EvalReport) {
    println!();
    println!("Extraction Eval Results: {}", suite);
    println!("{}", "=".repeat(25 + suite.len()));
    println!();
    println!("{:<25} {:>10}", "Test cases:", report.total);
    println!("{:<25} {:>10}", "Passed:", report.passed);
    println!("{:<25} {:>9.1}%", "Success rate:", report.success_rate * 100.0);
    println!("{:<25} {:>9.1}%", "Avg field pass rate:", report.avg_pass_rate * 100.0);
    println!("{:<25} {:>10.4}", "Workflow cost ($):", report.cost);
    println!("{:<25} {:>10.4}", "Comparator cost ($):", report.comparator_cost);
    println!();

    let failed: Vec<_> = report.test_cases.iter().filter(|c| !c.passed).collect();
    if failed.is_empty() {
        return;
    }

    println!("Failed test cases:");
    for case in failed {
        match &case.error {
            Some(error) => println!("  {}: workflow error: {}", case.label(), error),
            None => println!(
                "  {}: {}/{} fields passed",
                case.label(),
                case.passed_fields,
                case.total_fields
            ),
        }
    }
    println!();
}
