use clap::{Parser, Subcommand};
use colored::Colorize;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use testdeck::executor::ExecutorRegistry;
use testdeck::model::{RunRecord, TestCase, TestEnvironment, TestSuite};
use testdeck::report::{self, export};
use testdeck::runner::{self, EventEmitter, RunOptions};
use testdeck::store::{MemGlobalVariableStore, MemRunStore, RunStore};

#[derive(Parser)]
#[command(name = "testdeck")]
#[command(version = "0.1.0")]
#[command(about = "Test suite execution and reporting engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a run plan (suite, cases, environment, variables)
    Run {
        /// Path to the YAML run plan
        plan: PathBuf,

        /// Execute cases concurrently
        #[arg(long, default_value = "false")]
        parallel: bool,

        /// Output directory for the run record and report
        #[arg(short, long, default_value = "./output")]
        output: PathBuf,

        /// Report format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: String,
    },

    /// Generate a report from a stored run record
    Report {
        /// Path to a run record JSON file
        record: PathBuf,

        /// Output format (json, csv)
        #[arg(short, long, default_value = "json")]
        format: String,

        /// Output file path (stdout if omitted)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Daily pass/fail trend over stored runs
    Trend {
        /// Path to a JSON array of run records
        runs: PathBuf,

        /// Suite to aggregate
        #[arg(short, long)]
        suite: String,

        /// Trailing window in days
        #[arg(short, long, default_value = "7")]
        days: u32,
    },

    /// Execution-duration statistics over stored runs
    Performance {
        /// Path to a JSON array of run records
        runs: PathBuf,

        /// Suite to aggregate
        #[arg(short, long)]
        suite: String,

        /// Trailing window in days
        #[arg(short, long, default_value = "7")]
        days: u32,
    },
}

/// Everything one run needs, in a single YAML file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunPlan {
    suite: TestSuite,
    cases: Vec<TestCase>,
    environment: TestEnvironment,
    /// Seed variables placed into the run's local scope
    #[serde(default)]
    variables: HashMap<String, serde_json::Value>,
    /// Global variables seeded for the plan's environment
    #[serde(default)]
    globals: HashMap<String, serde_json::Value>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            plan,
            parallel,
            output,
            format,
        } => {
            let plan_text = std::fs::read_to_string(&plan)?;
            let plan: RunPlan = serde_yaml::from_str(&plan_text)?;

            println!(
                "{} Running suite: {} ({})",
                "▶".green().bold(),
                plan.suite.name.cyan(),
                plan.suite.category
            );
            println!("  Environment: {}", plan.environment.name.cyan());
            println!("  Cases: {}", plan.cases.len());
            if parallel {
                println!("  Parallel: {}", "Enabled".yellow());
            }

            let globals = Arc::new(MemGlobalVariableStore::new());
            for (name, value) in &plan.globals {
                globals.seed(name, value.clone(), &plan.environment.id);
            }

            let record = runner::run_suite(
                &plan.suite,
                &plan.cases,
                &plan.environment,
                plan.variables,
                globals,
                &ExecutorRegistry::with_defaults(),
                RunOptions { parallel },
                &EventEmitter::new(),
            )
            .await?;

            let generated = report::generate_report(&record);
            print_summary(&generated);

            std::fs::create_dir_all(&output)?;
            let record_path = output.join(format!("run-{}.json", record.id));
            std::fs::write(&record_path, serde_json::to_string_pretty(&record)?)?;
            let report_path = output.join(format!("report-{}.{}", record.id, format));
            std::fs::write(&report_path, render_report(&generated, &format)?)?;
            println!(
                "{} Run record: {}",
                "💾".to_string().blue(),
                record_path.display().to_string().cyan()
            );
            println!(
                "{} Report: {}",
                "📊".to_string().blue(),
                report_path.display().to_string().cyan()
            );

            if generated.summary.failed_tests > 0 {
                std::process::exit(1);
            }
        }

        Commands::Report {
            record,
            format,
            output,
        } => {
            let record: RunRecord = serde_json::from_str(&std::fs::read_to_string(&record)?)?;
            let generated = report::generate_report(&record);
            print_summary(&generated);

            let rendered = render_report(&generated, &format)?;
            match output {
                Some(path) => {
                    std::fs::write(&path, rendered)?;
                    println!(
                        "{} Report written to: {}",
                        "📊".to_string().blue(),
                        path.display().to_string().cyan()
                    );
                }
                None => println!("{}", rendered),
            }
        }

        Commands::Trend { runs, suite, days } => {
            let aggregator = report::ResultAggregator::new(load_runs(&runs)?);
            let trend = aggregator.generate_trend_report(&suite, days);
            println!("{}", serde_json::to_string_pretty(&trend)?);
        }

        Commands::Performance { runs, suite, days } => {
            let aggregator = report::ResultAggregator::new(load_runs(&runs)?);
            let perf = aggregator.generate_performance_report(&suite, days);
            println!("{}", serde_json::to_string_pretty(&perf)?);
        }
    }

    Ok(())
}

fn load_runs(path: &Path) -> anyhow::Result<Arc<dyn RunStore>> {
    let records: Vec<RunRecord> = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let store = MemRunStore::new();
    for record in records {
        store.save(record);
    }
    Ok(Arc::new(store))
}

fn render_report(report: &report::Report, format: &str) -> anyhow::Result<String> {
    match format {
        "json" => export::to_json(report),
        "csv" => export::to_csv(report),
        other => anyhow::bail!("Unknown report format: {}", other),
    }
}

fn print_summary(report: &report::Report) {
    let summary = &report.summary;
    println!(
        "\n{} {} passed, {} failed of {} ({}% pass rate)",
        if summary.failed_tests == 0 {
            "✅".to_string().green()
        } else {
            "❌".to_string().red()
        },
        summary.passed_tests.to_string().green(),
        summary.failed_tests.to_string().red(),
        summary.total_tests,
        summary.pass_rate
    );
    for detail in &report.details {
        let marker = if detail.status == report::types::STATUS_FAILED || detail.status.contains("失败")
        {
            "✗".red()
        } else {
            "✓".green()
        };
        println!(
            "  {} {} ({} ms)",
            marker, detail.test_case_name, detail.response_time_ms
        );
    }
}
