use std::path::PathBuf;

use anyhow::Context;
use chrono::{NaiveDate, Utc};
use clap::{Args, Parser, Subcommand, ValueEnum};
use sqlx::postgres::{PgPool, PgPoolOptions};

mod config;
mod dataset;
mod db;
mod error;
mod impute;
mod models;
mod report;
mod selector;
mod stats;

use config::{AppConfig, Thresholds};
use dataset::Dataset;
use impute::ImputationSummary;
use selector::Scorecard;

#[derive(Parser)]
#[command(name = "upsell-candidates")]
#[command(about = "Flag upsell and cross-sell candidates in a customer dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Customer dataset with a header row
    #[arg(long)]
    csv: PathBuf,
    /// Analysis date for derived columns (defaults to today)
    #[arg(long)]
    as_of: Option<NaiveDate>,
    /// Fill missing values before scoring
    #[arg(long)]
    impute: bool,
    /// JSON file overriding the default thresholds
    #[arg(long)]
    thresholds: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Create or upgrade the database schema
    InitDb,
    /// Evaluate every hypothesis and print the candidates
    Score {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
    /// Generate a markdown report
    Report {
        #[command(flatten)]
        input: InputArgs,
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
    /// Score a dataset and store the candidates in Postgres
    Publish {
        #[command(flatten)]
        input: InputArgs,
    },
    /// List recently published snapshots
    History {
        #[arg(long, default_value_t = 10)]
        limit: i64,
    },
}

struct Prepared {
    dataset: Dataset,
    imputation: Option<ImputationSummary>,
    scorecard: Scorecard,
}

fn prepare(input: &InputArgs) -> anyhow::Result<Prepared> {
    let thresholds = Thresholds::load(input.thresholds.as_deref())?;
    let as_of = input.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let loaded = Dataset::load_csv(&input.csv, as_of)?;

    let (dataset, imputation) = if input.impute {
        let (filled, summary) = impute::impute(&loaded);
        (filled, Some(summary))
    } else {
        (loaded, None)
    };

    let scorecard = selector::score(&dataset, &thresholds);
    Ok(Prepared {
        dataset,
        imputation,
        scorecard,
    })
}

async fn connect(config: &AppConfig) -> anyhow::Result<PgPool> {
    let database_url = config.require_database_url()?;
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .context("failed to connect to Postgres")
}

fn print_scorecard(dataset: &Dataset, scorecard: &Scorecard, limit: usize) {
    println!(
        "Candidates in {} ({} customers):",
        dataset.source,
        dataset.len()
    );
    for (hypothesis, result) in scorecard.iter() {
        match result {
            Ok(set) => {
                let labels = set.labels(dataset);
                let shown: Vec<&str> = labels.iter().take(limit).map(String::as_str).collect();
                let more = labels.len().saturating_sub(shown.len());
                let suffix = if more > 0 {
                    format!(" and {more} more")
                } else {
                    String::new()
                };
                println!(
                    "- {}: {} candidates{}{}{}",
                    hypothesis,
                    set.len(),
                    if set.is_empty() { "" } else { ": " },
                    shown.join(", "),
                    suffix
                );
            }
            Err(err) => println!("- {}: not evaluated ({})", hypothesis, err),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = AppConfig::from_env();
    config::init_tracing(&config.log_level);

    match cli.command {
        Commands::InitDb => {
            let pool = connect(&config).await?;
            db::init_db(&pool).await?;
            println!("Schema ready.");
        }
        Commands::Score {
            input,
            format,
            limit,
        } => {
            let prepared = prepare(&input)?;
            match format {
                OutputFormat::Text => {
                    print_scorecard(&prepared.dataset, &prepared.scorecard, limit)
                }
                OutputFormat::Json => println!(
                    "{}",
                    serde_json::to_string_pretty(
                        &prepared.scorecard.to_json(&prepared.dataset)?
                    )?
                ),
            }
        }
        Commands::Report { input, out } => {
            let prepared = prepare(&input)?;
            let report = report::build_report(
                &prepared.dataset,
                &prepared.scorecard,
                prepared.imputation.as_ref(),
            );
            std::fs::write(&out, report)
                .with_context(|| format!("failed to write {}", out.display()))?;
            println!("Report written to {}.", out.display());
        }
        Commands::Publish { input } => {
            let prepared = prepare(&input)?;
            let pool = connect(&config).await?;
            let inserted = db::publish(&pool, &prepared.dataset, &prepared.scorecard).await?;
            println!(
                "Published snapshot {} with {inserted} candidates.",
                prepared.dataset.snapshot_id
            );
        }
        Commands::History { limit } => {
            let pool = connect(&config).await?;
            let history = db::fetch_history(&pool, limit.max(1)).await?;

            if history.is_empty() {
                println!("No snapshots published yet.");
                return Ok(());
            }

            let mut current = None;
            for entry in history.iter() {
                if current != Some(entry.snapshot_id) {
                    current = Some(entry.snapshot_id);
                    println!(
                        "{} {} as of {} ({} customers, published {})",
                        entry.snapshot_id,
                        entry.source,
                        entry.as_of,
                        entry.row_count,
                        entry.created_at.format("%Y-%m-%d %H:%M")
                    );
                }
                if let Some(hypothesis) = &entry.hypothesis {
                    println!("  - {}: {} candidates", hypothesis, entry.candidate_count);
                }
            }
        }
    }

    Ok(())
}
