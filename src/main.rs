use std::path::PathBuf;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod assessment;
mod config;
mod db;
mod extremum;
mod models;
mod normalize;
mod performance;
mod pipeline;
mod report;
mod source;
mod underperforming;

use crate::assessment::AssessmentKind;
use crate::config::{Config, SourceFiles};

#[derive(Parser)]
#[command(name = "coursework-insights")]
#[command(about = "Normalize assessment exports and flag underperforming students", long_about = None)]
struct Cli {
    /// SQLite file holding the normalized tables
    #[arg(long, global = true, env = "COURSEWORK_DB", default_value = "coursework.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize every raw export and rewrite its table
    Normalize {
        /// Directory holding `<Table>.csv` exports
        #[arg(long, default_value = "data")]
        input_dir: PathBuf,
        /// JSON object mapping table names to export paths
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Print every row of a normalized table
    Table {
        #[arg(value_name = "ASSESSMENT")]
        assessment: AssessmentKind,
    },
    /// Show one student's grade in every assessment
    Results {
        #[arg(long)]
        student: String,
    },
    /// Compare one student's question scores with the cohort mean
    Performance {
        #[arg(long)]
        student: String,
        #[arg(long)]
        assessment: AssessmentKind,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// List students below the summative average despite formative attempts
    Underperforming {
        #[arg(long, default_value_t = 50)]
        limit: usize,
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Write a markdown report of underperforming students
    Report {
        #[arg(long, default_value = "report.md")]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config {
        sources: source_files(&cli.command)?,
        database: cli.db,
    };

    let pool = db::open(&config.database).await?;
    let outcome = execute(&pool, &config, cli.command).await;
    pool.close().await;
    outcome
}

/// Export locations, resolved only for commands that read exports.
fn source_files(command: &Commands) -> anyhow::Result<Option<SourceFiles>> {
    let Commands::Normalize {
        input_dir,
        manifest,
    } = command
    else {
        return Ok(None);
    };

    let sources = SourceFiles::in_dir(input_dir);
    match manifest {
        Some(manifest) => sources.with_manifest(manifest).map(Some),
        None => Ok(Some(sources)),
    }
}

async fn execute(pool: &SqlitePool, config: &Config, command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Normalize { .. } => {
            let sources = config
                .sources
                .as_ref()
                .context("export locations are only resolved for `normalize`")?;
            let written = pipeline::run(pool, sources).await?;
            println!(
                "Database written: {} ({} tables).",
                config.database.display(),
                written.len()
            );
        }
        Commands::Table { assessment } => {
            let table = db::fetch_table(pool, assessment).await?;
            print!("{}", report::render_table(&table));
        }
        Commands::Results { student } => {
            let results = db::student_results(pool, &student).await?;
            if results.is_empty() {
                println!("No results found for student: {student}");
                return Ok(());
            }
            print!("{}", report::render_results(&student, &results));
        }
        Commands::Performance {
            student,
            assessment,
            json,
        } => {
            let table = db::fetch_table(pool, assessment).await?;
            let Some(performance) = performance::compare_student(assessment, &table, &student)
            else {
                println!("Student ID not found in {assessment}.");
                return Ok(());
            };

            if json {
                let series = serde_json::json!({
                    "student_id": performance.student_id,
                    "assessment": performance.assessment,
                    "labels": performance.labels(),
                    "absolute": performance.absolute_series(),
                    "relative": performance.relative_series(),
                });
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print!("{}", report::render_performance(&performance));
            }
        }
        Commands::Underperforming { limit, json } => {
            let result = underperforming::load_and_detect(pool).await?;

            if json {
                let series = serde_json::json!({
                    "sum_average": result.sum_average,
                    "students": result.students,
                    "labels": result.labels(),
                    "summative": result.summative_series(),
                    "lowest_formative": result.lowest_formative_series(),
                });
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else if result.students.is_empty() {
                println!("No underperforming students found (after inactive filter).");
            } else {
                print!("{}", report::render_underperforming(&result, limit));
            }
        }
        Commands::Report { out } => {
            let result = underperforming::load_and_detect(pool).await?;
            let markdown = report::build_report(Utc::now().date_naive(), &result);
            std::fs::write(&out, markdown)?;
            info!(path = %out.display(), students = result.students.len(), "Report written");
            println!("Report written to {}.", out.display());
        }
    }

    Ok(())
}
