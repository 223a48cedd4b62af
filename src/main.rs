use anyhow::{bail, Context};
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, warn};

use healthcare_etl::apis::HealthcareApiClient;
use healthcare_etl::config::Config;
use healthcare_etl::db::{display_value, DatabaseManager};
use healthcare_etl::logging;
use healthcare_etl::pipeline::{FetchRequest, Pipeline, PipelineResult};
use healthcare_etl::report::{self, render_grid, ReportQueries};
use healthcare_etl::types::Metric;

#[derive(Parser)]
#[command(name = "healthcare_etl")]
#[command(about = "Global healthcare data ETL & analysis CLI")]
#[command(version)]
struct Cli {
    /// Path to the TOML configuration file (defaults to ./config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, transform, and load healthcare data (creates missing tables first)
    FetchData {
        /// Country the run is for (e.g. "India"); the source returns every country
        country: String,
        /// Start date (YYYY-MM-DD). Date-ranged fetches are not supported yet
        start_date: Option<NaiveDate>,
        /// End date (YYYY-MM-DD). Date-ranged fetches are not supported yet
        end_date: Option<NaiveDate>,
    },
    /// Query loaded data
    QueryData {
        #[command(subcommand)]
        query: QueryCommand,
    },
    /// List tables in the database
    ListTables,
    /// Drop the cases and vaccinations tables (use with caution)
    DropTables,
    /// Run a raw SQL statement
    RunSql {
        sql: String,
    },
    /// Create the cases and vaccinations tables if missing
    CreateTables,
    /// Open the configured database and report whether it is reachable
    CheckConnection,
}

#[derive(Subcommand)]
enum QueryCommand {
    /// Total cases for a country
    TotalCases {
        country: String,
    },
    /// First ten days of a metric for a country
    DailyTrends {
        country: String,
        #[arg(value_parser = parse_metric)]
        metric: Metric,
        /// Export results to CSV in the reports directory
        #[arg(long)]
        export: bool,
    },
    /// Top N countries by a metric
    TopN {
        n: u32,
        #[arg(value_parser = parse_metric)]
        metric: Metric,
    },
}

fn parse_metric(s: &str) -> Result<Metric, String> {
    s.parse().map_err(|_| {
        let known: Vec<&str> = Metric::ALL.iter().map(|m| m.column()).collect();
        format!("unknown metric '{}'; expected one of: {}", s, known.join(", "))
    })
}

fn cells(row: &[rusqlite::types::Value]) -> Vec<String> {
    row.iter().map(display_value).collect()
}

fn print_pipeline_result(result: &PipelineResult) {
    println!("\n📊 Pipeline Results for {}:", result.source);
    let rows = vec![
        vec![
            "cases".to_string(),
            result.cases.fetched.to_string(),
            result.cases.transformed.to_string(),
            result.cases.inserted.to_string(),
        ],
        vec![
            "vaccinations".to_string(),
            result.vaccinations.fetched.to_string(),
            result.vaccinations.transformed.to_string(),
            result.vaccinations.inserted.to_string(),
        ],
    ];
    println!(
        "{}",
        render_grid(&["Entity", "Fetched", "Transformed", "Inserted"], &rows)
    );
    if !result.errors.is_empty() {
        println!("\n⚠️  Errors encountered:");
        for error in &result.errors {
            println!("   - {}", error);
        }
    }
}

fn handle_fetch(
    config: &Config,
    db: &mut DatabaseManager,
    request: FetchRequest,
) -> anyhow::Result<()> {
    info!(
        "Fetching data for {} from {:?} to {:?}",
        request.country, request.start_date, request.end_date
    );
    println!("🔄 Fetching data for {}...", request.country);
    db.create_tables().context("Error preparing tables")?;

    let client = HealthcareApiClient::new(config.api.base_url.clone());
    let result = Pipeline::run(&client, db, &request).context("Error during fetch/load")?;
    print_pipeline_result(&result);

    if !result.is_success() {
        bail!("{} load step(s) failed", result.errors.len());
    }
    println!("✅ Data fetched and loaded successfully.");
    Ok(())
}

fn handle_query(config: &Config, db: &DatabaseManager, query: QueryCommand) -> anyhow::Result<()> {
    let queries = ReportQueries::new(db);
    match query {
        QueryCommand::TotalCases { country } => {
            let total = queries
                .total_cases_by_country(&country)
                .context("Error running query")?;
            match total {
                Some(total) => println!(
                    "{}",
                    render_grid(
                        &["Country", "Total Cases"],
                        &[vec![total.country, total.total.to_string()]]
                    )
                ),
                None => println!("No results found."),
            }
        }
        QueryCommand::DailyTrends {
            country,
            metric,
            export,
        } => {
            let points = queries
                .daily_trends(&country, metric)
                .context("Error running query")?;
            if points.is_empty() {
                println!("No trends found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = points
                .iter()
                .map(|p| {
                    vec![
                        p.date.to_string(),
                        p.value.map(|v| v.to_string()).unwrap_or_default(),
                    ]
                })
                .collect();
            println!("{}", render_grid(&["Date", metric.column()], &rows));

            if export {
                let path = report::export_trends(
                    &config.reports.dir,
                    &country,
                    metric,
                    &points,
                    Local::now().naive_local(),
                )
                .context("Error exporting report")?;
                println!("✅ Report exported to: {}", path.display());
            }
        }
        QueryCommand::TopN { n, metric } => {
            let top = queries
                .top_n_by_metric(n, metric)
                .context("Error running query")?;
            if top.is_empty() {
                println!("No countries found.");
                return Ok(());
            }
            let rows: Vec<Vec<String>> = top
                .into_iter()
                .map(|c| vec![c.country, c.total.to_string()])
                .collect();
            let total_header = format!("Total {}", metric.column());
            println!("{}", render_grid(&["Country", total_header.as_str()], &rows));
        }
    }
    Ok(())
}

fn handle_list_tables(db: &DatabaseManager) -> anyhow::Result<()> {
    let tables = db.list_tables().context("Error listing tables")?;
    if tables.is_empty() {
        println!("No tables found.");
    } else {
        let rows: Vec<Vec<String>> = tables.into_iter().map(|t| vec![t]).collect();
        println!("{}", render_grid(&["Tables"], &rows));
    }
    info!("Listed tables.");
    Ok(())
}

fn handle_drop_tables(db: &DatabaseManager) -> anyhow::Result<()> {
    println!("Dropping all tables...");
    db.drop_tables().context("Error dropping tables")?;
    println!("✅ All tables dropped.");
    info!("All tables dropped.");
    Ok(())
}

fn handle_run_sql(db: &DatabaseManager, sql: &str) -> anyhow::Result<()> {
    println!("🧾 Running SQL: {}", sql);
    let result = db
        .run_query_with_columns(sql)
        .context("Error running SQL")?;
    if result.is_empty() {
        println!("SQL executed. No results to display.");
    } else {
        let rows: Vec<Vec<String>> = result.rows.iter().map(|row| cells(row)).collect();
        println!("{}", render_grid(&result.columns, &rows));
    }
    info!("Executed SQL: {}", sql);
    Ok(())
}

fn run_command(command: Commands, config: &Config, db: &mut DatabaseManager) -> anyhow::Result<()> {
    match command {
        Commands::FetchData {
            country,
            start_date,
            end_date,
        } => handle_fetch(
            config,
            db,
            FetchRequest {
                country,
                start_date,
                end_date,
            },
        ),
        Commands::QueryData { query } => handle_query(config, db, query),
        Commands::ListTables => handle_list_tables(db),
        Commands::DropTables => handle_drop_tables(db),
        Commands::RunSql { sql } => handle_run_sql(db, &sql),
        Commands::CreateTables => {
            db.create_tables().context("Error creating tables")?;
            println!("✅ Tables created successfully.");
            Ok(())
        }
        Commands::CheckConnection => {
            db.run_query("SELECT 1")
                .context("Failed to query the database")?;
            println!(
                "✅ Connected to the database at {} successfully.",
                db.location().display()
            );
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    dotenv::dotenv().ok();
    let _log_guard = logging::init_logging();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            println!("❌ Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut db = match DatabaseManager::open(&config.database.path) {
        Ok(db) => db,
        Err(e) => {
            error!("Failed to connect to the database: {}", e);
            println!("❌ Failed to connect to the database: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let outcome = run_command(cli.command, &config, &mut db);

    if let Err(e) = db.close() {
        warn!("Failed to close database connection: {}", e);
    }

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Command failed: {:#}", e);
            println!("❌ {:#}", e);
            ExitCode::FAILURE
        }
    }
}
