//! QuotaWatch CLI
//!
//! Command-line interface for running quota checks from a host scheduler.

use clap::{Parser, Subcommand};
use std::process::ExitCode;
use tracing::info;

use quotawatch::alerting::{CheckOutcome, QuotaAlertEvaluator};
use quotawatch::db::Database;
use quotawatch::Config;

/// QuotaWatch - storage quota notifications with per-tier cooldowns
#[derive(Parser)]
#[command(name = "quotawatch")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, env = "QUOTAWATCH_CONFIG")]
    config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, Default, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Check one user's quota usage and notify if needed
    Check {
        /// User to check
        user_id: String,
    },

    /// Show the recorded alert time per tier for a user
    State {
        /// User to inspect
        user_id: String,
    },

    /// Resolve a user's notifications and forget all recorded tiers
    Reset {
        /// User to reset
        user_id: String,
    },

    /// Database management
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },

    /// Show backend health status
    Health,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum DbCommands {
    /// Run database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env before clap reads env-backed arguments
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config, cli.verbose);

    let result = match cli.command {
        Commands::Check { user_id } => run_check(&config, &user_id, cli.format).await,
        Commands::State { user_id } => run_state(&config, &user_id, cli.format).await,
        Commands::Reset { user_id } => run_reset(&config, &user_id).await,
        Commands::Db { command } => run_db(&config, command).await,
        Commands::Health => run_health(&config, cli.format).await,
        Commands::Completions { shell } => {
            generate_completions(shell);
            Ok(())
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &Config, verbose: bool) {
    let level = if verbose { "debug" } else { config.logging.level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if config.logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn evaluator(config: &Config) -> anyhow::Result<QuotaAlertEvaluator> {
    let db = Database::new(config).await?;
    Ok(QuotaAlertEvaluator::from_config(config, &db)?)
}

async fn run_check(config: &Config, user_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let outcome = evaluator(config).await?.check(user_id).await?;
    print_outcome(&outcome, format)
}

fn print_outcome(outcome: &CheckOutcome, format: OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Text => {
            let tier = outcome.tier.map_or("none".to_string(), |t| t.to_string());
            println!(
                "{}: {:.1}% used, tier {}, {:?}",
                outcome.user_id, outcome.percentage, tier, outcome.decision
            );
        }
    }
    Ok(())
}

async fn run_state(config: &Config, user_id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let state = evaluator(config).await?.alert_state(user_id).await?;

    match format {
        OutputFormat::Json => {
            let map: serde_json::Map<String, serde_json::Value> = state
                .iter()
                .map(|(tier, at)| (tier.to_string(), serde_json::json!(at)))
                .collect();
            println!("{}", serde_json::to_string_pretty(&map)?);
        }
        OutputFormat::Text => {
            println!("Alert state for {user_id}:");
            for (tier, at) in state {
                let at = at.map_or("-".to_string(), |t| t.to_rfc3339());
                println!("  {tier:<8} {at}");
            }
        }
    }
    Ok(())
}

async fn run_reset(config: &Config, user_id: &str) -> anyhow::Result<()> {
    evaluator(config).await?.reset(user_id).await?;
    println!("Reset quota alert state for {user_id}");
    Ok(())
}

async fn run_db(config: &Config, command: DbCommands) -> anyhow::Result<()> {
    match command {
        DbCommands::Migrate => {
            info!("Running database migrations");
            Database::connect_postgres(config).await?.migrate().await?;
            println!("Migrations applied");
        }
    }
    Ok(())
}

async fn run_health(config: &Config, format: OutputFormat) -> anyhow::Result<()> {
    let db = Database::new(config).await?;
    let postgres = match &db.postgres {
        Some(pool) => Some(pool.health_check().await.map_err(|e| e.to_string())),
        None => None,
    };
    let redis = db.redis.health_check().await.map_err(|e| e.to_string());

    match format {
        OutputFormat::Json => {
            let status = |r: &Result<(), String>| match r {
                Ok(()) => serde_json::json!({ "ok": true }),
                Err(e) => serde_json::json!({ "ok": false, "error": e }),
            };
            let report = serde_json::json!({
                "redis": status(&redis),
                "postgres": postgres.as_ref().map(status),
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        OutputFormat::Text => {
            let line = |name: &str, r: &Result<(), String>| match r {
                Ok(()) => println!("{name:<10} ok"),
                Err(e) => println!("{name:<10} error: {e}"),
            };
            line("Redis:", &redis);
            match &postgres {
                Some(r) => line("Postgres:", r),
                None => println!("{:<10} not configured", "Postgres:"),
            }
        }
    }

    if redis.is_err() || matches!(postgres, Some(Err(_))) {
        anyhow::bail!("one or more backends are unhealthy");
    }
    Ok(())
}

fn generate_completions(shell: clap_complete::Shell) {
    use clap::CommandFactory;
    use clap_complete::generate;
    use std::io;

    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "quotawatch", &mut io::stdout());
}
