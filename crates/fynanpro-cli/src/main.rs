mod output;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use fynanpro_config::{AppConfig, ConfigLoader, DATABASE_ENV_VAR, apply_env_overrides};
use fynanpro_db::{
    ConnectionFactory, MigrationRunner, MigrationState, MigrationStatus, backup, inspect,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser)]
#[command(name = "fynanpro", version, about = "FynanPro database migrations")]
struct Cli {
    /// Config file to use instead of ~/.fynanpro/config.{yml,yaml,toml}
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Database file or sqlite:// connection string
    #[arg(long, global = true, env = DATABASE_ENV_VAR, value_name = "PATH")]
    db: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply every pending migration
    Migrate {
        /// Back up the database here first if anything is pending
        #[arg(long, value_name = "FILE")]
        backup: Option<PathBuf>,
    },
    /// Show applied and pending migrations
    Status {
        #[arg(long)]
        json: bool,
    },
    /// List tables and their columns
    Inspect,
    /// Write a copy of the database
    Backup { dest: PathBuf },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = load_config(&cli)?;
    init_tracing(&config, cli.log_json);

    let factory = ConnectionFactory::from_config(&config.database)
        .context("invalid database location")?;

    match cli.command {
        Commands::Migrate { backup } => run_migrate(&factory, backup.as_deref()),
        Commands::Status { json } => run_status(&factory, json),
        Commands::Inspect => run_inspect(&factory),
        Commands::Backup { dest } => run_backup(&factory, &dest),
    }
}

fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let mut config = ConfigLoader::load_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            apply_env_overrides(&mut config, |key| std::env::var(key).ok());
            config
        }
        None => ConfigLoader::with_default_dir()
            .load()
            .context("failed to load configuration")?,
    };
    if let Some(db) = &cli.db {
        config.database.path = db.clone();
    }
    Ok(config)
}

fn init_tracing(config: &AppConfig, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    if json || config.log.json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(false))
            .with(filter)
            .init();
    }
}

fn run_migrate(factory: &ConnectionFactory, backup_dest: Option<&Path>) -> Result<()> {
    if let Some(dest) = backup_dest {
        if factory.exists() {
            let conn = factory.open()?;
            let runner = MigrationRunner::with_defaults()?;
            if runner.pending(&conn)?.is_empty() {
                info!("nothing pending, skipping backup");
            } else {
                backup::backup_to(&conn, dest)
                    .with_context(|| format!("backup to {} failed", dest.display()))?;
            }
        } else {
            warn!("{} does not exist yet, nothing to back up", factory.location());
        }
    }

    match fynanpro_db::migrate(factory) {
        Ok(report) => {
            output::print_report(&report);
            Ok(())
        }
        Err(e) if e.is_migration_failure() => {
            Err(e).context("database left at the last successful migration")
        }
        Err(e) => Err(e.into()),
    }
}

fn run_status(factory: &ConnectionFactory, json: bool) -> Result<()> {
    let runner = MigrationRunner::with_defaults()?;
    let statuses = if factory.exists() {
        let conn = factory.open()?;
        runner.status(&conn)?
    } else {
        // Opening would create the file.
        runner
            .migrations()
            .iter()
            .map(|m| MigrationStatus {
                name: m.name.to_string(),
                state: MigrationState::Pending,
                applied_at: None,
            })
            .collect()
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
    } else {
        output::print_status(&statuses);
    }
    Ok(())
}

fn run_inspect(factory: &ConnectionFactory) -> Result<()> {
    ensure_exists(factory)?;
    let conn = factory.open()?;
    let tables = inspect::describe(&conn)?;
    output::print_tables(&tables);
    Ok(())
}

fn run_backup(factory: &ConnectionFactory, dest: &Path) -> Result<()> {
    ensure_exists(factory)?;
    let conn = factory.open()?;
    backup::backup_to(&conn, dest)?;
    println!("backup written to {}", dest.display());
    Ok(())
}

fn ensure_exists(factory: &ConnectionFactory) -> Result<()> {
    if !factory.exists() {
        bail!("database {} does not exist", factory.location());
    }
    Ok(())
}
