//! sqlnb command line
//!
//! Runs a SQL script the way a notebook cell runs: split into statements,
//! executed one by one on a managed connection, one result per statement.

mod logging;
mod render;
mod settings;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use sqlnb_connection::{ConnectionManager, InMemorySecretStore, KeyringSecretStore, SecretStore};
use sqlnb_core::ConnectionConfig;
use sqlnb_driver_postgres::PostgresDriver;
use sqlnb_query::{BatchOptions, run_cell, split_statements};

#[derive(Parser)]
#[command(name = "sqlnb", version, about = "Run SQL notebook cells from the terminal")]
struct Cli {
    /// Also write JSON logs to this directory
    #[arg(long, global = true, env = "SQLNB_LOG_DIR")]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print the statements a script splits into
    Split {
        /// Script file, or `-` for stdin
        file: PathBuf,
    },
    /// Run a script against a PostgreSQL database
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Script file, or `-` for stdin
    file: PathBuf,

    #[arg(long, default_value = "localhost", env = "PGHOST")]
    host: String,

    #[arg(long, default_value_t = 5432, env = "PGPORT")]
    port: u16,

    #[arg(long, short = 'U', default_value = "postgres", env = "PGUSER")]
    user: String,

    #[arg(long, short = 'd', env = "PGDATABASE")]
    database: String,

    /// Saved connection id, used to look up the password in the keychain
    #[arg(long, default_value = "cli")]
    id: String,

    #[arg(long, env = "SQLNB_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Skip the remaining statements after the first failure
    #[arg(long)]
    stop_on_error: bool,

    /// Read the password from the system keychain
    #[arg(long, conflicts_with = "password")]
    keyring: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _log_guard = logging::init(&logging::LoggingConfig {
        log_dir: cli.log_dir.clone(),
        ..Default::default()
    })?;

    match cli.command {
        Command::Split { file } => {
            split(&file)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Run(args) => run(args).await,
    }
}

fn read_script(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("Failed to read script from stdin")?;
        return Ok(script);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read script: {:?}", path))
}

fn split(path: &Path) -> Result<()> {
    let script = read_script(path)?;
    for (index, statement) in split_statements(&script).iter().enumerate() {
        println!("-- [{}]\n{}\n", index + 1, statement);
    }
    Ok(())
}

async fn run(args: RunArgs) -> Result<ExitCode> {
    let script = read_script(&args.file)?;
    let settings = settings::load()?;

    let secrets: Arc<dyn SecretStore> = if args.keyring {
        Arc::new(KeyringSecretStore::new())
    } else {
        let store = InMemorySecretStore::new();
        Arc::new(match args.password {
            Some(password) => store.with_password(&args.id, password),
            None => store,
        })
    };

    let manager = ConnectionManager::new(Arc::new(PostgresDriver::new()), secrets, settings);
    let config = ConnectionConfig::new(&args.id, &args.database)
        .with_host(&args.host)
        .with_port(args.port)
        .with_username(&args.user);
    let options = BatchOptions::new().with_stop_on_error(args.stop_on_error);

    let outcome = run_cell(&manager, &config, &script, &options).await;
    manager.close_all().await;

    let batch = outcome.with_context(|| {
        format!(
            "Could not connect to {}:{}/{}",
            args.host, args.port, args.database
        )
    })?;
    println!("{}", render::render_batch(&batch));

    Ok(if batch.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
