use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use pgsql_provider::{
    DatabaseConfiguration, DatabaseProvider, MigrationCatalog, PROVIDER_ID, PgsqlProvider,
    ProviderError, SchemaSession,
};
use sqlx::migrate::Migrator;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Operate the PostgreSQL database provider outside of the host.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Provider configuration file (TOML).
    #[arg(long, short, default_value = "database.toml")]
    config: PathBuf,

    /// Log filter used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the configuration and print the redacted connection string.
    Check,
    /// Apply the migrations found in a directory.
    Migrate {
        #[arg(long)]
        migrations: PathBuf,
    },
    /// Run scheduled maintenance against the configured database.
    Maintain,
    /// Truncate the given tables and reset their identity sequences.
    Purge {
        #[arg(required = true)]
        tables: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone()));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_level(true)
                .with_target(false),
        )
        .init();

    let cfg = DatabaseConfiguration::load(&cli.config)?;
    info!(
        config = %cli.config.display(),
        options = cfg.options.len(),
        "configuration loaded"
    );

    if let Command::Check = cli.command {
        let session = SchemaSession::configure(&cfg)?;
        println!("{}", session.descriptor().redacted().to_connection_string());
        return Ok(());
    }

    let mut catalog = MigrationCatalog::new();
    if let Command::Migrate { migrations } = &cli.command {
        let migrator = Migrator::new(migrations.as_path()).await?;
        info!(
            path = %migrations.display(),
            count = migrator.iter().count(),
            "migrations loaded"
        );
        catalog.register(PROVIDER_ID, migrator);
    }

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("interrupt received; cancelling the running operation");
                cancel.cancel();
            }
        }
    });

    let mut provider = PgsqlProvider::new(catalog);
    let outcome = run(&mut provider, &cfg, &cli.command, &cancel).await;
    provider.shutdown().await?;

    if let Err(e) = &outcome {
        error!(error = %e, "command failed");
    }
    Ok(outcome?)
}

async fn run(
    provider: &mut PgsqlProvider,
    cfg: &DatabaseConfiguration,
    command: &Command,
    cancel: &CancellationToken,
) -> Result<(), ProviderError> {
    provider.initialize(cfg).await?;
    match command {
        Command::Maintain => provider.run_scheduled_maintenance(cancel).await,
        Command::Purge { tables } => provider.purge_tables(tables, cancel).await,
        Command::Check | Command::Migrate { .. } => Ok(()),
    }
}
