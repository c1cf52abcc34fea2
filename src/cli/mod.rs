//! Command-line interface definitions and dispatch.

mod diagnostics;
mod ingest;
mod links;
mod matching;
mod ops;
pub mod output;

use clap::{Parser, Subcommand};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::path::PathBuf;

use crate::app::Config;
use crate::core::db::create_pool;
use crate::core::store::SqliteStore;
use crate::error::{Error, Result};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Matchlock - cross-venue prediction market matching.
#[derive(Parser, Debug)]
#[command(name = "matchlock")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "matchlock.toml")]
    pub config: PathBuf,

    /// Override log level (debug, info, warn, error)
    #[arg(long)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest markets (and optionally quotes) from one venue
    Ingest(ingest::IngestArgs),

    /// Score cross-venue pairs for one topic and write suggestions
    SuggestMatches(matching::SuggestMatchesArgs),

    /// Link rule engines and review queue
    #[command(subcommand)]
    Links(links::LinksCommand),

    /// Manually confirm a link by id
    ConfirmMatch(links::ConfirmMatchArgs),

    /// Manually reject a link by id
    RejectMatch(links::RejectMatchArgs),

    /// Operational loop and KPIs
    #[command(subcommand)]
    Ops(ops::OpsCommand),

    /// Taxonomy diagnostics
    #[command(subcommand)]
    Taxonomy(diagnostics::TaxonomyCommand),

    /// Crypto matching diagnostics
    #[command(subcommand)]
    Crypto(diagnostics::CryptoCommand),

    /// Sports matching diagnostics
    #[command(subcommand)]
    Sports(diagnostics::SportsCommand),

    /// Kalshi catalog maintenance
    #[command(subcommand)]
    Kalshi(diagnostics::KalshiCommand),

    /// Cross-venue keyword overlap report
    OverlapReport(diagnostics::OverlapReportArgs),
}

/// Open the configured sqlite store and run pending migrations.
pub fn open_store(config: &Config) -> Result<SqliteStore> {
    let pool = create_pool(&config.database.url)?;
    let mut conn = pool
        .get()
        .map_err(|e| Error::Connection(e.to_string()))?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|e| Error::Database(format!("migrations failed: {e}")))?;
    drop(conn);
    Ok(SqliteStore::new(pool))
}

/// Dispatch a parsed command; returns the process exit code.
pub async fn dispatch(cli: Cli, config: &Config) -> Result<i32> {
    let store = open_store(config)?;
    match cli.command {
        Commands::Ingest(args) => ingest::ingest(&store, config, args).await,
        Commands::SuggestMatches(args) => matching::suggest_matches(&store, config, args).await,
        Commands::Links(command) => links::dispatch(&store, command).await,
        Commands::ConfirmMatch(args) => links::confirm_match(&store, args).await,
        Commands::RejectMatch(args) => links::reject_match(&store, args).await,
        Commands::Ops(command) => ops::dispatch(&store, config, command).await,
        Commands::Taxonomy(command) => diagnostics::taxonomy(&store, command).await,
        Commands::Crypto(command) => diagnostics::crypto(&store, command).await,
        Commands::Sports(command) => diagnostics::sports(&store, command).await,
        Commands::Kalshi(command) => diagnostics::kalshi(&store, command).await,
        Commands::OverlapReport(args) => diagnostics::overlap_report(&store, args).await,
    }
}
