//! # Techlynx site CLI (`techlynx`)
//!
//! The `techlynx` binary initializes the database, loads content fixtures,
//! inspects the chatbot context, and runs the web server.
//!
//! ## Usage
//!
//! ```bash
//! techlynx --config ./config/site.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `techlynx init` | Create the SQLite database and run schema migrations |
//! | `techlynx seed [--file <toml>]` | Insert missing fixture content |
//! | `techlynx serve` | Start the website |
//! | `techlynx context show` | Print the chatbot context blob |
//! | `techlynx context stats` | Per-section context lengths and budgets |
//! | `techlynx admin tables` | List the admin table descriptors |

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use techlynx_site::admin::TABLES;
use techlynx_site::config;
use techlynx_site::context::ContextBuilder;
use techlynx_site::db;
use techlynx_site::migrate;
use techlynx_site::seed;
use techlynx_site::server;
use techlynx_site::store::SiteStore;

/// Techlynx site: content store, lead capture, and chatbot for the agency
/// website.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/site.example.toml` for a full example.
#[derive(Parser)]
#[command(name = "techlynx", about = "Techlynx Pro website server", version)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/site.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Idempotent: running it multiple times is safe.
    Init,

    /// Insert fixture content that is not already present.
    Seed {
        /// Fixture file.
        #[arg(long, default_value = "fixtures/seed.toml")]
        file: PathBuf,
    },

    /// Start the website.
    Serve,

    /// Inspect the chatbot context.
    Context {
        #[command(subcommand)]
        action: ContextAction,
    },

    /// Admin surface helpers.
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum ContextAction {
    /// Print the full context blob.
    Show,
    /// Print each section's length against its budget.
    Stats,
}

#[derive(Subcommand)]
enum AdminAction {
    /// List editable tables and their columns.
    Tables,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Commands that don't require config
    if let Commands::Admin {
        action: AdminAction::Tables,
    } = &cli.command
    {
        print_tables();
        return Ok(());
    }

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            migrate::run_migrations(&cfg).await?;
            println!("Database initialized successfully.");
        }
        Commands::Seed { file } => {
            let fixtures = seed::load_seed_file(&file)?;
            let pool = db::connect(&cfg).await?;
            migrate::migrate_pool(&pool).await?;
            let store = SiteStore::new(pool.clone());
            let report = seed::apply_seed(&store, &fixtures).await?;
            pool.close().await;

            println!("Seeded from {}", file.display());
            for (kind, count) in &report.created {
                println!("  created {:>4} {}", count, kind);
            }
            for (kind, count) in &report.skipped {
                println!("  skipped {:>4} {}", count, kind);
            }
            if report.total_created() == 0 {
                println!("Nothing to do.");
            }
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Context { action } => {
            let builder = ContextBuilder::from_config(&cfg);
            match action {
                ContextAction::Show => {
                    println!("{}", builder.build());
                }
                ContextAction::Stats => {
                    let mut total = 0;
                    for section in builder.sections() {
                        let chars = section.body.chars().count();
                        total += chars;
                        println!(
                            "{:<50} {:>5} / {:<5}",
                            section.header.trim(),
                            chars,
                            section.budget
                        );
                    }
                    println!("{:<50} {:>5}", "total (sections)", total);
                    println!("{:<50} {:>5}", "total (blob)", builder.build().chars().count());
                }
            }
        }
        Commands::Admin { .. } => {
            // Handled above (before config loading)
        }
    }

    Ok(())
}

fn print_tables() {
    for table in TABLES {
        let visibility = table.visibility.unwrap_or("-");
        println!(
            "{:<24} {:<10} toggle={:<12} {}",
            table.name,
            format!("{:?}", table.kind).to_lowercase(),
            visibility,
            table.label
        );
        for column in table.columns {
            let flag = if column.editable { "" } else { " (read-only)" };
            println!("    {:<22} {:?}{}", column.name, column.kind, flag);
        }
    }
}
