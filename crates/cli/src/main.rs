//! Prysm CLI - database migrations and seeding tools.
//!
//! # Usage
//!
//! ```bash
//! # Run database migrations
//! prysm-cli migrate
//!
//! # Assign early-user signup numbers from an ordered uid list
//! prysm-cli seed early-users --file early_users.txt
//!
//! # Preview the assignment without writing
//! prysm-cli seed early-users --file early_users.txt --dry-run
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "prysm-cli")]
#[command(author, version, about = "Prysm CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Seed database state
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Assign dense signup numbers to the ordered early-user list
    EarlyUsers {
        /// Path to the uid list, one uid per line, in signup order
        #[arg(short, long)]
        file: String,

        /// Compute and log the plan without writing
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::EarlyUsers { file, dry_run } => {
                commands::seed::early_users(&file, dry_run).await?;
            }
        },
    }
    Ok(())
}
