pub mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "intake",
    about = "Customer CSV intake operator CLI",
    long_about = "Operate the customer store: migrations, config inspection, readiness checks, and local CSV ingestion.",
    after_help = "Examples:\n  intake doctor --json\n  intake config\n  intake ingest ./customers.csv"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Validate config, the database directory, connectivity, and the customers schema")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Upsert the customer rows of a local CSV file into the customer store")]
    Ingest {
        #[arg(help = "Path to a CSV file whose header contains `First Name`")]
        path: PathBuf,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Config => {
            commands::CommandResult { exit_code: 0, output: commands::config::run() }
        }
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Ingest { path } => commands::ingest::run(&path),
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
