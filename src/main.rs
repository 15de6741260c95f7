#[macro_use]
mod errors;
mod command;
mod repl;
mod storage;

use clap::Parser;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(
    name = "tinydb",
    version = VERSION,
    about = "Tiny single-table database with a disk-backed B+tree."
)]
struct Cli {
    /// Path to the database file. Created when missing.
    file: PathBuf,
}

fn main() -> ExitCode {
    let file = OpenOptions::new()
        .append(true)
        .create(true)
        .open("tinydb.log")
        .expect("Failed to open log file");

    tracing_subscriber::fmt()
        .with_writer(Arc::new(file))
        .with_ansi(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match repl::console::start(&cli.file) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
