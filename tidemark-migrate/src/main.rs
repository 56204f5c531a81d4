//! Tidemark Migration CLI Tool
//!
//! Applies versioned SQL migrations, loads seed data and reports migration
//! status. Exit status is 0 on success, 1 on any failure and 130 when
//! interrupted with Ctrl-C.

use clap::Parser;
use std::process;
use tidemark_migrate::cli::Cli;
use tidemark_migrate::commands;
use tidemark_migrate::interrupt;

fn main() {
    if let Err(e) = interrupt::install_handler() {
        eprintln!("⚠️  Could not install Ctrl-C handler: {e}");
    }

    // A missing .env is fine; variables may come from the real environment.
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    match commands::run(&cli) {
        Ok(()) => process::exit(0),
        Err(e) => {
            eprintln!("❌ Error: {e:#}");
            process::exit(1);
        }
    }
}
