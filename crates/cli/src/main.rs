//! stowage CLI
//!
//! Command-line access to a stowage content cache: store and fetch entries,
//! inspect where keys land on disk, and run eviction.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

mod cli;
mod commands;
mod errors;
mod tracing;

use crate::cli::Cli;
use crate::tracing::{Level, TracingConfig};
use stowage_cache::{CacheConfig, ContentCache};

fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
    }));

    let cli = cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    crate::tracing::init_tracing(TracingConfig {
        format: cli.effective_log_format(),
        level: Level::from(cli.level),
        ..TracingConfig::default()
    })?;

    let mut config = CacheConfig::from_env().map_err(errors::CliError::from)?;
    if let Some(home) = cli.cache_home {
        config = config.with_base_dir(home);
    }
    let cache = ContentCache::new(config);

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    commands::execute(&cache, cli.command, &mut stdin.lock(), &mut stdout.lock())?;
    Ok(())
}
