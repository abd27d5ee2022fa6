//! Command execution against a [`ContentCache`]

use crate::cli::Commands;
use crate::errors::CliError;
use std::io::{Read, Write};
use std::time::Duration;
use stowage_cache::{ContentCache, EvictionPolicy};

pub fn execute(
    cache: &ContentCache,
    command: Commands,
    input: &mut impl Read,
    out: &mut impl Write,
) -> Result<(), CliError> {
    match command {
        Commands::Key { key } => {
            writeln!(out, "{}", stowage_cache::EntryName::derive(&key))?;
        }
        Commands::Root => {
            writeln!(out, "{}", cache.root().display())?;
        }
        Commands::Put {
            key,
            file,
            delay_ms,
        } => {
            let bytes = match file {
                Some(path) => {
                    std::fs::read(&path).map_err(|e| CliError::file_error("read", path, e))?
                }
                None => {
                    let mut buf = Vec::new();
                    input
                        .read_to_end(&mut buf)
                        .map_err(|e| CliError::file_error("read", "<stdin>", e))?;
                    buf
                }
            };
            let root = cache.root();
            tracing::info!(key = %key, bytes = bytes.len(), delay_ms, "storing entry");
            cache.store_async(root, &key, bytes, Duration::from_millis(delay_ms));
            cache.drain_blocking();
            let path = cache
                .lookup(root, &key)
                .ok_or_else(|| CliError::store_failed(&key))?;
            writeln!(out, "{}", path.display())?;
        }
        Commands::Get { key, no_touch } => {
            let root = cache.root();
            let bytes = if no_touch {
                cache
                    .lookup(root, &key)
                    .map(|path| std::fs::read(&path).map_err(|e| CliError::file_error("read", path, e)))
                    .transpose()?
            } else {
                cache.read(root, &key)
            };
            let bytes = bytes.ok_or_else(|| CliError::not_found(&key))?;
            out.write_all(&bytes)?;
        }
        Commands::Lookup { key } => {
            let path = cache
                .lookup_and_touch(cache.root(), &key)
                .ok_or_else(|| CliError::not_found(&key))?;
            writeln!(out, "{}", path.display())?;
        }
        Commands::Clean { trigger, target } => {
            let config = cache.config();
            let policy = EvictionPolicy::new(
                trigger.unwrap_or(config.trigger_size),
                target.unwrap_or(config.target_size),
            );
            let report = cache.clean(cache.root(), policy);
            writeln!(
                out,
                "scanned {} entries ({} bytes), deleted {} ({} bytes reclaimed)",
                report.scanned, report.total_bytes, report.deleted, report.reclaimed_bytes
            )?;
            if report.failed > 0 {
                tracing::warn!(failed = report.failed, "some entries could not be deleted");
            }
        }
        Commands::Usage => {
            let usage = cache.usage(cache.root());
            writeln!(out, "{} entries, {} bytes", usage.entries, usage.bytes)?;
        }
    }
    out.flush()?;
    Ok(())
}
