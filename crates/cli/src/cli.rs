use crate::tracing::{LogLevel, TracingFormat};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "stowage")]
#[command(about = "Inspect and maintain a stowage disk cache")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        short = 'l',
        long,
        global = true,
        help = "Set logging level",
        default_value = "warn",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        global = true,
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub log_format: TracingFormat,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub json: bool,

    #[arg(
        long,
        global = true,
        help = "Parent directory of the cache (overrides STOWAGE_CACHE_HOME)"
    )]
    pub cache_home: Option<PathBuf>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    #[command(about = "Print the entry name a key maps to")]
    Key { key: String },

    #[command(about = "Print the cache root directory")]
    Root,

    #[command(about = "Store a payload from a file or stdin")]
    Put {
        key: String,
        #[arg(long, short = 'f', help = "Read the payload from this file instead of stdin")]
        file: Option<PathBuf>,
        #[arg(long, help = "Delay before the write runs", default_value_t = 0)]
        delay_ms: u64,
    },

    #[command(about = "Write a cached payload to stdout")]
    Get {
        key: String,
        #[arg(long, help = "Do not mark the entry as recently used")]
        no_touch: bool,
    },

    #[command(about = "Print the path of a cached entry")]
    Lookup { key: String },

    #[command(about = "Evict entries if the cache exceeds the trigger size")]
    Clean {
        #[arg(long, help = "Trigger size in bytes (default from configuration)")]
        trigger: Option<u64>,
        #[arg(long, help = "Target size in bytes (default from configuration)")]
        target: Option<u64>,
    },

    #[command(about = "Print entry count and total size")]
    Usage,
}

impl Cli {
    /// The effective log format, `--json` taking precedence
    pub fn effective_log_format(&self) -> TracingFormat {
        if self.json {
            TracingFormat::Json
        } else {
            self.log_format
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}
