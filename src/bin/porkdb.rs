//! PorkDB Tool
//!
//! Inspect and modify one string-keyed, string-valued container.
//! The storage flags must match the ones the container was created with.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand, ValueEnum};
use porkdb::{
    Compression, ContainerConfig, DataKind, DbMap, DbMapOptions, HasherKind, IndexKind, PorkDb,
};
use tracing_subscriber::{fmt, EnvFilter};

/// PorkDB Tool
#[derive(Parser, Debug)]
#[command(name = "porkdb")]
#[command(about = "Inspect and modify PorkDB containers")]
#[command(version)]
struct Args {
    /// Root directory
    #[arg(short, long, default_value = "./pork_data")]
    root: PathBuf,

    /// Container name
    #[arg(short, long, default_value = "default")]
    container: String,

    /// Hash width in bits
    #[arg(long, default_value = "16")]
    hash_bits: u32,

    /// Index strategy
    #[arg(long, value_enum, default_value = "table")]
    index: IndexArg,

    /// Bucket bits (bucketing index)
    #[arg(long, default_value = "8")]
    bucket_bits: u32,

    /// Entries per bucket (bucketing index)
    #[arg(long, default_value = "64")]
    bucket_entries: u32,

    /// Data strategy
    #[arg(long, value_enum, default_value = "sectored")]
    data: DataArg,

    /// Sector size in bytes (sectored store)
    #[arg(long, default_value = "4096")]
    sector_size: u32,

    /// Compress values with zstd at this level
    #[arg(long)]
    zstd: Option<i32>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum IndexArg {
    Table,
    Bucketing,
    Mapped,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum DataArg {
    Individual,
    Sectored,
    WriteOnce,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Set a key-value pair
    Put {
        key: String,
        value: String,
    },

    /// Get a value by key
    Get {
        key: String,
    },

    /// Remove a key
    Remove {
        key: String,

        /// Give freed space back to the filesystem
        #[arg(long)]
        shrink: bool,
    },

    /// Print every value with its hash
    List,

    /// Print entry count and storage usage
    Stats,
}

impl Args {
    fn container_config(&self) -> porkdb::Result<ContainerConfig> {
        let index = match self.index {
            IndexArg::Table => IndexKind::HashTable,
            IndexArg::Mapped => IndexKind::Mapped,
            IndexArg::Bucketing => IndexKind::Bucketing {
                bucket_bits: self.bucket_bits,
                entries_per_bucket: self.bucket_entries,
            },
        };
        let data = match self.data {
            DataArg::Individual => DataKind::IndividualFile,
            DataArg::Sectored => DataKind::Sectored {
                sector_size: self.sector_size,
            },
            DataArg::WriteOnce => DataKind::WriteOnce,
        };
        let compression = match self.zstd {
            Some(level) => Compression::Zstd { level },
            None => Compression::None,
        };

        ContainerConfig::builder()
            // Keys are bincode strings led by a length prefix, so only a
            // content hash spreads them
            .hasher(HasherKind::Content)
            .hash_bits(self.hash_bits)
            .index(index)
            .data(data)
            .compression(compression)
            .build()
    }
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,porkdb=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> porkdb::Result<()> {
    tracing::debug!("PorkDB tool v{}", porkdb::VERSION);

    let db = PorkDb::builder(&args.root).build()?;
    let map = db.get_container::<DbMap<String, String>, _>(&args.container, || {
        Ok(DbMapOptions::bincode(args.container_config()?))
    })?;

    match &args.command {
        Commands::Put { key, value } => {
            map.put(key, value)?;
        }
        Commands::Get { key } => match map.get(key)? {
            Some(value) => println!("{}", value),
            None => println!("(nil)"),
        },
        Commands::Remove { key, shrink } => {
            let removed = map.remove(key, *shrink)?;
            println!("{}", if removed { "removed" } else { "not found" });
        }
        Commands::List => {
            map.for_each(|hash, value| println!("{:#018x}\t{}", hash, value))?;
        }
        Commands::Stats => {
            let stats = map.stats()?;
            println!("entries:       {}", stats.entries);
            println!("bytes on disk: {}", stats.data.bytes_on_disk);
            if let Some(free) = stats.data.free_sectors {
                println!("free sectors:  {}", free);
            }
        }
    }

    db.close()
}
