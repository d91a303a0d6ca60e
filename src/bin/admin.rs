//! Offline administration of the burngate ledger.
//!
//! Usage:
//!   burngate-admin --data-dir <dir> status <hash>
//!   burngate-admin --data-dir <dir> add <hash> <owner>
//!   burngate-admin --data-dir <dir> expire [--days N]
//!   burngate-admin --data-dir <dir> list
//!
//! Do not run it against a ledger a live gateway is writing to; the gateway
//! rewrites the files in full and would overwrite the changes.

use burngate::config::GatewayConfig;
use burngate::{FileStore, HashStore, VerificationGate};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Inspect and maintain the burngate hash ledger.
#[derive(Parser, Debug)]
#[command(name = "burngate-admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding the ledger files.
    #[arg(long, env = "BURNGATE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the status of a hash.
    Status {
        /// Transaction hash.
        hash: String,
    },
    /// Record a hash as verified without checking it on chain.
    Add {
        /// Transaction hash.
        hash: String,
        /// Address credited with the burn.
        owner: String,
    },
    /// Remove used records older than the retention window.
    Expire {
        /// Retention window in days.
        #[arg(long, default_value = "15")]
        days: u64,
    },
    /// List every ledger entry.
    List,
}

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    let data_dir = cli
        .data_dir
        .unwrap_or_else(|| GatewayConfig::default().data_dir);
    let store = Arc::new(FileStore::open(&data_dir)?);
    let gate = VerificationGate::new(Arc::clone(&store) as Arc<dyn HashStore>);

    match cli.command {
        Command::Status { hash } => {
            println!("{}", gate.status(&hash));
            if let Some(entry) = gate.details(&hash) {
                println!("from:      {}", entry.owner);
                println!("verified:  {}", entry.timestamp.to_rfc3339());
            }
        }
        Command::Add { hash, owner } => {
            gate.add_verified_hash(&hash, &owner)?;
            println!("{} is {}", burngate::NormalizedHash::new(&hash), gate.status(&hash));
        }
        Command::Expire { days } => {
            let removed = gate.expire(Duration::from_secs(days.saturating_mul(24 * 3600)))?;
            println!("removed {removed} records");
        }
        Command::List => {
            for (hash, entry) in store.entries() {
                println!(
                    "{hash}  {:<8}  {}  {}",
                    entry.status.to_string(),
                    entry.timestamp.to_rfc3339(),
                    entry.owner
                );
            }
            println!("{} used hashes indexed", store.used_count());
        }
    }
    Ok(())
}
