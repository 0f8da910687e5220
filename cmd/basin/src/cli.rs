use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

pub const VERSION_STRING: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "basin", version = VERSION_STRING, about = "Postgres-to-vault replication pipeline")]
pub struct Cli {
    #[command(flatten)]
    pub opts: GlobalOptions,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Parser)]
pub struct GlobalOptions {
    #[arg(long = "config-dir", global = true, value_name = "DIR", help = "Overrides the default config/workspace directory")]
    pub config_dir: Option<PathBuf>,
    #[arg(long = "log-level", global = true, default_value = "info", help_heading = "Logging")]
    pub log_level: String,
}

#[derive(Subcommand)]
pub enum Command {
    /// Starts the replication pipeline for a vault.
    Stream {
        #[arg(long = "private-key", value_name = "HEX")]
        private_key: String,
        #[arg(value_name = "NAMESPACE.RELATION")]
        vault: String,
    },
    /// Creates a vault and, if `--dburi` is given, the source publication.
    Create {
        #[arg(long = "account", value_name = "HEX")]
        account: String,
        #[arg(long = "dburi", value_name = "CONNECTION_STRING")]
        dburi: Option<String>,
        #[arg(long = "window-size", value_name = "SECONDS")]
        window_size: Option<u64>,
        #[arg(long = "cache", value_name = "MINUTES")]
        cache: Option<u32>,
        #[arg(value_name = "NAMESPACE.RELATION")]
        vault: String,
    },
    /// One-shot upload of a single file as a vault event.
    Write {
        #[arg(long = "vault", value_name = "VAULT_ID")]
        vault: String,
        #[arg(long = "private-key", value_name = "HEX")]
        private_key: String,
        #[arg(long = "timestamp", value_name = "EPOCH|DATE|RFC3339")]
        timestamp: Option<String>,
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Lists the vault identifiers owned by an account.
    List {
        #[arg(long = "account", value_name = "HEX")]
        account: String,
    },
    /// Lists events written to a vault.
    Events {
        #[arg(long = "vault", value_name = "VAULT_ID")]
        vault: String,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        offset: Option<u32>,
        #[arg(long)]
        before: Option<String>,
        #[arg(long)]
        after: Option<String>,
        #[arg(long, help = "Resolve the single event nearest at-or-before this timestamp")]
        at: Option<String>,
        #[arg(long, help = "Resolve only the most recent event", conflicts_with = "at")]
        latest: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,
    },
    /// Fetches an event by content identifier.
    Retrieve {
        #[arg(long = "output", value_name = "PATH|-", default_value = "-")]
        output: String,
        #[arg(value_name = "CID")]
        cid: String,
    },
    /// Out-of-core wallet helpers.
    #[command(subcommand)]
    Wallet(WalletCommand),
}

#[derive(Subcommand)]
pub enum WalletCommand {
    /// Generates a new secp256k1 private key and writes it (hex-encoded) to a file.
    Create {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Prints the hex-encoded public key derived from a private key file.
    Pubkey {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}
