use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "wormlog",
    about = "wormlog: tamper-evident WORM audit ledger",
    version,
    after_help = "Ledger settings come from AUDIT_* environment variables (AUDIT_CHAIN_SECRET, AUDIT_STORE, AUDIT_S3_*)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Append an entry read from a JSON file ("-" for stdin)
    Append(AppendArgs),
    /// Show one record
    Get(GetArgs),
    /// List records in key order
    List(ListArgs),
    /// Verify hash chain integrity
    Verify(VerifyArgs),
    /// Delete a record whose retention has lapsed
    Delete(DeleteArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    /// Address to bind, overrides the config file and AUDIT_BIND_ADDR
    #[arg(long)]
    pub bind: Option<String>,
    /// TOML file with bind_addr, read_token and write_token
    #[arg(long)]
    pub config: Option<PathBuf>,
}

#[derive(Args)]
pub struct AppendArgs {
    pub file: PathBuf,
}

#[derive(Args)]
pub struct GetArgs {
    pub key: String,
}

#[derive(Args)]
pub struct ListArgs {
    #[arg(long)]
    pub start_key: Option<String>,
    #[arg(long)]
    pub end_key: Option<String>,
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u64).range(1..=1000))]
    pub limit: Option<u64>,
    #[arg(long)]
    pub cursor: Option<String>,
}

#[derive(Args)]
pub struct VerifyArgs {
    #[arg(long)]
    pub start_key: Option<String>,
    #[arg(long)]
    pub end_key: Option<String>,
    /// Page size used while walking the store
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=5000))]
    pub limit: Option<u64>,
}

#[derive(Args)]
pub struct DeleteArgs {
    pub key: String,
}
