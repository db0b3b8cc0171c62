//! CLI definition using clap derive.

use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "notiq",
    about = "Batch notifications read from stdin and present them on the console"
)]
pub struct Cli {
    /// JSON config file (queue, arbiter, filter lists)
    #[arg(long, short = 'c', env = "NOTIQ_CONFIG")]
    pub config: Option<PathBuf>,

    /// Despatch interval in milliseconds (overrides the config file)
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Modal wait timeout in milliseconds (overrides the config file)
    #[arg(long)]
    pub modal_timeout_ms: Option<u64>,

    /// Signature to suppress at the queue level (repeatable)
    #[arg(long = "filter", value_name = "TEXT")]
    pub filters: Vec<String>,

    /// Signature to suppress on the shared arbiter (repeatable)
    #[arg(long = "global-filter", value_name = "TEXT")]
    pub global_filters: Vec<String>,

    /// Collapse repeated items within one batch
    #[arg(long)]
    pub collapse_duplicates: bool,

    /// Start with the network marked unreachable
    #[arg(long)]
    pub offline: bool,

    /// Print presented items as JSON lines
    #[arg(long)]
    pub json: bool,
}
