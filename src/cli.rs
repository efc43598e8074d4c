use clap::Parser;
use std::path::PathBuf;

/// pfcpscope: PFCP (N4) message capture and traffic statistics
#[derive(Parser, Debug)]
#[command(name = "pfcpscope", version, about)]
pub struct Cli {
    /// TOML config file; command-line flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Local address to bind (e.g., "0.0.0.0", "10.0.0.5")
    #[arg(long)]
    pub bind: Option<String>,

    /// UDP port to listen on
    #[arg(long)]
    pub port: Option<u16>,

    /// Socket read timeout in milliseconds
    #[arg(long)]
    pub timeout_ms: Option<u64>,

    /// Only show messages from this source IP
    #[arg(long)]
    pub source_ip: Option<String>,

    /// Only show messages to this destination IP
    #[arg(long)]
    pub dest_ip: Option<String>,

    /// Only show this message type (numeric code, e.g. 1 for Heartbeat Request)
    #[arg(long)]
    pub message_type: Option<String>,

    /// Minimum datagram length in bytes (0 = no minimum)
    #[arg(long)]
    pub min_length: Option<usize>,

    /// Maximum datagram length in bytes (0 = no maximum)
    #[arg(long)]
    pub max_length: Option<usize>,

    /// One line per message
    #[arg(short, long)]
    pub compact: bool,

    /// Omit the hex text from the detail view
    #[arg(long)]
    pub no_hex: bool,

    /// Omit the raw byte dump from the detail view
    #[arg(long)]
    pub no_raw: bool,

    /// Omit the decoded header fields from the detail view
    #[arg(long)]
    pub no_details: bool,

    /// Do not print messages; only statistics reports
    #[arg(short, long)]
    pub quiet: bool,

    /// Seconds between periodic statistics reports
    #[arg(long)]
    pub stats_interval_secs: Option<u64>,

    /// Disable periodic statistics reports (the final report is still printed)
    #[arg(long)]
    pub no_stats: bool,

    /// Stop after this many accepted messages (0 = unlimited)
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// Append each statistics report to this file as JSON lines
    #[arg(long)]
    pub report_jsonl: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}
