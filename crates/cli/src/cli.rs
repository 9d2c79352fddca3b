use std::path::PathBuf;

use clap::Parser;

#[derive(Debug, Clone, Parser)]
#[command(name = "faasr-monitor", version, about = "External observer for a FaaSr workflow execution")]
pub struct Cli {
    /// Path to the workflow payload JSON file.
    #[arg(long, value_name = "PATH")]
    pub workflow_file: PathBuf,

    /// Seconds between monitoring ticks.
    #[arg(long, env = "FAASR_CHECK_INTERVAL", default_value_t = 1)]
    pub check_interval: u64,

    /// Seconds of inactivity across the whole workflow before the monitor
    /// declares a timeout.
    #[arg(long, env = "FAASR_TIMEOUT", default_value_t = 300)]
    pub timeout: u64,

    /// Disable streaming newly observed log lines to stdout as they arrive.
    #[arg(long, env = "FAASR_NO_STREAM_LOGS", default_value_t = false)]
    pub no_stream_logs: bool,
}
