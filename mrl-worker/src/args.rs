use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address of the coordinator server
    #[arg(short = 'j', long = "join", default_value = "http://[::1]:8030")]
    pub address: String,

    /// Name of the workload to run.
    #[arg(short, long, default_value = "wc")]
    pub workload: String,

    /// Directory shared with the coordinator for intermediate and output files.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Milliseconds to sleep when the coordinator has no task yet.
    #[arg(long, default_value_t = common::DEFAULT_WAIT_INTERVAL.as_millis() as u64)]
    pub wait_ms: u64,
}
