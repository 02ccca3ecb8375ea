use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;

use common::{DEFAULT_PORT, DEFAULT_TASK_TIMEOUT};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// The address for the server to bind.
    #[arg(long, default_value = "::1")]
    pub host: IpAddr,

    /// The port for the server to run on.
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Number of reduce partitions.
    #[arg(short, long, default_value_t = 10)]
    pub n_reduce: u32,

    /// Seconds a task may run before its worker is presumed dead.
    #[arg(short, long, default_value_t = DEFAULT_TASK_TIMEOUT.as_secs())]
    pub timeout: u64,

    /// Directory shared with the workers for intermediate and output files.
    #[arg(short, long, default_value = ".")]
    pub dir: PathBuf,

    /// Seconds to keep answering `done` after the job completes.
    #[arg(short, long, default_value_t = 1)]
    pub linger: u64,

    /// Input files, one split each.
    pub files: Vec<String>,
}
