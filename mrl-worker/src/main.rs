use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::rpc::CoordinatorClient;
use common::store::IntermediateStore;
use mrl_worker::MRWorker;

mod args;
use args::Args;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let workload = workload::named(&args.workload)?;

    // No retry: a coordinator that cannot be reached ends the worker.
    let client = CoordinatorClient::connect(args.address.clone()).await?;
    info!("Worker connected to {}", args.address);

    let worker = MRWorker::new(
        client,
        workload,
        IntermediateStore::new(&args.dir),
        Duration::from_millis(args.wait_ms),
    );
    worker.run().await?;

    info!("Worker exited...");
    Ok(())
}
