mod args;

use std::net::SocketAddr;
use std::time::Duration;

use args::Args;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::store::IntermediateStore;
use mrl_coordinator::{serve, Scheduler};

const DONE_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();

    let store = IntermediateStore::new(&args.dir);
    let scheduler = Scheduler::new(
        args.files,
        args.n_reduce,
        store,
        Duration::from_secs(args.timeout),
    )?;

    let addr = SocketAddr::new(args.host, args.port);
    let listener = TcpListener::bind(addr).await?;
    info!("CoordinatorServer listening on {}", addr);

    let linger = Duration::from_secs(args.linger);
    let done = {
        let scheduler = scheduler.clone();
        async move {
            scheduler.wait_until_done(DONE_POLL_INTERVAL).await;
            info!("Job done, shutting down in {:?}", linger);
            // Let polling workers observe `done` before the socket closes.
            tokio::time::sleep(linger).await;
        }
    };

    serve(scheduler, listener, done).await?;

    info!("Coordinator exited");
    Ok(())
}
