use std::future::Future;

use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::debug;

use common::rpc::{Coordinator, CoordinatorServer, RequestTaskArgs, RequestTaskReply};

use crate::scheduler::Scheduler;

/// gRPC front of the [`Scheduler`].
#[derive(Debug, Clone)]
pub struct MRCoordinator {
    scheduler: Scheduler,
}

impl MRCoordinator {
    pub fn new(scheduler: Scheduler) -> Self {
        Self { scheduler }
    }
}

#[tonic::async_trait]
impl Coordinator for MRCoordinator {
    /// Worker reports its previous task and asks for the next one.
    async fn request_task(
        &self,
        request: Request<RequestTaskArgs>,
    ) -> Result<Response<RequestTaskReply>, Status> {
        debug!("Got a request from {:?}", request.remote_addr());

        let args = request.into_inner();
        let assignment = self.scheduler.request_task(args.finished_task()).await;

        Ok(Response::new(assignment.into()))
    }
}

/// Serve `scheduler` on `listener` until `shutdown` resolves.
pub async fn serve(
    scheduler: Scheduler,
    listener: TcpListener,
    shutdown: impl Future<Output = ()>,
) -> Result<(), tonic::transport::Error> {
    Server::builder()
        .add_service(CoordinatorServer::new(MRCoordinator::new(scheduler)))
        .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
        .await
}
