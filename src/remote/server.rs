use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, warn};

use crate::error::AppResult;

use super::http::{
    HttpRequest, read_http_request, write_empty_response, write_error_response,
};
use super::pool::PoolCommand;
use super::protocol::ProgressReport;
use super::slave::SlaveAgent;

/// Routes the `/remote` endpoints for whichever roles this process serves.
/// The same process may act as both master and slave; requests for an
/// absent role fall through to 405.
pub(super) struct RemoteRouter {
    pool_tx: Option<mpsc::UnboundedSender<PoolCommand>>,
    slave: Option<Arc<SlaveAgent>>,
}

impl RemoteRouter {
    pub(super) fn master(pool_tx: mpsc::UnboundedSender<PoolCommand>) -> Self {
        Self {
            pool_tx: Some(pool_tx),
            slave: None,
        }
    }

    pub(super) fn slave(agent: Arc<SlaveAgent>) -> Self {
        Self {
            pool_tx: None,
            slave: Some(agent),
        }
    }
}

pub(super) async fn serve(
    listener: TcpListener,
    router: Arc<RemoteRouter>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            accepted = listener.accept() => {
                match accepted {
                    Ok((socket, _addr)) => {
                        let router = Arc::clone(&router);
                        tokio::spawn(async move {
                            handle_connection(socket, router).await;
                        });
                    }
                    Err(err) => warn!("Failed to accept connection: {}", err),
                }
            }
            result = shutdown.changed() => {
                if result.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}

async fn handle_connection(mut socket: TcpStream, router: Arc<RemoteRouter>) {
    let request = match read_http_request(&mut socket).await {
        Ok(request) => request,
        Err(failure) => {
            if write_error_response(&mut socket, failure.status, &failure.message)
                .await
                .is_err()
            {
                // Socket closed while writing error response.
            }
            return;
        }
    };
    if let Err(err) = dispatch(&mut socket, &request, &router).await {
        debug!(
            "Failed to answer {} {}: {}",
            request.method, request.path, err
        );
    }
}

async fn dispatch(
    socket: &mut TcpStream,
    request: &HttpRequest,
    router: &RemoteRouter,
) -> AppResult<()> {
    match (request.method.as_str(), request.path.as_str()) {
        ("POST", "/remote") => match router.slave.as_ref() {
            Some(agent) => match Arc::clone(agent).submit(&request.body).await {
                Ok(()) => write_empty_response(socket, 200).await,
                Err(err) => write_error_response(socket, 400, &err.to_string()).await,
            },
            None => write_empty_response(socket, 405).await,
        },
        ("GET", "/remote/state") => match router.slave.as_ref() {
            Some(agent) => {
                let status = if agent.running() { 200 } else { 410 };
                write_empty_response(socket, status).await
            }
            None => write_empty_response(socket, 405).await,
        },
        ("POST", "/remote/stop") => match router.slave.as_ref() {
            Some(agent) => {
                agent.stop();
                write_empty_response(socket, 200).await
            }
            None => write_empty_response(socket, 405).await,
        },
        ("POST", "/remote/progress") => match router.pool_tx.as_ref() {
            Some(pool_tx) => handle_progress(socket, &request.body, pool_tx).await,
            None => write_empty_response(socket, 405).await,
        },
        _ => write_empty_response(socket, 405).await,
    }
}

async fn handle_progress(
    socket: &mut TcpStream,
    body: &[u8],
    pool_tx: &mpsc::UnboundedSender<PoolCommand>,
) -> AppResult<()> {
    let report = match serde_json::from_slice::<ProgressReport>(body) {
        Ok(report) => report,
        Err(err) => {
            return write_error_response(socket, 400, &format!("Invalid progress report: {}", err))
                .await;
        }
    };
    let (respond_to, response_rx) = oneshot::channel();
    if pool_tx
        .send(PoolCommand::Progress { report, respond_to })
        .is_err()
    {
        // Pool already completed; late reports are dropped.
        return write_empty_response(socket, 200).await;
    }
    match response_rx.await {
        Ok(Ok(())) => write_empty_response(socket, 200).await,
        Ok(Err(message)) => write_error_response(socket, 400, &message).await,
        // Pool shut down while the report was in flight.
        Err(_) => write_empty_response(socket, 200).await,
    }
}
