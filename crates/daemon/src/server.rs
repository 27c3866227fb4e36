// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket server and connection handling.

use std::time::Instant;

use kvlog_storage::KvService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::protocol::{self, Request, Response, DEFAULT_TIMEOUT};

/// State shared by every connection handler
pub struct ServerContext {
    pub service: KvService,
    pub start_time: Instant,
    /// Signalled when a client asks the daemon to stop
    pub shutdown: Notify,
}

impl ServerContext {
    pub fn new(service: KvService) -> Self {
        Self {
            service,
            start_time: Instant::now(),
            shutdown: Notify::new(),
        }
    }
}

/// Handle a single client connection
pub async fn handle_connection<S>(ctx: &ServerContext, stream: S) -> Result<(), ServerError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let request = match protocol::read_request(&mut reader, DEFAULT_TIMEOUT).await {
        Ok(req) => req,
        Err(protocol::ProtocolError::Timeout) => {
            error!("Request read timeout");
            return Err(ServerError::Timeout);
        }
        Err(protocol::ProtocolError::ConnectionClosed) => {
            debug!("Client disconnected before sending request");
            return Ok(());
        }
        Err(e) => {
            error!("Failed to read request: {}", e);
            return Err(ServerError::Protocol(e));
        }
    };

    debug!(?request, "received request");

    let response = handle_request(ctx, request).await;

    debug!(?response, "sending response");

    protocol::write_response(&mut writer, &response, DEFAULT_TIMEOUT)
        .await
        .map_err(ServerError::Protocol)?;

    Ok(())
}

/// Handle a single request and return a response
pub async fn handle_request(ctx: &ServerContext, request: Request) -> Response {
    match request {
        Request::Ping => Response::Pong,

        Request::Get { key } => match ctx.service.get(&key) {
            Ok(value) => Response::Value { value },
            Err(e) if e.is_not_found() => Response::NotFound { key },
            Err(e) => Response::Error {
                message: e.to_string(),
            },
        },

        Request::Put { key, value } => match ctx.service.put(&key, &value).await {
            Ok(()) => Response::Ok,
            Err(e) => {
                warn!(key = %key, error = %e, "put refused");
                Response::Error {
                    message: e.to_string(),
                }
            }
        },

        Request::Delete { key } => match ctx.service.delete(&key).await {
            Ok(()) => Response::Ok,
            Err(e) => {
                warn!(key = %key, error = %e, "delete refused");
                Response::Error {
                    message: e.to_string(),
                }
            }
        },

        Request::Status => {
            let status = ctx.service.status();
            Response::Status {
                uptime_secs: ctx.start_time.elapsed().as_secs(),
                keys: status.keys,
                last_sequence: status.last_sequence,
                failed_appends: status.failed_appends,
            }
        }

        Request::Shutdown => {
            ctx.shutdown.notify_one();
            Response::ShuttingDown
        }
    }
}

/// Server errors
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] protocol::ProtocolError),

    #[error("Request timeout")]
    Timeout,
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
