use crate::client::Client;
use async_trait::async_trait;
use fogbender_core::schema::{Request, Response};
use fogbender_core::SessionContext;
use log::{debug, warn};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

/// Custom error types for server calls.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request timed out")]
    Timeout,
    #[error("client is not connected")]
    NotConnected,
    #[error("transport error: {0}")]
    Transport(anyhow::Error),
    #[error("failed to encode {msg_type} request: {source}")]
    Encode {
        msg_type: &'static str,
        source: serde_json::Error,
    },
    #[error("internal channel closed unexpectedly")]
    InternalChannelClosed,
}

/// The one capability roster components need from a connection: send a request,
/// get its paired response, and know who we are talking as.
#[async_trait]
pub trait ServerCall: Send + Sync {
    async fn call(&self, request: Request) -> Result<Response, RequestError>;

    fn session(&self) -> SessionContext;
}

impl Client {
    /// Generates a new unique request ID string.
    pub fn generate_request_id(&self) -> String {
        let count = self
            .id_counter
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        format!("{}-{}", self.unique_id, count)
    }

    /// Sends a request and asynchronously waits for the response with the same `msgId`.
    pub async fn send_request(
        &self,
        request: Request,
        wait: Option<Duration>,
    ) -> Result<Response, RequestError> {
        let transport = { self.transport.lock().await.clone() };
        let Some(transport) = transport else {
            return Err(RequestError::NotConnected);
        };

        let req_id = self.generate_request_id();
        let msg_type = request.msg_type();
        let frame = request
            .to_frame(&req_id)
            .map_err(|source| RequestError::Encode { msg_type, source })?;

        let (tx, rx) = tokio::sync::oneshot::channel();
        self.response_waiters
            .lock()
            .await
            .insert(req_id.clone(), tx);

        debug!(target: "Client/Request", "--> {msg_type} ({req_id})");
        if let Err(e) = transport.send_frame(&frame).await {
            self.response_waiters.lock().await.remove(&req_id);
            return Err(RequestError::Transport(e));
        }

        match timeout(wait.unwrap_or(self.config.request_timeout), rx).await {
            Ok(Ok(body)) => Ok(Response::from_value(body)),
            Ok(Err(_)) => Err(RequestError::InternalChannelClosed),
            Err(_) => {
                self.response_waiters.lock().await.remove(&req_id);
                Err(RequestError::Timeout)
            }
        }
    }

    /// Handles an incoming response by forwarding it to the waiting task.
    pub async fn handle_response(&self, msg_id: &str, body: Value) -> bool {
        if let Some(waiter) = self.response_waiters.lock().await.remove(msg_id) {
            if waiter.send(body).is_err() {
                warn!(target: "Client/Request", "Failed to send response to waiter for ID {msg_id}. Receiver was likely dropped.");
            }
            return true;
        }
        false
    }
}

#[async_trait]
impl ServerCall for Client {
    async fn call(&self, request: Request) -> Result<Response, RequestError> {
        self.send_request(request, None).await
    }

    fn session(&self) -> SessionContext {
        self.session_snapshot()
    }
}
