use crate::client::Client;
use fogbender_core::schema::{Request, Response};
use log::{debug, error, info, warn};
use std::sync::Arc;

impl Client {
    /// Sends a single `Ping.Ping` and waits up to one keepalive interval for the pong.
    /// Returns true on success, false on failure.
    async fn send_keepalive(&self) -> bool {
        if !self.is_connected() {
            return false;
        }

        debug!(target: "Client/Keepalive", "Sending keepalive ping");
        match self
            .send_request(Request::Ping, Some(self.config.keepalive_interval))
            .await
        {
            Ok(Response::PingPong) => {
                debug!(target: "Client/Keepalive", "Received keepalive pong");
                true
            }
            Ok(other) => {
                warn!(target: "Client/Keepalive", "Expected Ping.Pong, got {}", other.msg_type());
                false
            }
            Err(e) => {
                warn!(target: "Client/Keepalive", "Keepalive ping failed: {e}");
                false
            }
        }
    }

    /// The main keepalive loop. This should be spawned as a background task.
    ///
    /// A ping goes out every interval. If the previous ping never got its pong by the
    /// time the next one is due, the server is considered gone and the connection is
    /// closed.
    pub(crate) async fn keepalive_loop(self: Arc<Self>) {
        let interval = self.config.keepalive_interval;
        let mut failed_pings = 0u32;

        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {
                    if !self.is_connected() {
                        debug!(target: "Client/Keepalive", "Not connected, exiting keepalive loop.");
                        return;
                    }

                    if failed_pings >= 1 {
                        error!(target: "Client/Keepalive", "Server stopped responding to pings, closing the connection");
                        self.disconnect().await;
                        return;
                    }

                    if self.send_keepalive().await {
                        if failed_pings > 0 {
                            info!(target: "Client/Keepalive", "Keepalive restored.");
                        }
                        failed_pings = 0;
                    } else {
                        failed_pings += 1;
                    }
                },
                _ = self.shutdown_notifier.notified() => {
                    debug!(target: "Client/Keepalive", "Shutdown signaled, exiting keepalive loop.");
                    return;
                }
            }
        }
    }
}
