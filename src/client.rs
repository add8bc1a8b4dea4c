use crate::config::ClientConfig;
use crate::transport::{Transport, TransportEvent, TransportFactory};
use crate::types::events::{Connected, Disconnected, EventBus, ServerPush};
use fogbender_core::SessionContext;
use fogbender_core::schema::{Inbound, ServerEvent};
use log::{debug, info, warn};
use rand::RngCore;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tokio::sync::{Mutex, Notify, mpsc, oneshot};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("client is already connected")]
    AlreadyConnected,
    #[error("failed to open transport: {0}")]
    Transport(anyhow::Error),
}

pub struct Client {
    pub(crate) config: ClientConfig,
    transport_factory: Arc<dyn TransportFactory>,
    pub(crate) transport: Mutex<Option<Arc<dyn Transport>>>,
    pub(crate) response_waiters: Mutex<HashMap<String, oneshot::Sender<Value>>>,

    pub(crate) unique_id: String,
    pub(crate) id_counter: AtomicU64,

    session: RwLock<SessionContext>,
    is_connecting: AtomicBool,
    is_connected: AtomicBool,
    /// Bumped on every connect so a stale read loop cannot tear down a newer connection.
    connection_generation: AtomicU64,
    pub(crate) shutdown_notifier: Notify,

    pub event_bus: EventBus,
}

impl Client {
    pub fn new(transport_factory: Arc<dyn TransportFactory>, config: ClientConfig) -> Arc<Self> {
        let mut unique_id_bytes = [0u8; 2];
        rand::rng().fill_bytes(&mut unique_id_bytes);

        Arc::new(Self {
            config,
            transport_factory,
            transport: Mutex::new(None),
            response_waiters: Mutex::new(HashMap::new()),
            unique_id: format!("{}.{}", unique_id_bytes[0], unique_id_bytes[1]),
            id_counter: AtomicU64::new(0),
            session: RwLock::new(SessionContext::default()),
            is_connecting: AtomicBool::new(false),
            is_connected: AtomicBool::new(false),
            connection_generation: AtomicU64::new(0),
            shutdown_notifier: Notify::new(),
            event_bus: EventBus::new(),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    /// Replaces the session context. Roster topics are derived from it, so this is
    /// what turns an inert roster into a live one.
    pub fn set_session(&self, session: SessionContext) {
        match self.session.write() {
            Ok(mut guard) => *guard = session,
            Err(poisoned) => *poisoned.into_inner() = session,
        }
    }

    pub fn session_snapshot(&self) -> SessionContext {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub async fn connect(self: &Arc<Self>) -> Result<(), ClientError> {
        if self.is_connecting.swap(true, Ordering::SeqCst) {
            return Err(ClientError::AlreadyConnected);
        }

        let _guard = scopeguard::guard((), |_| {
            self.is_connecting.store(false, Ordering::Relaxed);
        });

        if self.is_connected() {
            return Err(ClientError::AlreadyConnected);
        }

        let (transport, transport_events) = self
            .transport_factory
            .create_transport()
            .await
            .map_err(ClientError::Transport)?;

        *self.transport.lock().await = Some(transport);
        self.is_connected.store(true, Ordering::Release);
        let generation = self.connection_generation.fetch_add(1, Ordering::SeqCst) + 1;

        let client_clone = self.clone();
        tokio::spawn(async move {
            client_clone
                .read_messages_loop(transport_events, generation)
                .await
        });

        let client_clone = self.clone();
        tokio::spawn(async move { client_clone.keepalive_loop().await });

        Ok(())
    }

    pub async fn disconnect(&self) {
        info!("Disconnecting client intentionally.");
        self.shutdown_notifier.notify_waiters();

        let transport = self.transport.lock().await.clone();
        if let Some(transport) = transport {
            transport.disconnect().await;
        }
        self.cleanup_connection_state().await;
    }

    async fn cleanup_connection_state(&self) {
        let was_connected = self.is_connected.swap(false, Ordering::AcqRel);
        *self.transport.lock().await = None;
        // Dropping the senders fails every pending request with InternalChannelClosed.
        self.response_waiters.lock().await.clear();
        if was_connected {
            let _ = self.event_bus.disconnected.send(Arc::new(Disconnected));
        }
    }

    async fn read_messages_loop(
        self: Arc<Self>,
        mut transport_events: mpsc::Receiver<TransportEvent>,
        generation: u64,
    ) {
        info!(target: "Client", "Starting message processing loop...");

        loop {
            tokio::select! {
                biased;
                _ = self.shutdown_notifier.notified() => {
                    info!(target: "Client", "Shutdown signaled in message loop. Exiting message loop.");
                    return;
                },
                event = transport_events.recv() => match event {
                    Some(TransportEvent::Connected) => {
                        let _ = self.event_bus.connected.send(Arc::new(Connected));
                    }
                    Some(TransportEvent::FrameReceived(text)) => self.handle_frame(&text).await,
                    Some(TransportEvent::Disconnected) | None => break,
                },
            }
        }

        if self.connection_generation.load(Ordering::SeqCst) == generation {
            info!(target: "Client", "Transport closed, cleaning up connection state");
            self.shutdown_notifier.notify_waiters();
            self.cleanup_connection_state().await;
        }
    }

    pub(crate) async fn handle_frame(&self, text: &str) {
        match Inbound::parse(text) {
            Ok(Inbound::Response { msg_id, body }) => {
                if !self.handle_response(&msg_id, body).await {
                    debug!(target: "Client", "No waiter for response {msg_id}");
                }
            }
            Ok(Inbound::Event(ServerEvent::Roster(event))) => {
                let _ = self.event_bus.roster.send(Arc::new(event));
            }
            Ok(Inbound::Event(ServerEvent::Other { msg_type, body })) => {
                let _ = self
                    .event_bus
                    .server_push
                    .send(Arc::new(ServerPush { msg_type, body }));
            }
            Err(e) => warn!(target: "Client", "Dropping inbound frame: {e}"),
        }
    }
}
