use fogbender_core::RosterEvent;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::broadcast;

// The size of the broadcast channel buffer.
const CHANNEL_CAPACITY: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Connected;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Disconnected;

/// A pushed `Event.*` frame the roster does not model (badges, typing, etc).
#[derive(Debug, Clone, PartialEq)]
pub struct ServerPush {
    pub msg_type: String,
    pub body: Value,
}

macro_rules! define_event_bus {
    ($(($field:ident, $type:ty)),* $(,)?) => {
        /// Typed event bus with a separate broadcast channel per event type.
        #[derive(Debug)]
        pub struct EventBus {
            $(
                pub $field: broadcast::Sender<$type>,
            )*
        }

        impl EventBus {
            pub fn new() -> Self {
                Self {
                    $(
                        $field: broadcast::channel(CHANNEL_CAPACITY).0,
                    )*
                }
            }
        }
    };
}

define_event_bus! {
    // Connection events
    (connected, Arc<Connected>),
    (disconnected, Arc<Disconnected>),

    // Server pushes
    (roster, Arc<RosterEvent>),
    (server_push, Arc<ServerPush>),
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
