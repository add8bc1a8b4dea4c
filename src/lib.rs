pub use fogbender_core::{
    SessionContext, ViewOptions, expansion, format, gallery, rows, schema, sections, topic,
    view, window,
};

pub mod types {
    pub mod events;
}

pub mod client;
pub mod config;
pub mod files;
pub mod idle;
pub mod keepalive;
pub mod request;
pub mod roster;
pub mod search;
pub mod transport;

#[cfg(test)]
pub(crate) mod test_utils;

pub use client::Client;
pub use config::ClientConfig;
pub use request::{RequestError, ServerCall};
pub use roster::Roster;
