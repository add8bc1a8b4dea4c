//! Debounced roster search.
//!
//! Typing produces a burst of [`RosterSearch::search`] calls. Only the last call of a
//! burst reaches the server: every call waits out the debounce and then checks that
//! no newer call has started since. At most one `Search.Roster` is outstanding per
//! searcher, and answers stay fresh in a cache for the configured stale time.

use crate::client::Client;
use crate::request::{RequestError, ServerCall};
use dashmap::DashMap;
use fogbender_core::schema::{EventRoom, Request, Response};
use log::{debug, error};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;

#[derive(Debug, Error)]
pub enum SearchError {
    /// A newer search started before this one reached the server.
    #[error("superseded by a newer search")]
    Superseded,
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("expected Search.Ok, got {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TermFields {
    RoomAndCustomerName,
    Message,
}

impl TermFields {
    pub fn fields(self) -> Vec<String> {
        match self {
            TermFields::RoomAndCustomerName => vec!["rname".into(), "cname".into()],
            TermFields::Message => vec!["message".into()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SearchKey {
    workspace_id: Option<String>,
    helpdesk_id: Option<String>,
    term: String,
    fields: TermFields,
}

pub struct RosterSearch {
    caller: Arc<dyn ServerCall>,
    debounce: Duration,
    stale_time: Duration,
    generation: AtomicU64,
    in_flight: Mutex<()>,
    cache: DashMap<SearchKey, (Instant, Arc<Vec<EventRoom>>)>,
}

impl RosterSearch {
    pub fn new(caller: Arc<dyn ServerCall>, debounce: Duration, stale_time: Duration) -> Self {
        Self {
            caller,
            debounce,
            stale_time,
            generation: AtomicU64::new(0),
            in_flight: Mutex::new(()),
            cache: DashMap::new(),
        }
    }

    /// A searcher over `client`, with the configured debounce and stale time.
    pub fn from_client(client: &Arc<Client>) -> Self {
        let config = client.config();
        Self::new(client.clone(), config.search_debounce, config.search_stale_time)
    }

    pub async fn search(
        &self,
        term: &str,
        fields: TermFields,
    ) -> Result<Arc<Vec<EventRoom>>, SearchError> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let session = self.caller.session();
        let key = SearchKey {
            workspace_id: session.workspace_id,
            helpdesk_id: session.helpdesk_id,
            term: term.to_string(),
            fields,
        };
        if let Some(hit) = self.fresh(&key) {
            return Ok(hit);
        }

        tokio::time::sleep(self.debounce).await;
        self.ensure_current(generation)?;

        let _in_flight = self.in_flight.lock().await;
        self.ensure_current(generation)?;
        if let Some(hit) = self.fresh(&key) {
            return Ok(hit);
        }

        debug!(target: "Roster/Search", "Searching for {term:?} in {:?}", fields);
        let request = Request::SearchRoster {
            workspace_id: key.workspace_id.clone(),
            helpdesk_id: key.helpdesk_id.clone(),
            term: key.term.clone(),
            term_fields: fields.fields(),
        };
        match self.caller.call(request).await? {
            Response::SearchOk { items } => {
                let items = Arc::new(items);
                self.cache.insert(key, (Instant::now(), items.clone()));
                Ok(items)
            }
            other => {
                error!(
                    target: "Roster/Search",
                    "Expected Search.Ok, got {}: {other:?}",
                    other.msg_type()
                );
                Err(SearchError::UnexpectedResponse(other.msg_type().to_string()))
            }
        }
    }

    fn ensure_current(&self, generation: u64) -> Result<(), SearchError> {
        if self.generation.load(Ordering::SeqCst) == generation {
            Ok(())
        } else {
            Err(SearchError::Superseded)
        }
    }

    fn fresh(&self, key: &SearchKey) -> Option<Arc<Vec<EventRoom>>> {
        let entry = self.cache.get(key)?;
        let (stored_at, items) = entry.value();
        (stored_at.elapsed() < self.stale_time).then(|| items.clone())
    }
}
