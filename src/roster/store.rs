//! The shared roster store.
//!
//! State lives in an immutable [`RosterSections`] snapshot behind a `watch` channel.
//! Readers take an `Arc` of the current snapshot; every dispatched action produces
//! the next one, copying only when a reader still holds the previous snapshot.

use crate::request::{RequestError, ServerCall};
use fogbender_core::RosterSections;
use fogbender_core::schema::{EventRosterRoom, Request, Response, RosterEvent};
use log::{debug, error};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("expected Roster.GetOk, got {0}")]
    UnexpectedResponse(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RosterAction {
    /// Replace a view with the items of a fresh `Roster.OpenViewOk`.
    ResetView {
        view: String,
        items: Vec<RosterEvent>,
    },
    /// Fetch the page after the loaded prefix of one section.
    Load { view: String, section_id: String },
    /// Pushed room updates.
    UpdateRoster { rooms: Vec<EventRosterRoom> },
    /// Pushed section updates (or any other roster items).
    Apply { items: Vec<RosterEvent> },
    /// Stop tracking a view; later results for it are ignored.
    DropView { view: String },
}

pub struct RosterStore {
    caller: Arc<dyn ServerCall>,
    page_limit: u32,
    state: watch::Sender<Arc<RosterSections>>,
}

impl RosterStore {
    pub fn new(caller: Arc<dyn ServerCall>, page_limit: u32) -> Self {
        let (state, _) = watch::channel(Arc::new(RosterSections::default()));
        Self {
            caller,
            page_limit,
            state,
        }
    }

    pub fn snapshot(&self) -> Arc<RosterSections> {
        self.state.borrow().clone()
    }

    /// Receives every new snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<RosterSections>> {
        self.state.subscribe()
    }

    /// Applies an action. `Load` resolves once its page has been applied (or dropped
    /// because the view closed meanwhile); every other action is synchronous.
    pub async fn dispatch(&self, action: RosterAction) -> Result<(), LoadError> {
        match action {
            RosterAction::ResetView { view, items } => {
                self.update(|state| state.reset_view(&view, &items));
            }
            RosterAction::Load { view, section_id } => self.load(&view, &section_id).await?,
            RosterAction::UpdateRoster { rooms } => self.update(|state| {
                for room in &rooms {
                    if !state.apply_room_event(room) {
                        debug!(target: "Roster/Store", "Room {} for untracked view {}", room.room.id, room.view);
                    }
                }
            }),
            RosterAction::Apply { items } => self.update(|state| {
                state.apply(&items);
            }),
            RosterAction::DropView { view } => self.forget_view(&view),
        }
        Ok(())
    }

    /// Stops tracking `view`. Pages still in flight for it are dropped on arrival.
    pub fn forget_view(&self, view: &str) {
        self.update(|state| {
            state.remove_view(view);
        });
    }

    fn update(&self, f: impl FnOnce(&mut RosterSections)) {
        self.state.send_modify(|state| f(Arc::make_mut(state)));
    }

    async fn load(&self, view: &str, section_id: &str) -> Result<(), LoadError> {
        let Some(topic) = self.caller.session().roster_topic() else {
            debug!(target: "Roster/Store", "No roster topic yet, skipping load of {view}/{section_id}");
            return Ok(());
        };

        let start_pos = 1 + self
            .snapshot()
            .section(view, section_id)
            .map_or(0, |section| section.materialized_len());

        let request = Request::RosterGetRange {
            topic,
            view: view.to_string(),
            section_id: section_id.to_string(),
            start_pos,
            limit: self.page_limit,
        };

        match self.caller.call(request).await? {
            Response::RosterGetOk { items } => {
                if !self.snapshot().has_view(view) {
                    debug!(
                        target: "Roster/Store",
                        "View {view} closed while loading {section_id}, dropping {} item(s)",
                        items.len()
                    );
                    return Ok(());
                }
                self.update(|state| {
                    state.apply(&items);
                });
                Ok(())
            }
            other => {
                error!(
                    target: "Roster/Store",
                    "Expected Roster.GetOk for {view}/{section_id}, got {}: {other:?}",
                    other.msg_type()
                );
                Err(LoadError::UnexpectedResponse(other.msg_type().to_string()))
            }
        }
    }
}
