pub mod loader;
pub mod store;
pub mod subscription;

pub use loader::SectionLoader;
pub use store::{LoadError, RosterAction, RosterStore};
pub use subscription::{ViewError, ViewHandle, ViewSubscriptions};

use crate::client::Client;
use crate::request::ServerCall;
use fogbender_core::RosterSections;
use fogbender_core::schema::RosterEvent;
use log::{debug, warn};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// One roster: a store, the views feeding it and the loader paging it.
pub struct Roster {
    store: Arc<RosterStore>,
    views: ViewSubscriptions,
    loader: SectionLoader,
    pump: Option<JoinHandle<()>>,
}

impl Roster {
    /// A roster over a live client. Roster items the server pushes are folded into
    /// the store for as long as the roster lives.
    pub fn new(client: &Arc<Client>) -> Self {
        let mut roster = Self::with_caller(client.clone(), client.config().roster_page_limit);
        roster.pump = Some(tokio::spawn(pump_events(
            client.event_bus.roster.subscribe(),
            roster.store.clone(),
        )));
        roster
    }

    pub fn with_caller(caller: Arc<dyn ServerCall>, page_limit: u32) -> Self {
        let store = Arc::new(RosterStore::new(caller.clone(), page_limit));
        let loader = SectionLoader::new(store.clone());
        Self {
            views: ViewSubscriptions::new(caller, store.clone(), loader.clone()),
            loader,
            store,
            pump: None,
        }
    }

    pub fn store(&self) -> &Arc<RosterStore> {
        &self.store
    }

    pub fn views(&self) -> &ViewSubscriptions {
        &self.views
    }

    pub fn loader(&self) -> &SectionLoader {
        &self.loader
    }

    pub fn snapshot(&self) -> Arc<RosterSections> {
        self.store.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<RosterSections>> {
        self.store.subscribe()
    }
}

impl Drop for Roster {
    fn drop(&mut self) {
        if let Some(pump) = self.pump.take() {
            pump.abort();
        }
    }
}

async fn pump_events(mut events: broadcast::Receiver<Arc<RosterEvent>>, store: Arc<RosterStore>) {
    loop {
        match events.recv().await {
            Ok(event) => apply_pushed(&store, &event).await,
            Err(RecvError::Lagged(missed)) => {
                warn!(target: "Roster", "Missed {missed} pushed roster event(s)");
            }
            Err(RecvError::Closed) => {
                debug!(target: "Roster", "Event bus closed, stopping roster pump");
                return;
            }
        }
    }
}

async fn apply_pushed(store: &RosterStore, event: &RosterEvent) {
    let action = match event {
        RosterEvent::Room(room) => RosterAction::UpdateRoster {
            rooms: vec![room.clone()],
        },
        RosterEvent::Section(_) => RosterAction::Apply {
            items: vec![event.clone()],
        },
    };
    if let Err(e) = store.dispatch(action).await {
        warn!(target: "Roster", "Failed to apply pushed roster event: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::test_utils::section_event;
    use crate::transport::mock::MockTransportFactory;
    use fogbender_core::SessionContext;

    #[tokio::test]
    async fn pushed_events_reach_the_store() {
        let _ = env_logger::builder().is_test(true).try_init();

        let factory = Arc::new(MockTransportFactory::new());
        let client = Client::new(factory.clone(), ClientConfig::default());
        client.set_session(SessionContext::agent("fog-1", "w1"));
        let roster = Roster::new(&client);
        client.connect().await.unwrap();

        roster
            .store()
            .dispatch(RosterAction::ResetView {
                view: "main".into(),
                items: vec![section_event("main", "OPEN", 0, 1)],
            })
            .await
            .unwrap();
        let mut changes = roster.subscribe();
        changes.borrow_and_update();

        factory
            .push(r#"{"msgType":"Event.RosterSection","id":"OPEN","view":"main","count":4,"pos":1}"#)
            .await;
        changes.changed().await.unwrap();
        assert_eq!(roster.snapshot().section("main", "OPEN").unwrap().count(), 4);

        factory
            .push(r#"{"msgType":"Event.RosterRoom","view":"main","room":{"id":"r1","name":"Billing"},"sections":{"OPEN":1}}"#)
            .await;
        changes.changed().await.unwrap();
        let snapshot = roster.snapshot();
        let section = snapshot.section("main", "OPEN").unwrap();
        assert_eq!(section.row(0).unwrap().room.name, "Billing");
    }
}
