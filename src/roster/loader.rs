use crate::roster::store::{RosterAction, RosterStore};
use fogbender_core::window::{FetchGuard, WindowProbe};
use log::{info, warn};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinHandle;

type SlotKey = (String, String);

/// A section's fetch state for one lifetime of its view. `epoch` tells a load that
/// finishes after its view was closed and reopened apart from the current slot.
struct Slot {
    epoch: u64,
    guard: FetchGuard,
}

/// Fetches the next page of a section when the viewport reaches its loaded edge.
///
/// Each `(view, section)` has one slot: at most one load is outstanding for it and
/// the same window state never triggers a second load. Slots are independent, so
/// different sections load concurrently.
#[derive(Clone)]
pub struct SectionLoader {
    store: Arc<RosterStore>,
    slots: Arc<Mutex<HashMap<SlotKey, Slot>>>,
    epochs: Arc<AtomicU64>,
}

impl SectionLoader {
    pub fn new(store: Arc<RosterStore>) -> Self {
        Self {
            store,
            slots: Arc::default(),
            epochs: Arc::default(),
        }
    }

    /// Reports the last row index the viewport shows for a section (`None` when
    /// nothing of it is visible). Returns the spawned load, if one was started.
    pub fn on_viewport(
        &self,
        view: &str,
        section_id: &str,
        last_visible_index: Option<usize>,
    ) -> Option<JoinHandle<()>> {
        let snapshot = self.store.snapshot();
        let section = snapshot.section(view, section_id)?;
        let probe = WindowProbe::new(section, last_visible_index);

        let key = (view.to_string(), section_id.to_string());
        let (epoch, fetch_key) = {
            let mut slots = lock(&self.slots);
            let slot = slots.entry(key.clone()).or_insert_with(|| Slot {
                epoch: self.epochs.fetch_add(1, Ordering::Relaxed),
                guard: FetchGuard::default(),
            });
            (slot.epoch, slot.guard.begin(&probe)?)
        };

        info!(
            target: "Roster/Loader",
            "fetch more items starting from {} because we only have {} out of {} ({fetch_key})",
            probe.last_visible_index + 1,
            probe.materialized_len,
            probe.count
        );

        let store = self.store.clone();
        let slots = self.slots.clone();
        Some(tokio::spawn(async move {
            let (view, section_id) = key.clone();
            let _release = scopeguard::guard(key, move |key| {
                if let Some(slot) = lock(&slots).get_mut(&key) {
                    if slot.epoch == epoch {
                        slot.guard.finish();
                    }
                }
            });
            if let Err(e) = store
                .dispatch(RosterAction::Load {
                    view: view.clone(),
                    section_id: section_id.clone(),
                })
                .await
            {
                warn!(target: "Roster/Loader", "Loading {view}/{section_id} failed: {e}");
            }
        }))
    }

    pub fn is_loading(&self, view: &str, section_id: &str) -> bool {
        lock(&self.slots)
            .get(&(view.to_string(), section_id.to_string()))
            .is_some_and(|slot| slot.guard.in_flight())
    }

    /// Drops the fetch state of every section of `view`. A reopened view starts
    /// from fresh slots, so its first window is fetched again.
    pub fn forget_view(&self, view: &str) {
        lock(&self.slots).retain(|(slot_view, _), _| slot_view != view);
    }
}

fn lock(slots: &Mutex<HashMap<SlotKey, Slot>>) -> MutexGuard<'_, HashMap<SlotKey, Slot>> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{ScriptedServer, agent_session, room_event, section_event};

    async fn loader_with(
        sections: &[(&str, usize, usize)],
    ) -> (Arc<ScriptedServer>, Arc<RosterStore>, SectionLoader) {
        let server = Arc::new(ScriptedServer::roster(agent_session(), sections));
        let store = Arc::new(RosterStore::new(server.clone(), 30));
        let mut items = Vec::new();
        for (i, (id, count, loaded)) in sections.iter().enumerate() {
            items.push(section_event("main", id, *count, i as i64 + 1));
            items.extend((1..=*loaded).map(|pos| room_event("main", id, pos)));
        }
        store
            .dispatch(RosterAction::ResetView {
                view: "main".into(),
                items,
            })
            .await
            .unwrap();
        let loader = SectionLoader::new(store.clone());
        (server, store, loader)
    }

    #[tokio::test]
    async fn reaching_the_loaded_edge_fetches_the_next_page() {
        let _ = env_logger::builder().is_test(true).try_init();
        let (server, store, loader) = loader_with(&[("OPEN", 50, 20)]).await;

        let load = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        load.await.unwrap();

        assert_eq!(server.calls_of("Roster.GetRange").len(), 1);
        assert_eq!(
            store.snapshot().section("main", "OPEN").unwrap().materialized_len(),
            50
        );
        assert!(!loader.is_loading("main", "OPEN"));
    }

    #[tokio::test]
    async fn repeated_reports_while_loading_do_not_duplicate() {
        let (server, _store, loader) = loader_with(&[("OPEN", 50, 20)]).await;
        server.hold_loads();

        let load = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        assert!(loader.on_viewport("main", "OPEN", Some(19)).is_none());
        assert!(loader.on_viewport("main", "OPEN", Some(25)).is_none());
        assert!(loader.is_loading("main", "OPEN"));

        server.release_load();
        load.await.unwrap();
        assert_eq!(server.calls_of("Roster.GetRange").len(), 1);
    }

    #[tokio::test]
    async fn satisfied_window_does_not_fetch_again() {
        let (server, _store, loader) = loader_with(&[("OPEN", 50, 20)]).await;

        loader.on_viewport("main", "OPEN", Some(19)).unwrap().await.unwrap();
        assert!(loader.on_viewport("main", "OPEN", Some(19)).is_none());
        assert!(loader.on_viewport("main", "OPEN", Some(49)).is_none());
        assert_eq!(server.calls_of("Roster.GetRange").len(), 1);
    }

    #[tokio::test]
    async fn empty_and_fully_loaded_sections_never_fetch() {
        let (server, _store, loader) = loader_with(&[("OPEN", 0, 0), ("PINNED", 3, 3)]).await;
        assert!(loader.on_viewport("main", "OPEN", Some(0)).is_none());
        assert!(loader.on_viewport("main", "PINNED", Some(2)).is_none());
        assert!(loader.on_viewport("main", "MISSING", Some(2)).is_none());
        assert!(server.calls().is_empty());
    }

    #[tokio::test]
    async fn sections_load_independently() {
        let (server, _store, loader) = loader_with(&[("OPEN", 50, 20), ("ARCHIVED", 40, 10)]).await;
        server.hold_loads();

        let open = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        let archived = loader.on_viewport("main", "ARCHIVED", Some(9)).unwrap();
        server.wait_for_calls("Roster.GetRange", 2).await;

        server.release_load();
        server.release_load();
        open.await.unwrap();
        archived.await.unwrap();
    }

    #[tokio::test]
    async fn failed_load_frees_the_slot() {
        let server = Arc::new(ScriptedServer::new(
            agent_session(),
            Box::new(|_| fogbender_core::schema::Response::RosterErr {
                code: Some(500),
                error: None,
            }),
        ));
        let store = Arc::new(RosterStore::new(server.clone(), 30));
        store
            .dispatch(RosterAction::ResetView {
                view: "main".into(),
                items: vec![section_event("main", "OPEN", 10, 1)],
            })
            .await
            .unwrap();
        let loader = SectionLoader::new(store);

        loader.on_viewport("main", "OPEN", Some(0)).unwrap().await.unwrap();
        assert!(!loader.is_loading("main", "OPEN"));
        // Same window state as the failed attempt: not retried.
        assert!(loader.on_viewport("main", "OPEN", Some(0)).is_none());
        // A different one is.
        assert!(loader.on_viewport("main", "OPEN", Some(3)).is_some());
    }

    #[tokio::test]
    async fn forgotten_view_fetches_its_window_again() {
        let (server, _store, loader) = loader_with(&[("OPEN", 50, 20)]).await;
        server.hold_loads();

        let stale = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        server.wait_for_calls("Roster.GetRange", 1).await;
        loader.forget_view("main");
        assert!(!loader.is_loading("main", "OPEN"));

        // Same window state as before the view went away.
        let fresh = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        server.wait_for_calls("Roster.GetRange", 2).await;

        // The older load finishing must not free the newer slot.
        server.release_load();
        stale.await.unwrap();
        assert!(loader.is_loading("main", "OPEN"));

        server.release_load();
        fresh.await.unwrap();
        assert!(!loader.is_loading("main", "OPEN"));
    }

    #[tokio::test]
    async fn forget_view_leaves_other_views_alone() {
        let (server, _store, loader) = loader_with(&[("OPEN", 50, 20)]).await;
        server.hold_loads();

        let load = loader.on_viewport("main", "OPEN", Some(19)).unwrap();
        loader.forget_view("customers");
        assert!(loader.is_loading("main", "OPEN"));

        server.release_load();
        load.await.unwrap();
    }
}
