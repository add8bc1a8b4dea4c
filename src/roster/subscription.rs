//! Server-side roster views.
//!
//! Opening a view asks the server to start streaming roster items for a
//! `(topic, view)` pair; the initial snapshot replaces that view in the store. Every
//! successful open is matched by exactly one close: explicitly through
//! [`ViewHandle::close`], or in the background when the handle is dropped.
//!
//! A `(topic, view)` slot stays taken until its `Roster.CloseView` has been answered,
//! so reopening a view that is still closing waits for the close to finish first.

use crate::request::{RequestError, ServerCall};
use crate::roster::loader::SectionLoader;
use crate::roster::store::{LoadError, RosterAction, RosterStore};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use fogbender_core::ViewOptions;
use fogbender_core::schema::{Request, Response, RosterEvent};
use log::{debug, error, warn};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;

#[derive(Debug, Error)]
pub enum ViewError {
    #[error("view {view} is already open on {topic}")]
    AlreadyOpen { topic: String, view: String },
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("expected {expected}, got {got}")]
    UnexpectedResponse { expected: &'static str, got: String },
    #[error(transparent)]
    Store(#[from] LoadError),
}

type SlotKey = (String, String);

enum Slot {
    Open,
    /// `Roster.CloseView` is in flight; flips to `true` once it has been answered.
    Closing(watch::Receiver<bool>),
}

struct Inner {
    caller: Arc<dyn ServerCall>,
    store: Arc<RosterStore>,
    loader: SectionLoader,
    open: DashMap<SlotKey, Slot>,
    cache: DashMap<String, Arc<Vec<RosterEvent>>>,
}

impl Inner {
    /// Marks the slot as closing and stops the store and the loader from tracking
    /// the view. The returned sender completes the close.
    fn begin_close(&self, key: &SlotKey) -> watch::Sender<bool> {
        let (done, closing) = watch::channel(false);
        self.open.insert(key.clone(), Slot::Closing(closing));
        self.store.forget_view(&key.1);
        self.loader.forget_view(&key.1);
        done
    }

    fn finish_close(&self, key: &SlotKey, done: watch::Sender<bool>) {
        self.open
            .remove_if(key, |_, slot| matches!(slot, Slot::Closing(_)));
        done.send_replace(true);
    }

    async fn close(&self, key: SlotKey, done: watch::Sender<bool>) -> Result<(), ViewError> {
        let _finish = scopeguard::guard(done, |done| self.finish_close(&key, done));
        self.send_close(&key.0, &key.1).await
    }

    async fn send_close(&self, topic: &str, view: &str) -> Result<(), ViewError> {
        let response = self.caller.call(Request::close_view(topic, view)).await?;
        match response {
            Response::RosterCloseViewOk => Ok(()),
            response if response.is_not_found() => {
                debug!(target: "Roster/View", "View {view} was already gone on {topic}");
                Ok(())
            }
            other => {
                error!(
                    target: "Roster/View",
                    "Expected Roster.CloseViewOk for {view}, got {}: {other:?}",
                    other.msg_type()
                );
                Err(ViewError::UnexpectedResponse {
                    expected: "Roster.CloseViewOk",
                    got: other.msg_type().to_string(),
                })
            }
        }
    }
}

/// Opens and closes roster views against one connection and one store.
#[derive(Clone)]
pub struct ViewSubscriptions {
    inner: Arc<Inner>,
}

impl ViewSubscriptions {
    pub fn new(caller: Arc<dyn ServerCall>, store: Arc<RosterStore>, loader: SectionLoader) -> Self {
        Self {
            inner: Arc::new(Inner {
                caller,
                store,
                loader,
                open: DashMap::new(),
                cache: DashMap::new(),
            }),
        }
    }

    /// Opens a view. Returns `Ok(None)` while there is no roster topic (no session
    /// yet, or neither a workspace nor a helpdesk); that is not an error. If the same
    /// view is still closing, the open waits until the server answered the close.
    ///
    /// Dropping the returned future while `Roster.OpenView` is in flight frees the
    /// slot without a close: the server may keep that view until the connection ends.
    pub async fn open(&self, options: &ViewOptions) -> Result<Option<ViewHandle>, ViewError> {
        let Some(topic) = self.inner.caller.session().roster_topic() else {
            debug!(target: "Roster/View", "No roster topic, not opening {}", options.view);
            return Ok(None);
        };
        let options = options.clone().with_default_sections();
        let key = (topic.clone(), options.view.clone());

        loop {
            let mut closing = match self.inner.open.entry(key.clone()) {
                Entry::Occupied(entry) => match entry.get() {
                    Slot::Open => {
                        return Err(ViewError::AlreadyOpen {
                            topic,
                            view: options.view,
                        });
                    }
                    Slot::Closing(closing) => closing.clone(),
                },
                Entry::Vacant(slot) => {
                    slot.insert(Slot::Open);
                    break;
                }
            };
            debug!(target: "Roster/View", "Waiting for {} to close before reopening", options.view);
            let _ = closing.wait_for(|closed| *closed).await;
        }
        let slot = scopeguard::guard(key, |key| {
            self.inner
                .open
                .remove_if(&key, |_, slot| matches!(slot, Slot::Open));
        });

        let response = self
            .inner
            .caller
            .call(Request::open_view(&topic, &options))
            .await?;

        match response {
            Response::RosterOpenViewOk { items } => {
                self.inner
                    .cache
                    .insert(options.cache_key(), Arc::new(items.clone()));
                self.inner
                    .store
                    .dispatch(RosterAction::ResetView {
                        view: options.view.clone(),
                        items,
                    })
                    .await?;
                scopeguard::ScopeGuard::into_inner(slot);
                Ok(Some(ViewHandle {
                    inner: self.inner.clone(),
                    topic,
                    options,
                    closed: false,
                }))
            }
            other => {
                error!(
                    target: "Roster/View",
                    "Expected Roster.OpenViewOk for {}, got {}: {other:?}",
                    options.view,
                    other.msg_type()
                );
                Err(ViewError::UnexpectedResponse {
                    expected: "Roster.OpenViewOk",
                    got: other.msg_type().to_string(),
                })
            }
        }
    }

    /// Switches `current` over to `options`: closes the old view and opens the new
    /// one, unless the options did not actually change.
    pub async fn replace(
        &self,
        current: Option<ViewHandle>,
        options: &ViewOptions,
    ) -> Result<Option<ViewHandle>, ViewError> {
        let wanted = options.clone().with_default_sections();
        if let Some(handle) = current {
            if handle.options == wanted {
                return Ok(Some(handle));
            }
            if let Err(e) = handle.close().await {
                warn!(target: "Roster/View", "Closing the previous view failed: {e}");
            }
        }
        self.open(options).await
    }

    /// The items of the last successful open with these options.
    pub fn cached_items(&self, options: &ViewOptions) -> Option<Arc<Vec<RosterEvent>>> {
        let key = options.clone().with_default_sections().cache_key();
        self.inner.cache.get(&key).map(|items| items.value().clone())
    }

    /// Whether the view is open; a view that is still closing is not.
    pub fn is_open(&self, topic: &str, view: &str) -> bool {
        self.inner
            .open
            .get(&(topic.to_string(), view.to_string()))
            .is_some_and(|slot| matches!(*slot, Slot::Open))
    }
}

/// A successfully opened view.
pub struct ViewHandle {
    inner: Arc<Inner>,
    topic: String,
    options: ViewOptions,
    closed: bool,
}

impl std::fmt::Debug for ViewHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ViewHandle")
            .field("topic", &self.topic)
            .field("view", &self.options.view)
            .finish()
    }
}

impl ViewHandle {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn view(&self) -> &str {
        &self.options.view
    }

    pub fn options(&self) -> &ViewOptions {
        &self.options
    }

    fn key(&self) -> SlotKey {
        (self.topic.clone(), self.options.view.clone())
    }

    pub async fn close(mut self) -> Result<(), ViewError> {
        self.closed = true;
        let key = self.key();
        let done = self.inner.begin_close(&key);
        self.inner.close(key, done).await
    }
}

impl Drop for ViewHandle {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        let key = self.key();
        let done = self.inner.begin_close(&key);

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let inner = self.inner.clone();
                runtime.spawn(async move {
                    let view = key.1.clone();
                    if let Err(e) = inner.close(key, done).await {
                        warn!(target: "Roster/View", "Closing {view} on drop failed: {e}");
                    }
                });
            }
            Err(_) => {
                warn!(target: "Roster/View", "No runtime to close {} on {}", key.1, key.0);
                self.inner.finish_close(&key, done);
            }
        }
    }
}
