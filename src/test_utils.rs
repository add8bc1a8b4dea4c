use crate::request::{RequestError, ServerCall};
use async_trait::async_trait;
use fogbender_core::SessionContext;
use fogbender_core::schema::{
    EventRoom, EventRosterRoom, EventRosterSection, Request, Response, RosterEvent,
};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Semaphore;

pub type Responder = Box<dyn Fn(&Request) -> Response + Send + Sync>;

/// In-memory server: records every request and answers with a scripted responder.
/// `Roster.GetRange` can be held until the test releases it.
pub struct ScriptedServer {
    session: Mutex<SessionContext>,
    calls: Mutex<Vec<Request>>,
    responder: Responder,
    hold_loads: AtomicBool,
    load_gate: Semaphore,
}

impl ScriptedServer {
    pub fn new(session: SessionContext, responder: Responder) -> Self {
        Self {
            session: Mutex::new(session),
            calls: Mutex::new(Vec::new()),
            responder,
            hold_loads: AtomicBool::new(false),
            load_gate: Semaphore::new(0),
        }
    }

    /// Serves `sections` as `(id, count, rows returned by OpenView)` for any view.
    pub fn roster(session: SessionContext, sections: &[(&str, usize, usize)]) -> Self {
        let sections: Vec<(String, usize, usize)> = sections
            .iter()
            .map(|(id, count, loaded)| (id.to_string(), *count, *loaded))
            .collect();
        Self::new(
            session,
            Box::new(move |request| roster_response(&sections, request)),
        )
    }

    pub fn set_session(&self, session: SessionContext) {
        *self.session.lock().unwrap() = session;
    }

    pub fn calls(&self) -> Vec<Request> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_of(&self, msg_type: &str) -> Vec<Request> {
        self.calls()
            .into_iter()
            .filter(|r| r.msg_type() == msg_type)
            .collect()
    }

    pub fn hold_loads(&self) {
        self.hold_loads.store(true, Ordering::SeqCst);
    }

    pub fn release_load(&self) {
        self.load_gate.add_permits(1);
    }

    pub async fn wait_for_calls(&self, msg_type: &str, count: usize) {
        while self.calls_of(msg_type).len() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[async_trait]
impl ServerCall for ScriptedServer {
    async fn call(&self, request: Request) -> Result<Response, RequestError> {
        self.calls.lock().unwrap().push(request.clone());
        if matches!(request, Request::RosterGetRange { .. }) && self.hold_loads.load(Ordering::SeqCst)
        {
            self.load_gate
                .acquire()
                .await
                .map_err(|_| RequestError::InternalChannelClosed)?
                .forget();
        }
        Ok((self.responder)(&request))
    }

    fn session(&self) -> SessionContext {
        self.session.lock().unwrap().clone()
    }
}

pub fn agent_session() -> SessionContext {
    SessionContext::agent("fog-1", "w1")
}

pub fn section_event(view: &str, id: &str, count: usize, pos: i64) -> RosterEvent {
    RosterEvent::Section(EventRosterSection {
        id: id.to_string(),
        name: id.to_string(),
        view: view.to_string(),
        count,
        pos,
        ..Default::default()
    })
}

pub fn room_event(view: &str, section_id: &str, pos: usize) -> RosterEvent {
    let room_id = format!("{section_id}-{pos}");
    RosterEvent::Room(EventRosterRoom {
        view: view.to_string(),
        room: EventRoom {
            id: room_id.clone(),
            name: room_id,
            ..Default::default()
        },
        badge: None,
        sections: [(section_id.to_string(), pos)].into_iter().collect(),
    })
}

fn roster_response(sections: &[(String, usize, usize)], request: &Request) -> Response {
    match request {
        Request::RosterOpenView { view, .. } => {
            let mut items = Vec::new();
            for (i, (id, count, loaded)) in sections.iter().enumerate() {
                items.push(section_event(view, id, *count, i as i64 + 1));
                for pos in 1..=*loaded {
                    items.push(room_event(view, id, pos));
                }
            }
            Response::RosterOpenViewOk { items }
        }
        Request::RosterCloseView { .. } => Response::RosterCloseViewOk,
        Request::RosterGetRange {
            view,
            section_id,
            start_pos,
            limit,
            ..
        } => {
            let count = sections
                .iter()
                .find(|(id, _, _)| id == section_id)
                .map(|(_, count, _)| *count)
                .unwrap_or(0);
            let end = (*start_pos + *limit as usize).min(count + 1);
            let items = (*start_pos..end)
                .map(|pos| room_event(view, section_id, pos))
                .collect();
            Response::RosterGetOk { items }
        }
        Request::SearchRoster { term, .. } => Response::SearchOk {
            items: vec![EventRoom {
                id: format!("match-{term}"),
                name: term.clone(),
                ..Default::default()
            }],
        },
        Request::MessageRefreshFiles { message_id } => Response::MessageOk {
            message_id: Some(message_id.clone()),
        },
        Request::Ping => Response::PingPong,
    }
}
