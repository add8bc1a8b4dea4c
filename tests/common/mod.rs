use async_trait::async_trait;
use fogbender_roster::transport::{Transport, TransportEvent, TransportFactory};
use serde_json::{Value, json};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

pub type Script = Box<dyn Fn(&Value) -> Option<Value> + Send + Sync>;

/// Plays the server on the other end of the transport: every outbound frame is
/// recorded and answered by `script`, with the request's `msgId` copied over.
/// `Roster.GetRange` answers can be held back and released later.
pub struct FakeServer {
    frames: Mutex<Vec<Value>>,
    script: Script,
    events: Mutex<Option<mpsc::Sender<TransportEvent>>>,
    hold_pages: AtomicBool,
    held: Mutex<Vec<Value>>,
}

impl FakeServer {
    pub fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            frames: Mutex::new(Vec::new()),
            script,
            events: Mutex::new(None),
            hold_pages: AtomicBool::new(false),
            held: Mutex::new(Vec::new()),
        })
    }

    pub fn factory(self: &Arc<Self>) -> Arc<FakeServerFactory> {
        Arc::new(FakeServerFactory {
            server: self.clone(),
        })
    }

    pub fn frames_of(&self, msg_type: &str) -> Vec<Value> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter(|f| f["msgType"] == msg_type)
            .cloned()
            .collect()
    }

    /// Message types of every frame received so far, in order.
    pub fn msg_types(&self) -> Vec<String> {
        self.frames
            .lock()
            .unwrap()
            .iter()
            .filter_map(|f| f["msgType"].as_str().map(str::to_string))
            .collect()
    }

    pub async fn wait_for(&self, msg_type: &str, count: usize) {
        while self.frames_of(msg_type).len() < count {
            tokio::task::yield_now().await;
        }
    }

    pub fn hold_pages(&self) {
        self.hold_pages.store(true, Ordering::SeqCst);
    }

    pub async fn release_pages(&self) {
        let held: Vec<Value> = std::mem::take(&mut *self.held.lock().unwrap());
        for response in held {
            self.deliver(response).await;
        }
    }

    /// Sends a server push.
    pub async fn push(&self, event: Value) {
        self.deliver(event).await;
    }

    async fn deliver(&self, frame: Value) {
        let tx = self.events.lock().unwrap().clone();
        if let Some(tx) = tx {
            let _ = tx.send(TransportEvent::FrameReceived(frame.to_string())).await;
        }
    }
}

#[async_trait]
impl Transport for FakeServer {
    async fn send_frame(&self, frame: &str) -> Result<(), anyhow::Error> {
        let request: Value = serde_json::from_str(frame)?;
        self.frames.lock().unwrap().push(request.clone());

        let Some(mut response) = (self.script)(&request) else {
            return Ok(());
        };
        response["msgId"] = request["msgId"].clone();
        if request["msgType"] == "Roster.GetRange" && self.hold_pages.load(Ordering::SeqCst) {
            self.held.lock().unwrap().push(response);
        } else {
            self.deliver(response).await;
        }
        Ok(())
    }

    async fn disconnect(&self) {}
}

pub struct FakeServerFactory {
    server: Arc<FakeServer>,
}

#[async_trait]
impl TransportFactory for FakeServerFactory {
    async fn create_transport(
        &self,
    ) -> Result<(Arc<dyn Transport>, mpsc::Receiver<TransportEvent>), anyhow::Error> {
        let (tx, rx) = mpsc::channel(100);
        tx.send(TransportEvent::Connected).await?;
        *self.server.events.lock().unwrap() = Some(tx);
        Ok((self.server.clone(), rx))
    }
}

pub fn section(view: &str, id: &str, count: usize, pos: usize) -> Value {
    json!({"msgType": "Event.RosterSection", "id": id, "name": id, "view": view, "count": count, "pos": pos})
}

pub fn room(view: &str, section_id: &str, pos: usize) -> Value {
    json!({
        "msgType": "Event.RosterRoom",
        "view": view,
        "room": {"id": format!("{section_id}-{pos}"), "name": format!("{section_id} #{pos}")},
        "sections": {section_id: pos}
    })
}

/// Serves `(section id, count, rows in the initial snapshot)` for every view, pages
/// from `Roster.GetRange`, and acknowledges closes with `close_reply`.
pub fn roster_script(sections: &[(&str, usize, usize)], close_reply: Value) -> Script {
    let sections: Vec<(String, usize, usize)> = sections
        .iter()
        .map(|(id, count, loaded)| (id.to_string(), *count, *loaded))
        .collect();
    Box::new(move |request| {
        let view = request["view"].as_str().unwrap_or_default();
        match request["msgType"].as_str()? {
            "Roster.OpenView" => {
                let mut items = Vec::new();
                for (i, (id, count, loaded)) in sections.iter().enumerate() {
                    items.push(section(view, id, *count, i + 1));
                    items.extend((1..=*loaded).map(|pos| room(view, id, pos)));
                }
                Some(json!({"msgType": "Roster.OpenViewOk", "items": items}))
            }
            "Roster.CloseView" => Some(close_reply.clone()),
            "Roster.GetRange" => {
                let section_id = request["sectionId"].as_str()?;
                let start = request["startPos"].as_u64()? as usize;
                let limit = request["limit"].as_u64()? as usize;
                let count = sections
                    .iter()
                    .find(|(id, _, _)| id == section_id)
                    .map_or(0, |(_, count, _)| *count);
                let items: Vec<Value> = (start..(start + limit).min(count + 1))
                    .map(|pos| room(view, section_id, pos))
                    .collect();
                Some(json!({"msgType": "Roster.GetOk", "items": items}))
            }
            "Ping.Ping" => Some(json!({"msgType": "Ping.Pong"})),
            _ => None,
        }
    })
}
