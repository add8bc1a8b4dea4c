//! Wire schema for the roster protocol.
//!
//! Every frame is a JSON object carrying a `msgType` discriminator. Requests get a
//! `msgId` assigned by the client; responses echo it back. Frames whose `msgType`
//! starts with `Event.` are server pushes and carry no pairing id.

use crate::view::{ViewFilters, ViewOptions};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

pub type RosterSectionId = String;

const EVENT_PREFIX: &str = "Event.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomType {
    Dialog,
    #[default]
    Public,
    Private,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tag {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMessage {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub plain_text: Option<String>,
    #[serde(default)]
    pub from_name: Option<String>,
    /// Microseconds since the epoch.
    #[serde(default)]
    pub created_ts: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRoom {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub customer_name: String,
    #[serde(default)]
    pub helpdesk_id: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default, rename = "type")]
    pub room_type: RoomType,
    #[serde(default)]
    pub created_ts: i64,
    #[serde(default)]
    pub updated_ts: i64,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub is_triage: bool,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub last_message: Option<EventMessage>,
    #[serde(default)]
    pub remove: bool,
}

impl EventRoom {
    /// Priority label from a `:priority:<level>` tag, if the room carries one.
    pub fn priority(&self) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.name.starts_with(":priority"))
            .and_then(|t| t.name.split(':').nth(2))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventBadge {
    pub room_id: String,
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub mentions_count: u32,
    #[serde(default)]
    pub last_room_message: Option<EventMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SectionEntity {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRosterSection {
    pub id: RosterSectionId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub pos: i64,
    #[serde(default)]
    pub view: String,
    /// Total rows the server claims for this section, not what is loaded locally.
    #[serde(default)]
    pub count: usize,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub unresolved_count: u32,
    #[serde(default)]
    pub mentions_count: u32,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub entity: Option<SectionEntity>,
}

impl EventRosterSection {
    /// Placeholder used when a room references a section we have not heard of yet.
    pub fn placeholder(id: &str, view: &str) -> Self {
        Self {
            id: id.to_string(),
            name: id.to_string(),
            view: view.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRosterRoom {
    #[serde(default)]
    pub view: String,
    pub room: EventRoom,
    #[serde(default)]
    pub badge: Option<EventBadge>,
    /// Section id to 1-based position.
    #[serde(default)]
    pub sections: BTreeMap<RosterSectionId, usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "msgType")]
pub enum RosterEvent {
    #[serde(rename = "Event.RosterSection")]
    Section(EventRosterSection),
    #[serde(rename = "Event.RosterRoom")]
    Room(EventRosterRoom),
}

impl RosterEvent {
    pub fn view(&self) -> &str {
        match self {
            RosterEvent::Section(s) => &s.view,
            RosterEvent::Room(r) => &r.view,
        }
    }
}

/// Requests the roster client can issue.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "msgType")]
pub enum Request {
    #[serde(rename = "Roster.OpenView", rename_all = "camelCase")]
    RosterOpenView {
        topic: String,
        view: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        sections: Option<Vec<String>>,
        #[serde(skip_serializing_if = "Option::is_none")]
        filters: Option<ViewFilters>,
        #[serde(skip_serializing_if = "Option::is_none")]
        limit: Option<u32>,
    },
    #[serde(rename = "Roster.CloseView")]
    RosterCloseView { topic: String, view: String },
    #[serde(rename = "Roster.GetRange", rename_all = "camelCase")]
    RosterGetRange {
        topic: String,
        view: String,
        section_id: RosterSectionId,
        start_pos: usize,
        limit: u32,
    },
    #[serde(rename = "Search.Roster", rename_all = "camelCase")]
    SearchRoster {
        #[serde(skip_serializing_if = "Option::is_none")]
        workspace_id: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        helpdesk_id: Option<String>,
        term: String,
        term_fields: Vec<String>,
    },
    #[serde(rename = "Message.RefreshFiles", rename_all = "camelCase")]
    MessageRefreshFiles { message_id: String },
    #[serde(rename = "Ping.Ping")]
    Ping,
}

impl Request {
    pub fn open_view(topic: &str, options: &ViewOptions) -> Self {
        Request::RosterOpenView {
            topic: topic.to_string(),
            view: options.view.clone(),
            sections: options.sections.clone(),
            filters: options.filters.clone(),
            limit: options.limit,
        }
    }

    pub fn close_view(topic: &str, view: &str) -> Self {
        Request::RosterCloseView {
            topic: topic.to_string(),
            view: view.to_string(),
        }
    }

    pub fn msg_type(&self) -> &'static str {
        match self {
            Request::RosterOpenView { .. } => "Roster.OpenView",
            Request::RosterCloseView { .. } => "Roster.CloseView",
            Request::RosterGetRange { .. } => "Roster.GetRange",
            Request::SearchRoster { .. } => "Search.Roster",
            Request::MessageRefreshFiles { .. } => "Message.RefreshFiles",
            Request::Ping => "Ping.Ping",
        }
    }

    /// Serializes the request with its pairing id attached.
    pub fn to_frame(&self, msg_id: &str) -> Result<String, serde_json::Error> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            map.insert("msgId".into(), Value::String(msg_id.to_string()));
        }
        serde_json::to_string(&value)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "msgType")]
pub enum Response {
    #[serde(rename = "Roster.OpenViewOk")]
    RosterOpenViewOk {
        #[serde(default)]
        items: Vec<RosterEvent>,
    },
    #[serde(rename = "Roster.CloseViewOk")]
    RosterCloseViewOk,
    #[serde(rename = "Roster.GetOk")]
    RosterGetOk {
        #[serde(default)]
        items: Vec<RosterEvent>,
    },
    #[serde(rename = "Roster.Err")]
    RosterErr {
        #[serde(default)]
        code: Option<u16>,
        #[serde(default)]
        error: Option<String>,
    },
    #[serde(rename = "Search.Ok")]
    SearchOk {
        #[serde(default)]
        items: Vec<EventRoom>,
    },
    #[serde(rename = "Message.Ok", rename_all = "camelCase")]
    MessageOk {
        #[serde(default)]
        message_id: Option<String>,
    },
    #[serde(rename = "Ping.Pong")]
    PingPong,
    /// Anything this client does not model, kept verbatim for error reporting.
    #[serde(skip)]
    Unexpected { msg_type: String, body: Value },
}

impl Response {
    /// Decodes a response body. Never fails: unknown or malformed bodies become
    /// [`Response::Unexpected`].
    pub fn from_value(body: Value) -> Self {
        match serde_json::from_value::<Response>(body.clone()) {
            Ok(response) => response,
            Err(e) => {
                let msg_type = msg_type_of(&body).unwrap_or_default().to_string();
                debug!("Keeping {msg_type:?} response undecoded: {e}");
                Response::Unexpected { msg_type, body }
            }
        }
    }

    pub fn msg_type(&self) -> &str {
        match self {
            Response::RosterOpenViewOk { .. } => "Roster.OpenViewOk",
            Response::RosterCloseViewOk => "Roster.CloseViewOk",
            Response::RosterGetOk { .. } => "Roster.GetOk",
            Response::RosterErr { .. } => "Roster.Err",
            Response::SearchOk { .. } => "Search.Ok",
            Response::MessageOk { .. } => "Message.Ok",
            Response::PingPong => "Ping.Pong",
            Response::Unexpected { msg_type, .. } => msg_type,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Response::RosterErr { code: Some(404), .. })
    }
}

/// Server-pushed events the roster cares about.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    Roster(RosterEvent),
    Other { msg_type: String, body: Value },
}

/// A decoded inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Response { msg_id: String, body: Value },
    Event(ServerEvent),
}

#[derive(Debug, thiserror::Error)]
pub enum InboundError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no msgType")]
    MissingMsgType,
    #[error("{0} response has no msgId")]
    MissingMsgId(String),
}

impl Inbound {
    pub fn parse(text: &str) -> Result<Self, InboundError> {
        let body: Value = serde_json::from_str(text)?;
        let msg_type = msg_type_of(&body)
            .ok_or(InboundError::MissingMsgType)?
            .to_string();

        if msg_type.starts_with(EVENT_PREFIX) {
            let event = match serde_json::from_value::<RosterEvent>(body.clone()) {
                Ok(roster) => ServerEvent::Roster(roster),
                Err(_) => ServerEvent::Other { msg_type, body },
            };
            return Ok(Inbound::Event(event));
        }

        let msg_id = body
            .get("msgId")
            .and_then(Value::as_str)
            .ok_or(InboundError::MissingMsgId(msg_type))?
            .to_string();
        Ok(Inbound::Response { msg_id, body })
    }
}

fn msg_type_of(body: &Value) -> Option<&str> {
    body.get("msgType").and_then(Value::as_str)
}
