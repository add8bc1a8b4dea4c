/// What the connection knows about the signed-in session.
///
/// Admin (vendor) sessions carry a workspace id, embedded widget sessions carry a
/// helpdesk id. Before authentication completes neither is known.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionContext {
    pub fog_session_id: Option<String>,
    pub workspace_id: Option<String>,
    pub helpdesk_id: Option<String>,
    pub user_id: Option<String>,
}

impl SessionContext {
    pub fn agent(session_id: impl Into<String>, workspace_id: impl Into<String>) -> Self {
        Self {
            fog_session_id: Some(session_id.into()),
            workspace_id: Some(workspace_id.into()),
            ..Default::default()
        }
    }

    pub fn user(session_id: impl Into<String>, helpdesk_id: impl Into<String>) -> Self {
        Self {
            fog_session_id: Some(session_id.into()),
            helpdesk_id: Some(helpdesk_id.into()),
            ..Default::default()
        }
    }

    /// Roster topic for this session, or `None` while unauthenticated.
    pub fn roster_topic(&self) -> Option<String> {
        self.fog_session_id.as_ref()?;
        roster_topic(self.workspace_id.as_deref(), self.helpdesk_id.as_deref())
    }
}

/// `workspace/{id}/roster` wins over `helpdesk/{id}/roster`.
pub fn roster_topic(workspace_id: Option<&str>, helpdesk_id: Option<&str>) -> Option<String> {
    match (workspace_id, helpdesk_id) {
        (Some(w), _) => Some(format!("workspace/{w}/roster")),
        (None, Some(h)) => Some(format!("helpdesk/{h}/roster")),
        (None, None) => None,
    }
}
