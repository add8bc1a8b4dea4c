use crate::request::{RequestError, ServerCall};
use fogbender_core::schema::{Request, Response};
use log::{error, info};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Request(#[from] RequestError),
    #[error("expected Message.Ok, got {0}")]
    UnexpectedResponse(String),
}

/// Asks the server to re-sign the download URLs of a message's files. The message
/// then arrives again with fresh URLs; the returned id is the one to watch for.
pub async fn refresh_files(
    caller: &dyn ServerCall,
    message_id: &str,
) -> Result<String, RefreshError> {
    info!(target: "Files/Refresh", "fetching new download url for {message_id}");
    let request = Request::MessageRefreshFiles {
        message_id: message_id.to_string(),
    };
    match caller.call(request).await? {
        Response::MessageOk { message_id: id } => Ok(id.unwrap_or_else(|| message_id.to_string())),
        other => {
            error!(
                target: "Files/Refresh",
                "Expected Message.Ok for {message_id}, got {}: {other:?}",
                other.msg_type()
            );
            Err(RefreshError::UnexpectedResponse(other.msg_type().to_string()))
        }
    }
}
