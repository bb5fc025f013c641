use crate::http::types::{HttpError, SetWebhookResponse, StatusResponse};
use crate::http::HttpState;
use crate::telegram::types::Update;
use crate::telegram::{classify, UpdateKind};
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header::HOST;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Json;
use tracing::{debug, error, info, warn};

/// Telegram retries any delivery that is not answered with a 2xx, so every
/// update is acknowledged whatever happens while relaying it.
pub async fn webhook(State(state): State<HttpState>, body: Bytes) -> Json<StatusResponse> {
    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("Discarding unparseable webhook update: {e}");
            return StatusResponse::ok();
        }
    };

    match classify(&update) {
        UpdateKind::Text { chat_id, text } => {
            if let Err(e) = state.relay.handle_message(chat_id, &text).await {
                error!("Failed to send reply to chat {chat_id}: {e}");
            }
        }
        UpdateKind::Command { chat_id, command } => {
            debug!("Ignoring command {command} from chat {chat_id}");
        }
        UpdateKind::Other => {
            debug!("Ignoring non-text update {:?}", update.update_id);
        }
    }

    StatusResponse::ok()
}

pub async fn set_webhook(
    State(state): State<HttpState>,
    headers: HeaderMap,
    uri: Uri,
) -> Result<Json<SetWebhookResponse>, HttpError> {
    // HTTP/2 requests carry the host in the URI authority instead of a Host header.
    let host = headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .filter(|host| !host.is_empty())
        .ok_or(HttpError {
            status: StatusCode::BAD_REQUEST,
            message: "Missing host header".to_string(),
        })?;

    let url = format!("https://{host}/webhook");
    let success = match state
        .relay
        .telegram()
        .set_webhook(&url, state.webhook_secret.as_deref())
        .await
    {
        Ok(success) => {
            info!("Webhook registration for {url} returned {success}");
            success
        }
        Err(e) => {
            error!("Failed to register webhook {url}: {e}");
            false
        }
    };

    Ok(Json(SetWebhookResponse { success, url }))
}

pub async fn health() -> Json<StatusResponse> {
    StatusResponse::healthy()
}
