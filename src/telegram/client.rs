//! Production Telegram Client Implementation
//!
//! Implements MessagingClient over the Telegram Bot API (HTTPS + JSON) with
//! long polling. A client is one transport session: the supervisor builds a
//! new one with `connect` after every failure.
//!
//! Error classification:
//! - connection failures, timeouts, HTTP 429 and 5xx: `TransportError::Network`
//! - HTTP 401/404 (bad token): `TransportError::Unauthorized`
//! - other API errors: `TransportError::Api`
//! - undecodable responses: `TransportError::Protocol`
//!
//! The bot token is part of every request URL, so reqwest errors are stripped
//! of their URL before they are logged.

use super::traits::*;
use async_trait::async_trait;
use serde::de::{DeserializeOwned, IgnoredAny};
use serde::Deserialize;
use serde_json::json;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Default Bot API endpoint
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Seconds the server may hold a `getUpdates` request open.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// HTTP timeout: long poll window plus headroom for slow links.
const HTTP_TIMEOUT: Duration = Duration::from_secs(LONG_POLL_TIMEOUT_SECS + 15);

/// Bot API response envelope
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
    error_code: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<TgMessage>,
}

#[derive(Debug, Deserialize)]
struct TgMessage {
    chat: TgChat,
    from: Option<TgUser>,
    text: Option<String>,
    photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct TgChat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct TgUser {
    id: i64,
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    width: u32,
    height: u32,
}

#[derive(Debug, Deserialize)]
struct TgFile {
    file_path: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatInviteLink {
    invite_link: String,
}

/// Telegram Bot API client
///
/// Cloning shares the HTTP connection pool and the update offset.
#[derive(Clone)]
pub struct TelegramClient {
    http: reqwest::Client,
    api_url: Arc<str>,
    token: Arc<str>,
    /// Next `update_id` to request; acknowledges everything before it
    offset: Arc<AtomicI64>,
}

impl TelegramClient {
    /// Build a client without contacting the API.
    pub fn new(token: &str, api_url: &str) -> TransportResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| TransportError::Protocol(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            http,
            api_url: Arc::from(api_url.trim_end_matches('/')),
            token: Arc::from(token.trim()),
            offset: Arc::new(AtomicI64::new(0)),
        })
    }

    /// Build a client, check the token and drop updates queued while the bot
    /// was offline.
    pub async fn connect(token: &str, api_url: &str) -> TransportResult<Self> {
        let client = Self::new(token, api_url)?;

        let me: TgUser = client.call("getMe", json!({})).await?;
        info!(
            "Connected to Telegram as @{} ({})",
            me.username.as_deref().unwrap_or("unknown"),
            me.id
        );

        let _: IgnoredAny = client
            .call("deleteWebhook", json!({ "drop_pending_updates": true }))
            .await?;

        Ok(client)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> TransportResult<T> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(classify_reqwest)?;

        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(classify_reqwest)?;
        decode_response(status, &body)
    }
}

/// Map a transport-level reqwest failure, dropping the token-bearing URL.
fn classify_reqwest(err: reqwest::Error) -> TransportError {
    let err = err.without_url();
    if err.is_decode() {
        TransportError::Protocol(err.to_string())
    } else {
        TransportError::Network(err.to_string())
    }
}

/// Map an API-level failure by status code.
fn classify_status(code: u16, description: String) -> TransportError {
    match code {
        401 | 404 => TransportError::Unauthorized(description),
        429 | 500..=599 => TransportError::Network(format!("HTTP {}: {}", code, description)),
        _ => TransportError::Api { code, description },
    }
}

fn decode_response<T: DeserializeOwned>(status: u16, body: &[u8]) -> TransportResult<T> {
    let envelope: ApiResponse<T> = match serde_json::from_slice(body) {
        Ok(envelope) => envelope,
        // Proxies answer 5xx with HTML; still a network-class failure
        Err(_) if status == 429 || status >= 500 => {
            return Err(classify_status(status, "non-JSON error response".to_string()))
        }
        Err(e) => return Err(TransportError::Protocol(format!("Invalid API response: {}", e))),
    };

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            ok: true,
            result: None,
            ..
        } => Err(TransportError::Protocol("Response without result".to_string())),
        ApiResponse {
            description,
            error_code,
            ..
        } => Err(classify_status(
            error_code.unwrap_or(status),
            description.unwrap_or_else(|| "unknown error".to_string()),
        )),
    }
}

/// Convert an update into an event. Updates without a message or a human
/// sender (channel posts, edits) are dropped.
fn into_event(update: Update) -> Option<InboundEvent> {
    let message = update.message?;
    let sender = message.from?;

    let largest_photo = message
        .photo
        .unwrap_or_default()
        .into_iter()
        .max_by_key(|size| u64::from(size.width) * u64::from(size.height));

    let kind = match (largest_photo, message.text) {
        (Some(photo), _) => EventKind::Photo(AttachmentRef(photo.file_id)),
        (None, Some(text)) => EventKind::from_text(&text),
        (None, None) => EventKind::Other,
    };

    Some(InboundEvent {
        sender: UserId(sender.id),
        chat: ChatId(message.chat.id),
        kind,
    })
}

#[async_trait]
impl MessagingClient for TelegramClient {
    async fn receive_events(&self) -> TransportResult<Vec<InboundEvent>> {
        let offset = self.offset.load(Ordering::SeqCst);
        let updates: Vec<Update> = self
            .call(
                "getUpdates",
                json!({
                    "offset": offset,
                    "timeout": LONG_POLL_TIMEOUT_SECS,
                    "allowed_updates": ["message"],
                }),
            )
            .await?;

        if let Some(last) = updates.iter().map(|u| u.update_id).max() {
            self.offset.fetch_max(last + 1, Ordering::SeqCst);
        }

        Ok(updates.into_iter().filter_map(into_event).collect())
    }

    async fn send_text(&self, chat: &ChatId, text: &str) -> TransportResult<()> {
        let _: IgnoredAny = self
            .call("sendMessage", json!({ "chat_id": chat.0, "text": text }))
            .await?;
        Ok(())
    }

    async fn download_attachment(&self, attachment: &AttachmentRef) -> TransportResult<Vec<u8>> {
        let file: TgFile = self
            .call("getFile", json!({ "file_id": attachment.0 }))
            .await?;
        let file_path = file.file_path.ok_or_else(|| {
            TransportError::Protocol(format!("No download path for file {}", attachment.0))
        })?;

        let url = format!("{}/file/bot{}/{}", self.api_url, self.token, file_path);
        let response = self.http.get(url).send().await.map_err(classify_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            return Err(classify_status(
                status.as_u16(),
                format!("download of file {} failed", attachment.0),
            ));
        }

        let bytes = response.bytes().await.map_err(classify_reqwest)?;
        debug!("Downloaded {} bytes for file {}", bytes.len(), attachment.0);
        Ok(bytes.to_vec())
    }

    async fn create_single_use_invite(&self, group: &GroupId) -> TransportResult<Credential> {
        let link: ChatInviteLink = self
            .call(
                "createChatInviteLink",
                json!({ "chat_id": group.0, "member_limit": 1 }),
            )
            .await?;
        Ok(Credential {
            invite_link: link.invite_link,
        })
    }
}
