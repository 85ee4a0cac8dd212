//! # Chat HTTP Bridge
//!
//! Egress: [`HttpChatTransport`] speaks a Discord-compatible REST surface.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | `reply`  | `POST   {api}/channels/{channel}/messages` |
//! | `edit`   | `PATCH  {api}/channels/{channel}/messages/{id}` |
//! | `delete` | `DELETE {api}/channels/{channel}/messages/{id}` |
//!
//! Ingress: a gateway relay posts each message as JSON to `POST /events`;
//! accepted messages are queued to the dispatcher. `GET /health` reports
//! liveness and queue state.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

use crate::chat::{ChatError, ChatTransport, IncomingMessage, PostedMessage, Reply};

pub const DEFAULT_CHAT_API_URL: &str = "https://discord.com/api/v10";

// ════════════════════════════════════════════════════════════════════════════════
// EGRESS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Serialize)]
struct Embed<'a> {
    description: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

#[derive(Serialize)]
struct MessageReference<'a> {
    message_id: &'a str,
}

#[derive(Serialize)]
struct MessageBody<'a> {
    content: String,
    embeds: [Embed<'a>; 1],
    #[serde(skip_serializing_if = "Option::is_none")]
    message_reference: Option<MessageReference<'a>>,
}

impl<'a> MessageBody<'a> {
    fn new(reply: &'a Reply, reference: Option<&'a str>) -> Self {
        Self {
            content: reply.mention_text(),
            embeds: [Embed {
                description: &reply.description,
                timestamp: reply.timestamp.map(|t| t.to_rfc3339()),
            }],
            message_reference: reference.map(|message_id| MessageReference { message_id }),
        }
    }
}

#[derive(Deserialize)]
struct CreatedMessage {
    id: String,
}

fn map_transport(e: reqwest::Error) -> ChatError {
    ChatError::Network(e.to_string())
}

pub struct HttpChatTransport {
    api_url: String,
    token: String,
    client: Client,
}

impl HttpChatTransport {
    pub fn new(api_url: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self, ChatError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChatError::Network(format!("http client: {}", e)))?;
        Ok(Self {
            api_url: api_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            client,
        })
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.api_url, channel_id)
    }

    fn auth(&self) -> String {
        format!("Bot {}", self.token)
    }

    async fn check(op: &str, resp: reqwest::Response) -> Result<reqwest::Response, ChatError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let t = resp.text().await.unwrap_or_default();
            Err(ChatError::Rejected(format!("{} failed {} {}", op, status, t)))
        }
    }
}

#[async_trait]
impl ChatTransport for HttpChatTransport {
    async fn reply(&self, origin: &IncomingMessage, reply: &Reply) -> Result<PostedMessage, ChatError> {
        let body = MessageBody::new(reply, Some(origin.id.as_str()));
        let resp = self
            .client
            .post(self.messages_url(&origin.channel_id))
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        let created: CreatedMessage = Self::check("create message", resp)
            .await?
            .json()
            .await
            .map_err(|e| ChatError::Rejected(format!("create message: {}", e)))?;
        Ok(PostedMessage {
            channel_id: origin.channel_id.clone(),
            message_id: created.id,
        })
    }

    async fn edit(&self, message: &PostedMessage, reply: &Reply) -> Result<(), ChatError> {
        let body = MessageBody::new(reply, None);
        let url = format!("{}/{}", self.messages_url(&message.channel_id), message.message_id);
        let resp = self
            .client
            .patch(url)
            .header("Authorization", self.auth())
            .json(&body)
            .send()
            .await
            .map_err(map_transport)?;
        Self::check("edit message", resp).await.map(|_| ())
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), ChatError> {
        let url = format!("{}/{}", self.messages_url(channel_id), message_id);
        let resp = self
            .client
            .delete(url)
            .header("Authorization", self.auth())
            .send()
            .await
            .map_err(map_transport)?;
        Self::check("delete message", resp).await.map(|_| ())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// INGRESS
// ════════════════════════════════════════════════════════════════════════════════

struct IngressState {
    inbox: mpsc::Sender<IncomingMessage>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    queue_capacity: usize,
}

/// POST /events: queue one inbound message.
async fn receive_event(
    State(st): State<Arc<IngressState>>,
    Json(message): Json<IncomingMessage>,
) -> StatusCode {
    match st.inbox.try_send(message) {
        Ok(()) => StatusCode::ACCEPTED,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("dispatcher inbox full; rejecting event");
            StatusCode::SERVICE_UNAVAILABLE
        }
        Err(mpsc::error::TrySendError::Closed(_)) => StatusCode::GONE,
    }
}

/// GET /health
async fn health(State(st): State<Arc<IngressState>>) -> Json<HealthResponse> {
    let status = if st.inbox.is_closed() { "stopping" } else { "ok" };
    Json(HealthResponse {
        status,
        queue_capacity: st.inbox.capacity(),
    })
}

pub fn build_ingress_router(inbox: mpsc::Sender<IncomingMessage>) -> Router {
    Router::new()
        .route("/events", post(receive_event))
        .route("/health", get(health))
        .with_state(Arc::new(IngressState { inbox }))
}

/// Serves the ingress until `shutdown` turns true.
pub async fn serve_ingress(
    addr: SocketAddr,
    router: Router,
    mut shutdown: watch::Receiver<bool>,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("ingress listening on http://{}", addr);
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            while !*shutdown.borrow() {
                if shutdown.changed().await.is_err() {
                    break;
                }
            }
            info!("ingress shutting down");
        })
        .await
        .map_err(|e| {
            error!("ingress server error: {}", e);
            e
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};

    #[test]
    fn message_body_shape() {
        let offset = FixedOffset::west_opt(5 * 3600).unwrap();
        let reply = Reply::new("Balance: 10 SLP")
            .mentioning("42")
            .at(offset.with_ymd_and_hms(2021, 8, 2, 21, 4, 5).unwrap());
        let body = MessageBody::new(&reply, Some("m-1"));
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["content"], "<@42>");
        assert_eq!(json["embeds"][0]["description"], "Balance: 10 SLP");
        assert_eq!(json["embeds"][0]["timestamp"], "2021-08-02T21:04:05-05:00");
        assert_eq!(json["message_reference"]["message_id"], "m-1");

        let edit = serde_json::to_value(MessageBody::new(&Reply::new("x"), None)).unwrap();
        assert!(edit.get("message_reference").is_none());
        assert!(edit["embeds"][0].get("timestamp").is_none());
    }

    #[tokio::test]
    async fn events_are_queued_until_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let state = Arc::new(IngressState { inbox: tx });
        let message = IncomingMessage {
            id: "1".into(),
            author_id: "u".into(),
            channel_id: "c".into(),
            content: "!claim".into(),
            roles: Vec::new(),
        };

        let status = receive_event(State(state.clone()), Json(message.clone())).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        let status = receive_event(State(state.clone()), Json(message.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(rx.recv().await, Some(message));
    }
}
