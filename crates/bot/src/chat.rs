//! # Chat Collaborator
//!
//! Narrow interface to the chat platform: inbound messages, replies, edits
//! and deletions, plus the role-based permission check.
//!
//! The flows only ever talk to [`ChatTransport`]; the HTTP bridge lives in
//! [`crate::webhook`] and [`MockChatTransport`] records traffic for tests.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Notify;

// ════════════════════════════════════════════════════════════════════════════════
// MESSAGES
// ════════════════════════════════════════════════════════════════════════════════

/// A message as delivered by the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingMessage {
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
    /// Role names held by the author in the originating guild.
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Outgoing message body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    /// User to mention above the body.
    pub mention: Option<String>,
    pub description: String,
    pub timestamp: Option<DateTime<FixedOffset>>,
}

impl Reply {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            mention: None,
            description: description.into(),
            timestamp: None,
        }
    }

    pub fn mentioning(mut self, user_id: &str) -> Self {
        self.mention = Some(user_id.to_string());
        self
    }

    pub fn at(mut self, timestamp: DateTime<FixedOffset>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// `<@id>` mention text, empty when nobody is mentioned.
    pub fn mention_text(&self) -> String {
        self.mention
            .as_ref()
            .map(|id| format!("<@{}>", id))
            .unwrap_or_default()
    }
}

/// Handle to a message the bot posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedMessage {
    pub channel_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    #[error("chat network error: {0}")]
    Network(String),

    #[error("chat api rejected the request: {0}")]
    Rejected(String),
}

// ════════════════════════════════════════════════════════════════════════════════
// TRANSPORT
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Posts `reply` in the channel of `origin`, referencing it.
    async fn reply(&self, origin: &IncomingMessage, reply: &Reply) -> Result<PostedMessage, ChatError>;

    /// Replaces the body of a message the bot posted earlier.
    async fn edit(&self, message: &PostedMessage, reply: &Reply) -> Result<(), ChatError>;

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), ChatError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// PERMISSIONS
// ════════════════════════════════════════════════════════════════════════════════

pub trait PermissionCheck: Send + Sync {
    /// Does the author of `message` hold an elevated role.
    fn has_elevated_role(&self, message: &IncomingMessage) -> bool;
}

/// Elevated when the author holds a role with this exact name.
#[derive(Debug, Clone)]
pub struct RolePermission {
    role: String,
}

impl RolePermission {
    pub fn new(role: impl Into<String>) -> Self {
        Self { role: role.into() }
    }
}

impl Default for RolePermission {
    fn default() -> Self {
        Self::new("Admin")
    }
}

impl PermissionCheck for RolePermission {
    fn has_elevated_role(&self, message: &IncomingMessage) -> bool {
        message.roles.iter().any(|r| r == &self.role)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// MOCK TRANSPORT
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Replied {
        channel_id: String,
        message_id: String,
        reply: Reply,
    },
    Edited {
        message_id: String,
        reply: Reply,
    },
    Deleted {
        channel_id: String,
        message_id: String,
    },
}

/// Records every call in order. Posted messages get ids `bot-1`, `bot-2`, ...
#[derive(Default)]
pub struct MockChatTransport {
    events: Mutex<Vec<ChatEvent>>,
    changed: Notify,
}

impl MockChatTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<ChatEvent> {
        self.events.lock().clone()
    }

    /// Descriptions of every reply and edit, in order.
    pub fn descriptions(&self) -> Vec<String> {
        self.events
            .lock()
            .iter()
            .filter_map(|e| match e {
                ChatEvent::Replied { reply, .. } | ChatEvent::Edited { reply, .. } => {
                    Some(reply.description.clone())
                }
                ChatEvent::Deleted { .. } => None,
            })
            .collect()
    }

    pub fn last_description(&self) -> Option<String> {
        self.descriptions().pop()
    }

    /// Waits until at least `count` events were recorded.
    pub async fn wait_for_events(&self, count: usize, timeout: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.changed.notified();
                if self.events.lock().len() >= count {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(timeout, wait).await.is_ok()
    }

    fn record(&self, event: ChatEvent) {
        self.events.lock().push(event);
        self.changed.notify_waiters();
    }
}

#[async_trait]
impl ChatTransport for MockChatTransport {
    async fn reply(&self, origin: &IncomingMessage, reply: &Reply) -> Result<PostedMessage, ChatError> {
        let message_id = {
            let events = self.events.lock();
            let posted = events
                .iter()
                .filter(|e| matches!(e, ChatEvent::Replied { .. }))
                .count();
            format!("bot-{}", posted + 1)
        };
        self.record(ChatEvent::Replied {
            channel_id: origin.channel_id.clone(),
            message_id: message_id.clone(),
            reply: reply.clone(),
        });
        Ok(PostedMessage {
            channel_id: origin.channel_id.clone(),
            message_id,
        })
    }

    async fn edit(&self, message: &PostedMessage, reply: &Reply) -> Result<(), ChatError> {
        self.record(ChatEvent::Edited {
            message_id: message.message_id.clone(),
            reply: reply.clone(),
        });
        Ok(())
    }

    async fn delete(&self, channel_id: &str, message_id: &str) -> Result<(), ChatError> {
        self.record(ChatEvent::Deleted {
            channel_id: channel_id.to_string(),
            message_id: message_id.to_string(),
        });
        Ok(())
    }
}
