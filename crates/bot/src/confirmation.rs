//! # Confirmation Gate
//!
//! Holds a balance-moving command until the invoker answers `yes` in the
//! channel the command came from.
//!
//! ```text
//!            register(invoker, channel)
//!                      │
//!                      ▼
//!          ┌─ AWAITING_CONFIRMATION ─┐
//!          │           │             │
//!   no reply in    first reply    shutdown
//!     window       from invoker      │
//!          │           │             ▼
//!          ▼           ▼          CANCELLED
//!      TIMED_OUT   evaluate_reply
//!                   │        │
//!                   ▼        ▼
//!              CONFIRMED   REJECTED
//! ```
//!
//! Messages from other identities never reach a waiter: [`ConfirmationGate::offer`]
//! routes by author, so only the invoker's first reply decides the outcome.
//! The waiter is registered before the prompt is posted, so a fast reply
//! cannot slip past the gate.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{oneshot, watch};
use tracing::debug;

use crate::chat::IncomingMessage;

/// How long the invoker has to answer.
pub const CONFIRMATION_WINDOW: Duration = Duration::from_secs(60);

/// Reply text accepted as confirmation (compared case-insensitively).
pub const CONFIRMATION_WORD: &str = "yes";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationOutcome {
    /// Carries the confirming message so the caller can delete it.
    Confirmed { reply: IncomingMessage },
    Rejected,
    TimedOut,
    Cancelled,
}

impl ConfirmationOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, ConfirmationOutcome::Confirmed { .. })
    }
}

/// Decides what a reply means for a prompt issued to `invoker` in `channel_id`.
/// Returns `None` for messages from anyone else.
pub fn evaluate_reply(
    invoker: &str,
    channel_id: &str,
    reply: &IncomingMessage,
) -> Option<ConfirmationOutcome> {
    if reply.author_id != invoker {
        return None;
    }
    if reply.channel_id != channel_id {
        return Some(ConfirmationOutcome::Rejected);
    }
    if reply.content.trim().eq_ignore_ascii_case(CONFIRMATION_WORD) {
        Some(ConfirmationOutcome::Confirmed {
            reply: reply.clone(),
        })
    } else {
        Some(ConfirmationOutcome::Rejected)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// GATE
// ════════════════════════════════════════════════════════════════════════════════

struct Waiter {
    ticket: u64,
    sender: oneshot::Sender<IncomingMessage>,
}

type WaiterMap = Arc<Mutex<HashMap<String, Waiter>>>;

/// Routes invoker replies to the flow waiting on them.
pub struct ConfirmationGate {
    waiters: WaiterMap,
    tickets: AtomicU64,
    shutdown: watch::Receiver<bool>,
}

impl ConfirmationGate {
    /// `shutdown` flipping to `true` cancels every pending wait.
    pub fn new(shutdown: watch::Receiver<bool>) -> Self {
        Self {
            waiters: Arc::new(Mutex::new(HashMap::new())),
            tickets: AtomicU64::new(1),
            shutdown,
        }
    }

    /// A gate that is never cancelled.
    pub fn detached() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self::new(rx)
    }

    /// Starts awaiting a reply from `invoker`. Replaces an older registration
    /// for the same invoker, which then resolves as cancelled.
    pub fn register(&self, invoker: &str, channel_id: &str) -> PendingConfirmation {
        let (sender, receiver) = oneshot::channel();
        let ticket = self.tickets.fetch_add(1, Ordering::Relaxed);
        self.waiters
            .lock()
            .insert(invoker.to_string(), Waiter { ticket, sender });
        PendingConfirmation {
            waiters: self.waiters.clone(),
            ticket,
            invoker: invoker.to_string(),
            channel_id: channel_id.to_string(),
            receiver,
            shutdown: self.shutdown.clone(),
        }
    }

    /// Hands `message` to the flow waiting on its author. Returns `false`
    /// when nobody is waiting on that author.
    pub fn offer(&self, message: &IncomingMessage) -> bool {
        let Some(waiter) = self.waiters.lock().remove(&message.author_id) else {
            return false;
        };
        debug!(author = %message.author_id, "confirmation reply received");
        waiter.sender.send(message.clone()).is_ok()
    }

    pub fn is_awaiting(&self, invoker: &str) -> bool {
        self.waiters.lock().contains_key(invoker)
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.lock().len()
    }
}

/// A registered wait. Dropping it withdraws the registration.
pub struct PendingConfirmation {
    waiters: WaiterMap,
    ticket: u64,
    invoker: String,
    channel_id: String,
    receiver: oneshot::Receiver<IncomingMessage>,
    shutdown: watch::Receiver<bool>,
}

impl PendingConfirmation {
    /// Waits up to `window` for the invoker's first reply.
    pub async fn wait(mut self, window: Duration) -> ConfirmationOutcome {
        if *self.shutdown.borrow() {
            return ConfirmationOutcome::Cancelled;
        }
        let mut shutdown = self.shutdown.clone();

        tokio::select! {
            received = tokio::time::timeout(window, &mut self.receiver) => match received {
                Ok(Ok(reply)) => evaluate_reply(&self.invoker, &self.channel_id, &reply)
                    .unwrap_or(ConfirmationOutcome::Rejected),
                Ok(Err(_)) => ConfirmationOutcome::Cancelled,
                Err(_) => ConfirmationOutcome::TimedOut,
            },
            _ = shutdown_signalled(&mut shutdown) => ConfirmationOutcome::Cancelled,
        }
    }
}

impl Drop for PendingConfirmation {
    fn drop(&mut self) {
        let mut waiters = self.waiters.lock();
        if waiters.get(&self.invoker).map(|w| w.ticket) == Some(self.ticket) {
            waiters.remove(&self.invoker);
        }
    }
}

async fn shutdown_signalled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone: shutdown can no longer be signalled.
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(author: &str, channel: &str, content: &str) -> IncomingMessage {
        IncomingMessage {
            id: format!("{}-{}", author, content),
            author_id: author.into(),
            channel_id: channel.into(),
            content: content.into(),
            roles: Vec::new(),
        }
    }

    #[test]
    fn evaluate_reply_rules() {
        assert_eq!(evaluate_reply("u1", "c1", &msg("u2", "c1", "yes")), None);
        assert!(evaluate_reply("u1", "c1", &msg("u1", "c1", "  YeS \n"))
            .unwrap()
            .is_confirmed());
        assert_eq!(
            evaluate_reply("u1", "c1", &msg("u1", "c2", "yes")),
            Some(ConfirmationOutcome::Rejected)
        );
        assert_eq!(
            evaluate_reply("u1", "c1", &msg("u1", "c1", "yes please")),
            Some(ConfirmationOutcome::Rejected)
        );
    }

    #[tokio::test]
    async fn confirms_on_invoker_yes() {
        let gate = ConfirmationGate::detached();
        let pending = gate.register("u1", "c1");
        assert!(!gate.offer(&msg("u2", "c1", "yes")));
        assert!(gate.offer(&msg("u1", "c1", "Yes")));
        let outcome = pending.wait(Duration::from_secs(1)).await;
        assert!(outcome.is_confirmed());
        assert_eq!(gate.pending_count(), 0);
    }

    #[tokio::test]
    async fn first_invoker_reply_decides() {
        let gate = ConfirmationGate::detached();
        let pending = gate.register("u1", "c1");
        assert!(gate.offer(&msg("u1", "c1", "no")));
        // Later replies find no waiter.
        assert!(!gate.offer(&msg("u1", "c1", "yes")));
        assert_eq!(pending.wait(Duration::from_secs(1)).await, ConfirmationOutcome::Rejected);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_and_withdraws() {
        let gate = ConfirmationGate::detached();
        let pending = gate.register("u1", "c1");
        assert_eq!(pending.wait(CONFIRMATION_WINDOW).await, ConfirmationOutcome::TimedOut);
        assert!(!gate.is_awaiting("u1"));
        assert!(!gate.offer(&msg("u1", "c1", "yes")));
    }

    #[tokio::test]
    async fn shutdown_cancels_wait() {
        let (tx, rx) = watch::channel(false);
        let gate = ConfirmationGate::new(rx);
        let pending = gate.register("u1", "c1");
        let task = tokio::spawn(pending.wait(CONFIRMATION_WINDOW));
        tx.send(true).unwrap();
        assert_eq!(task.await.unwrap(), ConfirmationOutcome::Cancelled);
    }

    #[tokio::test]
    async fn replaced_registration_is_cancelled() {
        let gate = ConfirmationGate::detached();
        let first = gate.register("u1", "c1");
        let second = gate.register("u1", "c1");
        assert_eq!(first.wait(Duration::from_secs(1)).await, ConfirmationOutcome::Cancelled);
        // Dropping the stale registration left the new one in place.
        assert!(gate.is_awaiting("u1"));
        drop(second);
        assert!(!gate.is_awaiting("u1"));
    }
}
