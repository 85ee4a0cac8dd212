//! Shared state handed to every command flow.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use slp_common::{BotConfig, PayoutError};

use crate::chain::{ChainClient, ChainError};
use crate::chat::{ChatTransport, IncomingMessage, PermissionCheck, PostedMessage, Reply};
use crate::confirmation::{
    ConfirmationGate, ConfirmationOutcome, PendingConfirmation, CONFIRMATION_WINDOW,
};
use crate::in_flight::InFlightRegistry;
use crate::ledger::LedgerLogger;
use crate::nonce_cache::NonceCache;
use crate::transfer_executor::INTER_SUBMISSION_PAUSE;

/// Tunables of the command surface.
#[derive(Debug, Clone)]
pub struct BotSettings {
    /// Text that precedes every command.
    pub prefix: String,
    pub confirmation_window: Duration,
    pub transfer_pause: Duration,
}

impl Default for BotSettings {
    fn default() -> Self {
        Self {
            prefix: "!".to_string(),
            confirmation_window: CONFIRMATION_WINDOW,
            transfer_pause: INTER_SUBMISSION_PAUSE,
        }
    }
}

pub struct BotContext {
    pub config: BotConfig,
    pub chain: Arc<dyn ChainClient>,
    pub chat: Arc<dyn ChatTransport>,
    pub ledger: LedgerLogger,
    pub permissions: Arc<dyn PermissionCheck>,
    pub nonces: NonceCache,
    pub gate: ConfirmationGate,
    pub in_flight: InFlightRegistry,
    pub settings: BotSettings,
}

impl BotContext {
    pub fn new(
        config: BotConfig,
        chain: Arc<dyn ChainClient>,
        chat: Arc<dyn ChatTransport>,
        ledger: LedgerLogger,
        permissions: Arc<dyn PermissionCheck>,
        gate: ConfirmationGate,
        settings: BotSettings,
    ) -> Self {
        Self {
            config,
            chain,
            chat,
            ledger,
            permissions,
            nonces: NonceCache::new(),
            gate,
            in_flight: InFlightRegistry::new(),
            settings,
        }
    }

    /// Posts a reply mentioning the author of `origin`. Chat failures are
    /// logged and swallowed; they never abort a flow.
    pub async fn say(&self, origin: &IncomingMessage, reply: Reply) -> Option<PostedMessage> {
        let reply = reply.mentioning(&origin.author_id);
        match self.chat.reply(origin, &reply).await {
            Ok(posted) => Some(posted),
            Err(e) => {
                warn!(channel = %origin.channel_id, error = %e, "failed to post reply");
                None
            }
        }
    }

    /// Replaces the body of `posted`, or posts anew if there is nothing to edit.
    pub async fn update(
        &self,
        origin: &IncomingMessage,
        posted: Option<&PostedMessage>,
        reply: Reply,
    ) -> Option<PostedMessage> {
        let Some(posted) = posted else {
            return self.say(origin, reply).await;
        };
        let reply = reply.mentioning(&origin.author_id);
        if let Err(e) = self.chat.edit(posted, &reply).await {
            warn!(message = %posted.message_id, error = %e, "failed to edit message");
        }
        Some(posted.clone())
    }

    pub async fn delete_message(&self, message: &IncomingMessage) {
        if let Err(e) = self.chat.delete(&message.channel_id, &message.id).await {
            warn!(message = %message.id, error = %e, "failed to delete confirmation reply");
        }
    }

    /// Waits for the invoker's answer. The confirming reply is removed from
    /// the channel; a cancelled wait counts as a timeout.
    pub async fn confirm(&self, pending: PendingConfirmation) -> Result<(), PayoutError> {
        match pending.wait(self.settings.confirmation_window).await {
            ConfirmationOutcome::Confirmed { reply } => {
                self.delete_message(&reply).await;
                Ok(())
            }
            ConfirmationOutcome::Rejected => Err(PayoutError::ConfirmationRejected),
            ConfirmationOutcome::TimedOut | ConfirmationOutcome::Cancelled => {
                Err(PayoutError::ConfirmationTimedOut)
            }
        }
    }

    pub fn confirmation_hint(&self) -> String {
        format!(
            "Reply `yes` within {} seconds to proceed.",
            self.settings.confirmation_window.as_secs()
        )
    }
}

pub(crate) fn chain_query(e: ChainError) -> PayoutError {
    PayoutError::ChainQuery(e.to_string())
}
