//! # Command Dispatcher
//!
//! Routes inbound chat messages:
//!
//! ```text
//! IncomingMessage
//!      │
//!      ├─ "<prefix>claim"                  ──► spawn run_claim
//!      ├─ "<prefix>sendpayout" / "sendslp" ──► spawn run_payout
//!      ├─ "<prefix>scholars"               ──► spawn listing (elevated role only)
//!      └─ anything else                    ──► ignored
//! ```
//!
//! Before any of that, a message whose author has a pending confirmation is
//! handed to the [`ConfirmationGate`](crate::confirmation::ConfirmationGate)
//! and goes no further. A command typed instead of "yes" rejects the prompt.
//!
//! Every command runs in its own task, so invocations from different users
//! proceed concurrently. All [`PayoutError`]s end as a chat reply; nothing a
//! command does can stop the dispatch loop. On shutdown the loop stops
//! reading and drains the commands it started.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use slp_common::PayoutError;

use crate::chat::{IncomingMessage, Reply};
use crate::claim_flow::{run_claim, ClaimReport};
use crate::context::BotContext;
use crate::payout_flow::{run_payout, LedgerStatus, PayoutReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Claim,
    SendPayout,
    Scholars,
}

/// Recognizes `<prefix><name>`; trailing arguments are ignored.
pub fn parse_command(prefix: &str, content: &str) -> Option<Command> {
    let rest = content.trim().strip_prefix(prefix)?;
    let name = rest.split_whitespace().next()?;
    match name {
        "claim" => Some(Command::Claim),
        "sendpayout" | "sendslp" => Some(Command::SendPayout),
        "scholars" => Some(Command::Scholars),
        _ => None,
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// RENDERING
// ════════════════════════════════════════════════════════════════════════════════

pub fn render_error(err: &PayoutError) -> String {
    match err {
        PayoutError::UnknownScholar { .. } => {
            "You are not registered as a scholar. Ask an admin to add you.".to_string()
        }
        PayoutError::ZeroBalance { scholar, kind } => {
            format!("{} has no {} SLP right now. Nothing to do.", scholar, kind)
        }
        PayoutError::InvalidPercentage { .. } | PayoutError::InvalidAddressFormat { .. } => {
            format!("Configuration problem, please contact an admin: {}", err)
        }
        PayoutError::ChainQuery(reason) => {
            format!("Could not read from the chain ({}). Please try again later.", reason)
        }
        PayoutError::ConfirmationTimedOut => "No confirmation received. Cancelled.".to_string(),
        PayoutError::ConfirmationRejected => "Not confirmed. Cancelled.".to_string(),
        PayoutError::FlowInFlight(kind) => {
            format!("You already have a {} in progress. Wait for it to finish.", kind)
        }
        PayoutError::TransferExecutionFault {
            leg,
            nonce,
            completed,
            reason,
            ..
        } => {
            let mut out = format!(
                "Payout stopped: the {} transfer (nonce {}) failed: {}\n",
                leg, nonce, reason
            );
            if completed.is_empty() {
                out.push_str("No transfer went through.");
            } else {
                out.push_str("These transfers already went through and were not reverted:\n");
                for t in completed {
                    out.push_str(&format!("{}: {}\n", t.leg.title(), t.tx_hash.explorer_url()));
                }
                out.push_str("Contact an admin before retrying.");
            }
            out
        }
        PayoutError::ClaimNotSucceeded { unclaimed, .. } => {
            format!("The claim of {} SLP did not succeed, please retry.", unclaimed)
        }
    }
}

pub fn render_payout_report(report: &PayoutReport) -> String {
    let mut out = format!(
        "Payout for {} complete: {} SLP sent.\n",
        report.scholar, report.split.balance
    );
    for t in &report.transfers {
        out.push_str(&format!(
            "\n{}: {} SLP\n{}\n",
            t.leg.title(),
            t.transaction.amount,
            t.tx_hash.explorer_url()
        ));
    }
    match &report.ledger {
        LedgerStatus::Recorded { row } => out.push_str(&format!("\nRecorded in ledger row {}.", row)),
        LedgerStatus::Failed(reason) => out.push_str(&format!(
            "\nTransfers succeeded but the ledger row could not be written: {}",
            reason
        )),
    }
    out
}

pub fn render_claim_report(report: &ClaimReport) -> String {
    format!(
        "Claimed {} SLP for {}.\n{}",
        report.amount,
        report.scholar,
        report.tx_hash.explorer_url()
    )
}

/// Admin listing. Never includes keys.
pub fn render_scholars(ctx: &BotContext) -> String {
    let accounts = &ctx.config.accounts;
    if accounts.scholars.is_empty() {
        return "No scholars configured.".to_string();
    }
    let fee = accounts
        .fee_percentage()
        .map(|p| p.to_string())
        .unwrap_or_else(|_| format!("invalid ({})", accounts.fee_payout_percentage));
    let mut out = format!("**Scholars** ({}), fee {}\n", accounts.scholars.len(), fee);
    for (identity, record) in &accounts.scholars {
        let account = record
            .account()
            .map(|a| a.to_display())
            .unwrap_or_else(|_| format!("invalid ({})", record.account_address));
        let share = record
            .payout_share()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| format!("invalid ({})", record.payout_percentage));
        out.push_str(&format!(
            "\n{} <@{}>\n{}\nscholar share {}\n",
            record.name, identity, account, share
        ));
    }
    out
}

// ════════════════════════════════════════════════════════════════════════════════
// DISPATCHER
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Clone)]
pub struct Dispatcher {
    ctx: Arc<BotContext>,
}

impl Dispatcher {
    pub fn new(ctx: Arc<BotContext>) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &Arc<BotContext> {
        &self.ctx
    }

    /// Spawns the command in `message`, or hands the message to the
    /// confirmation gate. Returns the command task, if one was started.
    pub fn handle_message(&self, message: IncomingMessage) -> Option<JoinHandle<()>> {
        self.route(message).map(tokio::spawn)
    }

    /// A message from an author with a pending confirmation is that
    /// confirmation's reply, even when it parses as a command.
    fn route(&self, message: IncomingMessage) -> Option<impl Future<Output = ()> + Send + 'static> {
        if self.ctx.gate.offer(&message) {
            debug!(author = %message.author_id, "message routed to pending confirmation");
            return None;
        }
        let command = parse_command(&self.ctx.settings.prefix, &message.content)?;

        info!(author = %message.author_id, channel = %message.channel_id, ?command, "command received");
        let ctx = self.ctx.clone();
        Some(async move {
            execute(&ctx, command, &message).await;
        })
    }

    /// Feeds messages from `inbox` until it closes or `shutdown` turns true,
    /// then waits for every command still running. Pending confirmations
    /// are cancelled by the shutdown signal, so only confirmed work is
    /// awaited.
    pub async fn run(self, mut inbox: mpsc::Receiver<IncomingMessage>, mut shutdown: watch::Receiver<bool>) {
        info!(prefix = %self.ctx.settings.prefix, "dispatcher started");
        let mut commands = JoinSet::new();
        loop {
            tokio::select! {
                message = inbox.recv() => match message {
                    Some(message) => {
                        if let Some(command) = self.route(message) {
                            commands.spawn(command);
                        }
                    }
                    None => break,
                },
                Some(joined) = commands.join_next(), if !commands.is_empty() => {
                    log_join(joined);
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        if !commands.is_empty() {
            info!(running = commands.len(), "waiting for running commands");
        }
        while let Some(joined) = commands.join_next().await {
            log_join(joined);
        }
        info!("dispatcher stopped");
    }
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        error!("command task failed: {}", e);
    }
}

async fn execute(ctx: &BotContext, command: Command, message: &IncomingMessage) {
    let text = match command {
        Command::Claim => match run_claim(ctx, message).await {
            Ok(report) => render_claim_report(&report),
            Err(e) => {
                log_failure("claim", message, &e);
                render_error(&e)
            }
        },
        Command::SendPayout => match run_payout(ctx, message).await {
            Ok(report) => render_payout_report(&report),
            Err(e) => {
                log_failure("payout", message, &e);
                render_error(&e)
            }
        },
        Command::Scholars => {
            if ctx.permissions.has_elevated_role(message) {
                render_scholars(ctx)
            } else {
                "You do not have permission to list scholars.".to_string()
            }
        }
    };
    ctx.say(message, Reply::new(text)).await;
}

fn log_failure(command: &str, message: &IncomingMessage, err: &PayoutError) {
    if err.is_informational() {
        info!(command, author = %message.author_id, "{}", err);
    } else if err.may_have_moved_funds() {
        error!(command, author = %message.author_id, error = %err, "command failed after funds moved");
    } else {
        warn!(command, author = %message.author_id, error = %err, "command failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slp_common::{Address, BalanceKind, CompletedTransfer, FlowKind, PayoutLeg, Transaction, TxHash};

    #[test]
    fn parses_commands_with_prefix() {
        assert_eq!(parse_command("!", "!claim"), Some(Command::Claim));
        assert_eq!(parse_command("!", "  !sendpayout now"), Some(Command::SendPayout));
        assert_eq!(parse_command("!", "!sendslp"), Some(Command::SendPayout));
        assert_eq!(parse_command("!", "!scholars"), Some(Command::Scholars));
        assert_eq!(parse_command("!", "claim"), None);
        assert_eq!(parse_command("!", "!"), None);
        assert_eq!(parse_command("!", "!unknown"), None);
        assert_eq!(parse_command("$", "$claim"), Some(Command::Claim));
    }

    #[test]
    fn fault_message_lists_submitted_transfers() {
        let err = PayoutError::TransferExecutionFault {
            scholar: "Alice".into(),
            leg: PayoutLeg::Fee,
            nonce: 9,
            completed: vec![CompletedTransfer {
                leg: PayoutLeg::Scholar,
                nonce: 7,
                transaction: Transaction {
                    from_address: Address::from_bytes([1; 20]),
                    to_address: Address::from_bytes([2; 20]),
                    amount: 665,
                },
                tx_hash: TxHash::new("0xfeed"),
            }],
            reason: "nonce too low".into(),
        };
        let text = render_error(&err);
        assert!(text.contains("fee transfer (nonce 9)"));
        assert!(text.contains("Scholar Payout: https://explorer.roninchain.com/tx/0xfeed"));
    }

    #[test]
    fn informational_and_concurrency_messages() {
        let zero = PayoutError::ZeroBalance {
            scholar: "Bob".into(),
            kind: BalanceKind::Unclaimed,
        };
        assert_eq!(render_error(&zero), "Bob has no unclaimed SLP right now. Nothing to do.");
        assert!(render_error(&PayoutError::FlowInFlight(FlowKind::Claim)).contains("claim in progress"));
    }
}
