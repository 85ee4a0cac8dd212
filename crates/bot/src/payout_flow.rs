//! # Payout Flow (`sendpayout`)
//!
//! ```text
//! LOOKUP_SCHOLAR ──► lease source address ──► refresh nonce
//!      │
//!      ▼
//! QUERY_CLAIMED_BALANCE ── 0 ──► ZeroBalance (no prompt)
//!      │ > 0
//!      ▼
//! COMPUTE_SPLIT ──► prompt ──► AWAIT_CONFIRMATION ── no / timeout ──► abort
//!      │ yes
//!      ▼
//! EXECUTE_SEQUENCE  scholar @ n, academy @ n+1, fee @ n+2
//!      │                  └─ failure ──► TransferExecutionFault (no ledger row)
//!      ▼
//! LOG ──► PayoutReport { ledger: Recorded | Failed }
//! ```
//!
//! The address lease is held from the nonce read until the last submission,
//! so two payouts from the same account serialize instead of reusing nonces.

use chrono::Utc;
use tracing::{error, info, warn};

use slp_common::{
    split_payout, BalanceKind, CompletedTransfer, FlowKind, Payout, PayoutError, PayoutSplit,
};

use crate::chat::{IncomingMessage, Reply};
use crate::context::{chain_query, BotContext};
use crate::ledger::{ledger_timezone, LedgerEntry};
use crate::transfer_executor::TransferSequence;

/// What happened to the ledger row of a completed payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerStatus {
    Recorded { row: usize },
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayoutReport {
    pub scholar: String,
    pub nonce: u64,
    pub split: PayoutSplit,
    /// Scholar, academy, fee.
    pub transfers: Vec<CompletedTransfer>,
    pub ledger: LedgerStatus,
}

pub async fn run_payout(ctx: &BotContext, origin: &IncomingMessage) -> Result<PayoutReport, PayoutError> {
    let flight = ctx.in_flight.try_begin(&origin.author_id, FlowKind::Payout)?;
    let scholar = ctx.config.scholar(flight.identity())?;
    let parties = scholar.parties(&ctx.config.accounts)?;

    let mut lease = ctx.nonces.lease(parties.source).await;
    let nonce = lease.refresh(ctx.chain.as_ref()).await.map_err(chain_query)?;
    let balance = ctx
        .chain
        .get_claimed_balance(&parties.source)
        .await
        .map_err(chain_query)?;
    if balance == 0 {
        return Err(PayoutError::ZeroBalance {
            scholar: scholar.name.clone(),
            kind: BalanceKind::Claimed,
        });
    }

    let fee_share = ctx.config.accounts.fee_percentage()?;
    let scholar_share = scholar.payout_share()?;
    let split = split_payout(balance, fee_share, scholar_share)
        .map_err(|e| PayoutError::from_split(e, &scholar.name))?;
    let payout = Payout::new(&scholar.name, scholar.private_key.clone(), nonce, parties, &split);
    debug_assert!(payout.is_balanced());

    let pending = ctx.gate.register(&origin.author_id, &origin.channel_id);
    let prompt = format!("{}\n\n{}", payout_summary(&payout), ctx.confirmation_hint());
    ctx.say(origin, Reply::new(prompt).at(Utc::now().with_timezone(&ledger_timezone())))
        .await;
    ctx.confirm(pending).await?;
    info!(scholar = %payout.name, nonce, balance, "payout confirmed");

    let mut progress = ctx
        .say(origin, Reply::new(progress_text(&payout, &[])))
        .await;
    let mut sequence = TransferSequence::new(ctx.chain.as_ref(), &payout, ctx.settings.transfer_pause);
    let mut done = Vec::new();
    while let Some(step) = sequence.step(&mut lease).await {
        if let Ok(transfer) = step {
            done.push(transfer);
            progress = ctx
                .update(origin, progress.as_ref(), Reply::new(progress_text(&payout, &done)))
                .await;
        }
    }
    let outcome = sequence.into_outcome();
    drop(lease);

    let transfers = match outcome.into_result(&payout.name) {
        Ok(transfers) => transfers,
        Err(fault) => {
            if let PayoutError::TransferExecutionFault { completed, leg, nonce, .. } = &fault {
                let hashes: Vec<&str> = completed.iter().map(|t| t.tx_hash.as_str()).collect();
                error!(
                    scholar = %payout.name,
                    failed_leg = %leg,
                    nonce,
                    submitted = ?hashes,
                    "payout sequence incomplete; no ledger row written"
                );
            }
            return Err(fault);
        }
    };

    let entry = LedgerEntry::from_payout(&payout, &transfers, Utc::now());
    let ledger = match ctx.ledger.record(&entry).await {
        Ok(row) => LedgerStatus::Recorded { row },
        Err(e) => {
            warn!(scholar = %payout.name, error = %e, "payout completed but ledger write failed");
            LedgerStatus::Failed(e.to_string())
        }
    };

    Ok(PayoutReport {
        scholar: payout.name.clone(),
        nonce,
        split,
        transfers,
        ledger,
    })
}

/// Balance, nonce and every leg with its addresses.
pub fn payout_summary(payout: &Payout) -> String {
    let mut out = format!(
        "**Payout for {}**\nNonce: {}\nClaimed balance: {} SLP\n",
        payout.name, payout.nonce, payout.slp_balance
    );
    for (leg, tx) in payout.legs() {
        out.push_str(&format!(
            "\n{}: {} SLP\nfrom {}\nto {}\n",
            leg.title(),
            tx.amount,
            tx.from_address.to_display(),
            tx.to_address.to_display()
        ));
    }
    out
}

fn progress_text(payout: &Payout, done: &[CompletedTransfer]) -> String {
    let mut out = format!("Sending payout for {}...\n", payout.name);
    for transfer in done {
        out.push_str(&format!(
            "\n{} (nonce {}): {}\n{}\n",
            transfer.leg.title(),
            transfer.nonce,
            transfer.tx_hash,
            transfer.tx_hash.explorer_url()
        ));
    }
    out
}
