//! # Claim Flow (`claim`)
//!
//! ```text
//! LOOKUP_SCHOLAR ──► lease address ──► refresh nonce ──► QUERY_UNCLAIMED
//!      │
//!      ├─ 0 ──► ZeroBalance (no prompt)
//!      ▼
//! AWAIT_CONFIRMATION ── no / timeout ──► abort
//!      │ yes
//!      ▼
//! build SlpClaim (reads claimed balance) ──► EXECUTE_CLAIM once
//!      │
//!      ├─ Signed   ──► ClaimReport
//!      └─ NotSigned / Fault ──► ClaimNotSucceeded
//! ```

use chrono::Utc;
use tracing::info;

use slp_common::{BalanceKind, ClaimState, FlowKind, PayoutError, SlpClaim, TxHash};

use crate::chat::{IncomingMessage, Reply};
use crate::context::{chain_query, BotContext};
use crate::ledger::ledger_timezone;
use crate::transfer_executor::{execute_claim, ClaimOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimReport {
    pub scholar: String,
    pub nonce: u64,
    pub amount: u64,
    pub tx_hash: TxHash,
}

pub async fn run_claim(ctx: &BotContext, origin: &IncomingMessage) -> Result<ClaimReport, PayoutError> {
    let flight = ctx.in_flight.try_begin(&origin.author_id, FlowKind::Claim)?;
    let scholar = ctx.config.scholar(flight.identity())?;
    let address = scholar.account()?;

    let mut lease = ctx.nonces.lease(address).await;
    let nonce = lease.refresh(ctx.chain.as_ref()).await.map_err(chain_query)?;
    let unclaimed = ctx
        .chain
        .get_unclaimed_balance(&address)
        .await
        .map_err(chain_query)?;
    if unclaimed == 0 {
        return Err(PayoutError::ZeroBalance {
            scholar: scholar.name.clone(),
            kind: BalanceKind::Unclaimed,
        });
    }

    let pending = ctx.gate.register(&origin.author_id, &origin.channel_id);
    let prompt = format!(
        "**Claim for {}**\nAccount: {}\nNonce: {}\nUnclaimed balance: {} SLP\n\n{}",
        scholar.name,
        address.to_display(),
        nonce,
        unclaimed,
        ctx.confirmation_hint()
    );
    ctx.say(origin, Reply::new(prompt).at(Utc::now().with_timezone(&ledger_timezone())))
        .await;
    ctx.confirm(pending).await?;
    info!(scholar = %scholar.name, nonce, unclaimed, "claim confirmed");

    let claimed = ctx
        .chain
        .get_claimed_balance(&address)
        .await
        .map_err(chain_query)?;
    let mut claim = SlpClaim {
        name: scholar.name.clone(),
        address,
        private_key: scholar.private_key.clone(),
        claimed_balance: claimed,
        unclaimed_balance: unclaimed,
        state: ClaimState::Pending,
    };
    flight.attach_claim(&claim);
    ctx.say(origin, Reply::new(format!("Claiming {} SLP for {}...", unclaimed, scholar.name)))
        .await;

    let outcome = execute_claim(ctx.chain.as_ref(), &mut claim, nonce, &mut lease).await;
    flight.update_claim_state(claim.state.clone());

    match outcome {
        ClaimOutcome::Signed(tx_hash) => Ok(ClaimReport {
            scholar: claim.name.clone(),
            nonce,
            amount: unclaimed,
            tx_hash,
        }),
        ClaimOutcome::NotSigned => Err(PayoutError::ClaimNotSucceeded {
            scholar: claim.name.clone(),
            unclaimed,
            reason: None,
        }),
        ClaimOutcome::Fault(e) => Err(PayoutError::ClaimNotSucceeded {
            scholar: claim.name.clone(),
            unclaimed,
            reason: Some(e.to_string()),
        }),
    }
}
