//! # Transfer Executor
//!
//! Sequencing wrapper over [`ChainClient`] for the two balance-moving
//! operations.
//!
//! ## Payout sequence
//!
//! ```text
//! nonce      nonce+1     nonce+2
//!   │          │           │
//! scholar ──► academy ──► fee        (pause between submissions)
//!   │          │           │
//!   └── a failed leg stops the sequence; accepted legs stay on chain
//! ```
//!
//! The order and the nonce offsets are fixed and independent of the amounts.
//! There is no rollback: a [`SequenceOutcome::Partial`] lists exactly what
//! went through.
//!
//! ## Claim
//!
//! A single submission. Success is decided by the presence of a receipt;
//! an empty answer and a fault are both "not signed".

use std::time::Duration;

use tracing::{info, warn};

use slp_common::{ClaimState, CompletedTransfer, Payout, PayoutError, PayoutLeg, SlpClaim, TxHash};

use crate::chain::{ChainClient, ChainError};
use crate::nonce_cache::NonceLease;

/// Default pause between consecutive transfer submissions.
pub const INTER_SUBMISSION_PAUSE: Duration = Duration::from_millis(250);

// ════════════════════════════════════════════════════════════════════════════════
// PAYOUT SEQUENCE
// ════════════════════════════════════════════════════════════════════════════════

/// The leg that stopped a sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegFailure {
    pub leg: PayoutLeg,
    pub nonce: u64,
    pub error: ChainError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SequenceOutcome {
    Completed(Vec<CompletedTransfer>),
    Partial {
        completed: Vec<CompletedTransfer>,
        failure: LegFailure,
    },
}

impl SequenceOutcome {
    pub fn completed(&self) -> &[CompletedTransfer] {
        match self {
            SequenceOutcome::Completed(done) => done,
            SequenceOutcome::Partial { completed, .. } => completed,
        }
    }

    /// Converts a partial run into [`PayoutError::TransferExecutionFault`].
    pub fn into_result(self, scholar: &str) -> Result<Vec<CompletedTransfer>, PayoutError> {
        match self {
            SequenceOutcome::Completed(done) => Ok(done),
            SequenceOutcome::Partial { completed, failure } => Err(PayoutError::TransferExecutionFault {
                scholar: scholar.to_string(),
                leg: failure.leg,
                nonce: failure.nonce,
                completed,
                reason: failure.error.to_string(),
            }),
        }
    }
}

/// Step-wise submission of a payout's three legs, so callers can report
/// progress between steps.
pub struct TransferSequence<'a> {
    chain: &'a dyn ChainClient,
    payout: &'a Payout,
    pause: Duration,
    next: usize,
    completed: Vec<CompletedTransfer>,
    failure: Option<LegFailure>,
}

impl<'a> TransferSequence<'a> {
    pub fn new(chain: &'a dyn ChainClient, payout: &'a Payout, pause: Duration) -> Self {
        Self {
            chain,
            payout,
            pause,
            next: 0,
            completed: Vec::with_capacity(PayoutLeg::ORDER.len()),
            failure: None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.failure.is_some() || self.next >= PayoutLeg::ORDER.len()
    }

    /// Submits the next leg. Returns `None` once all legs ran or one failed.
    pub async fn step(&mut self, lease: &mut NonceLease) -> Option<Result<CompletedTransfer, LegFailure>> {
        if self.is_finished() {
            return None;
        }
        let leg = PayoutLeg::ORDER[self.next];
        if self.next > 0 && !self.pause.is_zero() {
            tokio::time::sleep(self.pause).await;
        }
        self.next += 1;

        let nonce = self.payout.nonce_for(leg);
        let transaction = *self.payout.transaction(leg);
        match self
            .chain
            .submit_transfer(&transaction, &self.payout.private_key, nonce)
            .await
        {
            Ok(tx_hash) => {
                lease.mark_used(nonce);
                info!(
                    scholar = %self.payout.name,
                    %leg,
                    nonce,
                    amount = transaction.amount,
                    %tx_hash,
                    "transfer submitted"
                );
                let done = CompletedTransfer {
                    leg,
                    nonce,
                    transaction,
                    tx_hash,
                };
                self.completed.push(done.clone());
                Some(Ok(done))
            }
            Err(error) => {
                warn!(scholar = %self.payout.name, %leg, nonce, %error, "transfer failed");
                let failure = LegFailure { leg, nonce, error };
                self.failure = Some(failure.clone());
                Some(Err(failure))
            }
        }
    }

    pub fn into_outcome(self) -> SequenceOutcome {
        match self.failure {
            Some(failure) => SequenceOutcome::Partial {
                completed: self.completed,
                failure,
            },
            None => SequenceOutcome::Completed(self.completed),
        }
    }
}

/// Runs the whole sequence without intermediate reporting.
pub async fn execute_payout(
    chain: &dyn ChainClient,
    payout: &Payout,
    lease: &mut NonceLease,
    pause: Duration,
) -> SequenceOutcome {
    let mut sequence = TransferSequence::new(chain, payout, pause);
    while sequence.step(lease).await.is_some() {}
    sequence.into_outcome()
}

// ════════════════════════════════════════════════════════════════════════════════
// CLAIM
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Signed(TxHash),
    NotSigned,
    Fault(ChainError),
}

/// Submits `claim` once with `nonce` and records the result in
/// `claim.state`.
pub async fn execute_claim(
    chain: &dyn ChainClient,
    claim: &mut SlpClaim,
    nonce: u64,
    lease: &mut NonceLease,
) -> ClaimOutcome {
    let outcome = match chain.submit_claim(claim, nonce).await {
        Ok(Some(tx_hash)) => {
            lease.mark_used(nonce);
            ClaimOutcome::Signed(tx_hash)
        }
        Ok(None) => ClaimOutcome::NotSigned,
        Err(e) => ClaimOutcome::Fault(e),
    };

    claim.state = match &outcome {
        ClaimOutcome::Signed(tx_hash) => ClaimState::Signed {
            tx_hash: tx_hash.clone(),
        },
        _ => ClaimState::NotSigned,
    };
    match &outcome {
        ClaimOutcome::Signed(tx_hash) => {
            info!(scholar = %claim.name, nonce, %tx_hash, amount = claim.unclaimed_balance, "claim signed")
        }
        ClaimOutcome::NotSigned => warn!(scholar = %claim.name, nonce, "claim returned no signature"),
        ClaimOutcome::Fault(e) => warn!(scholar = %claim.name, nonce, error = %e, "claim failed"),
    }
    outcome
}
