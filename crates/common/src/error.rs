//! # Payout Error Taxonomy
//!
//! Every failure a `claim` or `sendpayout` command can hit. All variants are
//! caught at the command boundary and turned into a chat reply; none of them
//! may terminate the dispatcher.
//!
//! | Category | Variants | Side effects before failure |
//! |----------|----------|-----------------------------|
//! | Lookup | `UnknownScholar` | none |
//! | Informational | `ZeroBalance` | none |
//! | Configuration | `InvalidPercentage`, `InvalidAddressFormat` | none |
//! | Chain read | `ChainQuery` | none |
//! | Confirmation | `ConfirmationTimedOut`, `ConfirmationRejected` | none |
//! | Concurrency | `FlowInFlight` | none |
//! | Execution | `TransferExecutionFault`, `ClaimNotSucceeded` | possibly funds moved |

use thiserror::Error;

use crate::address::AddressError;
use crate::payout_math::SplitError;
use crate::types::{BalanceKind, CompletedTransfer, FlowKind, PayoutLeg};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayoutError {
    #[error("no scholar record is configured for identity {identity}")]
    UnknownScholar { identity: String },

    #[error("{kind} balance of `{scholar}` is zero")]
    ZeroBalance { scholar: String, kind: BalanceKind },

    #[error("{context}: percentage {value} is outside [0, 1]")]
    InvalidPercentage { context: String, value: f64 },

    #[error("{context}: {source}")]
    InvalidAddressFormat {
        context: String,
        #[source]
        source: AddressError,
    },

    #[error("chain query failed: {0}")]
    ChainQuery(String),

    #[error("confirmation was not received in time")]
    ConfirmationTimedOut,

    #[error("confirmation was declined")]
    ConfirmationRejected,

    #[error("a {0} is already in progress for this identity")]
    FlowInFlight(FlowKind),

    /// A transfer in the payout sequence failed. Transfers listed in
    /// `completed` were already accepted by the chain and are not reverted.
    #[error(
        "{leg} transfer for `{scholar}` (nonce {nonce}) failed after {} completed transfer(s): {reason}",
        completed.len()
    )]
    TransferExecutionFault {
        scholar: String,
        leg: PayoutLeg,
        nonce: u64,
        completed: Vec<CompletedTransfer>,
        reason: String,
    },

    /// The claim produced no signature. `reason` is set when the chain call
    /// itself faulted.
    #[error("claim for `{scholar}` did not succeed ({unclaimed} SLP still unclaimed)")]
    ClaimNotSucceeded {
        scholar: String,
        unclaimed: u64,
        reason: Option<String>,
    },
}

impl PayoutError {
    /// Lifts a calculator failure into the command taxonomy.
    pub fn from_split(err: SplitError, scholar: &str) -> Self {
        match err {
            SplitError::ZeroBalance => PayoutError::ZeroBalance {
                scholar: scholar.to_string(),
                kind: BalanceKind::Claimed,
            },
            SplitError::InvalidPercentage { value } => PayoutError::InvalidPercentage {
                context: format!("payout percentage of `{}`", scholar),
                value,
            },
        }
    }

    /// Nothing went wrong; there was simply nothing to do.
    pub fn is_informational(&self) -> bool {
        matches!(self, PayoutError::ZeroBalance { .. })
    }

    /// A configuration defect an operator must fix.
    pub fn is_config_defect(&self) -> bool {
        matches!(
            self,
            PayoutError::InvalidPercentage { .. } | PayoutError::InvalidAddressFormat { .. }
        )
    }

    /// Whether tokens may have moved before the failure.
    pub fn may_have_moved_funds(&self) -> bool {
        match self {
            PayoutError::TransferExecutionFault { completed, .. } => !completed.is_empty(),
            PayoutError::ClaimNotSucceeded { reason, .. } => reason.is_some(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_errors_map_with_scholar_context() {
        let err = PayoutError::from_split(SplitError::ZeroBalance, "Alice");
        assert!(err.is_informational());
        assert_eq!(err.to_string(), "claimed balance of `Alice` is zero");

        let err = PayoutError::from_split(SplitError::InvalidPercentage { value: 1.5 }, "Bob");
        assert!(err.is_config_defect());
        assert!(err.to_string().contains("`Bob`"));
    }

    #[test]
    fn fault_without_completed_transfers_moved_nothing() {
        let err = PayoutError::TransferExecutionFault {
            scholar: "Alice".into(),
            leg: PayoutLeg::Scholar,
            nonce: 7,
            completed: Vec::new(),
            reason: "connection refused".into(),
        };
        assert!(!err.may_have_moved_funds());
        assert!(err.to_string().contains("after 0 completed transfer(s)"));
    }
}
