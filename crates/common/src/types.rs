//! Data model shared by the claim and payout commands.

use std::fmt;

use serde::Deserialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::address::Address;
use crate::payout_math::PayoutSplit;

/// Block explorer prefix for transaction links.
pub const EXPLORER_TX_URL: &str = "https://explorer.roninchain.com/tx/";

// ════════════════════════════════════════════════════════════════════════════════
// SECRETS & IDENTIFIERS
// ════════════════════════════════════════════════════════════════════════════════

/// Account private key as configured. Wiped on drop, redacted in `Debug`.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop, PartialEq, Eq)]
#[serde(transparent)]
pub struct PrivateKey(String);

impl PrivateKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrivateKey(<redacted>)")
    }
}

/// Transaction identifier returned by the chain.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TxHash(String);

impl TxHash {
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn explorer_url(&self) -> String {
        format!("{}{}", EXPLORER_TX_URL, self.0)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// TRANSACTIONS
// ════════════════════════════════════════════════════════════════════════════════

/// A single SLP transfer. `amount` is in the smallest token unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub from_address: Address,
    pub to_address: Address,
    pub amount: u64,
}

/// Position of a transfer inside a payout. Submission order is
/// scholar, academy, fee; the offset is added to the payout nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayoutLeg {
    Scholar,
    Academy,
    Fee,
}

impl PayoutLeg {
    pub const ORDER: [PayoutLeg; 3] = [PayoutLeg::Scholar, PayoutLeg::Academy, PayoutLeg::Fee];

    pub const fn nonce_offset(&self) -> u64 {
        match self {
            PayoutLeg::Scholar => 0,
            PayoutLeg::Academy => 1,
            PayoutLeg::Fee => 2,
        }
    }

    /// Heading used in chat output.
    pub const fn title(&self) -> &'static str {
        match self {
            PayoutLeg::Scholar => "Scholar Payout",
            PayoutLeg::Academy => "Academy Payout",
            PayoutLeg::Fee => "Admin Fee",
        }
    }
}

impl fmt::Display for PayoutLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PayoutLeg::Scholar => "scholar",
            PayoutLeg::Academy => "academy",
            PayoutLeg::Fee => "fee",
        };
        f.write_str(name)
    }
}

/// A transfer accepted by the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedTransfer {
    pub leg: PayoutLeg,
    pub nonce: u64,
    pub transaction: Transaction,
    pub tx_hash: TxHash,
}

// ════════════════════════════════════════════════════════════════════════════════
// PAYOUT
// ════════════════════════════════════════════════════════════════════════════════

/// Destinations of a payout, all resolved to canonical addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayoutParties {
    pub source: Address,
    pub scholar: Address,
    pub academy: Address,
    pub fee: Address,
}

/// One `sendpayout` invocation.
///
/// Invariant: `slp_balance` equals the sum of the three transaction amounts.
#[derive(Debug, Clone)]
pub struct Payout {
    pub name: String,
    pub private_key: PrivateKey,
    pub nonce: u64,
    pub slp_balance: u64,
    pub scholar_transaction: Transaction,
    pub academy_transaction: Transaction,
    pub fee_transaction: Transaction,
}

impl Payout {
    pub fn new(
        name: impl Into<String>,
        private_key: PrivateKey,
        nonce: u64,
        parties: PayoutParties,
        split: &PayoutSplit,
    ) -> Self {
        let transfer = |to_address, amount| Transaction {
            from_address: parties.source,
            to_address,
            amount,
        };
        Self {
            name: name.into(),
            private_key,
            nonce,
            slp_balance: split.balance,
            scholar_transaction: transfer(parties.scholar, split.scholar_amount),
            academy_transaction: transfer(parties.academy, split.academy_amount),
            fee_transaction: transfer(parties.fee, split.fee_amount),
        }
    }

    pub fn transaction(&self, leg: PayoutLeg) -> &Transaction {
        match leg {
            PayoutLeg::Scholar => &self.scholar_transaction,
            PayoutLeg::Academy => &self.academy_transaction,
            PayoutLeg::Fee => &self.fee_transaction,
        }
    }

    /// Legs in submission order.
    pub fn legs(&self) -> impl Iterator<Item = (PayoutLeg, &Transaction)> {
        PayoutLeg::ORDER.into_iter().map(move |leg| (leg, self.transaction(leg)))
    }

    pub fn nonce_for(&self, leg: PayoutLeg) -> u64 {
        self.nonce + leg.nonce_offset()
    }

    pub fn is_balanced(&self) -> bool {
        let sum = u128::from(self.scholar_transaction.amount)
            + u128::from(self.academy_transaction.amount)
            + u128::from(self.fee_transaction.amount);
        sum == u128::from(self.slp_balance)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// CLAIM
// ════════════════════════════════════════════════════════════════════════════════

/// Outcome marker of a claim attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimState {
    /// Not yet executed.
    Pending,
    /// The chain returned a signature/receipt.
    Signed { tx_hash: TxHash },
    /// Execution finished without a signature, or faulted.
    NotSigned,
}

/// One `claim` attempt. Lives only for the duration of the command.
#[derive(Debug, Clone)]
pub struct SlpClaim {
    pub name: String,
    pub address: Address,
    pub private_key: PrivateKey,
    pub claimed_balance: u64,
    pub unclaimed_balance: u64,
    pub state: ClaimState,
}

impl SlpClaim {
    pub fn is_signed(&self) -> bool {
        matches!(self.state, ClaimState::Signed { .. })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// FLOW LABELS
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowKind {
    Claim,
    Payout,
}

impl fmt::Display for FlowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlowKind::Claim => f.write_str("claim"),
            FlowKind::Payout => f.write_str("payout"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalanceKind {
    Claimed,
    Unclaimed,
}

impl fmt::Display for BalanceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BalanceKind::Claimed => f.write_str("claimed"),
            BalanceKind::Unclaimed => f.write_str("unclaimed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payout_math::compute_split;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn parties() -> PayoutParties {
        PayoutParties {
            source: addr(0x01),
            scholar: addr(0x02),
            academy: addr(0x03),
            fee: addr(0x04),
        }
    }

    #[test]
    fn payout_legs_in_fixed_order_with_consecutive_nonces() {
        let split = compute_split(1000, 0.05, 0.7).unwrap();
        let payout = Payout::new("Alice", PrivateKey::new("0xkey"), 41, parties(), &split);

        let legs: Vec<_> = payout.legs().map(|(leg, tx)| (leg, payout.nonce_for(leg), tx.amount)).collect();
        assert_eq!(
            legs,
            vec![
                (PayoutLeg::Scholar, 41, 665),
                (PayoutLeg::Academy, 42, 285),
                (PayoutLeg::Fee, 43, 50),
            ]
        );
        assert!(payout.is_balanced());
        assert_eq!(payout.fee_transaction.to_address, addr(0x04));
        assert_eq!(payout.academy_transaction.from_address, addr(0x01));
    }

    #[test]
    fn private_key_debug_is_redacted() {
        let key = PrivateKey::new("0xdeadbeef");
        assert_eq!(format!("{:?}", key), "PrivateKey(<redacted>)");
        assert_eq!(key.expose(), "0xdeadbeef");
    }

    #[test]
    fn explorer_link() {
        let hash = TxHash::new("0xabc");
        assert_eq!(hash.explorer_url(), "https://explorer.roninchain.com/tx/0xabc");
    }
}
