//! # Chain Client: Balance Oracle & Transfer Collaborator
//!
//! Trait boundary between the command flows and the Ronin chain.
//!
//! ```text
//! claim / payout flow
//!      │
//!      ├─ get_unclaimed_balance / get_claimed_balance   (oracle reads)
//!      ├─ get_transaction_count                         (nonce source)
//!      ├─ submit_transfer(tx, key, nonce) → TxHash      (payout legs)
//!      └─ submit_claim(claim, nonce) → Option<TxHash>   (claim)
//!      │
//!      ▼
//! dyn ChainClient  ──►  RoninRpcClient (HTTP)  |  MockChainClient (tests)
//! ```
//!
//! ## Contract
//!
//! - Implementations perform a single attempt; no internal retry.
//! - `submit_claim` returns `Ok(None)` when the chain produced no
//!   signature. Callers treat that exactly like a failure.
//! - Implementations never log private keys.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use thiserror::Error;

use slp_common::{Address, PrivateKey, SlpClaim, Transaction, TxHash};

// ════════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════════

/// Transport or chain-level failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("chain network error: {0}")]
    Network(String),

    #[error("chain rejected the request: {0}")]
    Rejected(String),

    #[error("invalid chain response: {0}")]
    InvalidResponse(String),

    #[error("chain request timed out")]
    Timeout,
}

// ════════════════════════════════════════════════════════════════════════════════
// TRAIT
// ════════════════════════════════════════════════════════════════════════════════

#[async_trait]
pub trait ChainClient: Send + Sync {
    /// SLP earned in game but not yet claimed on chain.
    async fn get_unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError>;

    /// SLP held on chain by `address`.
    async fn get_claimed_balance(&self, address: &Address) -> Result<u64, ChainError>;

    /// Number of transactions sent from `address` (the next nonce).
    async fn get_transaction_count(&self, address: &Address) -> Result<u64, ChainError>;

    /// Signs and submits one SLP transfer.
    async fn submit_transfer(
        &self,
        transaction: &Transaction,
        private_key: &PrivateKey,
        nonce: u64,
    ) -> Result<TxHash, ChainError>;

    /// Claims the unclaimed balance of `claim.address`.
    async fn submit_claim(&self, claim: &SlpClaim, nonce: u64) -> Result<Option<TxHash>, ChainError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// MOCK
// ════════════════════════════════════════════════════════════════════════════════

/// A transfer the mock accepted or refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTransfer {
    pub transaction: Transaction,
    pub nonce: u64,
    pub accepted: bool,
}

/// How the mock answers the next claim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockClaimResponse {
    Signed,
    NoSignature,
    Fail(ChainError),
}

#[derive(Default)]
struct MockChainState {
    unclaimed: HashMap<Address, u64>,
    claimed: HashMap<Address, u64>,
    tx_counts: HashMap<Address, u64>,
    transfers: Vec<RecordedTransfer>,
    claims: Vec<(Address, u64)>,
    /// Fails the transfer with this submission index (0-based, global).
    transfer_failure: Option<(usize, ChainError)>,
    claim_response: Option<MockClaimResponse>,
    query_failure: Option<ChainError>,
    tx_count_queries: usize,
    next_hash: u64,
}

impl MockChainState {
    fn issue_hash(&mut self) -> TxHash {
        self.next_hash += 1;
        TxHash::new(format!("0x{:064x}", self.next_hash))
    }

    fn check_query(&self) -> Result<(), ChainError> {
        match &self.query_failure {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

/// In-memory chain for tests. Accepted transfers bump the sender's
/// transaction count and debit its claimed balance; accepted claims move the
/// unclaimed balance into the claimed balance.
#[derive(Default)]
pub struct MockChainClient {
    state: Mutex<MockChainState>,
}

impl MockChainClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_unclaimed(&self, address: Address, amount: u64) {
        self.state.lock().unclaimed.insert(address, amount);
    }

    pub fn set_claimed(&self, address: Address, amount: u64) {
        self.state.lock().claimed.insert(address, amount);
    }

    pub fn set_transaction_count(&self, address: Address, count: u64) {
        self.state.lock().tx_counts.insert(address, count);
    }

    /// Refuse the `index`-th transfer submission (0-based, counted across
    /// all addresses).
    pub fn fail_transfer_at(&self, index: usize, error: ChainError) {
        self.state.lock().transfer_failure = Some((index, error));
    }

    pub fn set_claim_response(&self, response: MockClaimResponse) {
        self.state.lock().claim_response = Some(response);
    }

    /// Make every balance and nonce query fail.
    pub fn fail_queries(&self, error: ChainError) {
        self.state.lock().query_failure = Some(error);
    }

    pub fn transfers(&self) -> Vec<RecordedTransfer> {
        self.state.lock().transfers.clone()
    }

    pub fn accepted_transfers(&self) -> Vec<RecordedTransfer> {
        self.state
            .lock()
            .transfers
            .iter()
            .filter(|t| t.accepted)
            .cloned()
            .collect()
    }

    /// `(address, nonce)` of every claim submission.
    pub fn claims(&self) -> Vec<(Address, u64)> {
        self.state.lock().claims.clone()
    }

    pub fn tx_count_queries(&self) -> usize {
        self.state.lock().tx_count_queries
    }

    pub fn claimed_balance(&self, address: &Address) -> u64 {
        self.state.lock().claimed.get(address).copied().unwrap_or(0)
    }
}

#[async_trait]
impl ChainClient for MockChainClient {
    async fn get_unclaimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let state = self.state.lock();
        state.check_query()?;
        Ok(state.unclaimed.get(address).copied().unwrap_or(0))
    }

    async fn get_claimed_balance(&self, address: &Address) -> Result<u64, ChainError> {
        let state = self.state.lock();
        state.check_query()?;
        Ok(state.claimed.get(address).copied().unwrap_or(0))
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, ChainError> {
        let mut state = self.state.lock();
        state.check_query()?;
        state.tx_count_queries += 1;
        Ok(state.tx_counts.get(address).copied().unwrap_or(0))
    }

    async fn submit_transfer(
        &self,
        transaction: &Transaction,
        _private_key: &PrivateKey,
        nonce: u64,
    ) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        let index = state.transfers.len();

        let scheduled_failure = match &state.transfer_failure {
            Some((fail_index, error)) if *fail_index == index => Some(error.clone()),
            _ => None,
        };
        if let Some(error) = scheduled_failure {
            state.transfers.push(RecordedTransfer {
                transaction: *transaction,
                nonce,
                accepted: false,
            });
            return Err(error);
        }

        let expected = state.tx_counts.get(&transaction.from_address).copied().unwrap_or(0);
        if nonce != expected {
            state.transfers.push(RecordedTransfer {
                transaction: *transaction,
                nonce,
                accepted: false,
            });
            return Err(ChainError::Rejected(format!(
                "nonce {} does not match expected {}",
                nonce, expected
            )));
        }

        state.tx_counts.insert(transaction.from_address, expected + 1);
        let balance = state.claimed.entry(transaction.from_address).or_insert(0);
        *balance = balance.saturating_sub(transaction.amount);
        state.transfers.push(RecordedTransfer {
            transaction: *transaction,
            nonce,
            accepted: true,
        });
        Ok(state.issue_hash())
    }

    async fn submit_claim(&self, claim: &SlpClaim, nonce: u64) -> Result<Option<TxHash>, ChainError> {
        let mut state = self.state.lock();
        state.claims.push((claim.address, nonce));

        match state.claim_response.clone().unwrap_or(MockClaimResponse::Signed) {
            MockClaimResponse::Fail(e) => Err(e),
            MockClaimResponse::NoSignature => Ok(None),
            MockClaimResponse::Signed => {
                let unclaimed = state.unclaimed.remove(&claim.address).unwrap_or(0);
                *state.claimed.entry(claim.address).or_insert(0) += unclaimed;
                *state.tx_counts.entry(claim.address).or_insert(0) += 1;
                Ok(Some(state.issue_hash()))
            }
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// COMPILE-TIME ASSERTIONS
// ════════════════════════════════════════════════════════════════════════════════

const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn check() {
        assert_send_sync::<MockChainClient>();
    }
    let _ = check;
};

#[cfg(test)]
mod tests {
    use super::*;
    use slp_common::ClaimState;

    fn addr(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    fn transfer(amount: u64) -> Transaction {
        Transaction {
            from_address: addr(1),
            to_address: addr(2),
            amount,
        }
    }

    #[tokio::test]
    async fn mock_enforces_nonce_order() {
        let chain = MockChainClient::new();
        chain.set_transaction_count(addr(1), 5);
        chain.set_claimed(addr(1), 100);
        let key = PrivateKey::new("k");

        assert!(chain.submit_transfer(&transfer(10), &key, 5).await.is_ok());
        let err = chain.submit_transfer(&transfer(10), &key, 5).await.unwrap_err();
        assert!(matches!(err, ChainError::Rejected(_)));
        assert!(chain.submit_transfer(&transfer(10), &key, 6).await.is_ok());

        assert_eq!(chain.get_transaction_count(&addr(1)).await, Ok(7));
        assert_eq!(chain.claimed_balance(&addr(1)), 80);
        assert_eq!(chain.accepted_transfers().len(), 2);
    }

    #[tokio::test]
    async fn mock_claim_without_signature() {
        let chain = MockChainClient::new();
        chain.set_unclaimed(addr(1), 30);
        chain.set_claim_response(MockClaimResponse::NoSignature);

        let claim = SlpClaim {
            name: "Alice".into(),
            address: addr(1),
            private_key: PrivateKey::new("k"),
            claimed_balance: 0,
            unclaimed_balance: 30,
            state: ClaimState::Pending,
        };
        assert_eq!(chain.submit_claim(&claim, 0).await, Ok(None));
        assert_eq!(chain.get_unclaimed_balance(&addr(1)).await, Ok(30));
    }

    #[tokio::test]
    async fn mock_query_failure() {
        let chain = MockChainClient::new();
        chain.fail_queries(ChainError::Timeout);
        assert_eq!(chain.get_claimed_balance(&addr(1)).await, Err(ChainError::Timeout));
    }
}
