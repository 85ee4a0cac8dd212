//! # Nonce Cache
//!
//! Process-lifetime map from address to the next transaction nonce, with
//! one asynchronous lock per address.
//!
//! ## Lease Protocol
//!
//! ```text
//! NonceCache::lease(addr)      ── waits while another flow holds addr
//!      │
//!      ▼
//! NonceLease::refresh(chain)   ── read-through: eth_getTransactionCount
//!      │
//!      ▼
//! submit(nonce), submit(nonce+1), ...   mark_used() after each accepted one
//!      │
//!      ▼
//! drop(lease)                  ── next flow for addr may proceed
//! ```
//!
//! ## Invariants
//!
//! 1. Two leases for the same address never coexist, so nonce allocation of
//!    concurrent flows cannot interleave.
//! 2. `refresh` always queries the chain. The cached value only acts as a
//!    floor: a nonce this process saw accepted is never handed out again,
//!    even if the chain's `latest` count has not caught up yet.
//! 3. Addresses are independent; leasing one never blocks another.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::warn;

use slp_common::Address;

use crate::chain::{ChainClient, ChainError};

#[derive(Debug, Default)]
struct NonceSlot {
    /// Lowest nonce not yet consumed, as far as this process knows.
    next: Option<u64>,
}

#[derive(Default)]
pub struct NonceCache {
    slots: Mutex<HashMap<Address, Arc<AsyncMutex<NonceSlot>>>>,
}

impl NonceCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, address: Address) -> Arc<AsyncMutex<NonceSlot>> {
        self.slots.lock().entry(address).or_default().clone()
    }

    /// Takes exclusive ownership of `address` until the lease is dropped.
    pub async fn lease(&self, address: Address) -> NonceLease {
        let guard = self.slot(address).lock_owned().await;
        NonceLease {
            address,
            guard,
            refreshed: None,
        }
    }

    /// Whether some flow currently holds `address`.
    pub fn is_leased(&self, address: &Address) -> bool {
        let Some(slot) = self.slots.lock().get(address).cloned() else {
            return false;
        };
        let leased = slot.try_lock().is_err();
        leased
    }

    /// Last known next nonce. Advisory only; `None` while leased or unknown.
    pub fn peek(&self, address: &Address) -> Option<u64> {
        let slot = self.slots.lock().get(address).cloned()?;
        let guard = slot.try_lock().ok()?;
        guard.next
    }
}

/// Exclusive right to allocate nonces for one address.
pub struct NonceLease {
    address: Address,
    guard: OwnedMutexGuard<NonceSlot>,
    refreshed: Option<u64>,
}

impl NonceLease {
    pub fn address(&self) -> Address {
        self.address
    }

    /// Re-reads the transaction count from the chain and returns the nonce to
    /// use for the next submission.
    pub async fn refresh(&mut self, chain: &dyn ChainClient) -> Result<u64, ChainError> {
        let on_chain = chain.get_transaction_count(&self.address).await?;
        let nonce = match self.guard.next {
            Some(local) if local > on_chain => {
                warn!(
                    address = %self.address,
                    on_chain,
                    local,
                    "chain transaction count behind locally consumed nonces"
                );
                local
            }
            _ => on_chain,
        };
        self.guard.next = Some(nonce);
        self.refreshed = Some(nonce);
        Ok(nonce)
    }

    /// Nonce returned by the last `refresh` of this lease.
    pub fn current(&self) -> Option<u64> {
        self.refreshed
    }

    /// Records that `nonce` was accepted by the chain.
    pub fn mark_used(&mut self, nonce: u64) {
        let next = nonce.saturating_add(1);
        if self.guard.next.map_or(true, |n| next > n) {
            self.guard.next = Some(next);
        }
    }
}

impl std::fmt::Debug for NonceLease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NonceLease")
            .field("address", &self.address)
            .field("next", &self.guard.next)
            .field("refreshed", &self.refreshed)
            .finish()
    }
}
