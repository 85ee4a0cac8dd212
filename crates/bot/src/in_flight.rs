//! Registry of commands currently running, keyed by invoking identity.
//!
//! One identity runs at most one flow at a time. The registration is an RAII
//! guard, so a flow that errors out or panics still releases its slot.
//! Claims being executed are attached to their slot for inspection.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use slp_common::{ClaimState, FlowKind, PayoutError, SlpClaim};

#[derive(Debug, Clone)]
struct Flight {
    kind: FlowKind,
    claim: Option<SlpClaim>,
}

#[derive(Default, Clone)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashMap<String, Flight>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a flow for `identity`, failing with
    /// [`PayoutError::FlowInFlight`] if one is already running.
    pub fn try_begin(&self, identity: &str, kind: FlowKind) -> Result<FlightGuard, PayoutError> {
        let mut active = self.active.lock();
        if let Some(existing) = active.get(identity) {
            return Err(PayoutError::FlowInFlight(existing.kind));
        }
        active.insert(identity.to_string(), Flight { kind, claim: None });
        Ok(FlightGuard {
            active: self.active.clone(),
            identity: identity.to_string(),
        })
    }

    pub fn active_flow(&self, identity: &str) -> Option<FlowKind> {
        self.active.lock().get(identity).map(|f| f.kind)
    }

    /// Snapshot of the claim attached to `identity`'s flow.
    pub fn claim(&self, identity: &str) -> Option<SlpClaim> {
        self.active.lock().get(identity).and_then(|f| f.claim.clone())
    }

    pub fn len(&self) -> usize {
        self.active.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.active.lock().is_empty()
    }
}

/// Releases the identity's slot on drop.
pub struct FlightGuard {
    active: Arc<Mutex<HashMap<String, Flight>>>,
    identity: String,
}

impl FlightGuard {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn attach_claim(&self, claim: &SlpClaim) {
        if let Some(flight) = self.active.lock().get_mut(&self.identity) {
            flight.claim = Some(claim.clone());
        }
    }

    pub fn update_claim_state(&self, state: ClaimState) {
        if let Some(claim) = self
            .active
            .lock()
            .get_mut(&self.identity)
            .and_then(|f| f.claim.as_mut())
        {
            claim.state = state;
        }
    }
}

impl Drop for FlightGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.identity);
    }
}
