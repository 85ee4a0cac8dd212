//! # SLP Common Crate
//!
//! Shared building blocks for the SLP payout bot.
//!
//! ## Modules
//! - `address`: `ronin:` ↔ checksummed `0x` address codec
//! - `payout_math`: fee / scholar / academy split with fixed rounding policy
//! - `types`: transactions, payouts, claims
//! - `config`: account configuration file loading and resolution
//! - `error`: command error taxonomy
//!
//! ## Payout Split
//! ```text
//!  balance ──► fee = floor(balance * fee%)
//!                │
//!                ▼
//!          remainder ──► scholar = ceil(remainder * scholar%)
//!                │
//!                ▼
//!          academy = remainder - scholar
//! ```

pub mod address;
pub mod config;
pub mod error;
pub mod payout_math;
pub mod types;

pub use address::{to_canonical, to_display, Address, AddressError};
pub use config::{load_from_file, AccountsConfig, BotConfig, ConfigError, ScholarRecord};
pub use error::PayoutError;
pub use payout_math::{compute_split, split_payout, PayoutSplit, Percentage, SplitError};
pub use types::{
    BalanceKind, ClaimState, CompletedTransfer, FlowKind, Payout, PayoutLeg, PayoutParties,
    PrivateKey, SlpClaim, Transaction, TxHash, EXPLORER_TX_URL,
};
