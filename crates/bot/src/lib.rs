//! # SLP Bot
//!
//! Chat command handler for claiming SLP and paying out scholar earnings.
//!
//! ## Commands
//! - `claim`: claim the invoker's unclaimed SLP after a `yes` confirmation
//! - `sendpayout` (alias `sendslp`): split the claimed balance into scholar,
//!   academy and fee transfers, submit them in order, record a ledger row
//! - `scholars`: list configured scholars (elevated role only)
//!
//! ## Architecture
//! ```text
//!  POST /events ──► mpsc ──► Dispatcher ──┬─► claim_flow ──┐
//!                               │         └─► payout_flow ─┤
//!                               ▼                          ▼
//!                      ConfirmationGate        NonceCache / TransferExecutor
//!                                                          │
//!                     ChatTransport ◄──────────────────────┼──► ChainClient
//!                                                          └──► LedgerLogger
//! ```
//!
//! External systems sit behind the `ChainClient`, `ChatTransport` and
//! `LedgerStore` traits, each with an HTTP implementation and an in-memory
//! mock.

pub mod chain;
pub mod chat;
pub mod claim_flow;
pub mod confirmation;
pub mod context;
pub mod dispatcher;
pub mod in_flight;
pub mod ledger;
pub mod nonce_cache;
pub mod payout_flow;
pub mod rpc;
pub mod sheets;
pub mod transfer_executor;
pub mod webhook;

pub use chain::{ChainClient, ChainError, MockChainClient, MockClaimResponse, RecordedTransfer};
pub use chat::{
    ChatError, ChatEvent, ChatTransport, IncomingMessage, MockChatTransport, PermissionCheck,
    PostedMessage, Reply, RolePermission,
};
pub use claim_flow::{run_claim, ClaimReport};
pub use confirmation::{
    evaluate_reply, ConfirmationGate, ConfirmationOutcome, PendingConfirmation, CONFIRMATION_WINDOW,
};
pub use context::{BotContext, BotSettings};
pub use dispatcher::{parse_command, Command, Dispatcher};
pub use in_flight::{FlightGuard, InFlightRegistry};
pub use ledger::{LedgerCell, LedgerEntry, LedgerError, LedgerLogger, LedgerStore, MockLedgerStore};
pub use nonce_cache::{NonceCache, NonceLease};
pub use payout_flow::{run_payout, LedgerStatus, PayoutReport};
pub use rpc::{RoninRpcClient, RpcEndpoints};
pub use sheets::GoogleSheetsStore;
pub use transfer_executor::{
    execute_claim, execute_payout, ClaimOutcome, LegFailure, SequenceOutcome, TransferSequence,
    INTER_SUBMISSION_PAUSE,
};
pub use webhook::{build_ingress_router, serve_ingress, HttpChatTransport};
