//! # Ledger Logger
//!
//! One spreadsheet row per completed payout:
//!
//! ```text
//! | A    | B                 | C     | D       | E       | F   | G..         |
//! | name | dd-mm-yy HH:MM:SS | total | scholar | academy | fee | tx links... |
//! ```
//!
//! Timestamps are rendered in EST (fixed UTC-5). The row goes to the first
//! unused index, counted from the non-empty cells of column A. Appending is
//! not idempotent; callers record each payout once.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use slp_common::{CompletedTransfer, Payout, TxHash};

/// Row timestamp layout.
pub const TIMESTAMP_FORMAT: &str = "%d-%m-%y %H:%M:%S";

const EST_OFFSET_SECS: i32 = 5 * 3600;

/// Column used to find the next free row.
pub const KEY_COLUMN: &str = "A";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    #[error("ledger network error: {0}")]
    Network(String),

    #[error("ledger api rejected the request: {0}")]
    Rejected(String),

    #[error("invalid ledger response: {0}")]
    InvalidResponse(String),
}

/// A cell value. Numbers are sent unquoted so the sheet treats them as numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum LedgerCell {
    Text(String),
    Number(u64),
}

impl From<&str> for LedgerCell {
    fn from(s: &str) -> Self {
        LedgerCell::Text(s.to_string())
    }
}

impl From<String> for LedgerCell {
    fn from(s: String) -> Self {
        LedgerCell::Text(s)
    }
}

impl From<u64> for LedgerCell {
    fn from(n: u64) -> Self {
        LedgerCell::Number(n)
    }
}

#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Values of `column`, top to bottom. Trailing empty cells may be omitted.
    async fn read_column(&self, sheet_id: &str, column: &str) -> Result<Vec<String>, LedgerError>;

    /// Writes one row of `values` into `range`.
    async fn append_row(&self, sheet_id: &str, range: &str, values: &[LedgerCell]) -> Result<(), LedgerError>;
}

// ════════════════════════════════════════════════════════════════════════════════
// ROW FORMATTING
// ════════════════════════════════════════════════════════════════════════════════

pub fn ledger_timezone() -> FixedOffset {
    FixedOffset::west_opt(EST_OFFSET_SECS).unwrap_or_else(|| Utc.fix())
}

/// Spreadsheet column name for a 0-based index (`0` → `A`, `26` → `AA`).
pub fn column_letter(index: usize) -> String {
    let mut n = index + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    letters.iter().rev().map(|&b| b as char).collect()
}

/// 1-based index of the first unused row.
pub fn next_row(key_column: &[String]) -> usize {
    key_column.iter().filter(|v| !v.trim().is_empty()).count() + 1
}

/// Everything a ledger row records about one payout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerEntry {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub balance: u64,
    pub scholar_amount: u64,
    pub academy_amount: u64,
    pub fee_amount: u64,
    /// In submission order.
    pub tx_hashes: Vec<TxHash>,
}

impl LedgerEntry {
    pub fn from_payout(payout: &Payout, transfers: &[CompletedTransfer], timestamp: DateTime<Utc>) -> Self {
        Self {
            name: payout.name.clone(),
            timestamp,
            balance: payout.slp_balance,
            scholar_amount: payout.scholar_transaction.amount,
            academy_amount: payout.academy_transaction.amount,
            fee_amount: payout.fee_transaction.amount,
            tx_hashes: transfers.iter().map(|t| t.tx_hash.clone()).collect(),
        }
    }

    pub fn to_cells(&self) -> Vec<LedgerCell> {
        let when = self
            .timestamp
            .with_timezone(&ledger_timezone())
            .format(TIMESTAMP_FORMAT)
            .to_string();
        let mut cells = vec![
            LedgerCell::from(self.name.as_str()),
            LedgerCell::from(when),
            LedgerCell::from(self.balance),
            LedgerCell::from(self.scholar_amount),
            LedgerCell::from(self.academy_amount),
            LedgerCell::from(self.fee_amount),
        ];
        cells.extend(self.tx_hashes.iter().map(|h| LedgerCell::from(h.explorer_url())));
        cells
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// LOGGER
// ════════════════════════════════════════════════════════════════════════════════

pub struct LedgerLogger {
    store: Arc<dyn LedgerStore>,
    sheet_id: String,
}

impl LedgerLogger {
    pub fn new(store: Arc<dyn LedgerStore>, sheet_id: impl Into<String>) -> Self {
        Self {
            store,
            sheet_id: sheet_id.into(),
        }
    }

    /// Appends `entry` and returns the row it was written to.
    pub async fn record(&self, entry: &LedgerEntry) -> Result<usize, LedgerError> {
        let cells = entry.to_cells();
        let keys = self.store.read_column(&self.sheet_id, KEY_COLUMN).await?;
        let row = next_row(&keys);
        let range = format!(
            "{}{}:{}{}",
            KEY_COLUMN,
            row,
            column_letter(cells.len().saturating_sub(1)),
            row
        );
        self.store.append_row(&self.sheet_id, &range, &cells).await?;
        info!(scholar = %entry.name, row, "payout recorded in ledger");
        Ok(row)
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// MOCK STORE
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MockLedgerState {
    key_column: Vec<String>,
    rows: Vec<(String, Vec<LedgerCell>)>,
    failure: Option<LedgerError>,
}

/// In-memory sheet. Appended rows extend the key column with their first cell.
#[derive(Default)]
pub struct MockLedgerStore {
    state: Mutex<MockLedgerState>,
}

impl MockLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-fills column A (e.g. a header row).
    pub fn with_key_column(values: &[&str]) -> Self {
        let store = Self::new();
        store.state.lock().key_column = values.iter().map(|v| v.to_string()).collect();
        store
    }

    pub fn fail_with(&self, error: LedgerError) {
        self.state.lock().failure = Some(error);
    }

    /// `(range, cells)` of every appended row.
    pub fn rows(&self) -> Vec<(String, Vec<LedgerCell>)> {
        self.state.lock().rows.clone()
    }
}

#[async_trait]
impl LedgerStore for MockLedgerStore {
    async fn read_column(&self, _sheet_id: &str, _column: &str) -> Result<Vec<String>, LedgerError> {
        let state = self.state.lock();
        if let Some(e) = &state.failure {
            return Err(e.clone());
        }
        Ok(state.key_column.clone())
    }

    async fn append_row(&self, _sheet_id: &str, range: &str, values: &[LedgerCell]) -> Result<(), LedgerError> {
        let mut state = self.state.lock();
        if let Some(e) = &state.failure {
            return Err(e.clone());
        }
        let key = match values.first() {
            Some(LedgerCell::Text(s)) => s.clone(),
            Some(LedgerCell::Number(n)) => n.to_string(),
            None => String::new(),
        };
        state.key_column.push(key);
        state.rows.push((range.to_string(), values.to_vec()));
        Ok(())
    }
}
