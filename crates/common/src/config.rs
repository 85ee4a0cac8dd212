//! Account configuration loader (JSON or TOML, picked by file extension).
//!
//! Layout (JSON shown, TOML mirrors it):
//!
//! ```json
//! {
//!   "accounts": {
//!     "scholars": {
//!       "<chat user id>": {
//!         "Name": "Alice",
//!         "AccountAddress": "ronin:...",
//!         "PrivateKey": "0x...",
//!         "ScholarPayoutAddress": "ronin:...",
//!         "ScholarPayoutPercentage": 0.6
//!       }
//!     },
//!     "fee_payout_percentage": 0.05,
//!     "fee_payout_address": "ronin:...",
//!     "academy_payout_address": "ronin:..."
//!   },
//!   "sheets_id": "<spreadsheet id>"
//! }
//! ```
//!
//! Addresses and percentages stay raw here and are resolved per command, so a
//! bad entry fails only the command that touches it.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::address::Address;
use crate::error::PayoutError;
use crate::payout_math::Percentage;
use crate::types::{PayoutParties, PrivateKey};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {0} not found")]
    NotFound(PathBuf),

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid JSON config: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid TOML config: {0}")]
    Toml(#[from] toml::de::Error),
}

// ════════════════════════════════════════════════════════════════════════════════
// FILE STRUCTURE
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub accounts: AccountsConfig,

    /// Spreadsheet that receives one row per completed payout.
    #[serde(rename = "sheets_id", alias = "ledger_id")]
    pub ledger_id: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AccountsConfig {
    /// Keyed by chat identity.
    #[serde(default)]
    pub scholars: BTreeMap<String, ScholarRecord>,

    pub fee_payout_percentage: f64,

    pub fee_payout_address: String,

    pub academy_payout_address: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScholarRecord {
    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "AccountAddress")]
    pub account_address: String,

    #[serde(rename = "PrivateKey")]
    pub private_key: PrivateKey,

    #[serde(rename = "ScholarPayoutAddress")]
    pub payout_address: String,

    #[serde(rename = "ScholarPayoutPercentage")]
    pub payout_percentage: f64,
}

// ════════════════════════════════════════════════════════════════════════════════
// LOADING
// ════════════════════════════════════════════════════════════════════════════════

/// Load config from a file path. `.toml` files are parsed as TOML, anything
/// else as JSON. A missing file is reported as [`ConfigError::NotFound`].
pub fn load_from_file(path: impl AsRef<Path>) -> Result<BotConfig, ConfigError> {
    let p = path.as_ref();
    let s = fs::read_to_string(p).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(p.to_path_buf())
        } else {
            ConfigError::Io {
                path: p.to_path_buf(),
                source,
            }
        }
    })?;

    let is_toml = p
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if is_toml {
        BotConfig::from_toml_str(&s)
    } else {
        BotConfig::from_json_str(&s)
    }
}

impl BotConfig {
    pub fn from_json_str(s: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(s)?)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn scholar(&self, identity: &str) -> Result<&ScholarRecord, PayoutError> {
        self.accounts
            .scholars
            .get(identity)
            .ok_or_else(|| PayoutError::UnknownScholar {
                identity: identity.to_string(),
            })
    }

    /// Resolves every address and percentage, returning all defects found.
    /// Used by the `check-config` command; commands resolve lazily.
    pub fn validate(&self) -> Vec<PayoutError> {
        let mut issues = Vec::new();
        if let Err(e) = self.accounts.fee_percentage() {
            issues.push(e);
        }
        if let Err(e) = self.accounts.academy_address() {
            issues.push(e);
        }
        if let Err(e) = self.accounts.fee_address() {
            issues.push(e);
        }
        for scholar in self.accounts.scholars.values() {
            if let Err(e) = scholar.account() {
                issues.push(e);
            }
            if let Err(e) = scholar.payout() {
                issues.push(e);
            }
            if let Err(e) = scholar.payout_share() {
                issues.push(e);
            }
        }
        issues
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// RESOLUTION
// ════════════════════════════════════════════════════════════════════════════════

fn resolve_address(raw: &str, context: String) -> Result<Address, PayoutError> {
    Address::parse_display(raw).map_err(|source| PayoutError::InvalidAddressFormat { context, source })
}

fn resolve_percentage(value: f64, context: String) -> Result<Percentage, PayoutError> {
    Percentage::from_fraction(value).map_err(|_| PayoutError::InvalidPercentage { context, value })
}

impl AccountsConfig {
    pub fn fee_percentage(&self) -> Result<Percentage, PayoutError> {
        resolve_percentage(self.fee_payout_percentage, "fee_payout_percentage".to_string())
    }

    pub fn fee_address(&self) -> Result<Address, PayoutError> {
        resolve_address(&self.fee_payout_address, "fee_payout_address".to_string())
    }

    pub fn academy_address(&self) -> Result<Address, PayoutError> {
        resolve_address(&self.academy_payout_address, "academy_payout_address".to_string())
    }
}

impl ScholarRecord {
    pub fn account(&self) -> Result<Address, PayoutError> {
        resolve_address(&self.account_address, format!("account address of `{}`", self.name))
    }

    pub fn payout(&self) -> Result<Address, PayoutError> {
        resolve_address(&self.payout_address, format!("payout address of `{}`", self.name))
    }

    pub fn payout_share(&self) -> Result<Percentage, PayoutError> {
        resolve_percentage(self.payout_percentage, format!("payout percentage of `{}`", self.name))
    }

    /// All four addresses a payout touches.
    pub fn parties(&self, accounts: &AccountsConfig) -> Result<PayoutParties, PayoutError> {
        Ok(PayoutParties {
            source: self.account()?,
            scholar: self.payout()?,
            academy: accounts.academy_address()?,
            fee: accounts.fee_address()?,
        })
    }
}
