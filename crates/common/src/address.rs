//! # Ronin Address Codec
//!
//! Addresses are shown to users as `ronin:<40 hex>` and sent to RPC
//! endpoints in canonical EIP-55 checksummed form `0x<40 hex>`. Both forms
//! carry the same 20 bytes; only the prefix differs.
//!
//! ## Rules
//!
//! - The display prefix is validated before any conversion.
//! - Input casing is not validated against the checksum (any casing is
//!   accepted); output is always checksummed.
//! - `to_canonical(to_display(to_canonical(a))) == to_canonical(a)`.

use std::fmt;
use std::str::FromStr;

use sha3::{Digest, Keccak256};
use thiserror::Error;

/// Prefix used in user-facing text.
pub const DISPLAY_PREFIX: &str = "ronin:";

/// Prefix of the canonical hexadecimal form.
pub const CANONICAL_PREFIX: &str = "0x";

/// Address width in bytes.
pub const ADDRESS_LEN: usize = 20;

const HEX_BODY_LEN: usize = ADDRESS_LEN * 2;

// ════════════════════════════════════════════════════════════════════════════════
// ERROR
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address `{input}` does not start with `{expected}`")]
    MissingPrefix { input: String, expected: &'static str },

    #[error("address `{0}` must have exactly 40 hex characters after the prefix")]
    InvalidLength(String),

    #[error("address `{0}` contains non-hex characters")]
    InvalidHex(String),
}

// ════════════════════════════════════════════════════════════════════════════════
// ADDRESS
// ════════════════════════════════════════════════════════════════════════════════

/// A 20-byte account address.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Parses the user-facing `ronin:` form.
    pub fn parse_display(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix(DISPLAY_PREFIX)
            .ok_or_else(|| AddressError::MissingPrefix {
                input: trimmed.to_string(),
                expected: DISPLAY_PREFIX,
            })?;
        Self::decode_body(trimmed, body)
    }

    /// Parses the canonical `0x` form.
    pub fn parse_canonical(input: &str) -> Result<Self, AddressError> {
        let trimmed = input.trim();
        let body = trimmed
            .strip_prefix(CANONICAL_PREFIX)
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| AddressError::MissingPrefix {
                input: trimmed.to_string(),
                expected: CANONICAL_PREFIX,
            })?;
        Self::decode_body(trimmed, body)
    }

    /// Checksummed `0x` form for API calls.
    pub fn to_canonical(&self) -> String {
        format!("{}{}", CANONICAL_PREFIX, self.checksum_body())
    }

    /// Checksummed `ronin:` form for chat output.
    pub fn to_display(&self) -> String {
        format!("{}{}", DISPLAY_PREFIX, self.checksum_body())
    }

    /// Lowercase hex without prefix.
    pub fn to_lower_hex(&self) -> String {
        hex::encode(self.0)
    }

    fn decode_body(original: &str, body: &str) -> Result<Self, AddressError> {
        if body.len() != HEX_BODY_LEN {
            return Err(AddressError::InvalidLength(original.to_string()));
        }
        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(body, &mut bytes)
            .map_err(|_| AddressError::InvalidHex(original.to_string()))?;
        Ok(Self(bytes))
    }

    /// EIP-55: uppercase a hex letter when the matching nibble of
    /// `keccak256(lowercase_hex)` is >= 8.
    fn checksum_body(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = Keccak256::digest(lower.as_bytes());

        lower
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if !c.is_ascii_alphabetic() {
                    return c;
                }
                let byte = hash[i / 2];
                let nibble = if i % 2 == 0 { byte >> 4 } else { byte & 0x0f };
                if nibble >= 8 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    /// Accepts either form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim_start().starts_with(DISPLAY_PREFIX) {
            Self::parse_display(s)
        } else {
            Self::parse_canonical(s)
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_display())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_canonical())
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// STRING CONVERSIONS
// ════════════════════════════════════════════════════════════════════════════════

/// `ronin:...` → checksummed `0x...`. Fails unless the display prefix is present.
pub fn to_canonical(display: &str) -> Result<String, AddressError> {
    Address::parse_display(display).map(|a| a.to_canonical())
}

/// `0x...` → checksummed `ronin:...`. Fails unless the canonical prefix is present.
pub fn to_display(canonical: &str) -> Result<String, AddressError> {
    Address::parse_canonical(canonical).map(|a| a.to_display())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    // Vectors from EIP-55.
    const CHECKSUMMED: [&str; 4] = [
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
        "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
        "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
        "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
    ];

    #[test]
    fn checksum_matches_eip55_vectors() {
        for expected in CHECKSUMMED {
            let display = format!("ronin:{}", expected[2..].to_lowercase());
            assert_eq!(to_canonical(&display).unwrap(), expected);
        }
    }

    #[test]
    fn display_keeps_checksum_casing() {
        let display = to_display("0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(display, "ronin:5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn missing_prefix_rejected() {
        let err = to_canonical("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(matches!(err, AddressError::MissingPrefix { expected: DISPLAY_PREFIX, .. }));

        let err = to_display("ronin:5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap_err();
        assert!(matches!(err, AddressError::MissingPrefix { expected: CANONICAL_PREFIX, .. }));
    }

    #[test]
    fn bad_length_and_hex_rejected() {
        assert!(matches!(
            to_canonical("ronin:1234"),
            Err(AddressError::InvalidLength(_))
        ));
        assert!(matches!(
            to_canonical("ronin:zzAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn from_str_accepts_both_forms() {
        let a: Address = "ronin:5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap();
        let b: Address = "0x5AAEB6053F3E94C9B9A09F33669435E7EF1BEAED".parse().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.to_string(), "ronin:5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed");
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        let a = Address::parse_display("  ronin:5aaeb6053f3e94c9b9a09f33669435e7ef1beaed\n").unwrap();
        assert_eq!(a.to_lower_hex(), "5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    proptest! {
        #[test]
        fn canonical_display_roundtrip(bytes in proptest::array::uniform20(any::<u8>())) {
            let display = format!("ronin:{}", hex::encode(bytes));
            let canonical = to_canonical(&display).unwrap();
            let again = to_canonical(&to_display(&canonical).unwrap()).unwrap();
            prop_assert_eq!(again, canonical);
        }
    }
}
