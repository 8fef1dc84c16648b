//! Account domain model.
//!
//! # Responsibility
//! - Define the locally managed signing account shown in account tables.
//! - Validate address and private-key shapes before anything touches a node.
//!
//! # Invariants
//! - `address` is `0x` followed by 40 hex digits.
//! - `private_key` is 64 hex digits, optionally `0x`-prefixed.
//! - Private keys never appear in `Debug` output or logs.
//!
//! Key derivation is external; callers supply the address with its key.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};

static ADDRESS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^0x[0-9a-fA-F]{40}$").expect("address regex is valid"));
static PRIVATE_KEY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0x)?[0-9a-fA-F]{64}$").expect("private key regex is valid"));

/// The all-zero address used on-chain for "no owner".
pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

/// Account input validation failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccountValidationError {
    EmptyName,
    InvalidAddress(String),
    InvalidPrivateKey,
}

impl Display for AccountValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "account name must not be blank"),
            Self::InvalidAddress(value) => write!(f, "invalid account address: `{value}`"),
            Self::InvalidPrivateKey => write!(f, "private key must be 64 hex digits"),
        }
    }
}

impl Error for AccountValidationError {}

/// Locally stored signing account.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub address: String,
    pub private_key: String,
}

impl Account {
    /// Builds a validated account; name and key are trimmed.
    pub fn new(
        name: impl Into<String>,
        address: impl Into<String>,
        private_key: impl Into<String>,
    ) -> Result<Self, AccountValidationError> {
        let account = Self {
            name: name.into().trim().to_string(),
            address: address.into().trim().to_string(),
            private_key: private_key.into().trim().to_string(),
        };
        account.validate()?;
        Ok(account)
    }

    pub fn validate(&self) -> Result<(), AccountValidationError> {
        if self.name.trim().is_empty() {
            return Err(AccountValidationError::EmptyName);
        }
        validate_address(&self.address)?;
        if !PRIVATE_KEY_RE.is_match(&self.private_key) {
            return Err(AccountValidationError::InvalidPrivateKey);
        }
        Ok(())
    }

    /// Case-insensitive address comparison.
    pub fn has_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address.trim())
    }
}

impl Debug for Account {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Account")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// Checks the `0x` + 40 hex digit address shape.
pub fn validate_address(address: &str) -> Result<(), AccountValidationError> {
    if ADDRESS_RE.is_match(address) {
        Ok(())
    } else {
        Err(AccountValidationError::InvalidAddress(address.to_string()))
    }
}

/// Returns whether `address` is the zero address (unowned).
pub fn is_zero_address(address: &str) -> bool {
    address.trim().eq_ignore_ascii_case(ZERO_ADDRESS)
}
