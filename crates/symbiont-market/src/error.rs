//! Error types for symbiont-market.

use std::fmt;

use serde::Serialize;
use symbiont_core::{Bounty, CoreError, SellerProfile, Solution};
use thiserror::Error;

use crate::identity::IdentityError;
use crate::rail::RailError;
use crate::store::StoreError;

/// The existing record a conflicting write collided with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "record", rename_all = "snake_case")]
pub enum ConflictRecord {
    /// An open bounty with the same fingerprint.
    Bounty(Bounty),
    /// A solution with the same fingerprint.
    Solution(Solution),
    /// A seller already registered under the wallet.
    Seller(SellerProfile),
}

impl fmt::Display for ConflictRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bounty(b) => write!(f, "bounty {} is already open for this error", b.id),
            Self::Solution(s) => write!(f, "solution {} already exists for this error", s.id),
            Self::Seller(s) => write!(f, "seller {} is already registered", s.wallet),
        }
    }
}

/// Errors that can occur in marketplace operations.
#[derive(Debug, Error)]
pub enum MarketError {
    /// Malformed or missing input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown id.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Record kind.
        kind: &'static str,
        /// The id that was looked up.
        id: String,
    },

    /// Duplicate record; the existing one is attached.
    #[error("conflict: {0}")]
    Conflict(Box<ConflictRecord>),

    /// Action invalid for the record's current lifecycle state.
    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition {
        /// The current state.
        from: String,
        /// The attempted target state.
        to: String,
    },

    /// The payment rail did not complete the transfer.
    #[error("payment rail failure: {0}")]
    Rail(#[from] RailError),

    /// The record store failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StoreError),

    /// The identity-stats provider failed.
    #[error("identity provider failure: {0}")]
    Identity(#[from] IdentityError),
}

impl MarketError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a not-found error.
    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound { kind, id: id.into() }
    }

    /// Creates a conflict error carrying the existing record.
    #[must_use]
    pub fn conflict(existing: ConflictRecord) -> Self {
        Self::Conflict(Box::new(existing))
    }

    /// Returns the attached record if this is a conflict.
    #[must_use]
    pub fn conflicting_record(&self) -> Option<&ConflictRecord> {
        match self {
            Self::Conflict(existing) => Some(existing),
            _ => None,
        }
    }
}

impl From<CoreError> for MarketError {
    fn from(e: CoreError) -> Self {
        Self::Validation(e.to_string())
    }
}

/// Result alias for marketplace operations.
pub type Result<T> = std::result::Result<T, MarketError>;
