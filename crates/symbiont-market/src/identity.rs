//! Identity-stats provider port.
//!
//! Sellers may link a public developer identity. Its activity counts feed
//! the identity dimension of the reputation score.

use std::collections::HashMap;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Activity counts for a linked identity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityStats {
    /// Stars across the identity's public projects.
    pub stars: u64,
    /// Contributions in the last year.
    pub contributions: u64,
}

/// Errors returned by an identity-stats provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentityError {
    /// The provider does not know the username.
    #[error("unknown identity: {0}")]
    UnknownUser(String),

    /// The provider could not be reached.
    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

/// Looks up activity counts for a username.
pub trait IdentityStatsProvider: Send + Sync {
    /// Returns the counts for `username`.
    fn stats(&self, username: &str) -> Result<IdentityStats, IdentityError>;
}

/// Provider backed by a fixed in-memory table.
#[derive(Debug, Default)]
pub struct StaticIdentityStats {
    users: RwLock<HashMap<String, IdentityStats>>,
}

impl StaticIdentityStats {
    /// Creates an empty provider.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a user, builder style.
    #[must_use]
    pub fn with_user(self, username: &str, stars: u64, contributions: u64) -> Self {
        self.insert(username, IdentityStats { stars, contributions });
        self
    }

    /// Adds or replaces a user.
    pub fn insert(&self, username: &str, stats: IdentityStats) {
        self.users.write().insert(username.to_lowercase(), stats);
    }
}

impl IdentityStatsProvider for StaticIdentityStats {
    fn stats(&self, username: &str) -> Result<IdentityStats, IdentityError> {
        self.users
            .read()
            .get(&username.to_lowercase())
            .copied()
            .ok_or_else(|| IdentityError::UnknownUser(username.to_string()))
    }
}
