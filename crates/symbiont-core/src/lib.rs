//! # symbiont-core
//!
//! Pure building blocks for the Symbiont fix marketplace.
//!
//! This crate provides:
//!
//! - [`Amount`] - USDC amount with fixed-point precision
//! - [`normalize`] / [`classify`] - error text normalization and typing
//! - [`similarity`] - keyword Jaccard similarity
//! - [`environment`] - runtime-environment compatibility scoring
//! - [`matching`] - multi-tier ranking of stored fixes against a failure report
//! - [`reputation`] - weighted seller trust score
//! - [`types`] - the Solution, SellerProfile, Bounty and PendingPayment records
//!
//! Nothing in here touches storage or money movement; see `symbiont-market`.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod amount;
pub mod environment;
pub mod error;
pub mod fingerprint;
pub mod matching;
pub mod normalize;
pub mod reputation;
pub mod similarity;
pub mod types;

pub use amount::Amount;
pub use environment::{AgentEnvironment, Environment, VersionConstraint, environment_score};
pub use error::CoreError;
pub use fingerprint::{bounty_fingerprint, solution_fingerprint};
pub use matching::{MatchResult, MatchType, lookup, search};
pub use normalize::{classify, normalize};
pub use reputation::{
    BreakdownRow, ReputationBreakdown, ReputationLevel, reputation_level, reputation_score,
};
pub use similarity::{keywords, similarity};
pub use types::{
    Bounty, BountyStatus, PaymentStatus, PayoutClaim, PendingPayment, SellerProfile, SettlementClaim,
    Solution, VoteDirection,
};
