//! # symbiont-market
//!
//! Stateful side of the Symbiont fix marketplace.
//!
//! This crate provides:
//!
//! - Storage, payment-rail and identity-stats ports with in-process adapters
//! - The escrow ledger holding buyer payments until a vote
//! - Vote-driven settlement through the payment rail
//! - The bounty board and reward payouts
//! - [`SymbiontMarket`], the facade every caller goes through
//!
//! All operations are synchronous. Shared records are updated under short
//! locks that are never held across a rail call; payments and bounties are
//! claimed before their transfer so each pays out at most once.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod bounty;
pub mod config;
pub mod error;
pub mod escrow;
pub mod identity;
pub mod market;
pub mod rail;
mod records;
pub mod settlement;
pub mod store;

pub use bounty::{BountyBoard, BountyFilter, BountyPayout, BountyRequest};
pub use config::MarketConfig;
pub use error::{ConflictRecord, MarketError, Result};
pub use escrow::{EscrowLedger, PaymentClaim, PurchaseOutcome};
pub use identity::{IdentityError, IdentityStats, IdentityStatsProvider, StaticIdentityStats};
pub use market::{
    BountyResolution, SellerReport, SolutionPreview, SymbiontMarket, UnstakeOutcome, UploadOutcome,
    UploadRequest,
};
pub use rail::{PaymentProof, PaymentRail, RailError, SimulatedRail, TransferRecord, TxRef, VerifiedPayment};
pub use settlement::{SettlementCoordinator, SettlementOutcome, VoteOutcome};
pub use store::{
    Expectation, JsonFileStore, MemoryStore, PurchaseReceipt, Record, RecordStore, RecordStoreExt,
    StoreError, WriteBatch,
};
