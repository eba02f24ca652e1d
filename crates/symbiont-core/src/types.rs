//! Marketplace records.
//!
//! The four entities are independent top-level records correlated only by id
//! and wallet strings. Lifecycle enums expose `can_transition_to` so the
//! stateful layer can check a move before it commits it.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::environment::{AgentEnvironment, Environment};
use crate::error::CoreError;

/// A purchasable fix for a class of errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Solution {
    /// Fingerprint of the error signature (plus bounty environment).
    pub id: String,
    /// Raw error text the fix was written for.
    pub error_signature: String,
    /// The fix payload, revealed only after purchase.
    pub fix: String,
    /// Price per purchase.
    pub price: Amount,
    /// Seller wallet.
    pub seller: String,
    /// Declared supported environment, if any.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Upload time.
    pub created_at: DateTime<Utc>,
    /// Completed purchases.
    #[serde(default)]
    pub usage_count: u64,
    /// Funds released to the seller for this fix.
    #[serde(default)]
    pub total_earnings: Amount,
    /// Buyer approvals.
    #[serde(default)]
    pub upvotes: u64,
    /// Buyer rejections.
    #[serde(default)]
    pub downvotes: u64,
    /// Bounty this fix was written for.
    #[serde(default)]
    pub bounty_id: Option<String>,
}

impl Solution {
    /// Share of upvotes among all votes, 0-100; 100 when nobody voted.
    #[must_use]
    pub fn success_rate(&self) -> u32 {
        let total = self.upvotes.saturating_add(self.downvotes);
        if total == 0 {
            return 100;
        }
        (100.0 * self.upvotes as f64 / total as f64).round() as u32
    }
}

/// A fix seller and the inputs to its reputation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerProfile {
    /// Wallet address, lowercase. Unique key.
    pub wallet: String,
    /// Linked identity username.
    #[serde(default)]
    pub username: Option<String>,
    /// Stars reported by the identity provider.
    #[serde(default)]
    pub stars: u64,
    /// Contributions reported by the identity provider.
    #[serde(default)]
    pub contributions: u64,
    /// Registration time.
    pub joined_at: DateTime<Utc>,
    /// Completed, approved sales.
    #[serde(default)]
    pub total_sales: u64,
    /// Funds released to this seller.
    #[serde(default)]
    pub total_earnings: Amount,
    /// Upvotes received.
    #[serde(default)]
    pub success_votes: u64,
    /// Downvotes received.
    #[serde(default)]
    pub failure_votes: u64,
    /// Amount staked.
    #[serde(default)]
    pub staked: Amount,
    /// Cached reputation score; recomputable from the fields above.
    #[serde(default)]
    pub reputation_score: u32,
}

impl SellerProfile {
    /// Creates a profile with no history and its initial cached score.
    #[must_use]
    pub fn new(wallet: impl Into<String>, joined_at: DateTime<Utc>) -> Self {
        let mut profile = Self {
            wallet: wallet.into(),
            username: None,
            stars: 0,
            contributions: 0,
            joined_at,
            total_sales: 0,
            total_earnings: Amount::ZERO,
            success_votes: 0,
            failure_votes: 0,
            staked: Amount::ZERO,
            reputation_score: 0,
        };
        profile.reputation_score = crate::reputation::reputation_score(&profile, joined_at);
        profile
    }
}

/// Lifecycle of a bounty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BountyStatus {
    /// Waiting for a solver.
    Open,
    /// A solver announced they are working on it.
    Claimed,
    /// Resolved by a solution. Terminal.
    Solved,
}

impl BountyStatus {
    /// Checks if a transition to the target status is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use BountyStatus::{Claimed, Open, Solved};

        matches!((self, target), (Open, Claimed) | (Open | Claimed, Solved))
    }
}

impl fmt::Display for BountyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "open"),
            Self::Claimed => write!(f, "claimed"),
            Self::Solved => write!(f, "solved"),
        }
    }
}

impl FromStr for BountyStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "claimed" => Ok(Self::Claimed),
            "solved" => Ok(Self::Solved),
            other => Err(CoreError::validation(format!("unknown bounty status: {other}"))),
        }
    }
}

/// A reward offered for a fix to an unsolved error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounty {
    /// Bounty id.
    pub id: String,
    /// Fingerprint of error signature plus environment; dedup key.
    pub fingerprint: String,
    /// Raw error text.
    pub error_signature: String,
    /// Environment the error was seen in.
    pub environment: AgentEnvironment,
    /// Reward paid to the solver.
    pub reward: Amount,
    /// Wallet that filed the bounty.
    pub requester: String,
    /// Current status.
    pub status: BountyStatus,
    /// Wallet that claimed or solved the bounty.
    #[serde(default)]
    pub solver: Option<String>,
    /// Solution that resolved the bounty.
    #[serde(default)]
    pub solution_id: Option<String>,
    /// Filing time.
    pub created_at: DateTime<Utc>,
    /// Advisory expiry; nothing transitions when it passes.
    pub expires_at: DateTime<Utc>,
    /// Payout in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payout: Option<PayoutClaim>,
}

/// Marks a bounty whose reward is being paid.
///
/// Set before the rail is called and cleared when the bounty is marked
/// solved or the payout fails. While set, no other resolver or claimer can
/// act on the bounty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayoutClaim {
    /// Wallet being paid.
    pub solver: String,
    /// Solution the bounty is being resolved with.
    pub solution_id: String,
    /// When the payout started.
    pub claimed_at: DateTime<Utc>,
}

/// Lifecycle of an escrowed payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Held until the buyer votes.
    Pending,
    /// Released to the seller.
    Settled,
    /// Returned to the buyer.
    Refunded,
}

impl PaymentStatus {
    /// Checks if a transition to the target status is valid.
    #[must_use]
    pub const fn can_transition_to(&self, target: &Self) -> bool {
        use PaymentStatus::{Pending, Refunded, Settled};

        matches!((self, target), (Pending, Settled | Refunded))
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Settled => write!(f, "settled"),
            Self::Refunded => write!(f, "refunded"),
        }
    }
}

/// A buyer's payment held in escrow until a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPayment {
    /// Escrow entry id.
    pub id: String,
    /// Purchased solution.
    pub solution_id: String,
    /// Paying wallet.
    pub buyer: String,
    /// Wallet paid on approval.
    pub seller: String,
    /// Amount held.
    pub amount: Amount,
    /// Current status.
    pub status: PaymentStatus,
    /// Transaction reference of the inbound payment.
    pub tx_ref: String,
    /// Purchase time.
    pub created_at: DateTime<Utc>,
    /// Advisory expiry.
    pub expires_at: DateTime<Utc>,
    /// Settlement in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim: Option<SettlementClaim>,
    /// Rail transaction that moved the funds out of escrow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settlement_tx: Option<String>,
}

/// Marks an escrow entry whose funds are being moved.
///
/// Written before the rail is called. A claimed entry is skipped by every
/// other settler until the claim is committed or released.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementClaim {
    /// Status the settler is moving the entry to.
    pub target: PaymentStatus,
    /// When the claim was taken.
    pub claimed_at: DateTime<Utc>,
}

/// A buyer's verdict on a purchased fix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteDirection {
    /// The fix worked.
    Up,
    /// The fix did not work.
    Down,
}

impl fmt::Display for VoteDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Up => write!(f, "up"),
            Self::Down => write!(f, "down"),
        }
    }
}

impl FromStr for VoteDirection {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            other => Err(CoreError::validation(format!(
                "vote must be \"up\" or \"down\", got {other:?}"
            ))),
        }
    }
}
