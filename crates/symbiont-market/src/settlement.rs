//! Vote-driven settlement.
//!
//! A vote always counts: the solution's tallies and the seller's vote
//! inputs move whether or not any money is held. If a pending payment
//! exists it is then released to the seller (up) or refunded to the buyer
//! (down). A rail failure leaves the payment pending for a later vote. If
//! the funds moved but the outcome could not be stored, the payment stays
//! claimed and the next vote records it without paying again.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use symbiont_core::{Amount, PaymentStatus, PendingPayment, SellerProfile, Solution, VoteDirection};
use tracing::{debug, info, warn};

use crate::error::{MarketError, Result};
use crate::escrow::EscrowLedger;
use crate::rail::{PaymentRail, TxRef};
use crate::records::Records;

/// Cached-score nudge for an upvote.
const UPVOTE_NUDGE: i64 = 1;

/// Cached-score nudge for a downvote.
const DOWNVOTE_NUDGE: i64 = -2;

/// What happened to escrowed funds after a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SettlementOutcome {
    /// No pending payment matched the vote.
    NoPendingPayment,
    /// Funds went to the seller.
    Settled {
        /// Settled escrow entry.
        payment_id: String,
        /// Amount released.
        amount: Amount,
        /// Rail transaction; absent for free fixes.
        tx_ref: Option<TxRef>,
    },
    /// Funds went back to the buyer.
    Refunded {
        /// Refunded escrow entry.
        payment_id: String,
        /// Amount returned.
        amount: Amount,
        /// Rail transaction; absent for free fixes.
        tx_ref: Option<TxRef>,
    },
    /// The rail failed; the payment is still pending.
    Failed {
        /// Escrow entry left pending.
        payment_id: String,
        /// Rail error text.
        reason: String,
    },
}

/// Result of a vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    /// Voted solution.
    pub solution_id: String,
    /// Direction recorded.
    pub direction: VoteDirection,
    /// Upvotes after this vote.
    pub upvotes: u64,
    /// Downvotes after this vote.
    pub downvotes: u64,
    /// Success rate after this vote, 0-100.
    pub success_rate: u32,
    /// Effect on escrowed funds.
    pub settlement: SettlementOutcome,
}

/// Applies votes and settles the matching escrow entry.
pub struct SettlementCoordinator {
    records: Arc<Records>,
    ledger: Arc<EscrowLedger>,
    rail: Arc<dyn PaymentRail>,
    treasury: String,
}

impl SettlementCoordinator {
    pub(crate) fn new(
        records: Arc<Records>,
        ledger: Arc<EscrowLedger>,
        rail: Arc<dyn PaymentRail>,
        treasury: impl Into<String>,
    ) -> Self {
        Self {
            records,
            ledger,
            rail,
            treasury: treasury.into(),
        }
    }

    /// Records a vote on `solution_id` and settles one pending payment.
    ///
    /// `buyer` narrows settlement to that wallet's payments.
    pub fn vote(
        &self,
        solution_id: &str,
        direction: VoteDirection,
        buyer: Option<&str>,
    ) -> Result<VoteOutcome> {
        let solution = self
            .records
            .update::<Solution>(solution_id, |s| match direction {
                VoteDirection::Up => s.upvotes = s.upvotes.saturating_add(1),
                VoteDirection::Down => s.downvotes = s.downvotes.saturating_add(1),
            })?
            .ok_or_else(|| MarketError::not_found("solution", solution_id))?;

        let seller = self.records.update::<SellerProfile>(&solution.seller, |p| {
            let nudge = match direction {
                VoteDirection::Up => {
                    p.success_votes = p.success_votes.saturating_add(1);
                    UPVOTE_NUDGE
                }
                VoteDirection::Down => {
                    p.failure_votes = p.failure_votes.saturating_add(1);
                    DOWNVOTE_NUDGE
                }
            };
            p.reputation_score = (i64::from(p.reputation_score) + nudge).clamp(0, 100) as u32;
        })?;
        if seller.is_none() {
            debug!(seller = %solution.seller, "vote for unregistered seller");
        }

        info!(%solution_id, %direction, upvotes = solution.upvotes, downvotes = solution.downvotes, "vote recorded");

        let settlement = self.settle(&solution, direction, buyer)?;
        Ok(VoteOutcome {
            solution_id: solution.id.clone(),
            direction,
            upvotes: solution.upvotes,
            downvotes: solution.downvotes,
            success_rate: solution.success_rate(),
            settlement,
        })
    }

    fn settle(
        &self,
        solution: &Solution,
        direction: VoteDirection,
        buyer: Option<&str>,
    ) -> Result<SettlementOutcome> {
        for recovered in self.ledger.recover()? {
            if recovered.status == PaymentStatus::Settled {
                self.credit_seller(&recovered)?;
            }
        }

        let target = match direction {
            VoteDirection::Up => PaymentStatus::Settled,
            VoteDirection::Down => PaymentStatus::Refunded,
        };
        let Some(claim) = self
            .ledger
            .claim_oldest_pending(&solution.id, buyer, target, Utc::now())?
        else {
            debug!(solution_id = %solution.id, "no pending payment to settle");
            return Ok(SettlementOutcome::NoPendingPayment);
        };
        let payment = claim.payment().clone();
        let recipient = match direction {
            VoteDirection::Up => payment.seller.as_str(),
            VoteDirection::Down => payment.buyer.as_str(),
        };

        let tx_ref = if payment.amount.is_zero() {
            None
        } else {
            match self.rail.transfer(&self.treasury, recipient, payment.amount) {
                Ok(tx_ref) => Some(tx_ref),
                Err(e) => {
                    warn!(payment_id = %payment.id, error = %e, "settlement transfer failed");
                    if let Err(release) = claim.release() {
                        warn!(payment_id = %payment.id, error = %release, "claim left on payment");
                    }
                    return Ok(SettlementOutcome::Failed {
                        payment_id: payment.id,
                        reason: e.to_string(),
                    });
                }
            }
        };

        let committed = claim.commit(tx_ref.clone())?;
        info!(
            payment_id = %committed.id,
            status = %committed.status,
            amount = %committed.amount,
            %recipient,
            "payment settled"
        );

        match direction {
            VoteDirection::Up => {
                self.credit_seller(&committed)?;
                Ok(SettlementOutcome::Settled {
                    payment_id: committed.id,
                    amount: committed.amount,
                    tx_ref,
                })
            }
            VoteDirection::Down => Ok(SettlementOutcome::Refunded {
                payment_id: committed.id,
                amount: committed.amount,
                tx_ref,
            }),
        }
    }

    /// Adds a released payment to the solution's and the seller's earnings.
    fn credit_seller(&self, payment: &PendingPayment) -> Result<()> {
        self.records.update::<Solution>(&payment.solution_id, |s| {
            s.total_earnings = s.total_earnings.saturating_add(payment.amount);
        })?;
        self.records.upsert_seller(&payment.seller, Utc::now(), |p| {
            p.total_sales = p.total_sales.saturating_add(1);
            p.total_earnings = p.total_earnings.saturating_add(payment.amount);
        })?;
        Ok(())
    }
}
