//! Escrow ledger for purchased fixes.
//!
//! A purchase opens a [`PendingPayment`] that holds the buyer's funds until
//! a vote settles it. Settlement first marks the oldest pending entry for a
//! solution as claimed in storage, then moves the funds, then records the
//! outcome. A claimed entry is invisible to every other settler, in this
//! process or another one sharing the store, so two concurrent votes can
//! never release the same payment twice.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use symbiont_core::{PaymentStatus, PendingPayment, SettlementClaim, Solution};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{MarketError, Result};
use crate::rail::{TxRef, VerifiedPayment};
use crate::records::{Records, Step};
use crate::store::{PurchaseReceipt, RecordStoreExt, WriteBatch};

/// What a purchase returns to the buyer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseOutcome {
    /// Purchased solution.
    pub solution_id: String,
    /// The fix payload.
    pub fix: String,
    /// Escrow entry holding the payment.
    pub payment_id: String,
    /// Paying wallet.
    pub buyer: String,
    /// True when this proof was already used and the cached result returned.
    pub replayed: bool,
}

impl PurchaseOutcome {
    fn from_receipt(receipt: PurchaseReceipt, replayed: bool) -> Self {
        Self {
            solution_id: receipt.solution_id,
            fix: receipt.fix,
            payment_id: receipt.payment_id,
            buyer: receipt.buyer,
            replayed,
        }
    }
}

/// Moves a pending payment to `target` if its lifecycle allows it.
fn transition_to(payment: &mut PendingPayment, target: PaymentStatus) -> Result<()> {
    if payment.status.can_transition_to(&target) {
        payment.status = target;
        Ok(())
    } else {
        Err(MarketError::InvalidStateTransition {
            from: payment.status.to_string(),
            to: target.to_string(),
        })
    }
}

/// A settlement whose funds moved but whose outcome is not stored yet.
#[derive(Debug, Clone)]
struct Unrecorded {
    target: PaymentStatus,
    tx_ref: Option<TxRef>,
}

/// Holds buyer payments until settlement.
pub struct EscrowLedger {
    records: Arc<Records>,
    ttl: Duration,
    unrecorded: Mutex<HashMap<String, Unrecorded>>,
}

impl EscrowLedger {
    pub(crate) fn new(records: Arc<Records>, ttl_days: u32) -> Self {
        Self {
            records,
            ttl: Duration::days(i64::from(ttl_days)),
            unrecorded: Mutex::new(HashMap::new()),
        }
    }

    /// Opens an escrow entry for a verified payment and returns the fix.
    ///
    /// Idempotent per inbound transaction: replaying a proof returns the
    /// first result and opens nothing new. The escrow entry, the receipt
    /// and the solution's usage count are written in one batch, so a failed
    /// write leaves no trace and the proof can simply be presented again.
    pub fn purchase(
        &self,
        solution: &Solution,
        payment: &VerifiedPayment,
        now: DateTime<Utc>,
    ) -> Result<PurchaseOutcome> {
        let store = self.records.store();
        let tx_ref = payment.tx_ref.as_str();
        let payment_id = format!("pay_{}", Uuid::new_v4().simple());

        let outcome = self.records.transact::<Solution, _, MarketError>(&solution.id, |current| {
            if let Some(receipt) = store.get::<PurchaseReceipt>(tx_ref)? {
                return Ok(Step::Stop(PurchaseOutcome::from_receipt(receipt, true)));
            }
            let mut current = current.ok_or_else(|| MarketError::not_found("solution", solution.id.clone()))?;
            current.usage_count = current.usage_count.saturating_add(1);

            let pending = PendingPayment {
                id: payment_id.clone(),
                solution_id: current.id.clone(),
                buyer: payment.payer.clone(),
                seller: current.seller.clone(),
                amount: current.price,
                status: PaymentStatus::Pending,
                tx_ref: tx_ref.to_string(),
                created_at: now,
                expires_at: now + self.ttl,
                claim: None,
                settlement_tx: None,
            };
            let receipt = PurchaseReceipt {
                tx_ref: tx_ref.to_string(),
                solution_id: current.id.clone(),
                payment_id: pending.id.clone(),
                buyer: pending.buyer.clone(),
                fix: current.fix.clone(),
                created_at: now,
            };
            let batch = WriteBatch::new()
                .expect_absent::<PurchaseReceipt>(tx_ref)
                .put(&pending)?
                .put(&receipt)?
                .put(&current)?;
            Ok(Step::Commit(batch, PurchaseOutcome::from_receipt(receipt, false)))
        })?;

        if outcome.replayed {
            debug!(%tx_ref, solution_id = %outcome.solution_id, "purchase replayed");
        } else {
            info!(
                payment_id = %outcome.payment_id,
                solution_id = %outcome.solution_id,
                buyer = %outcome.buyer,
                amount = %solution.price,
                "escrow opened"
            );
        }
        Ok(outcome)
    }

    /// Claims the oldest pending payment for `solution_id` for a move to
    /// `target`.
    ///
    /// With `buyer` set only that wallet's payments are considered. The
    /// claim is written to storage before this returns, and the payment
    /// stays invisible to other claimers until the returned
    /// [`PaymentClaim`] is committed or released.
    pub fn claim_oldest_pending(
        &self,
        solution_id: &str,
        buyer: Option<&str>,
        target: PaymentStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentClaim<'_>>> {
        if !PaymentStatus::Pending.can_transition_to(&target) {
            return Err(MarketError::InvalidStateTransition {
                from: PaymentStatus::Pending.to_string(),
                to: target.to_string(),
            });
        }

        let mut candidates: Vec<PendingPayment> = self
            .records
            .store()
            .all::<PendingPayment>()?
            .into_iter()
            .filter(|p| p.status == PaymentStatus::Pending && p.claim.is_none())
            .filter(|p| p.solution_id == solution_id)
            .filter(|p| buyer.is_none_or(|b| p.buyer == b))
            .collect();
        candidates.sort_by_key(|p| p.created_at);

        for candidate in candidates {
            let claimed = self
                .records
                .transact::<PendingPayment, _, MarketError>(&candidate.id, |current| match current {
                    Some(mut payment) if payment.status == PaymentStatus::Pending && payment.claim.is_none() => {
                        payment.claim = Some(SettlementClaim {
                            target,
                            claimed_at: now,
                        });
                        Ok(Step::Commit(WriteBatch::new().put(&payment)?, Some(payment)))
                    }
                    _ => Ok(Step::Stop(None)),
                })?;

            if let Some(payment) = claimed {
                debug!(payment_id = %payment.id, %target, "payment claimed");
                return Ok(Some(PaymentClaim {
                    ledger: self,
                    payment,
                    target,
                    open: true,
                }));
            }
        }
        Ok(None)
    }

    /// Stores settlements whose funds already moved but whose outcome
    /// could not be written at the time.
    ///
    /// Returns the payments recorded by this call. Entries that still
    /// cannot be written are kept for the next call.
    pub fn recover(&self) -> Result<Vec<PendingPayment>> {
        let mut waiting: Vec<(String, Unrecorded)> = self.unrecorded.lock().drain().collect();
        let mut recorded = Vec::new();

        while let Some((payment_id, outcome)) = waiting.pop() {
            match self.record(&payment_id, outcome.target, outcome.tx_ref.as_ref()) {
                Ok(payment) => {
                    info!(%payment_id, status = %payment.status, "settlement recovered");
                    recorded.push(payment);
                }
                Err(e @ MarketError::Storage(_)) => {
                    warn!(%payment_id, error = %e, "settlement still unrecorded");
                    let mut unrecorded = self.unrecorded.lock();
                    unrecorded.insert(payment_id, outcome);
                    unrecorded.extend(waiting);
                    break;
                }
                Err(e) => error!(%payment_id, error = %e, "settlement cannot be recorded"),
            }
        }
        Ok(recorded)
    }

    /// Returns a payment by id.
    pub fn get(&self, payment_id: &str) -> Result<PendingPayment> {
        self.records
            .store()
            .get::<PendingPayment>(payment_id)?
            .ok_or_else(|| MarketError::not_found("payment", payment_id))
    }

    /// Lists payments for a solution, oldest first.
    pub fn payments_for(&self, solution_id: &str) -> Result<Vec<PendingPayment>> {
        let mut payments: Vec<_> = self
            .records
            .store()
            .all::<PendingPayment>()?
            .into_iter()
            .filter(|p| p.solution_id == solution_id)
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }

    fn record(&self, payment_id: &str, target: PaymentStatus, tx_ref: Option<&TxRef>) -> Result<PendingPayment> {
        self.records.transact::<PendingPayment, _, MarketError>(payment_id, |current| {
            let mut payment = current.ok_or_else(|| MarketError::not_found("payment", payment_id))?;
            transition_to(&mut payment, target)?;
            payment.claim = None;
            payment.settlement_tx = tx_ref.map(ToString::to_string);
            Ok(Step::Commit(WriteBatch::new().put(&payment)?, payment))
        })
    }

    fn release_claim(&self, payment_id: &str) -> Result<()> {
        self.records.transact::<PendingPayment, _, MarketError>(payment_id, |current| match current {
            Some(mut payment) if payment.status == PaymentStatus::Pending && payment.claim.is_some() => {
                payment.claim = None;
                Ok(Step::Commit(WriteBatch::new().put(&payment)?, ()))
            }
            _ => Ok(Step::Stop(())),
        })
    }
}

/// Exclusive hold on a pending payment during settlement.
///
/// Dropping the claim without committing or releasing it releases it.
pub struct PaymentClaim<'a> {
    ledger: &'a EscrowLedger,
    payment: PendingPayment,
    target: PaymentStatus,
    open: bool,
}

impl PaymentClaim<'_> {
    /// The claimed payment as it was when claimed.
    #[must_use]
    pub fn payment(&self) -> &PendingPayment {
        &self.payment
    }

    /// Status the payment moves to on commit.
    #[must_use]
    pub fn target(&self) -> PaymentStatus {
        self.target
    }

    /// Records that the funds moved and ends the claim.
    ///
    /// If storage fails the claim stays on the payment and the outcome is
    /// kept until [`EscrowLedger::recover`] writes it, so the funds are
    /// never moved a second time.
    pub fn commit(mut self, tx_ref: Option<TxRef>) -> Result<PendingPayment> {
        self.open = false;
        let payment_id = self.payment.id.clone();
        match self.ledger.record(&payment_id, self.target, tx_ref.as_ref()) {
            Ok(payment) => {
                debug!(%payment_id, status = %payment.status, "payment committed");
                Ok(payment)
            }
            Err(e) => {
                if matches!(e, MarketError::Storage(_)) {
                    warn!(%payment_id, error = %e, "settlement not recorded, claim kept");
                    self.ledger.unrecorded.lock().insert(
                        payment_id,
                        Unrecorded {
                            target: self.target,
                            tx_ref,
                        },
                    );
                }
                Err(e)
            }
        }
    }

    /// Gives the payment back to other settlers without moving funds.
    pub fn release(mut self) -> Result<()> {
        self.open = false;
        self.ledger.release_claim(&self.payment.id)
    }
}

impl Drop for PaymentClaim<'_> {
    fn drop(&mut self) {
        if self.open {
            if let Err(e) = self.ledger.release_claim(&self.payment.id) {
                warn!(payment_id = %self.payment.id, error = %e, "claim not released");
            }
        }
    }
}
