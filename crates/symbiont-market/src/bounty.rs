//! Bounty board.
//!
//! Agents post rewards for errors nobody has fixed yet. A bounty moves
//! `open -> claimed -> solved` (or straight to solved) and pays its reward
//! out of the treasury exactly once. At most one open bounty exists per
//! fingerprint.
//!
//! A payout is marked on the stored bounty before the rail is called. While
//! the mark is there no other resolver or claimer can touch the bounty, and
//! if the solved state cannot be written after the transfer the mark stays
//! until a retry records it without paying again.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use symbiont_core::{
    AgentEnvironment, Amount, Bounty, BountyStatus, PayoutClaim, bounty_fingerprint, reputation_score,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{ConflictRecord, MarketError, Result};
use crate::rail::{PaymentRail, TxRef};
use crate::records::{Records, Step};
use crate::store::{RecordStoreExt, WriteBatch};

/// Label reported as the current state of a bounty with a payout underway.
const RESOLVING: &str = "resolving";

/// Parameters for a new bounty.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BountyRequest {
    /// The unsolved error text.
    pub error_signature: String,
    /// Where the error occurs; unknown when absent.
    #[serde(default)]
    pub environment: Option<AgentEnvironment>,
    /// Reward; the configured default when absent.
    #[serde(default)]
    pub reward: Option<Amount>,
    /// Requesting wallet.
    pub requester: String,
}

/// A resolved bounty and its payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BountyPayout {
    /// The bounty after resolution.
    pub bounty: Bounty,
    /// Amount paid to the solver.
    pub reward: Amount,
    /// Rail transaction; absent for zero rewards.
    pub tx_ref: Option<TxRef>,
}

/// Filter for [`BountyBoard::list`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BountyFilter {
    /// Only bounties in this status.
    pub status: Option<BountyStatus>,
    /// Only bounties from this wallet.
    pub requester: Option<String>,
}

/// A reward that reached the solver but is not yet recorded as solved.
#[derive(Debug, Clone)]
struct PaidOut {
    solver: String,
    solution_id: String,
    tx_ref: Option<TxRef>,
}

/// Creates, claims and pays out bounties.
pub struct BountyBoard {
    records: Arc<Records>,
    rail: Arc<dyn PaymentRail>,
    treasury: String,
    default_reward: Amount,
    ttl: Duration,
    create_lock: Mutex<()>,
    unrecorded: Mutex<HashMap<String, PaidOut>>,
}

impl BountyBoard {
    pub(crate) fn new(
        records: Arc<Records>,
        rail: Arc<dyn PaymentRail>,
        treasury: impl Into<String>,
        default_reward: Amount,
        ttl_days: u32,
    ) -> Self {
        Self {
            records,
            rail,
            treasury: treasury.into(),
            default_reward,
            ttl: Duration::days(i64::from(ttl_days)),
            create_lock: Mutex::new(()),
            unrecorded: Mutex::new(HashMap::new()),
        }
    }

    /// Opens a bounty.
    ///
    /// # Errors
    ///
    /// [`MarketError::Conflict`] carrying the existing bounty when an open
    /// one already covers the same error and environment.
    pub fn create(&self, request: BountyRequest, now: DateTime<Utc>) -> Result<Bounty> {
        if request.error_signature.trim().is_empty() {
            return Err(MarketError::validation("error signature cannot be empty"));
        }
        if request.requester.trim().is_empty() {
            return Err(MarketError::validation("requester cannot be empty"));
        }

        let environment = request.environment.unwrap_or_else(AgentEnvironment::unknown);
        let fingerprint = bounty_fingerprint(&request.error_signature, &environment);

        let store = self.records.store();
        let _guard = self.create_lock.lock();
        if let Some(existing) = store
            .all::<Bounty>()?
            .into_iter()
            .find(|b| b.fingerprint == fingerprint && b.status == BountyStatus::Open)
        {
            return Err(MarketError::conflict(ConflictRecord::Bounty(existing)));
        }

        let bounty = Bounty {
            id: format!("bounty_{}", Uuid::new_v4().simple()),
            fingerprint,
            error_signature: request.error_signature,
            environment,
            reward: request.reward.unwrap_or(self.default_reward),
            requester: request.requester,
            status: BountyStatus::Open,
            solver: None,
            solution_id: None,
            created_at: now,
            expires_at: now + self.ttl,
            payout: None,
        };
        store.put(&bounty)?;

        info!(bounty_id = %bounty.id, fingerprint = %bounty.fingerprint, reward = %bounty.reward, "bounty created");
        Ok(bounty)
    }

    /// Marks an open bounty as being worked on by `solver`.
    pub fn claim(&self, bounty_id: &str, solver: &str) -> Result<Bounty> {
        if solver.trim().is_empty() {
            return Err(MarketError::validation("solver cannot be empty"));
        }

        let bounty = self.records.transact::<Bounty, _, MarketError>(bounty_id, |current| {
            let mut bounty = current.ok_or_else(|| MarketError::not_found("bounty", bounty_id))?;
            if bounty.payout.is_some() {
                return Err(MarketError::InvalidStateTransition {
                    from: RESOLVING.to_string(),
                    to: BountyStatus::Claimed.to_string(),
                });
            }
            transition_to(&mut bounty, BountyStatus::Claimed)?;
            bounty.solver = Some(solver.to_string());
            Ok(Step::Commit(WriteBatch::new().put(&bounty)?, bounty))
        })?;

        info!(%bounty_id, %solver, "bounty claimed");
        Ok(bounty)
    }

    /// Resolves a bounty with `solution_id` and pays `solver` its reward.
    ///
    /// The payout happens before the bounty is marked solved. If the rail
    /// fails the bounty is left as it was and the call can be retried. If
    /// the reward was paid but the bounty could not be marked solved, a
    /// retry marks it solved for the original solver without paying again.
    pub fn resolve(&self, bounty_id: &str, solver: &str, solution_id: &str) -> Result<BountyPayout> {
        if solver.trim().is_empty() {
            return Err(MarketError::validation("solver cannot be empty"));
        }

        let pending = self.unrecorded.lock().remove(bounty_id);
        if let Some(paid) = pending {
            debug!(%bounty_id, solver = %paid.solver, "recording earlier payout");
            return self.record_solved(bounty_id, paid);
        }

        let now = Utc::now();
        let bounty = self.records.transact::<Bounty, _, MarketError>(bounty_id, |current| {
            let mut bounty = current.ok_or_else(|| MarketError::not_found("bounty", bounty_id))?;
            if bounty.payout.is_some() {
                return Err(MarketError::InvalidStateTransition {
                    from: RESOLVING.to_string(),
                    to: BountyStatus::Solved.to_string(),
                });
            }
            if !bounty.status.can_transition_to(&BountyStatus::Solved) {
                return Err(MarketError::InvalidStateTransition {
                    from: bounty.status.to_string(),
                    to: BountyStatus::Solved.to_string(),
                });
            }
            bounty.payout = Some(PayoutClaim {
                solver: solver.to_string(),
                solution_id: solution_id.to_string(),
                claimed_at: now,
            });
            Ok(Step::Commit(WriteBatch::new().put(&bounty)?, bounty))
        })?;

        let tx_ref = if bounty.reward.is_zero() {
            None
        } else {
            match self.rail.transfer(&self.treasury, solver, bounty.reward) {
                Ok(tx) => Some(tx),
                Err(e) => {
                    warn!(%bounty_id, %solver, error = %e, "bounty payout failed");
                    if let Err(release) = self.release_payout(bounty_id) {
                        warn!(%bounty_id, error = %release, "payout mark left on bounty");
                    }
                    return Err(e.into());
                }
            }
        };

        self.record_solved(
            bounty_id,
            PaidOut {
                solver: solver.to_string(),
                solution_id: solution_id.to_string(),
                tx_ref,
            },
        )
    }

    /// Marks a paid bounty solved and credits the solver.
    fn record_solved(&self, bounty_id: &str, paid: PaidOut) -> Result<BountyPayout> {
        let written = self.records.transact::<Bounty, _, MarketError>(bounty_id, |current| {
            let mut bounty = current.ok_or_else(|| MarketError::not_found("bounty", bounty_id))?;
            transition_to(&mut bounty, BountyStatus::Solved)?;
            bounty.payout = None;
            bounty.solver = Some(paid.solver.clone());
            bounty.solution_id = Some(paid.solution_id.clone());
            Ok(Step::Commit(WriteBatch::new().put(&bounty)?, bounty))
        });
        let solved = match written {
            Ok(solved) => solved,
            Err(e) => {
                if matches!(e, MarketError::Storage(_)) {
                    warn!(%bounty_id, solver = %paid.solver, error = %e, "payout not recorded, mark kept");
                    self.unrecorded.lock().insert(bounty_id.to_string(), paid);
                }
                return Err(e);
            }
        };

        let now = Utc::now();
        self.records.upsert_seller(&paid.solver, now, |p| {
            p.total_sales = p.total_sales.saturating_add(1);
            p.total_earnings = p.total_earnings.saturating_add(solved.reward);
            p.reputation_score = reputation_score(p, now);
        })?;

        info!(%bounty_id, solver = %paid.solver, solution_id = %paid.solution_id, reward = %solved.reward, "bounty solved");
        Ok(BountyPayout {
            reward: solved.reward,
            bounty: solved,
            tx_ref: paid.tx_ref,
        })
    }

    fn release_payout(&self, bounty_id: &str) -> Result<()> {
        self.records.transact::<Bounty, _, MarketError>(bounty_id, |current| match current {
            Some(mut bounty) if bounty.payout.is_some() && bounty.status != BountyStatus::Solved => {
                bounty.payout = None;
                Ok(Step::Commit(WriteBatch::new().put(&bounty)?, ()))
            }
            _ => Ok(Step::Stop(())),
        })
    }

    /// Returns a bounty by id.
    pub fn get(&self, bounty_id: &str) -> Result<Bounty> {
        self.load(bounty_id)
    }

    /// Lists bounties, newest first.
    pub fn list(&self, filter: &BountyFilter) -> Result<Vec<Bounty>> {
        let mut bounties: Vec<Bounty> = self
            .records
            .store()
            .all::<Bounty>()?
            .into_iter()
            .filter(|b| filter.status.is_none_or(|s| b.status == s))
            .filter(|b| filter.requester.as_deref().is_none_or(|r| b.requester == r))
            .collect();
        bounties.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(bounties)
    }

    fn load(&self, bounty_id: &str) -> Result<Bounty> {
        self.records
            .store()
            .get::<Bounty>(bounty_id)?
            .ok_or_else(|| MarketError::not_found("bounty", bounty_id))
    }
}

fn transition_to(bounty: &mut Bounty, target: BountyStatus) -> Result<()> {
    if bounty.status.can_transition_to(&target) {
        bounty.status = target;
        Ok(())
    } else {
        Err(MarketError::InvalidStateTransition {
            from: bounty.status.to_string(),
            to: target.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rail::SimulatedRail;
    use crate::rail::test_support::StoreDroppingRail;
    use crate::store::{MemoryStore, RecordStore};
    use std::collections::BTreeMap;
    use symbiont_core::SellerProfile;

    fn board() -> (BountyBoard, Arc<SimulatedRail>, Arc<Records>) {
        let records = Arc::new(Records::new(Arc::new(MemoryStore::new())));
        let rail = Arc::new(SimulatedRail::new());
        let board = BountyBoard::new(
            Arc::clone(&records),
            Arc::clone(&rail) as Arc<dyn PaymentRail>,
            "treasury",
            Amount::from_usdc(1),
            7,
        );
        (board, rail, records)
    }

    fn node_env() -> AgentEnvironment {
        AgentEnvironment {
            os: "linux".into(),
            runtime: "node".into(),
            runtime_version: "18.17.0".into(),
            dependencies: BTreeMap::new(),
        }
    }

    fn request(signature: &str) -> BountyRequest {
        BountyRequest {
            error_signature: signature.into(),
            environment: Some(node_env()),
            reward: None,
            requester: "0xrequester".into(),
        }
    }

    // ==================== Create ====================

    #[test]
    fn create_applies_defaults() {
        let (board, _, _) = board();
        let now = Utc::now();
        let bounty = board
            .create(
                BountyRequest {
                    error_signature: "Error: boom".into(),
                    requester: "0xr".into(),
                    ..BountyRequest::default()
                },
                now,
            )
            .unwrap();

        assert_eq!(bounty.status, BountyStatus::Open);
        assert_eq!(bounty.reward, Amount::from_usdc(1));
        assert_eq!(bounty.environment, AgentEnvironment::unknown());
        assert_eq!(bounty.expires_at, now + Duration::days(7));
        assert!(bounty.id.starts_with("bounty_"));
    }

    #[test]
    fn duplicate_open_bounty_conflicts() {
        let (board, _, _) = board();
        let first = board.create(request("Error: boom"), Utc::now()).unwrap();

        let err = board.create(request("Error: boom"), Utc::now()).unwrap_err();
        assert!(matches!(
            err.conflicting_record(),
            Some(ConflictRecord::Bounty(existing)) if existing.id == first.id
        ));
    }

    #[test]
    fn different_environment_is_a_different_bounty() {
        let (board, _, _) = board();
        board.create(request("Error: boom"), Utc::now()).unwrap();

        let mut other = request("Error: boom");
        other.environment = Some(AgentEnvironment {
            os: "darwin".into(),
            ..node_env()
        });
        assert!(board.create(other, Utc::now()).is_ok());
    }

    #[test]
    fn empty_signature_is_rejected() {
        let (board, _, _) = board();
        assert!(matches!(
            board.create(request("  "), Utc::now()),
            Err(MarketError::Validation(_))
        ));
    }

    // ==================== Lifecycle ====================

    #[test]
    fn claim_then_resolve_pays_solver() {
        let (board, rail, records) = board();
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();

        let claimed = board.claim(&bounty.id, "0xsolver").unwrap();
        assert_eq!(claimed.status, BountyStatus::Claimed);
        assert!(board.claim(&bounty.id, "0xother").is_err());

        let payout = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap();
        assert_eq!(payout.bounty.status, BountyStatus::Solved);
        assert_eq!(payout.bounty.solution_id.as_deref(), Some("sol1"));
        assert!(payout.tx_ref.is_some());
        assert_eq!(rail.transfers()[0].to, "0xsolver");

        let solver: SellerProfile = records.store().get("0xsolver").unwrap().unwrap();
        assert_eq!(solver.total_earnings, Amount::from_usdc(1));
        assert_eq!(solver.total_sales, 1);
    }

    #[test]
    fn solved_bounty_cannot_be_resolved_again() {
        let (board, rail, _) = board();
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();
        board.resolve(&bounty.id, "0xsolver", "sol1").unwrap();

        let err = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap_err();
        assert!(matches!(err, MarketError::InvalidStateTransition { .. }));
        assert_eq!(rail.transfer_count(), 1);
    }

    #[test]
    fn failed_payout_leaves_bounty_open() {
        let (board, rail, _) = board();
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();
        rail.fail_next(1);

        let err = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap_err();
        assert!(matches!(err, MarketError::Rail(_)));
        let left = board.get(&bounty.id).unwrap();
        assert_eq!(left.status, BountyStatus::Open);
        assert!(left.payout.is_none());

        let payout = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap();
        assert_eq!(payout.bounty.status, BountyStatus::Solved);
    }

    #[test]
    fn claim_while_payout_is_marked_is_refused() {
        let (board, _, records) = board();
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();
        records
            .update::<Bounty>(&bounty.id, |b| {
                b.payout = Some(PayoutClaim {
                    solver: "0xfirst".into(),
                    solution_id: "sol1".into(),
                    claimed_at: Utc::now(),
                });
            })
            .unwrap();

        let err = board.claim(&bounty.id, "0xsecond").unwrap_err();
        assert!(matches!(err, MarketError::InvalidStateTransition { ref from, .. } if from == "resolving"));
        let err = board.resolve(&bounty.id, "0xsecond", "sol2").unwrap_err();
        assert!(matches!(err, MarketError::InvalidStateTransition { ref from, .. } if from == "resolving"));
    }

    #[test]
    fn unrecorded_payout_is_finished_without_paying_again() {
        let store = Arc::new(MemoryStore::new());
        let records = Arc::new(Records::new(Arc::clone(&store) as Arc<dyn RecordStore>));
        let rail = Arc::new(SimulatedRail::new());
        let board = BountyBoard::new(
            Arc::clone(&records),
            Arc::new(StoreDroppingRail::new(Arc::clone(&rail), Arc::clone(&store))),
            "treasury",
            Amount::from_usdc(1),
            7,
        );
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();

        let err = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap_err();
        assert!(matches!(err, MarketError::Storage(_)));
        assert_eq!(rail.transfer_count(), 1);

        store.set_unavailable(false);
        let marked = board.get(&bounty.id).unwrap();
        assert_eq!(marked.status, BountyStatus::Open);
        assert_eq!(marked.payout.map(|p| p.solver).as_deref(), Some("0xsolver"));
        assert!(board.claim(&bounty.id, "0xother").is_err());

        let payout = board.resolve(&bounty.id, "0xother", "sol2").unwrap();
        assert_eq!(rail.transfer_count(), 1);
        assert_eq!(payout.bounty.status, BountyStatus::Solved);
        assert_eq!(payout.bounty.solver.as_deref(), Some("0xsolver"));
        assert_eq!(payout.bounty.solution_id.as_deref(), Some("sol1"));
        assert!(payout.bounty.payout.is_none());

        let solver: SellerProfile = records.store().get("0xsolver").unwrap().unwrap();
        assert_eq!(solver.total_sales, 1);
        assert!(records.store().get::<SellerProfile>("0xother").unwrap().is_none());
    }

    #[test]
    fn zero_reward_skips_rail() {
        let (board, rail, _) = board();
        let mut req = request("Error: boom");
        req.reward = Some(Amount::ZERO);
        let bounty = board.create(req, Utc::now()).unwrap();

        let payout = board.resolve(&bounty.id, "0xsolver", "sol1").unwrap();
        assert!(payout.tx_ref.is_none());
        assert_eq!(rail.transfer_count(), 0);
    }

    #[test]
    fn solved_fingerprint_can_be_reposted() {
        let (board, _, _) = board();
        let bounty = board.create(request("Error: boom"), Utc::now()).unwrap();
        board.resolve(&bounty.id, "0xsolver", "sol1").unwrap();
        assert!(board.create(request("Error: boom"), Utc::now()).is_ok());
    }

    #[test]
    fn unknown_bounty_is_not_found() {
        let (board, _, _) = board();
        assert!(matches!(
            board.claim("bounty_missing", "0xs"),
            Err(MarketError::NotFound { kind: "bounty", .. })
        ));
    }

    // ==================== Listing ====================

    #[test]
    fn list_filters_and_orders_newest_first() {
        let (board, _, _) = board();
        let t0 = Utc::now();
        let old = board.create(request("Error: one"), t0).unwrap();
        let mut other = request("Error: two");
        other.requester = "0xother".into();
        let new = board.create(other, t0 + Duration::seconds(10)).unwrap();
        board.claim(&old.id, "0xsolver").unwrap();

        let all = board.list(&BountyFilter::default()).unwrap();
        assert_eq!(all[0].id, new.id);
        assert_eq!(all[1].id, old.id);

        let open = board
            .list(&BountyFilter {
                status: Some(BountyStatus::Open),
                requester: None,
            })
            .unwrap();
        assert_eq!(open.len(), 1);

        let mine = board
            .list(&BountyFilter {
                status: None,
                requester: Some("0xrequester".into()),
            })
            .unwrap();
        assert_eq!(mine[0].id, old.id);
    }
}
