//! The `SymbiontMarket` facade.
//!
//! Every externally visible operation enters here. The facade validates
//! input, lowercases wallets and then delegates to the escrow ledger, the
//! settlement coordinator and the bounty board. Fix payloads never leave
//! the facade except through a purchase.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use symbiont_core::{
    AgentEnvironment, Amount, Bounty, BountyStatus, Environment, MatchResult, ReputationBreakdown,
    ReputationLevel, SellerProfile, Solution, VoteDirection, lookup, reputation_level,
    reputation_score, search, solution_fingerprint,
};
use tracing::{debug, info, warn};

use crate::bounty::{BountyBoard, BountyFilter, BountyPayout, BountyRequest};
use crate::config::MarketConfig;
use crate::error::{ConflictRecord, MarketError, Result};
use crate::escrow::{EscrowLedger, PurchaseOutcome};
use crate::identity::IdentityStatsProvider;
use crate::rail::{PaymentProof, PaymentRail, TxRef};
use crate::records::Records;
use crate::settlement::{SettlementCoordinator, VoteOutcome};
use crate::store::{RecordStore, RecordStoreExt};

/// A new fix offered for sale.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UploadRequest {
    /// Error text the fix addresses.
    pub error_signature: String,
    /// The fix payload.
    pub fix: String,
    /// Seller wallet.
    pub seller: String,
    /// Price; the configured default when absent.
    #[serde(default)]
    pub price: Option<Amount>,
    /// Supported environment.
    #[serde(default)]
    pub environment: Option<Environment>,
    /// Free-form tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Bounty the fix answers.
    #[serde(default)]
    pub bounty_id: Option<String>,
}

/// How a bounty referenced by an upload was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BountyResolution {
    /// The bounty was solved and its reward paid.
    Paid(BountyPayout),
    /// The bounty could not be resolved; it can be retried later.
    Failed {
        /// Bounty left unchanged.
        bounty_id: String,
        /// Error text.
        reason: String,
    },
}

/// Result of an upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum UploadOutcome {
    /// A new solution was stored.
    Created {
        /// The stored solution.
        solution: Solution,
        /// What happened to the referenced bounty, if any.
        bounty: Option<BountyResolution>,
    },
    /// The fingerprint already existed; the bounty was solved with it.
    ResolvedWithExisting {
        /// The existing solution, fix withheld.
        solution: Solution,
        /// Bounty payout.
        payout: BountyPayout,
    },
}

/// Free pre-purchase view of a solution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolutionPreview {
    /// Solution id.
    pub id: String,
    /// Error text the fix addresses.
    pub error_signature: String,
    /// Price per purchase.
    pub price: Amount,
    /// Seller wallet.
    pub seller: String,
    /// Seller's cached score, if registered.
    pub seller_reputation: Option<u32>,
    /// Seller's tier, if registered.
    pub seller_level: Option<ReputationLevel>,
    /// Declared environment.
    pub environment: Option<Environment>,
    /// Tags.
    pub tags: Vec<String>,
    /// Completed purchases.
    pub usage_count: u64,
    /// Approvals.
    pub upvotes: u64,
    /// Rejections.
    pub downvotes: u64,
    /// Share of approvals, 0-100.
    pub success_rate: u32,
    /// Upload time.
    pub created_at: DateTime<Utc>,
}

/// A seller's profile with its derived trust data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerReport {
    /// The profile with a freshly computed score.
    pub profile: SellerProfile,
    /// Tier for the score.
    pub level: ReputationLevel,
    /// Badge for the tier.
    pub badge: String,
    /// Whether the tier is trustworthy.
    pub trustworthy: bool,
    /// Per-dimension score.
    pub breakdown: ReputationBreakdown,
}

/// Result of an unstake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnstakeOutcome {
    /// Profile after the stake was reduced.
    pub profile: SellerProfile,
    /// Rail transaction returning the funds.
    pub tx_ref: TxRef,
}

/// Fix marketplace over injected storage, rail and identity ports.
pub struct SymbiontMarket {
    config: MarketConfig,
    records: Arc<Records>,
    rail: Arc<dyn PaymentRail>,
    identity: Arc<dyn IdentityStatsProvider>,
    escrow: Arc<EscrowLedger>,
    settlement: SettlementCoordinator,
    bounties: BountyBoard,
}

impl SymbiontMarket {
    /// Builds a market over the given ports.
    ///
    /// # Errors
    ///
    /// Returns [`MarketError::Validation`] if `config` is invalid.
    pub fn new(
        config: MarketConfig,
        store: Arc<dyn RecordStore>,
        rail: Arc<dyn PaymentRail>,
        identity: Arc<dyn IdentityStatsProvider>,
    ) -> Result<Self> {
        config.validate()?;

        let records = Arc::new(Records::new(store));
        let escrow = Arc::new(EscrowLedger::new(Arc::clone(&records), config.escrow_ttl_days));
        let settlement = SettlementCoordinator::new(
            Arc::clone(&records),
            Arc::clone(&escrow),
            Arc::clone(&rail),
            config.treasury_wallet.clone(),
        );
        let bounties = BountyBoard::new(
            Arc::clone(&records),
            Arc::clone(&rail),
            config.treasury_wallet.clone(),
            config.default_bounty_reward,
            config.bounty_ttl_days,
        );

        Ok(Self {
            config,
            records,
            rail,
            identity,
            escrow,
            settlement,
            bounties,
        })
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &MarketConfig {
        &self.config
    }

    /// The escrow ledger, for inspecting payments.
    #[must_use]
    pub fn escrow(&self) -> &EscrowLedger {
        &self.escrow
    }

    // ==================== Matching ====================

    /// Ranks stored fixes against an error report. Fixes are withheld.
    pub fn query(
        &self,
        error_text: &str,
        min_confidence: Option<u32>,
        agent_env: Option<&AgentEnvironment>,
    ) -> Result<Vec<MatchResult>> {
        if error_text.trim().is_empty() {
            return Err(MarketError::validation("error text cannot be empty"));
        }
        let min_confidence = min_confidence.unwrap_or(self.config.default_min_confidence);
        if min_confidence > 100 {
            return Err(MarketError::validation(format!(
                "min confidence must be at most 100, got {min_confidence}"
            )));
        }

        let solutions = self.records.store().all::<Solution>()?;
        let mut results = search(error_text, &solutions, min_confidence, agent_env);
        for result in &mut results {
            result.solution.fix.clear();
        }
        debug!(candidates = solutions.len(), matches = results.len(), "query ranked");
        Ok(results)
    }

    /// Direct fingerprint lookup. The fix is withheld.
    pub fn lookup(&self, solution_id: &str, agent_env: Option<&AgentEnvironment>) -> Result<MatchResult> {
        let solution = withhold_fix(self.solution(solution_id)?);
        Ok(lookup(&solution, agent_env))
    }

    /// Free metadata view of a solution.
    pub fn preview(&self, solution_id: &str) -> Result<SolutionPreview> {
        let solution = self.solution(solution_id)?;
        let seller = self.records.store().get::<SellerProfile>(&solution.seller)?;

        Ok(SolutionPreview {
            success_rate: solution.success_rate(),
            seller_reputation: seller.as_ref().map(|p| p.reputation_score),
            seller_level: seller.as_ref().map(|p| reputation_level(p.reputation_score)),
            id: solution.id,
            error_signature: solution.error_signature,
            price: solution.price,
            seller: solution.seller,
            environment: solution.environment,
            tags: solution.tags,
            usage_count: solution.usage_count,
            upvotes: solution.upvotes,
            downvotes: solution.downvotes,
            created_at: solution.created_at,
        })
    }

    /// Lists solutions in upload order, optionally for one seller.
    pub fn list_solutions(&self, seller: Option<&str>) -> Result<Vec<Solution>> {
        let seller = seller.map(str::to_lowercase);
        Ok(self
            .records
            .store()
            .all::<Solution>()?
            .into_iter()
            .filter(|s| seller.as_deref().is_none_or(|w| s.seller == w))
            .map(withhold_fix)
            .collect())
    }

    // ==================== Purchases and votes ====================

    /// Buys a fix with a payment proof and opens an escrow entry.
    ///
    /// Replaying a proof returns the original result.
    pub fn purchase(&self, solution_id: &str, proof: &PaymentProof) -> Result<PurchaseOutcome> {
        let payment = self.rail.verify_payment(proof)?;
        let solution = self.solution(solution_id)?;
        self.escrow.purchase(&solution, &payment, Utc::now())
    }

    /// Records a vote and settles one pending payment.
    pub fn vote(
        &self,
        solution_id: &str,
        direction: VoteDirection,
        buyer: Option<&str>,
    ) -> Result<VoteOutcome> {
        let buyer = buyer.map(|b| wallet(b, "buyer")).transpose()?;
        self.settlement.vote(solution_id, direction, buyer.as_deref())
    }

    // ==================== Uploads ====================

    /// Stores a new fix.
    ///
    /// # Errors
    ///
    /// [`MarketError::Conflict`] with the existing solution when the
    /// fingerprint is taken and no unsolved bounty is referenced.
    pub fn upload(&self, request: UploadRequest) -> Result<UploadOutcome> {
        if request.error_signature.trim().is_empty() {
            return Err(MarketError::validation("error signature cannot be empty"));
        }
        if request.fix.trim().is_empty() {
            return Err(MarketError::validation("fix cannot be empty"));
        }
        let seller = wallet(&request.seller, "seller")?;

        let bounty = request
            .bounty_id
            .as_deref()
            .map(|id| self.bounties.get(id))
            .transpose()?;
        let now = Utc::now();

        let candidate = Solution {
            id: solution_fingerprint(&request.error_signature, bounty.as_ref().map(|b| &b.environment)),
            error_signature: request.error_signature,
            fix: request.fix,
            price: request.price.unwrap_or(self.config.default_solution_price),
            seller: seller.clone(),
            environment: request.environment,
            tags: request.tags,
            created_at: now,
            usage_count: 0,
            total_earnings: Amount::ZERO,
            upvotes: 0,
            downvotes: 0,
            bounty_id: request.bounty_id,
        };

        match (self.records.insert_new(&candidate)?, bounty) {
            (Some(existing), Some(bounty)) if bounty.status != BountyStatus::Solved => {
                info!(solution_id = %existing.id, bounty_id = %bounty.id, "upload matched existing solution, resolving bounty");
                let payout = self.bounties.resolve(&bounty.id, &seller, &existing.id)?;
                Ok(UploadOutcome::ResolvedWithExisting {
                    solution: withhold_fix(existing),
                    payout,
                })
            }
            (Some(existing), _) => {
                debug!(solution_id = %existing.id, "duplicate upload");
                Err(MarketError::conflict(ConflictRecord::Solution(withhold_fix(existing))))
            }
            (None, bounty) => {
                self.records.upsert_seller(&seller, now, |_| {})?;
                info!(solution_id = %candidate.id, %seller, price = %candidate.price, "solution uploaded");

                let resolution = bounty.map(|b| self.resolve_for_upload(&b, &seller, &candidate.id));
                let solution = match &resolution {
                    Some(BountyResolution::Paid(payout)) => self.seed_from_bounty(candidate, payout.reward),
                    _ => candidate,
                };
                Ok(UploadOutcome::Created {
                    solution,
                    bounty: resolution,
                })
            }
        }
    }

    /// Counts the bounty payout as the new solution's first sale.
    fn seed_from_bounty(&self, solution: Solution, reward: Amount) -> Solution {
        let seeded = self.records.update::<Solution>(&solution.id, |s| {
            s.usage_count = s.usage_count.saturating_add(1);
            s.total_earnings = s.total_earnings.saturating_add(reward);
        });
        match seeded {
            Ok(Some(seeded)) => seeded,
            Ok(None) => solution,
            Err(e) => {
                warn!(solution_id = %solution.id, error = %e, "bounty earnings not counted on solution");
                solution
            }
        }
    }

    fn resolve_for_upload(&self, bounty: &Bounty, solver: &str, solution_id: &str) -> BountyResolution {
        match self.bounties.resolve(&bounty.id, solver, solution_id) {
            Ok(payout) => BountyResolution::Paid(payout),
            Err(e) => {
                warn!(bounty_id = %bounty.id, error = %e, "bounty not resolved by upload");
                BountyResolution::Failed {
                    bounty_id: bounty.id.clone(),
                    reason: e.to_string(),
                }
            }
        }
    }

    // ==================== Bounties ====================

    /// Opens a bounty.
    pub fn bounty_create(&self, mut request: BountyRequest) -> Result<Bounty> {
        request.requester = wallet(&request.requester, "requester")?;
        self.bounties.create(request, Utc::now())
    }

    /// Claims an open bounty.
    pub fn bounty_claim(&self, bounty_id: &str, solver: &str) -> Result<Bounty> {
        self.bounties.claim(bounty_id, &wallet(solver, "solver")?)
    }

    /// Solves a bounty with an existing solution and pays the solver.
    pub fn bounty_resolve(&self, bounty_id: &str, solver: &str, solution_id: &str) -> Result<BountyPayout> {
        let solver = wallet(solver, "solver")?;
        self.solution(solution_id)?;
        self.bounties.resolve(bounty_id, &solver, solution_id)
    }

    /// Returns a bounty.
    pub fn bounty_get(&self, bounty_id: &str) -> Result<Bounty> {
        self.bounties.get(bounty_id)
    }

    /// Lists bounties, newest first.
    pub fn bounty_list(&self, status: Option<BountyStatus>, requester: Option<&str>) -> Result<Vec<Bounty>> {
        self.bounties.list(&BountyFilter {
            status,
            requester: requester.map(str::to_lowercase),
        })
    }

    // ==================== Sellers ====================

    /// Registers a seller, optionally linking an identity.
    ///
    /// # Errors
    ///
    /// [`MarketError::Conflict`] with the existing profile if the wallet is
    /// already registered.
    pub fn register_seller(&self, wallet_address: &str, username: Option<&str>) -> Result<SellerProfile> {
        let address = wallet(wallet_address, "wallet")?;
        let now = Utc::now();
        let mut profile = SellerProfile::new(address, now);

        if let Some(username) = username.map(str::trim).filter(|u| !u.is_empty()) {
            let stats = self.identity.stats(username)?;
            profile.username = Some(username.to_string());
            profile.stars = stats.stars;
            profile.contributions = stats.contributions;
            profile.reputation_score = reputation_score(&profile, now);
        }

        if let Some(existing) = self.records.insert_new(&profile)? {
            return Err(MarketError::conflict(ConflictRecord::Seller(existing)));
        }
        info!(wallet = %profile.wallet, score = profile.reputation_score, "seller registered");
        Ok(profile)
    }

    /// Links an identity and pulls its activity counts.
    pub fn link_identity(&self, wallet_address: &str, username: &str) -> Result<SellerProfile> {
        let address = wallet(wallet_address, "wallet")?;
        let username = username.trim();
        if username.is_empty() {
            return Err(MarketError::validation("username cannot be empty"));
        }

        let stats = self.identity.stats(username)?;
        let now = Utc::now();
        let profile = self
            .records
            .update::<SellerProfile>(&address, |p| {
                p.username = Some(username.to_string());
                p.stars = stats.stars;
                p.contributions = stats.contributions;
                p.reputation_score = reputation_score(p, now);
            })?
            .ok_or_else(|| MarketError::not_found("seller", address.clone()))?;

        info!(wallet = %address, %username, stars = stats.stars, "identity linked");
        Ok(profile)
    }

    /// Adds to a seller's stake, registering the wallet if needed.
    pub fn stake(&self, wallet_address: &str, amount: Amount) -> Result<SellerProfile> {
        let address = wallet(wallet_address, "wallet")?;
        if amount.is_zero() {
            return Err(MarketError::validation("stake amount must be positive"));
        }

        let now = Utc::now();
        let profile = self.records.upsert_seller(&address, now, |p| {
            p.staked = p.staked.saturating_add(amount);
            p.reputation_score = reputation_score(p, now);
        })?;
        info!(wallet = %address, %amount, staked = %profile.staked, "stake added");
        Ok(profile)
    }

    /// Returns part of a seller's stake through the rail.
    ///
    /// The stake is reduced first; if the rail fails it is restored.
    pub fn unstake(&self, wallet_address: &str, amount: Amount) -> Result<UnstakeOutcome> {
        let address = wallet(wallet_address, "wallet")?;
        if amount.is_zero() {
            return Err(MarketError::validation("unstake amount must be positive"));
        }

        let now = Utc::now();
        let mut shortfall = None;
        let profile = self
            .records
            .update::<SellerProfile>(&address, |p| match p.staked.checked_sub(amount) {
                Some(rest) => {
                    p.staked = rest;
                    p.reputation_score = reputation_score(p, now);
                }
                None => shortfall = Some(p.staked),
            })?
            .ok_or_else(|| MarketError::not_found("seller", address.clone()))?;

        if let Some(staked) = shortfall {
            return Err(MarketError::validation(format!(
                "cannot unstake {amount}: only {staked} staked"
            )));
        }

        match self.rail.transfer(&self.config.treasury_wallet, &address, amount) {
            Ok(tx_ref) => {
                info!(wallet = %address, %amount, %tx_ref, "stake returned");
                Ok(UnstakeOutcome { profile, tx_ref })
            }
            Err(e) => {
                warn!(wallet = %address, %amount, error = %e, "unstake transfer failed");
                self.records.update::<SellerProfile>(&address, |p| {
                    p.staked = p.staked.saturating_add(amount);
                    p.reputation_score = reputation_score(p, now);
                })?;
                Err(e.into())
            }
        }
    }

    /// Returns a seller's profile with a recomputed, re-cached score.
    pub fn seller_profile(&self, wallet_address: &str) -> Result<SellerReport> {
        let address = wallet(wallet_address, "wallet")?;
        let now = Utc::now();
        let profile = self
            .records
            .update::<SellerProfile>(&address, |p| p.reputation_score = reputation_score(p, now))?
            .ok_or_else(|| MarketError::not_found("seller", address))?;

        let level = reputation_level(profile.reputation_score);
        Ok(SellerReport {
            breakdown: ReputationBreakdown::compute(&profile, now),
            level,
            badge: level.badge().to_string(),
            trustworthy: level.is_trustworthy(),
            profile,
        })
    }

    fn solution(&self, solution_id: &str) -> Result<Solution> {
        self.records
            .store()
            .get::<Solution>(solution_id)?
            .ok_or_else(|| MarketError::not_found("solution", solution_id))
    }
}

fn withhold_fix(mut solution: Solution) -> Solution {
    solution.fix.clear();
    solution
}

/// Trims and lowercases a wallet address.
fn wallet(raw: &str, field: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(MarketError::validation(format!("{field} cannot be empty")));
    }
    Ok(trimmed.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::StaticIdentityStats;
    use crate::rail::SimulatedRail;
    use crate::store::MemoryStore;
    use test_case::test_case;

    #[test_case("0xABC", "0xabc" ; "uppercase is folded")]
    #[test_case("  0xabc\n", "0xabc" ; "whitespace is trimmed")]
    #[test_case("0xabc", "0xabc" ; "lowercase is unchanged")]
    fn wallets_are_normalized(raw: &str, expected: &str) {
        assert_eq!(wallet(raw, "wallet").unwrap(), expected);
    }

    #[test]
    fn blank_wallet_is_rejected() {
        assert!(matches!(wallet("  ", "seller"), Err(MarketError::Validation(ref m)) if m.contains("seller")));
    }

    fn market() -> (SymbiontMarket, Arc<SimulatedRail>) {
        let rail = Arc::new(SimulatedRail::new());
        let identity = StaticIdentityStats::new().with_user("octo", 200, 1000);
        let market = SymbiontMarket::new(
            MarketConfig::default(),
            Arc::new(MemoryStore::new()),
            Arc::clone(&rail) as Arc<dyn PaymentRail>,
            Arc::new(identity),
        )
        .unwrap();
        (market, rail)
    }

    fn upload(market: &SymbiontMarket, signature: &str) -> Solution {
        match market
            .upload(UploadRequest {
                error_signature: signature.into(),
                fix: "the fix".into(),
                seller: "0xSeller".into(),
                ..UploadRequest::default()
            })
            .unwrap()
        {
            UploadOutcome::Created { solution, .. } => solution,
            UploadOutcome::ResolvedWithExisting { solution, .. } => solution,
        }
    }

    // ==================== Uploads ====================

    #[test]
    fn upload_applies_defaults_and_registers_seller() {
        let (market, _) = market();
        let solution = upload(&market, "TypeError: x is undefined");

        assert_eq!(solution.seller, "0xseller");
        assert_eq!(solution.price, Amount::from_micros(50_000));
        assert_eq!(solution.id, solution_fingerprint("TypeError: x is undefined", None));
        assert!(market.seller_profile("0xSELLER").is_ok());
    }

    #[test]
    fn duplicate_upload_conflicts_without_leaking_fix() {
        let (market, _) = market();
        let first = upload(&market, "TypeError: x is undefined");

        let err = market
            .upload(UploadRequest {
                error_signature: "TypeError: x is undefined".into(),
                fix: "another fix".into(),
                seller: "0xother".into(),
                ..UploadRequest::default()
            })
            .unwrap_err();
        assert!(matches!(
            err.conflicting_record(),
            Some(ConflictRecord::Solution(existing)) if existing.id == first.id && existing.fix.is_empty()
        ));
    }

    #[test]
    fn upload_requires_fields() {
        let (market, _) = market();
        let missing_fix = UploadRequest {
            error_signature: "Error: boom".into(),
            seller: "0xs".into(),
            ..UploadRequest::default()
        };
        assert!(matches!(market.upload(missing_fix), Err(MarketError::Validation(_))));
    }

    #[test]
    fn upload_with_bounty_resolves_it() {
        let (market, rail) = market();
        let bounty = market
            .bounty_create(BountyRequest {
                error_signature: "Error: boom".into(),
                requester: "0xRequester".into(),
                ..BountyRequest::default()
            })
            .unwrap();
        assert_eq!(bounty.requester, "0xrequester");

        let outcome = market
            .upload(UploadRequest {
                error_signature: "Error: boom".into(),
                fix: "unboom".into(),
                seller: "0xsolver".into(),
                bounty_id: Some(bounty.id.clone()),
                ..UploadRequest::default()
            })
            .unwrap();

        let UploadOutcome::Created { solution, bounty: Some(BountyResolution::Paid(payout)) } = outcome else {
            unreachable!("expected a paid bounty");
        };
        assert_eq!(solution.bounty_id.as_deref(), Some(bounty.id.as_str()));
        assert_eq!(
            solution.id,
            solution_fingerprint("Error: boom", Some(&AgentEnvironment::unknown()))
        );
        assert_eq!(payout.bounty.status, BountyStatus::Solved);
        assert_eq!(rail.transfers()[0].to, "0xsolver");

        // The payout counts as the solution's first sale.
        assert_eq!(solution.usage_count, 1);
        assert_eq!(solution.total_earnings, Amount::from_usdc(1));
        assert_eq!(solution.fix, "unboom");
        let stored = market.list_solutions(None).unwrap();
        assert_eq!(stored[0].usage_count, 1);
        assert_eq!(stored[0].total_earnings, Amount::from_usdc(1));
    }

    #[test]
    fn failed_bounty_payout_does_not_seed_earnings() {
        let (market, rail) = market();
        let bounty = market
            .bounty_create(BountyRequest {
                error_signature: "Error: boom".into(),
                requester: "0xrequester".into(),
                ..BountyRequest::default()
            })
            .unwrap();
        rail.set_offline(true);

        let outcome = market
            .upload(UploadRequest {
                error_signature: "Error: boom".into(),
                fix: "unboom".into(),
                seller: "0xsolver".into(),
                bounty_id: Some(bounty.id),
                ..UploadRequest::default()
            })
            .unwrap();

        let UploadOutcome::Created { solution, bounty: Some(BountyResolution::Failed { .. }) } = outcome else {
            unreachable!("expected a failed payout");
        };
        assert_eq!(solution.usage_count, 0);
        assert_eq!(solution.total_earnings, Amount::ZERO);
    }

    // ==================== Queries ====================

    #[test]
    fn query_withholds_fixes() {
        let (market, _) = market();
        upload(&market, "TypeError: Cannot read property 'x' of undefined");

        let results = market
            .query("TypeError: Cannot read property 'y' of undefined", None, None)
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].solution.fix.is_empty());
    }

    #[test]
    fn query_validates_input() {
        let (market, _) = market();
        assert!(market.query("   ", None, None).is_err());
        assert!(market.query("Error", Some(101), None).is_err());
        assert!(market.query("Error", None, None).unwrap().is_empty());
    }

    #[test]
    fn preview_reports_seller_reputation() {
        let (market, _) = market();
        let solution = upload(&market, "Error: boom");

        let preview = market.preview(&solution.id).unwrap();
        assert_eq!(preview.seller_reputation, Some(63));
        assert_eq!(preview.seller_level, Some(ReputationLevel::Trusted));
        assert_eq!(preview.success_rate, 100);
        assert!(matches!(market.preview("missing"), Err(MarketError::NotFound { .. })));
    }

    #[test]
    fn list_solutions_filters_by_seller() {
        let (market, _) = market();
        upload(&market, "Error: one");
        upload(&market, "Error: two");

        assert_eq!(market.list_solutions(None).unwrap().len(), 2);
        assert_eq!(market.list_solutions(Some("0xSELLER")).unwrap().len(), 2);
        assert!(market.list_solutions(Some("0xnobody")).unwrap().is_empty());
    }

    // ==================== Purchases ====================

    #[test]
    fn purchase_from_header_returns_fix() {
        let (market, _) = market();
        let solution = upload(&market, "Error: boom");
        let header = PaymentProof::new("0xtx1", "0xBuyer").encode_header();
        let proof = PaymentProof::decode_header(&header).unwrap();

        let outcome = market.purchase(&solution.id, &proof).unwrap();
        assert_eq!(outcome.fix, "the fix");
        assert_eq!(outcome.buyer, "0xbuyer");
        assert_eq!(market.preview(&solution.id).unwrap().usage_count, 1);
    }

    #[test]
    fn purchase_of_unknown_solution_is_not_found() {
        let (market, _) = market();
        let err = market.purchase("nope", &PaymentProof::new("0xtx", "0xb")).unwrap_err();
        assert!(matches!(err, MarketError::NotFound { kind: "solution", .. }));
    }

    // ==================== Sellers ====================

    #[test]
    fn register_twice_conflicts() {
        let (market, _) = market();
        market.register_seller("0xA", None).unwrap();
        let err = market.register_seller("0xa", None).unwrap_err();
        assert!(matches!(err.conflicting_record(), Some(ConflictRecord::Seller(_))));
    }

    #[test]
    fn link_identity_raises_score() {
        let (market, _) = market();
        let before = market.register_seller("0xa", None).unwrap();
        let after = market.link_identity("0xa", "octo").unwrap();

        assert_eq!(after.stars, 200);
        assert!(after.reputation_score > before.reputation_score);
        assert!(matches!(
            market.link_identity("0xa", "ghost"),
            Err(MarketError::Identity(_))
        ));
        assert!(matches!(
            market.link_identity("0xb", "octo"),
            Err(MarketError::NotFound { kind: "seller", .. })
        ));
    }

    #[test]
    fn stake_is_cumulative_and_unstake_returns_funds() {
        let (market, rail) = market();
        market.stake("0xa", Amount::from_usdc(30)).unwrap();
        let profile = market.stake("0xa", Amount::from_usdc(20)).unwrap();
        assert_eq!(profile.staked, Amount::from_usdc(50));
        assert!(market.stake("0xa", Amount::ZERO).is_err());

        let outcome = market.unstake("0xa", Amount::from_usdc(10)).unwrap();
        assert_eq!(outcome.profile.staked, Amount::from_usdc(40));
        assert_eq!(rail.transfers()[0].to, "0xa");

        assert!(matches!(
            market.unstake("0xa", Amount::from_usdc(41)),
            Err(MarketError::Validation(_))
        ));
    }

    #[test]
    fn failed_unstake_restores_stake() {
        let (market, rail) = market();
        market.stake("0xa", Amount::from_usdc(50)).unwrap();
        rail.set_offline(true);

        assert!(matches!(
            market.unstake("0xa", Amount::from_usdc(10)),
            Err(MarketError::Rail(_))
        ));
        let report = market.seller_profile("0xa").unwrap();
        assert_eq!(report.profile.staked, Amount::from_usdc(50));
    }

    #[test]
    fn seller_profile_includes_level_and_breakdown() {
        let (market, _) = market();
        market.register_seller("0xa", Some("octo")).unwrap();

        let report = market.seller_profile("0xa").unwrap();
        assert_eq!(report.breakdown.rows.len(), 5);
        assert_eq!(report.breakdown.total, report.profile.reputation_score);
        assert_eq!(report.level, reputation_level(report.profile.reputation_score));
        assert!(report.trustworthy);
    }
}
