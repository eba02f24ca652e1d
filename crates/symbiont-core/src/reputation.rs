//! Seller reputation scoring.
//!
//! A seller's score combines five sub-scores, each in 0..=100:
//!
//! | dimension | weight | full marks at                      |
//! |-----------|--------|------------------------------------|
//! | age       | 10%    | 12 months since joining            |
//! | usage     | 10%    | 100 sales                          |
//! | identity  | 25%    | 200 stars and 1000 contributions   |
//! | votes     | 25%    | every vote an upvote (50 if none)  |
//! | stake     | 30%    | 100 USDC staked                    |
//!
//! Every profile starts from a floor of 50 and the weighted sum is added on
//! top, clamped at 100. The neutral vote score means a seller with no
//! history already sits above the floor.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

use crate::types::SellerProfile;

/// Points every profile starts with.
pub const BASE_SCORE: f64 = 50.0;

const AGE_WEIGHT: f64 = 0.10;
const USAGE_WEIGHT: f64 = 0.10;
const IDENTITY_WEIGHT: f64 = 0.25;
const VOTES_WEIGHT: f64 = 0.25;
const STAKE_WEIGHT: f64 = 0.30;

const FULL_AGE_MONTHS: f64 = 12.0;
const FULL_USAGE_SALES: f64 = 100.0;
const FULL_STARS: f64 = 200.0;
const FULL_CONTRIBUTIONS: f64 = 1000.0;
const FULL_STAKE_USDC: f64 = 100.0;

/// Vote score when nobody has voted yet.
const NEUTRAL_VOTES: f64 = 50.0;

fn capped(value: f64, full: f64) -> f64 {
    (value / full * 100.0).min(100.0)
}

/// Calendar months between `joined` and `now`, never negative.
fn months_between(joined: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let years = i64::from(now.year()) - i64::from(joined.year());
    let months = i64::from(now.month()) - i64::from(joined.month());
    (years * 12 + months).max(0)
}

fn age_score(profile: &SellerProfile, now: DateTime<Utc>) -> f64 {
    capped(months_between(profile.joined_at, now) as f64, FULL_AGE_MONTHS)
}

fn usage_score(profile: &SellerProfile) -> f64 {
    capped(profile.total_sales as f64, FULL_USAGE_SALES)
}

fn identity_score(profile: &SellerProfile) -> f64 {
    0.5 * capped(profile.stars as f64, FULL_STARS)
        + 0.5 * capped(profile.contributions as f64, FULL_CONTRIBUTIONS)
}

fn votes_score(profile: &SellerProfile) -> f64 {
    let total = profile.success_votes.saturating_add(profile.failure_votes);
    if total == 0 {
        return NEUTRAL_VOTES;
    }
    profile.success_votes as f64 / total as f64 * 100.0
}

fn stake_score(profile: &SellerProfile) -> f64 {
    capped(profile.staked.as_usdc_f64(), FULL_STAKE_USDC)
}

/// Computes a seller's reputation score in 0..=100 as of `now`.
#[must_use]
pub fn reputation_score(profile: &SellerProfile, now: DateTime<Utc>) -> u32 {
    let weighted = age_score(profile, now) * AGE_WEIGHT
        + usage_score(profile) * USAGE_WEIGHT
        + identity_score(profile) * IDENTITY_WEIGHT
        + votes_score(profile) * VOTES_WEIGHT
        + stake_score(profile) * STAKE_WEIGHT;

    (BASE_SCORE + weighted).round().clamp(0.0, 100.0) as u32
}

/// Named trust tier derived from a score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReputationLevel {
    /// Below 20.
    Unverified,
    /// 20 and above.
    Newcomer,
    /// 40 and above.
    Verified,
    /// 60 and above.
    Trusted,
    /// 80 and above.
    Expert,
}

impl ReputationLevel {
    /// Short badge shown next to the seller.
    #[must_use]
    pub const fn badge(self) -> &'static str {
        match self {
            Self::Expert => "🏆",
            Self::Trusted => "✅",
            Self::Verified => "☑️",
            Self::Newcomer => "🆕",
            Self::Unverified => "⚠️",
        }
    }

    /// Only the two lowest tiers are untrustworthy.
    #[must_use]
    pub const fn is_trustworthy(self) -> bool {
        matches!(self, Self::Verified | Self::Trusted | Self::Expert)
    }
}

impl std::fmt::Display for ReputationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expert => write!(f, "Expert"),
            Self::Trusted => write!(f, "Trusted"),
            Self::Verified => write!(f, "Verified"),
            Self::Newcomer => write!(f, "Newcomer"),
            Self::Unverified => write!(f, "Unverified"),
        }
    }
}

/// Maps a score onto its tier.
#[must_use]
pub const fn reputation_level(score: u32) -> ReputationLevel {
    match score {
        80.. => ReputationLevel::Expert,
        60..=79 => ReputationLevel::Trusted,
        40..=59 => ReputationLevel::Verified,
        20..=39 => ReputationLevel::Newcomer,
        _ => ReputationLevel::Unverified,
    }
}

/// One dimension of a breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownRow {
    /// Dimension name.
    pub dimension: String,
    /// Weight in percent.
    pub weight_percent: u32,
    /// Rounded sub-score.
    pub score: u32,
    /// Rounded contribution to the total.
    pub weighted: u32,
}

/// Per-dimension view of a seller's score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationBreakdown {
    /// Final score.
    pub total: u32,
    /// Age, usage, identity, votes and stake rows, in that order.
    pub rows: Vec<BreakdownRow>,
}

impl ReputationBreakdown {
    /// Builds the breakdown for `profile` as of `now`.
    #[must_use]
    pub fn compute(profile: &SellerProfile, now: DateTime<Utc>) -> Self {
        let row = |dimension: &str, weight: f64, score: f64| BreakdownRow {
            dimension: dimension.to_string(),
            weight_percent: (weight * 100.0).round() as u32,
            score: score.round() as u32,
            weighted: (score * weight).round() as u32,
        };

        Self {
            total: reputation_score(profile, now),
            rows: vec![
                row("age", AGE_WEIGHT, age_score(profile, now)),
                row("usage", USAGE_WEIGHT, usage_score(profile)),
                row("identity", IDENTITY_WEIGHT, identity_score(profile)),
                row("votes", VOTES_WEIGHT, votes_score(profile)),
                row("stake", STAKE_WEIGHT, stake_score(profile)),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amount::Amount;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use test_case::test_case;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn fresh() -> SellerProfile {
        SellerProfile::new("0xseller", now())
    }

    #[test]
    fn new_seller_gets_neutral_vote_credit() {
        // 0.25 * 50 neutral votes = 12.5 on top of the floor
        let profile = fresh();
        assert_eq!(reputation_score(&profile, now()), 63);
    }

    #[test]
    fn fully_established_seller_scores_100() {
        let mut profile = fresh();
        profile.joined_at = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        profile.total_sales = 100;
        profile.stars = 200;
        profile.contributions = 1000;
        profile.success_votes = 10;
        profile.failure_votes = 0;
        profile.staked = Amount::from_usdc(100);

        assert_eq!(reputation_score(&profile, now()), 100);
    }

    #[test]
    fn all_downvotes_lower_the_score() {
        let mut profile = fresh();
        profile.failure_votes = 4;
        assert_eq!(reputation_score(&profile, now()), 50);
    }

    #[test]
    fn future_join_date_does_not_go_negative() {
        let mut profile = fresh();
        profile.joined_at = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(months_between(profile.joined_at, now()), 0);
        assert_eq!(reputation_score(&profile, now()), 63);
    }

    #[test]
    fn months_count_calendar_boundaries() {
        let joined = Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(months_between(joined, later), 1);
    }

    #[test_case(100, ReputationLevel::Expert ; "top")]
    #[test_case(80, ReputationLevel::Expert ; "expert floor")]
    #[test_case(79, ReputationLevel::Trusted ; "below expert")]
    #[test_case(60, ReputationLevel::Trusted ; "trusted floor")]
    #[test_case(40, ReputationLevel::Verified ; "verified floor")]
    #[test_case(39, ReputationLevel::Newcomer ; "below verified")]
    #[test_case(20, ReputationLevel::Newcomer ; "newcomer floor")]
    #[test_case(0, ReputationLevel::Unverified ; "bottom")]
    fn levels_by_threshold(score: u32, expected: ReputationLevel) {
        assert_eq!(reputation_level(score), expected);
    }

    #[test]
    fn only_bottom_two_levels_are_untrustworthy() {
        assert!(ReputationLevel::Expert.is_trustworthy());
        assert!(ReputationLevel::Trusted.is_trustworthy());
        assert!(ReputationLevel::Verified.is_trustworthy());
        assert!(!ReputationLevel::Newcomer.is_trustworthy());
        assert!(!ReputationLevel::Unverified.is_trustworthy());
        assert_eq!(ReputationLevel::Verified.to_string(), "Verified");
    }

    #[test]
    fn breakdown_has_five_rows() {
        let mut profile = fresh();
        profile.staked = Amount::from_usdc(50);
        let breakdown = ReputationBreakdown::compute(&profile, now());

        assert_eq!(breakdown.rows.len(), 5);
        assert_eq!(breakdown.total, reputation_score(&profile, now()));
        let stake = &breakdown.rows[4];
        assert_eq!(stake.dimension, "stake");
        assert_eq!(stake.weight_percent, 30);
        assert_eq!(stake.score, 50);
        assert_eq!(stake.weighted, 15);
        let weights: u32 = breakdown.rows.iter().map(|r| r.weight_percent).sum();
        assert_eq!(weights, 100);
    }

    fn profile_with(months: u32, sales: u64, stars: u64, contrib: u64, up: u64, down: u64, stake: u64) -> SellerProfile {
        let mut profile = fresh();
        profile.joined_at = now() - chrono::Duration::days(i64::from(months) * 31);
        profile.total_sales = sales;
        profile.stars = stars;
        profile.contributions = contrib;
        profile.success_votes = up;
        profile.failure_votes = down;
        profile.staked = Amount::from_usdc(stake);
        profile
    }

    proptest! {
        #[test]
        fn score_is_bounded(
            months in 0u32..60, sales in 0u64..500, stars in 0u64..1000,
            contrib in 0u64..5000, up in 0u64..50, down in 0u64..50, stake in 0u64..500,
        ) {
            let profile = profile_with(months, sales, stars, contrib, up, down, stake);
            let score = reputation_score(&profile, now());
            prop_assert!(score <= 100);
        }

        #[test]
        fn score_is_monotonic_in_each_input(
            months in 0u32..30, sales in 0u64..200, stars in 0u64..400,
            contrib in 0u64..2000, up in 0u64..20, down in 0u64..20, stake in 0u64..200,
            bump in 1u64..50,
        ) {
            let base = profile_with(months, sales, stars, contrib, up, down, stake);
            let score = reputation_score(&base, now());

            let mut older = base.clone();
            older.joined_at -= chrono::Duration::days(31 * bump as i64);
            prop_assert!(reputation_score(&older, now()) >= score);

            let mut busier = base.clone();
            busier.total_sales += bump;
            prop_assert!(reputation_score(&busier, now()) >= score);

            let mut starred = base.clone();
            starred.stars += bump;
            prop_assert!(reputation_score(&starred, now()) >= score);

            let mut active = base.clone();
            active.contributions += bump;
            prop_assert!(reputation_score(&active, now()) >= score);

            let mut liked = base.clone();
            liked.success_votes += bump;
            prop_assert!(reputation_score(&liked, now()) >= score);

            let mut staked = base.clone();
            staked.staked = staked.staked.saturating_add(Amount::from_usdc(bump));
            prop_assert!(reputation_score(&staked, now()) >= score);
        }

        #[test]
        fn failure_votes_never_raise_score(up in 0u64..20, down in 0u64..20, bump in 1u64..20) {
            let base = profile_with(3, 10, 0, 0, up, down, 0);
            let mut disliked = base.clone();
            disliked.failure_votes += bump;
            prop_assert!(reputation_score(&disliked, now()) <= reputation_score(&base, now()));
        }
    }
}
