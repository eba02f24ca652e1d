//! Tiered matching of an error report against stored solutions.
//!
//! Each candidate is tried against three tiers in order, and the first tier
//! that accepts it decides its confidence:
//!
//! 1. **exact**: the normalized texts are equal (confidence 100);
//! 2. **error type**: both texts classify to the same error type and the
//!    normalized texts are similar enough (confidence `min(90, 50 + 0.4 * sim)`);
//! 3. **similarity**: raw keyword similarity clears the threshold
//!    (confidence = similarity). A same-type pair that fell short in tier 2
//!    still gets this chance.
//!
//! Candidates whose declared runtime rules out the agent are dropped before
//! any tier runs. Survivors are ranked by `0.6 * confidence + 0.4 * env`.

use serde::{Deserialize, Serialize};

use crate::environment::{AgentEnvironment, environment_score};
use crate::normalize::{classify, normalize};
use crate::similarity::similarity;
use crate::types::Solution;

const CONFIDENCE_WEIGHT: f64 = 0.6;
const ENVIRONMENT_WEIGHT: f64 = 0.4;

const ERROR_TYPE_BASE: f64 = 50.0;
const ERROR_TYPE_SLOPE: f64 = 0.4;
const ERROR_TYPE_CAP: f64 = 90.0;

/// Which tier accepted a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchType {
    /// Normalized texts are identical, or the id was looked up directly.
    Exact,
    /// Same classified error type with similar normalized text.
    ErrorType,
    /// Raw keyword overlap.
    Similarity,
}

impl std::fmt::Display for MatchType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exact => write!(f, "exact"),
            Self::ErrorType => write!(f, "error_type"),
            Self::Similarity => write!(f, "similarity"),
        }
    }
}

/// A ranked candidate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    /// The matched solution.
    pub solution: Solution,
    /// Tier that accepted it.
    pub match_type: MatchType,
    /// Confidence in 0..=100.
    pub confidence: f64,
    /// Human-readable explanation of the match.
    pub reason: String,
    /// Environment compatibility in 0..=100.
    pub environment_score: u32,
}

impl MatchResult {
    /// Ranking key: `0.6 * confidence + 0.4 * environment_score`.
    #[must_use]
    pub fn rank(&self) -> f64 {
        CONFIDENCE_WEIGHT * self.confidence + ENVIRONMENT_WEIGHT * f64::from(self.environment_score)
    }
}

fn match_candidate(
    query: &str,
    normalized_query: &str,
    query_type: Option<&str>,
    solution: &Solution,
    min_confidence: u32,
    agent_env: Option<&AgentEnvironment>,
) -> Option<MatchResult> {
    let env_score = environment_score(solution.environment.as_ref(), agent_env);
    if solution.environment.is_some() && agent_env.is_some() && env_score == 0 {
        return None;
    }

    let result = |match_type, confidence: f64, reason: String| MatchResult {
        solution: solution.clone(),
        match_type,
        confidence,
        reason,
        environment_score: env_score,
    };

    let normalized_signature = normalize(&solution.error_signature);
    if normalized_query == normalized_signature {
        return Some(result(MatchType::Exact, 100.0, "normalized error text is identical".into()));
    }

    if let Some(error_type) = query_type {
        if classify(&solution.error_signature) == Some(error_type) {
            let sim = similarity(normalized_query, &normalized_signature);
            if sim >= min_confidence {
                let confidence = (ERROR_TYPE_BASE + ERROR_TYPE_SLOPE * f64::from(sim)).min(ERROR_TYPE_CAP);
                return Some(result(
                    MatchType::ErrorType,
                    confidence,
                    format!("same error type {error_type}, {sim}% keyword overlap"),
                ));
            }
        }
    }

    let sim = similarity(query, &solution.error_signature);
    (sim >= min_confidence).then(|| {
        result(
            MatchType::Similarity,
            f64::from(sim),
            format!("{sim}% keyword overlap"),
        )
    })
}

/// Ranks `solutions` against an error report.
///
/// Results come back best first. Equal ranks keep the order of `solutions`.
/// An empty slice yields an empty result.
#[must_use]
pub fn search(
    query: &str,
    solutions: &[Solution],
    min_confidence: u32,
    agent_env: Option<&AgentEnvironment>,
) -> Vec<MatchResult> {
    let normalized_query = normalize(query);
    let query_type = classify(query);

    let mut results: Vec<MatchResult> = solutions
        .iter()
        .filter_map(|solution| {
            match_candidate(query, &normalized_query, query_type, solution, min_confidence, agent_env)
        })
        .collect();

    // stable: ties stay in input order
    results.sort_by(|a, b| b.rank().total_cmp(&a.rank()));
    results
}

/// Direct lookup by fingerprint, bypassing the text tiers.
#[must_use]
pub fn lookup(solution: &Solution, agent_env: Option<&AgentEnvironment>) -> MatchResult {
    MatchResult {
        solution: solution.clone(),
        match_type: MatchType::Exact,
        confidence: 100.0,
        reason: "direct fingerprint lookup".into(),
        environment_score: environment_score(solution.environment.as_ref(), agent_env),
    }
}
