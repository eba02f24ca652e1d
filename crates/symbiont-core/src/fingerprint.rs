//! Deterministic fingerprints used as dedup keys.

use sha2::{Digest, Sha256};

use crate::environment::AgentEnvironment;

/// Hex characters kept from the SHA-256 digest.
pub const FINGERPRINT_LEN: usize = 16;

fn digest_prefix(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(FINGERPRINT_LEN);
    hex
}

fn environment_json(environment: &AgentEnvironment) -> String {
    // Field order is fixed by the struct and dependencies are a BTreeMap,
    // so the encoding is canonical.
    serde_json::to_string(environment).unwrap_or_default()
}

/// Fingerprint of a solution.
///
/// Plain uploads are keyed by the error signature alone; fixes written for a
/// bounty also fold in the bounty's environment.
#[must_use]
pub fn solution_fingerprint(error_signature: &str, environment: Option<&AgentEnvironment>) -> String {
    match environment {
        Some(env) => bounty_fingerprint(error_signature, env),
        None => digest_prefix(error_signature),
    }
}

/// Fingerprint of a bounty: error signature plus reported environment.
#[must_use]
pub fn bounty_fingerprint(error_signature: &str, environment: &AgentEnvironment) -> String {
    digest_prefix(&format!("{error_signature}:{}", environment_json(environment)))
}
