//! Runtime-environment compatibility scoring.
//!
//! A fix declares the environments it works in ([`Environment`], wildcards
//! allowed); an agent reports the concrete environment it runs in
//! ([`AgentEnvironment`]). [`environment_score`] rates how well the two fit
//! on a 0-100 scale:
//!
//! | dimension        | points | rule                                         |
//! |------------------|--------|----------------------------------------------|
//! | OS               | 20     | agent OS in the declared set, or `*`         |
//! | runtime          | 30     | exact name or `*`; a mismatch scores 0 total |
//! | runtime version  | 25     | agent version satisfies the constraint       |
//! | dependencies     | 25     | pro-rated over the declared dependencies     |

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Wildcard accepted for OS, runtime and version constraints.
pub const WILDCARD: &str = "*";

const OS_POINTS: u32 = 20;
const RUNTIME_POINTS: u32 = 30;
const VERSION_POINTS: u32 = 25;
const DEPENDENCY_POINTS: u32 = 25;

fn wildcard() -> String {
    WILDCARD.to_string()
}

/// The environments a fix declares support for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    /// Supported operating systems (`"linux"`, `"macos"`, ...) or `"*"`.
    pub os: Vec<String>,
    /// Required runtime (`"nodejs"`, `"python"`, ...) or `"*"`.
    pub runtime: String,
    /// Runtime version constraint such as `">=14.0.0"`, or `"*"`.
    #[serde(default = "wildcard")]
    pub runtime_version: String,
    /// Dependency name to version constraint.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Environment {
    /// An environment that accepts everything.
    #[must_use]
    pub fn any() -> Self {
        Self {
            os: vec![wildcard()],
            runtime: wildcard(),
            runtime_version: wildcard(),
            dependencies: BTreeMap::new(),
        }
    }

    /// Returns true if `os` is in the declared set or the set has a wildcard.
    #[must_use]
    pub fn supports_os(&self, os: &str) -> bool {
        self.os.iter().any(|candidate| candidate == os || candidate == WILDCARD)
    }

    /// Returns true if `runtime` matches the declared runtime or its wildcard.
    #[must_use]
    pub fn supports_runtime(&self, runtime: &str) -> bool {
        self.runtime == runtime || self.runtime == WILDCARD
    }
}

/// The concrete environment an agent reports alongside a failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentEnvironment {
    /// Operating system name.
    pub os: String,
    /// Runtime name.
    pub runtime: String,
    /// Installed runtime version, e.g. `"18.17.0"`.
    pub runtime_version: String,
    /// Dependency name to installed version.
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl AgentEnvironment {
    /// Placeholder used when a bounty is filed without an environment.
    #[must_use]
    pub fn unknown() -> Self {
        Self {
            os: "unknown".to_string(),
            runtime: "unknown".to_string(),
            runtime_version: wildcard(),
            dependencies: BTreeMap::new(),
        }
    }
}

/// A parsed version constraint: an operator plus a dotted numeric version.
///
/// The operator is any run of `<`, `>` and `=` (default `>=`). A comparison
/// is decided by the first differing component, missing trailing components
/// count as zero, and an all-equal comparison satisfies only operators
/// containing `=`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionConstraint {
    /// Matches any version.
    Any,
    /// Matches versions in the allowed direction(s) of `version`.
    Compare {
        /// Accepts versions above `version`.
        greater: bool,
        /// Accepts versions below `version`.
        less: bool,
        /// Accepts `version` itself.
        equal: bool,
        /// Numeric components of the reference version.
        version: Vec<u64>,
    },
}

fn version_components(version: &str) -> Vec<u64> {
    version
        .split('.')
        .map(|part| part.trim().parse().unwrap_or(0))
        .collect()
}

impl VersionConstraint {
    /// Parses a constraint such as `">=14.0.0"`, `"<3"`, `"1.2"` or `"*"`.
    #[must_use]
    pub fn parse(constraint: &str) -> Self {
        let constraint = constraint.trim();
        if constraint.is_empty() || constraint == WILDCARD {
            return Self::Any;
        }

        let split = constraint
            .find(|c: char| !matches!(c, '<' | '>' | '='))
            .unwrap_or(constraint.len());
        let (operator, version) = constraint.split_at(split);
        if version.is_empty() {
            return Self::Any;
        }
        let operator = if operator.is_empty() { ">=" } else { operator };

        Self::Compare {
            greater: operator.contains('>'),
            less: operator.contains('<'),
            equal: operator.contains('='),
            version: version_components(version),
        }
    }

    /// Returns true if `actual` satisfies this constraint.
    ///
    /// An empty `actual` version is treated as unconstrained.
    #[must_use]
    pub fn is_satisfied_by(&self, actual: &str) -> bool {
        let Self::Compare { greater, less, equal, version } = self else {
            return true;
        };
        if actual.trim().is_empty() {
            return true;
        }

        let actual = version_components(actual);
        let len = actual.len().max(version.len());
        for i in 0..len {
            let a = actual.get(i).copied().unwrap_or(0);
            let r = version.get(i).copied().unwrap_or(0);
            match a.cmp(&r) {
                Ordering::Greater => return *greater,
                Ordering::Less => return *less,
                Ordering::Equal => {}
            }
        }
        *equal
    }
}

/// Shorthand for `VersionConstraint::parse(required).is_satisfied_by(actual)`.
#[must_use]
pub fn version_satisfies(actual: &str, required: &str) -> bool {
    VersionConstraint::parse(required).is_satisfied_by(actual)
}

/// Scores how well an agent environment fits a declared environment.
///
/// Missing either side means there is no constraint and scores 100. A
/// runtime mismatch returns 0 immediately, whatever the other dimensions
/// say.
#[must_use]
pub fn environment_score(
    solution_env: Option<&Environment>,
    agent_env: Option<&AgentEnvironment>,
) -> u32 {
    let (Some(declared), Some(agent)) = (solution_env, agent_env) else {
        return 100;
    };

    if !declared.supports_runtime(&agent.runtime) {
        return 0;
    }

    let mut score = RUNTIME_POINTS;

    if declared.supports_os(&agent.os) {
        score += OS_POINTS;
    }

    if version_satisfies(&agent.runtime_version, &declared.runtime_version) {
        score += VERSION_POINTS;
    }

    score += dependency_points(declared, agent);
    score
}

fn dependency_points(declared: &Environment, agent: &AgentEnvironment) -> u32 {
    if declared.dependencies.is_empty() {
        return DEPENDENCY_POINTS;
    }

    let satisfied = declared
        .dependencies
        .iter()
        .filter(|(name, required)| {
            agent
                .dependencies
                .get(name.as_str())
                .filter(|installed| !installed.is_empty())
                .is_some_and(|installed| version_satisfies(installed, required))
        })
        .count();

    let fraction = satisfied as f64 / declared.dependencies.len() as f64;
    (fraction * f64::from(DEPENDENCY_POINTS)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    fn node_env() -> Environment {
        Environment {
            os: vec!["linux".into(), "macos".into()],
            runtime: "nodejs".into(),
            runtime_version: ">=14.0.0".into(),
            dependencies: BTreeMap::from([
                ("ethers".to_string(), ">=5.0.0".to_string()),
                ("viem".to_string(), ">=2.0.0".to_string()),
            ]),
        }
    }

    fn reported(os: &str, runtime: &str, version: &str, deps: &[(&str, &str)]) -> AgentEnvironment {
        AgentEnvironment {
            os: os.into(),
            runtime: runtime.into(),
            runtime_version: version.into(),
            dependencies: deps
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        }
    }

    // =========================================================================
    // Version constraints
    // =========================================================================

    #[test_case("18.17.0", ">=14.0.0", true ; "greater satisfies ge")]
    #[test_case("14.0.0", ">=14.0.0", true ; "equal satisfies ge")]
    #[test_case("12.22.1", ">=14.0.0", false ; "lower fails ge")]
    #[test_case("14", ">=14.0.0", true ; "missing components are zero")]
    #[test_case("3.9", "<3.10", true ; "numeric not lexical")]
    #[test_case("3.10", "<3.10", false ; "equal fails strict lt")]
    #[test_case("3.10", "<=3.10", true ; "equal satisfies le")]
    #[test_case("2.0.0", ">2.0.0", false ; "equal fails strict gt")]
    #[test_case("1.2.3", "=1.2.3", true ; "exact equal")]
    #[test_case("1.2.4", "=1.2.3", false ; "exact differs")]
    #[test_case("16.0.0", "14.0.0", true ; "default operator is ge")]
    #[test_case("0.1.0", "*", true ; "wildcard")]
    #[test_case("", ">=99", true ; "unknown actual is unconstrained")]
    fn version_constraint_cases(actual: &str, required: &str, expected: bool) {
        assert_eq!(version_satisfies(actual, required), expected);
    }

    #[test]
    fn parse_extracts_operator_flags() {
        assert_eq!(
            VersionConstraint::parse("<=2.1"),
            VersionConstraint::Compare {
                greater: false,
                less: true,
                equal: true,
                version: vec![2, 1],
            }
        );
        assert_eq!(VersionConstraint::parse(" * "), VersionConstraint::Any);
        assert_eq!(VersionConstraint::parse(">="), VersionConstraint::Any);
    }

    // =========================================================================
    // Environment score
    // =========================================================================

    #[test]
    fn missing_side_scores_full() {
        let env = node_env();
        let agent = reported("linux", "python", "3.11", &[]);
        assert_eq!(environment_score(None, Some(&agent)), 100);
        assert_eq!(environment_score(Some(&env), None), 100);
        assert_eq!(environment_score(None, None), 100);
    }

    #[test]
    fn full_match_scores_100() {
        let env = node_env();
        let agent = reported("linux", "nodejs", "18.17.0", &[("ethers", "5.7.2"), ("viem", "2.9.0")]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 100);
    }

    #[test]
    fn runtime_mismatch_short_circuits_to_zero() {
        let env = node_env();
        let agent = reported("linux", "python", "18.17.0", &[("ethers", "5.7.2"), ("viem", "2.9.0")]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 0);
    }

    #[test]
    fn os_mismatch_loses_20() {
        let env = node_env();
        let agent = reported("windows", "nodejs", "18.17.0", &[("ethers", "5.7.2"), ("viem", "2.9.0")]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 80);
    }

    #[test]
    fn version_mismatch_loses_25() {
        let env = node_env();
        let agent = reported("linux", "nodejs", "12.0.0", &[("ethers", "5.7.2"), ("viem", "2.9.0")]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 75);
    }

    #[test]
    fn dependencies_are_prorated() {
        let env = node_env();
        // one of two satisfied: round(12.5) = 13
        let agent = reported("linux", "nodejs", "18.17.0", &[("ethers", "5.7.2"), ("viem", "1.0.0")]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 88);

        let agent = reported("linux", "nodejs", "18.17.0", &[]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 75);
    }

    #[test]
    fn no_declared_dependencies_gets_full_points() {
        let mut env = node_env();
        env.dependencies.clear();
        let agent = reported("linux", "nodejs", "18.17.0", &[]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 100);
    }

    #[test]
    fn wildcards_accept_anything() {
        let env = Environment::any();
        let agent = reported("plan9", "zig", "0.12.0", &[]);
        assert_eq!(environment_score(Some(&env), Some(&agent)), 100);
    }

    #[test]
    fn environment_deserializes_with_defaults() {
        let env: Environment =
            serde_json::from_str(r#"{"os":["linux"],"runtime":"python"}"#).unwrap();
        assert_eq!(env.runtime_version, "*");
        assert!(env.dependencies.is_empty());
    }

    proptest! {
        #[test]
        fn score_is_bounded(
            os in "[a-z]{1,6}",
            version in "[0-9]{1,2}\\.[0-9]{1,2}",
            dep in "[0-9]{1,2}\\.[0-9]",
        ) {
            let env = node_env();
            let agent = reported(&os, "nodejs", &version, &[("ethers", dep.as_str())]);
            prop_assert!(environment_score(Some(&env), Some(&agent)) <= 100);
        }

        #[test]
        fn runtime_mismatch_is_always_zero(
            runtime in "[a-z]{1,8}",
            os in prop::sample::select(vec!["linux", "macos", "windows"]),
            version in "[0-9]{1,2}\\.[0-9]{1,2}",
        ) {
            prop_assume!(runtime != "nodejs");
            let env = node_env();
            let agent = reported(os, &runtime, &version, &[("ethers", "9.9.9"), ("viem", "9.9.9")]);
            prop_assert_eq!(environment_score(Some(&env), Some(&agent)), 0);
        }
    }
}
