//! Query and check command implementations.

use std::io::Write;

use symbiont_core::AgentEnvironment;
use symbiont_market::SymbiontMarket;

use crate::cli::QueryArgs;
use crate::context::read_optional_json;
use crate::error::CliError;
use crate::output::{MatchList, OutputFormat};

/// Query command executor.
pub struct QueryCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> QueryCommand<'a> {
    /// Create a new query command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute the query command.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment file is unreadable or the query
    /// is invalid.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, args: &QueryArgs) -> Result<(), CliError> {
        let agent_env: Option<AgentEnvironment> = read_optional_json(args.env_file.as_deref())?;
        let results = self
            .market
            .query(&args.text, args.min_confidence, agent_env.as_ref())?;
        format.write(writer, &MatchList(results))
    }
}

/// Check (preview) command executor.
pub struct CheckCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> CheckCommand<'a> {
    /// Create a new check command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute the check command.
    ///
    /// # Errors
    ///
    /// Returns an error if the solution does not exist.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, id: &str) -> Result<(), CliError> {
        let preview = self.market.preview(id)?;
        format.write(writer, &preview)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::commands::test_support::market_with_solution;

    #[test]
    fn query_lists_matches() {
        let (market, _) = market_with_solution("TypeError: Cannot read property 'x' of undefined");
        let args = QueryArgs {
            text: "TypeError: Cannot read property 'y' of undefined".into(),
            min_confidence: None,
            env_file: None,
        };

        let mut out = Vec::new();
        QueryCommand::new(&market)
            .execute(&mut out, &OutputFormat::default(), &args)
            .expect("query");
        let text = String::from_utf8(out).expect("utf-8");
        assert!(text.contains("Total: 1 match(es)"));
    }

    #[test]
    fn check_hides_fix() {
        let (market, id) = market_with_solution("Error: boom");

        let mut out = Vec::new();
        CheckCommand::new(&market)
            .execute(&mut out, &OutputFormat::new(Format::Json), &id)
            .expect("check");
        let parsed: serde_json::Value = serde_json::from_slice(&out).expect("json");
        assert_eq!(parsed["id"], id.as_str());
        assert!(parsed.get("fix").is_none());
    }

    #[test]
    fn check_unknown_is_an_error() {
        let (market, _) = market_with_solution("Error: boom");
        let mut out = Vec::new();
        let err = CheckCommand::new(&market)
            .execute(&mut out, &OutputFormat::default(), "missing")
            .unwrap_err();
        assert!(matches!(err, CliError::Market(_)));
    }
}
