//! Output formatting for CLI commands.
//!
//! Supports table (human-readable) and JSON output formats.

use std::io::Write;

use serde::Serialize;
use symbiont_core::{Bounty, MatchResult, SellerProfile};
use symbiont_market::{
    BountyPayout, BountyResolution, PurchaseOutcome, SellerReport, SettlementOutcome,
    SolutionPreview, UnstakeOutcome, UploadOutcome, VoteOutcome,
};

use crate::cli::Format;
use crate::error::CliError;

/// Output formatter that handles both table and JSON output.
#[derive(Debug, Clone)]
pub struct OutputFormat {
    format: Format,
}

impl OutputFormat {
    /// Create a new output formatter.
    #[must_use]
    pub const fn new(format: Format) -> Self {
        Self { format }
    }

    /// Get the current format.
    #[must_use]
    pub const fn format(&self) -> Format {
        self.format
    }

    /// Check if JSON format is selected.
    #[must_use]
    pub const fn is_json(&self) -> bool {
        matches!(self.format, Format::Json)
    }

    /// Write a serializable value to the output.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write<W, T>(&self, writer: &mut W, value: &T) -> Result<(), CliError>
    where
        W: Write,
        T: Serialize + TableDisplay,
    {
        match self.format {
            Format::Json => {
                serde_json::to_writer_pretty(&mut *writer, value)
                    .map_err(|e| CliError::Format(format!("JSON serialization failed: {e}")))?;
                writeln!(writer)?;
            }
            Format::Table => {
                value.write_table(writer)?;
            }
        }
        Ok(())
    }

    /// Write a serializable value to a string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_string<T>(&self, value: &T) -> Result<String, CliError>
    where
        T: Serialize + TableDisplay,
    {
        let mut buf = Vec::new();
        self.write(&mut buf, value)?;
        String::from_utf8(buf).map_err(|e| CliError::Format(format!("UTF-8 error: {e}")))
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self::new(Format::Table)
    }
}

/// Trait for types that can be displayed as a table.
pub trait TableDisplay {
    /// Write the value as a human-readable table.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError>;
}

/// Ranked query results.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct MatchList(pub Vec<MatchResult>);

impl TableDisplay for MatchList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.0.is_empty() {
            writeln!(writer, "No matching fixes")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<16}  {:<11}  {:>5}  {:>4}  {:>14}  {}",
            "ID", "TIER", "CONF", "ENV", "PRICE", "ERROR"
        )?;
        writeln!(writer, "{}", "─".repeat(96))?;

        for result in &self.0 {
            writeln!(
                writer,
                "{:<16}  {:<11}  {:>5.1}  {:>4}  {:>14}  {}",
                result.solution.id,
                result.match_type,
                result.confidence,
                result.environment_score,
                result.solution.price.to_string(),
                truncate(&result.solution.error_signature, 40)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} match(es)", self.0.len())?;
        Ok(())
    }
}

impl TableDisplay for SolutionPreview {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Solution {}", self.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Error:          {}", self.error_signature)?;
        writeln!(writer, "Price:          {}", self.price)?;
        writeln!(writer, "Seller:         {}", self.seller)?;
        match (self.seller_reputation, self.seller_level) {
            (Some(score), Some(level)) => {
                writeln!(writer, "Reputation:     {score} {} {level}", level.badge())?;
            }
            _ => writeln!(writer, "Reputation:     unregistered")?,
        }
        if !self.tags.is_empty() {
            writeln!(writer, "Tags:           {}", self.tags.join(", "))?;
        }
        writeln!(writer)?;
        writeln!(writer, "Usage")?;
        writeln!(writer, "  Purchases:    {}", self.usage_count)?;
        writeln!(writer, "  Votes:        +{} / -{}", self.upvotes, self.downvotes)?;
        writeln!(writer, "  Success:      {}%", self.success_rate)?;
        Ok(())
    }
}

impl TableDisplay for PurchaseOutcome {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.replayed {
            writeln!(writer, "Payment already used; returning the original purchase")?;
        }
        writeln!(writer, "Payment:        {} (held in escrow)", self.payment_id)?;
        writeln!(writer, "Buyer:          {}", self.buyer)?;
        writeln!(writer)?;
        writeln!(writer, "Fix")?;
        writeln!(writer, "──────────────────────────────────")?;
        writeln!(writer, "{}", self.fix)?;
        writeln!(writer)?;
        writeln!(writer, "Vote with: symbiont vote {} up|down", self.solution_id)?;
        Ok(())
    }
}

impl TableDisplay for VoteOutcome {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(
            writer,
            "✓ Voted {} on {} (+{} / -{}, {}% success)",
            self.direction, self.solution_id, self.upvotes, self.downvotes, self.success_rate
        )?;
        match &self.settlement {
            SettlementOutcome::NoPendingPayment => writeln!(writer, "No payment to settle")?,
            SettlementOutcome::Settled { payment_id, amount, tx_ref } => {
                writeln!(writer, "Released {amount} to seller for {payment_id}")?;
                if let Some(tx) = tx_ref {
                    writeln!(writer, "Transaction:    {tx}")?;
                }
            }
            SettlementOutcome::Refunded { payment_id, amount, tx_ref } => {
                writeln!(writer, "Refunded {amount} to buyer for {payment_id}")?;
                if let Some(tx) = tx_ref {
                    writeln!(writer, "Transaction:    {tx}")?;
                }
            }
            SettlementOutcome::Failed { payment_id, reason } => {
                writeln!(writer, "Settlement of {payment_id} failed, still pending: {reason}")?;
            }
        }
        Ok(())
    }
}

impl TableDisplay for UploadOutcome {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        match self {
            Self::Created { solution, bounty } => {
                writeln!(writer, "✓ Uploaded solution {}", solution.id)?;
                writeln!(writer, "Price:          {}", solution.price)?;
                match bounty {
                    Some(BountyResolution::Paid(payout)) => payout.write_table(writer)?,
                    Some(BountyResolution::Failed { bounty_id, reason }) => {
                        writeln!(writer, "Bounty {bounty_id} not resolved: {reason}")?;
                    }
                    None => {}
                }
            }
            Self::ResolvedWithExisting { solution, payout } => {
                writeln!(writer, "Solution {} already existed; bounty resolved with it", solution.id)?;
                payout.write_table(writer)?;
            }
        }
        Ok(())
    }
}

impl TableDisplay for BountyPayout {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Bounty {} solved", self.bounty.id)?;
        writeln!(writer, "Reward:         {}", self.reward)?;
        if let Some(tx) = &self.tx_ref {
            writeln!(writer, "Transaction:    {tx}")?;
        }
        Ok(())
    }
}

impl TableDisplay for Bounty {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Bounty {}", self.id)?;
        writeln!(writer, "══════════════════════════════════")?;
        writeln!(writer, "Status:         {}", self.status)?;
        writeln!(writer, "Error:          {}", self.error_signature)?;
        writeln!(
            writer,
            "Environment:    {} / {} {}",
            self.environment.os, self.environment.runtime, self.environment.runtime_version
        )?;
        writeln!(writer, "Reward:         {}", self.reward)?;
        writeln!(writer, "Requester:      {}", self.requester)?;
        if let Some(solver) = &self.solver {
            writeln!(writer, "Solver:         {solver}")?;
        }
        if let Some(solution) = &self.solution_id {
            writeln!(writer, "Solution:       {solution}")?;
        }
        writeln!(writer, "Expires:        {}", self.expires_at.format("%Y-%m-%d %H:%M UTC"))?;
        Ok(())
    }
}

/// Bounties for listing.
#[derive(Debug, Clone, Serialize)]
#[serde(transparent)]
pub struct BountyList(pub Vec<Bounty>);

impl TableDisplay for BountyList {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        if self.0.is_empty() {
            writeln!(writer, "No bounties")?;
            return Ok(());
        }

        writeln!(
            writer,
            "{:<39}  {:<8}  {:>14}  {}",
            "ID", "STATUS", "REWARD", "ERROR"
        )?;
        writeln!(writer, "{}", "─".repeat(96))?;

        for bounty in &self.0 {
            writeln!(
                writer,
                "{:<39}  {:<8}  {:>14}  {}",
                bounty.id,
                bounty.status.to_string(),
                bounty.reward.to_string(),
                truncate(&bounty.error_signature, 28)
            )?;
        }

        writeln!(writer)?;
        writeln!(writer, "Total: {} bounty(ies)", self.0.len())?;
        Ok(())
    }
}

impl TableDisplay for SellerProfile {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "Seller {}", self.wallet)?;
        if let Some(username) = &self.username {
            writeln!(writer, "Identity:       {username} ({} stars, {} contributions)", self.stars, self.contributions)?;
        }
        writeln!(writer, "Reputation:     {}", self.reputation_score)?;
        writeln!(writer, "Sales:          {}", self.total_sales)?;
        writeln!(writer, "Earnings:       {}", self.total_earnings)?;
        writeln!(writer, "Votes:          +{} / -{}", self.success_votes, self.failure_votes)?;
        writeln!(writer, "Staked:         {}", self.staked)?;
        Ok(())
    }
}

impl TableDisplay for SellerReport {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        self.profile.write_table(writer)?;
        writeln!(
            writer,
            "Level:          {} {}{}",
            self.badge,
            self.level,
            if self.trustworthy { "" } else { " (not trustworthy)" }
        )?;
        writeln!(writer)?;
        writeln!(writer, "{:<10}  {:>6}  {:>5}  {:>8}", "DIMENSION", "WEIGHT", "SCORE", "WEIGHTED")?;
        writeln!(writer, "{}", "─".repeat(36))?;
        for row in &self.breakdown.rows {
            writeln!(
                writer,
                "{:<10}  {:>5}%  {:>5}  {:>8}",
                row.dimension, row.weight_percent, row.score, row.weighted
            )?;
        }
        writeln!(writer, "{}", "─".repeat(36))?;
        writeln!(writer, "{:<10}  {:>6}  {:>5}  {:>8}", "TOTAL", "", "", self.breakdown.total)?;
        Ok(())
    }
}

impl TableDisplay for UnstakeOutcome {
    fn write_table<W: Write>(&self, writer: &mut W) -> Result<(), CliError> {
        writeln!(writer, "✓ Stake returned to {}", self.profile.wallet)?;
        writeln!(writer, "Transaction:    {}", self.tx_ref)?;
        writeln!(writer, "Still staked:   {}", self.profile.staked)?;
        Ok(())
    }
}

/// Truncate a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len > 3 {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{head}...")
    } else {
        s.chars().take(max_len).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use symbiont_core::{AgentEnvironment, Amount, BountyStatus, MatchType, Solution, VoteDirection};

    fn solution() -> Solution {
        Solution {
            id: "ba7816bf8f01cfea".into(),
            error_signature: "TypeError: Cannot read property 'x' of undefined".into(),
            fix: String::new(),
            price: Amount::from_micros(50_000),
            seller: "0xseller".into(),
            environment: None,
            tags: vec![],
            created_at: Utc::now(),
            usage_count: 0,
            total_earnings: Amount::ZERO,
            upvotes: 0,
            downvotes: 0,
            bounty_id: None,
        }
    }

    #[test]
    fn output_format_default_is_table() {
        let fmt = OutputFormat::default();
        assert_eq!(fmt.format(), Format::Table);
        assert!(!fmt.is_json());
    }

    #[test]
    fn output_format_json() {
        let fmt = OutputFormat::new(Format::Json);
        assert_eq!(fmt.format(), Format::Json);
        assert!(fmt.is_json());
    }

    #[test]
    fn match_list_table() {
        let list = MatchList(vec![MatchResult {
            solution: solution(),
            match_type: MatchType::ErrorType,
            confidence: 76.8,
            reason: "same error type".into(),
            environment_score: 100,
        }]);

        let output = OutputFormat::default().to_string(&list).expect("should format");
        assert!(output.contains("ba7816bf8f01cfea"));
        assert!(output.contains("error_type"));
        assert!(output.contains("76.8"));
        assert!(output.contains("Total: 1 match(es)"));
    }

    #[test]
    fn empty_match_list_table() {
        let output = OutputFormat::default().to_string(&MatchList(vec![])).expect("should format");
        assert!(output.contains("No matching fixes"));
    }

    #[test]
    fn match_list_json_is_an_array() {
        let list = MatchList(vec![]);
        let output = OutputFormat::new(Format::Json).to_string(&list).expect("should format");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert!(parsed.is_array());
    }

    #[test]
    fn vote_outcome_reports_failure() {
        let outcome = VoteOutcome {
            solution_id: "abc".into(),
            direction: VoteDirection::Up,
            upvotes: 1,
            downvotes: 0,
            success_rate: 100,
            settlement: SettlementOutcome::Failed {
                payment_id: "pay_1".into(),
                reason: "rail unavailable: offline".into(),
            },
        };

        let output = OutputFormat::default().to_string(&outcome).expect("should format");
        assert!(output.contains("Voted up on abc"));
        assert!(output.contains("still pending"));
    }

    #[test]
    fn bounty_list_json() {
        let now = Utc::now();
        let list = BountyList(vec![Bounty {
            id: "bounty_1".into(),
            fingerprint: "f".into(),
            error_signature: "Error: boom".into(),
            environment: AgentEnvironment::unknown(),
            reward: Amount::from_usdc(1),
            requester: "0xr".into(),
            status: BountyStatus::Open,
            solver: None,
            solution_id: None,
            created_at: now,
            expires_at: now,
            payout: None,
        }]);

        let output = OutputFormat::new(Format::Json).to_string(&list).expect("should format");
        let parsed: serde_json::Value = serde_json::from_str(&output).expect("valid JSON");
        assert_eq!(parsed[0]["status"], "open");
        assert_eq!(parsed[0]["reward"], "1");
    }

    #[test]
    fn truncate_short_string() {
        assert_eq!(truncate("hello", 10), "hello");
    }

    #[test]
    fn truncate_long_string() {
        assert_eq!(truncate("hello world", 8), "hello...");
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(truncate("héllo wörld", 8), "héllo...");
    }
}
