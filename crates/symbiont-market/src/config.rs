//! Marketplace configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};
use symbiont_core::Amount;

use crate::error::MarketError;

/// Tunables for a [`SymbiontMarket`](crate::SymbiontMarket).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Custody account the rail pays settlements and rewards out of.
    pub treasury_wallet: String,
    /// Minimum confidence a query uses when the caller gives none.
    pub default_min_confidence: u32,
    /// Price used when an upload names none.
    pub default_solution_price: Amount,
    /// Reward used when a bounty names none.
    pub default_bounty_reward: Amount,
    /// Days until a bounty's advisory expiry.
    pub bounty_ttl_days: u32,
    /// Days until a pending payment's advisory expiry.
    pub escrow_ttl_days: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            treasury_wallet: "treasury".to_string(),
            default_min_confidence: 40,
            default_solution_price: Amount::from_micros(50_000),
            default_bounty_reward: Amount::from_usdc(1),
            bounty_ttl_days: 7,
            escrow_ttl_days: 7,
        }
    }
}

impl MarketConfig {
    /// Load configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MarketError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            MarketError::validation(format!(
                "failed to read config file '{}': {e}",
                path.as_ref().display()
            ))
        })?;

        Self::from_json(&content)
    }

    /// Parse configuration from a JSON string. Missing fields take defaults.
    pub fn from_json(content: &str) -> Result<Self, MarketError> {
        let config: Self = serde_json::from_str(content)
            .map_err(|e| MarketError::validation(format!("invalid config JSON: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), MarketError> {
        if self.treasury_wallet.trim().is_empty() {
            return Err(MarketError::validation("treasury wallet cannot be empty"));
        }

        if self.default_min_confidence > 100 {
            return Err(MarketError::validation(format!(
                "default min confidence must be at most 100, got {}",
                self.default_min_confidence
            )));
        }

        if self.bounty_ttl_days == 0 || self.escrow_ttl_days == 0 {
            return Err(MarketError::validation("TTL days must be greater than 0"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = MarketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_min_confidence, 40);
        assert_eq!(config.default_solution_price.to_string(), "0.050000 USDC");
        assert_eq!(config.default_bounty_reward, Amount::from_usdc(1));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config = MarketConfig::from_json(r#"{"treasury_wallet": "0xtreasury", "bounty_ttl_days": 3}"#).unwrap();
        assert_eq!(config.treasury_wallet, "0xtreasury");
        assert_eq!(config.bounty_ttl_days, 3);
        assert_eq!(config.escrow_ttl_days, 7);
    }

    #[test]
    fn amounts_parse_from_strings() {
        let config = MarketConfig::from_json(r#"{"default_bounty_reward": "2.5"}"#).unwrap();
        assert_eq!(config.default_bounty_reward, Amount::from_micros(2_500_000));
    }

    #[test]
    fn validation_rejects_bad_values() {
        assert!(MarketConfig::from_json(r#"{"treasury_wallet": " "}"#).is_err());
        assert!(MarketConfig::from_json(r#"{"default_min_confidence": 101}"#).is_err());
        assert!(MarketConfig::from_json(r#"{"escrow_ttl_days": 0}"#).is_err());
        assert!(MarketConfig::from_json("not json").is_err());
    }

    #[test]
    fn from_file_reads_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("symbiont.json");
        std::fs::write(&path, r#"{"default_min_confidence": 60}"#).unwrap();

        let config = MarketConfig::from_file(&path).unwrap();
        assert_eq!(config.default_min_confidence, 60);
        assert!(MarketConfig::from_file(dir.path().join("missing.json")).is_err());
    }
}
