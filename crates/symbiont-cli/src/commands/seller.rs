//! Seller command implementation.

use std::io::Write;

use symbiont_market::SymbiontMarket;

use crate::cli::SellerCommands;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Seller command executor.
pub struct SellerCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> SellerCommand<'a> {
    /// Create a new seller command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute a seller subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &SellerCommands,
    ) -> Result<(), CliError> {
        match command {
            SellerCommands::Show { wallet } => {
                let report = self.market.seller_profile(wallet)?;
                format.write(writer, &report)?;
            }
            SellerCommands::Register { wallet, username } => {
                let profile = self.market.register_seller(wallet, username.as_deref())?;
                format.write(writer, &profile)?;
            }
            SellerCommands::Link { wallet, username } => {
                let profile = self.market.link_identity(wallet, username)?;
                format.write(writer, &profile)?;
            }
            SellerCommands::Stake { wallet, amount } => {
                let profile = self.market.stake(wallet, *amount)?;
                format.write(writer, &profile)?;
            }
            SellerCommands::Unstake { wallet, amount } => {
                let outcome = self.market.unstake(wallet, *amount)?;
                format.write(writer, &outcome)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Format;
    use crate::commands::test_support::market;
    use symbiont_core::Amount;

    fn run(market: &SymbiontMarket, format: Format, command: &SellerCommands) -> String {
        let mut out = Vec::new();
        SellerCommand::new(market)
            .execute(&mut out, &OutputFormat::new(format), command)
            .expect("seller command");
        String::from_utf8(out).expect("utf-8")
    }

    #[test]
    fn register_then_show() {
        let market = market();
        run(
            &market,
            Format::Table,
            &SellerCommands::Register {
                wallet: "0xA".into(),
                username: Some("octo".into()),
            },
        );

        let text = run(&market, Format::Table, &SellerCommands::Show { wallet: "0xa".into() });
        assert!(text.contains("Seller 0xa"));
        assert!(text.contains("identity"));
        assert!(text.contains("TOTAL"));
    }

    #[test]
    fn stake_and_unstake() {
        let market = market();
        let staked = run(
            &market,
            Format::Json,
            &SellerCommands::Stake {
                wallet: "0xa".into(),
                amount: Amount::from_usdc(5),
            },
        );
        let parsed: serde_json::Value = serde_json::from_str(&staked).expect("json");
        assert_eq!(parsed["staked"], "5");

        let text = run(
            &market,
            Format::Table,
            &SellerCommands::Unstake {
                wallet: "0xa".into(),
                amount: Amount::from_usdc(2),
            },
        );
        assert!(text.contains("3.000000 USDC"));
    }

    #[test]
    fn show_unknown_seller_fails() {
        let market = market();
        let mut out = Vec::new();
        assert!(SellerCommand::new(&market)
            .execute(&mut out, &OutputFormat::default(), &SellerCommands::Show { wallet: "0xnone".into() })
            .is_err());
    }
}
