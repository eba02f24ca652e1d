//! Bounty command implementation.

use std::io::Write;

use symbiont_core::AgentEnvironment;
use symbiont_market::{BountyRequest, SymbiontMarket};

use crate::cli::BountyCommands;
use crate::context::read_optional_json;
use crate::error::CliError;
use crate::output::{BountyList, OutputFormat};

/// Bounty command executor.
pub struct BountyCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> BountyCommand<'a> {
    /// Create a new bounty command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute a bounty subcommand.
    ///
    /// # Errors
    ///
    /// Returns an error if the operation fails.
    pub fn execute<W: Write>(
        &self,
        writer: &mut W,
        format: &OutputFormat,
        command: &BountyCommands,
    ) -> Result<(), CliError> {
        match command {
            BountyCommands::Create {
                error,
                requester,
                reward,
                env_file,
            } => {
                let environment: Option<AgentEnvironment> = read_optional_json(env_file.as_deref())?;
                let bounty = self.market.bounty_create(BountyRequest {
                    error_signature: error.clone(),
                    environment,
                    reward: *reward,
                    requester: requester.clone(),
                })?;
                format.write(writer, &bounty)?;
            }
            BountyCommands::Claim { id, solver } => {
                let bounty = self.market.bounty_claim(id, solver)?;
                format.write(writer, &bounty)?;
            }
            BountyCommands::Resolve { id, solver, solution } => {
                let payout = self.market.bounty_resolve(id, solver, solution)?;
                format.write(writer, &payout)?;
            }
            BountyCommands::Show { id } => {
                let bounty = self.market.bounty_get(id)?;
                format.write(writer, &bounty)?;
            }
            BountyCommands::List { status, requester } => {
                let bounties = self.market.bounty_list(*status, requester.as_deref())?;
                format.write(writer, &BountyList(bounties))?;
            }
        }
        Ok(())
    }
}
