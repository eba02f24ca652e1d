//! Purchase and vote command implementations.

use std::io::Write;

use symbiont_market::{PaymentProof, SymbiontMarket};

use crate::cli::{PurchaseArgs, VoteArgs};
use crate::error::CliError;
use crate::output::OutputFormat;

/// Purchase command executor.
pub struct PurchaseCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> PurchaseCommand<'a> {
    /// Create a new purchase command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute the purchase command.
    ///
    /// # Errors
    ///
    /// Returns an error if the proof is missing or invalid, or the solution
    /// does not exist.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, args: &PurchaseArgs) -> Result<(), CliError> {
        let proof = Self::proof(args)?;
        let outcome = self.market.purchase(&args.id, &proof)?;
        format.write(writer, &outcome)
    }

    fn proof(args: &PurchaseArgs) -> Result<PaymentProof, CliError> {
        match (&args.payment_header, &args.payer, &args.tx) {
            (Some(header), _, _) => PaymentProof::decode_header(header).map_err(|e| CliError::Market(e.into())),
            (None, Some(payer), Some(tx)) => Ok(PaymentProof::new(tx.clone(), payer.clone())),
            _ => Err(CliError::InvalidArgument(
                "either --payment-header or both --payer and --tx are required".into(),
            )),
        }
    }
}

/// Vote command executor.
pub struct VoteCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> VoteCommand<'a> {
    /// Create a new vote command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute the vote command.
    ///
    /// # Errors
    ///
    /// Returns an error if the solution does not exist or storage fails.
    /// A failed settlement is reported in the output, not as an error.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, args: &VoteArgs) -> Result<(), CliError> {
        let outcome = self
            .market
            .vote(&args.id, args.direction, args.buyer.as_deref())?;
        format.write(writer, &outcome)
    }
}
