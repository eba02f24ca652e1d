//! Upload command implementation.

use std::io::Write;

use symbiont_core::Environment;
use symbiont_market::{SymbiontMarket, UploadRequest};

use crate::cli::UploadArgs;
use crate::context::read_optional_json;
use crate::error::CliError;
use crate::output::OutputFormat;

/// Upload command executor.
pub struct UploadCommand<'a> {
    market: &'a SymbiontMarket,
}

impl<'a> UploadCommand<'a> {
    /// Create a new upload command.
    #[must_use]
    pub const fn new(market: &'a SymbiontMarket) -> Self {
        Self { market }
    }

    /// Execute the upload command.
    ///
    /// # Errors
    ///
    /// Returns an error if the environment file is unreadable, a field is
    /// missing, or the fingerprint already exists.
    pub fn execute<W: Write>(&self, writer: &mut W, format: &OutputFormat, args: &UploadArgs) -> Result<(), CliError> {
        let environment: Option<Environment> = read_optional_json(args.env_file.as_deref())?;
        let outcome = self.market.upload(UploadRequest {
            error_signature: args.error.clone(),
            fix: args.fix.clone(),
            seller: args.seller.clone(),
            price: args.price,
            environment,
            tags: args.tags.clone(),
            bounty_id: args.bounty.clone(),
        })?;
        format.write(writer, &outcome)
    }
}
