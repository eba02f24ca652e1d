//! # symbiont-cli
//!
//! Symbiont command-line interface.
//!
//! Provides commands for:
//! - Querying the marketplace for fixes to an error
//! - Previewing, buying and voting on fixes
//! - Selling fixes and answering bounties
//! - Seller registration, stake and reputation
//!
//! # Architecture
//!
//! The CLI opens a [`symbiont_market::SymbiontMarket`] over a JSON record
//! directory and runs one operation per invocation.
//!
//! ```text
//! ┌──────────────┐                 ┌─────────────────┐     ┌──────────────┐
//! │ symbiont-cli │────────────────►│ SymbiontMarket  │────►│ JsonFileStore│
//! └──────────────┘                 └─────────────────┘     └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod context;
pub mod error;
pub mod output;

pub use cli::{BountyCommands, Cli, Commands, Format, SellerCommands};
pub use context::open_market;
pub use error::CliError;
pub use output::OutputFormat;
