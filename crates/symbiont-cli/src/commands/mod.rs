//! CLI command implementations.
//!
//! Each submodule implements a specific CLI command:
//! - [`query`] - Matching and previews
//! - [`purchase`] - Buying fixes and voting on them
//! - [`upload`] - Selling fixes
//! - [`bounty`] - Bounty lifecycle
//! - [`seller`] - Seller registration, stake and reputation

pub mod bounty;
pub mod purchase;
pub mod query;
pub mod seller;
pub mod upload;

pub use bounty::BountyCommand;
pub use purchase::{PurchaseCommand, VoteCommand};
pub use query::{CheckCommand, QueryCommand};
pub use seller::SellerCommand;
pub use upload::UploadCommand;
