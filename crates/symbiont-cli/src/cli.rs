//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use symbiont_core::{Amount, BountyStatus, VoteDirection};

/// Symbiont - a marketplace of fixes for agent errors.
#[derive(Parser, Debug, Clone)]
#[command(name = "symbiont")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Directory holding the marketplace records.
    #[arg(short, long, env = "SYMBIONT_DATA_DIR", default_value = ".symbiont")]
    pub data_dir: PathBuf,

    /// JSON configuration file.
    #[arg(short, long, env = "SYMBIONT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Emit logs as JSON.
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Find fixes for an error.
    Query(QueryArgs),

    /// Preview a fix before buying it.
    Check {
        /// Solution id.
        id: String,
    },

    /// Buy a fix.
    Purchase(PurchaseArgs),

    /// Vote on a purchased fix and settle its payment.
    Vote(VoteArgs),

    /// Sell a new fix.
    Upload(UploadArgs),

    /// Bounty management.
    Bounty {
        /// Bounty subcommand to execute.
        #[command(subcommand)]
        command: BountyCommands,
    },

    /// Seller management.
    Seller {
        /// Seller subcommand to execute.
        #[command(subcommand)]
        command: SellerCommands,
    },
}

/// Arguments for the query command.
#[derive(Args, Debug, Clone)]
pub struct QueryArgs {
    /// Error text to match.
    pub text: String,

    /// Minimum confidence (0-100).
    #[arg(short, long)]
    pub min_confidence: Option<u32>,

    /// JSON file describing the agent environment.
    #[arg(short, long)]
    pub env_file: Option<PathBuf>,
}

/// Arguments for the purchase command.
#[derive(Args, Debug, Clone)]
pub struct PurchaseArgs {
    /// Solution id.
    pub id: String,

    /// Paying wallet.
    #[arg(long, requires = "tx", conflicts_with = "payment_header")]
    pub payer: Option<String>,

    /// Inbound payment transaction reference.
    #[arg(long, requires = "payer", conflicts_with = "payment_header")]
    pub tx: Option<String>,

    /// Base64-encoded payment-response header.
    #[arg(long, required_unless_present = "tx")]
    pub payment_header: Option<String>,
}

/// Arguments for the vote command.
#[derive(Args, Debug, Clone)]
pub struct VoteArgs {
    /// Solution id.
    pub id: String,

    /// `up` if the fix worked, `down` otherwise.
    pub direction: VoteDirection,

    /// Settle only this buyer's payment.
    #[arg(short, long)]
    pub buyer: Option<String>,
}

/// Arguments for the upload command.
#[derive(Args, Debug, Clone)]
pub struct UploadArgs {
    /// Error text the fix addresses.
    #[arg(short, long)]
    pub error: String,

    /// The fix.
    #[arg(long)]
    pub fix: String,

    /// Seller wallet.
    #[arg(short, long)]
    pub seller: String,

    /// Price in USDC.
    #[arg(short, long)]
    pub price: Option<Amount>,

    /// Tag (repeatable).
    #[arg(short, long = "tag")]
    pub tags: Vec<String>,

    /// Bounty this fix answers.
    #[arg(short, long)]
    pub bounty: Option<String>,

    /// JSON file describing the supported environment.
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}

/// Bounty subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum BountyCommands {
    /// Post a bounty for an unsolved error.
    Create {
        /// Error text.
        #[arg(short, long)]
        error: String,

        /// Requesting wallet.
        #[arg(short, long)]
        requester: String,

        /// Reward in USDC.
        #[arg(long)]
        reward: Option<Amount>,

        /// JSON file describing the agent environment.
        #[arg(long)]
        env_file: Option<PathBuf>,
    },

    /// Announce work on a bounty.
    Claim {
        /// Bounty id.
        id: String,

        /// Solver wallet.
        #[arg(short, long)]
        solver: String,
    },

    /// Solve a bounty with an existing fix and pay the solver.
    Resolve {
        /// Bounty id.
        id: String,

        /// Solver wallet.
        #[arg(short, long)]
        solver: String,

        /// Solution id.
        #[arg(long)]
        solution: String,
    },

    /// Show one bounty.
    Show {
        /// Bounty id.
        id: String,
    },

    /// List bounties, newest first.
    List {
        /// Only bounties in this status.
        #[arg(long)]
        status: Option<BountyStatus>,

        /// Only bounties from this wallet.
        #[arg(short, long)]
        requester: Option<String>,
    },
}

/// Seller subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum SellerCommands {
    /// Show a seller's reputation.
    Show {
        /// Seller wallet.
        wallet: String,
    },

    /// Register a wallet as a seller.
    Register {
        /// Seller wallet.
        wallet: String,

        /// Identity to link.
        #[arg(short, long)]
        username: Option<String>,
    },

    /// Link an identity to a seller.
    Link {
        /// Seller wallet.
        wallet: String,

        /// Identity username.
        username: String,
    },

    /// Add to a seller's stake.
    Stake {
        /// Seller wallet.
        wallet: String,

        /// Amount in USDC.
        amount: Amount,
    },

    /// Withdraw part of a seller's stake.
    Unstake {
        /// Seller wallet.
        wallet: String,

        /// Amount in USDC.
        amount: Amount,
    },
}
