//! Payment rail port and a simulated rail.
//!
//! The rail moves USDC between accounts and verifies inbound payment proofs.
//! Calls are blocking, carry no engine-level timeout, and are never retried
//! automatically: a failed call comes back as a [`RailError`] and the caller
//! leaves its ledger untouched.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use symbiont_core::Amount;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Errors returned by a payment rail.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RailError {
    /// The rail could not be reached.
    #[error("rail unavailable: {0}")]
    Unavailable(String),

    /// The paying account does not hold enough funds.
    #[error("insufficient balance in {account}: have {have}, need {need}")]
    InsufficientBalance {
        /// Paying account.
        account: String,
        /// Current balance.
        have: Amount,
        /// Requested amount.
        need: Amount,
    },

    /// The rail refused the transfer.
    #[error("transfer rejected: {0}")]
    Rejected(String),

    /// The payment proof could not be decoded or verified.
    #[error("invalid payment proof: {0}")]
    InvalidProof(String),
}

/// Reference to a completed rail transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxRef(String);

impl TxRef {
    /// Wraps a transaction reference.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// The reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TxRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proof that a buyer paid, as presented with a purchase request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    /// Inbound transaction reference.
    pub transaction: String,
    /// Wallet that paid.
    pub payer: String,
}

impl PaymentProof {
    /// Creates a proof from its parts.
    pub fn new(transaction: impl Into<String>, payer: impl Into<String>) -> Self {
        Self {
            transaction: transaction.into(),
            payer: payer.into(),
        }
    }

    /// Decodes a base64-encoded JSON payment-response header.
    pub fn decode_header(header: &str) -> Result<Self, RailError> {
        let bytes = STANDARD
            .decode(header.trim())
            .map_err(|e| RailError::InvalidProof(format!("header is not base64: {e}")))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| RailError::InvalidProof(format!("header is not a payment response: {e}")))
    }

    /// Encodes the proof the way [`PaymentProof::decode_header`] expects.
    #[must_use]
    pub fn encode_header(&self) -> String {
        STANDARD.encode(serde_json::to_vec(self).unwrap_or_default())
    }
}

/// A payment the rail has confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedPayment {
    /// Confirmed transaction reference.
    pub tx_ref: TxRef,
    /// Confirmed payer wallet, lowercase.
    pub payer: String,
}

/// Moves funds and verifies inbound payments.
pub trait PaymentRail: Send + Sync {
    /// Transfers `amount` out of `custody` to `to`.
    fn transfer(&self, custody: &str, to: &str, amount: Amount) -> Result<TxRef, RailError>;

    /// Confirms an inbound payment and extracts payer and reference.
    fn verify_payment(&self, proof: &PaymentProof) -> Result<VerifiedPayment, RailError>;
}

/// A transfer executed by [`SimulatedRail`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferRecord {
    /// Transaction reference.
    pub tx_ref: TxRef,
    /// Paying account.
    pub from: String,
    /// Receiving account.
    pub to: String,
    /// Amount moved.
    pub amount: Amount,
    /// Execution time.
    pub at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct SimulatedState {
    balances: HashMap<String, Amount>,
    transfers: Vec<TransferRecord>,
    rejected_proofs: HashSet<String>,
    offline: bool,
    fail_next: u32,
}

/// In-memory payment rail for development and tests.
///
/// Unmetered rails accept every transfer; metered rails require the paying
/// account to hold the funds. Failures can be injected with
/// [`SimulatedRail::set_offline`] and [`SimulatedRail::fail_next`].
#[derive(Debug, Default)]
pub struct SimulatedRail {
    metered: bool,
    latency: Option<Duration>,
    state: Mutex<SimulatedState>,
}

impl SimulatedRail {
    /// Creates an unmetered rail.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a rail that enforces balances.
    #[must_use]
    pub fn metered() -> Self {
        Self {
            metered: true,
            ..Self::default()
        }
    }

    /// Adds a delay to every transfer, outside the internal lock.
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Credits `amount` to `account`.
    pub fn airdrop(&self, account: &str, amount: Amount) {
        let mut state = self.state.lock();
        let balance = state.balances.entry(account.to_string()).or_default();
        *balance = balance.saturating_add(amount);

        info!(account, amount = %amount, "airdrop completed");
    }

    /// Current balance of `account`.
    #[must_use]
    pub fn balance(&self, account: &str) -> Amount {
        self.state.lock().balances.get(account).copied().unwrap_or_default()
    }

    /// Takes the rail offline or back online.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fails the next `count` transfers.
    pub fn fail_next(&self, count: u32) {
        self.state.lock().fail_next = count;
    }

    /// Makes proofs for `transaction` fail verification.
    pub fn reject_proof(&self, transaction: &str) {
        self.state.lock().rejected_proofs.insert(transaction.to_string());
    }

    /// Every executed transfer, oldest first.
    #[must_use]
    pub fn transfers(&self) -> Vec<TransferRecord> {
        self.state.lock().transfers.clone()
    }

    /// Number of executed transfers.
    #[must_use]
    pub fn transfer_count(&self) -> usize {
        self.state.lock().transfers.len()
    }
}

impl PaymentRail for SimulatedRail {
    fn transfer(&self, custody: &str, to: &str, amount: Amount) -> Result<TxRef, RailError> {
        if let Some(latency) = self.latency {
            std::thread::sleep(latency);
        }

        let mut state = self.state.lock();
        if state.offline {
            warn!(from = custody, to, amount = %amount, "transfer attempted while offline");
            return Err(RailError::Unavailable("simulated rail is offline".into()));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            warn!(from = custody, to, amount = %amount, "injected transfer failure");
            return Err(RailError::Rejected("injected failure".into()));
        }

        let have = state.balances.get(custody).copied().unwrap_or_default();
        if self.metered && have < amount {
            return Err(RailError::InsufficientBalance {
                account: custody.to_string(),
                have,
                need: amount,
            });
        }

        state
            .balances
            .insert(custody.to_string(), have.saturating_sub(amount));
        let recipient = state.balances.entry(to.to_string()).or_default();
        *recipient = recipient.saturating_add(amount);

        let tx_ref = TxRef::new(format!("0x{}", Uuid::new_v4().simple()));
        state.transfers.push(TransferRecord {
            tx_ref: tx_ref.clone(),
            from: custody.to_string(),
            to: to.to_string(),
            amount,
            at: Utc::now(),
        });

        debug!(from = custody, to, amount = %amount, tx = %tx_ref, "transfer completed");
        Ok(tx_ref)
    }

    fn verify_payment(&self, proof: &PaymentProof) -> Result<VerifiedPayment, RailError> {
        let state = self.state.lock();
        if state.offline {
            return Err(RailError::Unavailable("simulated rail is offline".into()));
        }
        if proof.transaction.trim().is_empty() {
            return Err(RailError::InvalidProof("missing transaction reference".into()));
        }
        if proof.payer.trim().is_empty() {
            return Err(RailError::InvalidProof("missing payer".into()));
        }
        if state.rejected_proofs.contains(&proof.transaction) {
            return Err(RailError::InvalidProof(format!(
                "transaction {} is not confirmed",
                proof.transaction
            )));
        }

        Ok(VerifiedPayment {
            tx_ref: TxRef::new(proof.transaction.trim()),
            payer: proof.payer.trim().to_lowercase(),
        })
    }
}
