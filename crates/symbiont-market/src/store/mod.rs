//! Record storage port.
//!
//! The market never holds records in a process-wide singleton. Every read
//! and write goes through a [`RecordStore`], which deals in untyped JSON rows
//! grouped into named collections. [`RecordStoreExt`] layers typed access on
//! top: rows are decoded into their explicit schemas at this boundary, and a
//! row that does not decode is a [`StoreError::Schema`], never a silent
//! default.
//!
//! Writes are expressed as a [`WriteBatch`]: a set of upserts across any
//! collections plus the row values they expect to find. A store applies the
//! whole batch or none of it, which makes every lifecycle step a single
//! compare-and-set at the port.

mod json;
mod memory;

pub use json::JsonFileStore;
pub use memory::MemoryStore;

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use symbiont_core::{Bounty, PendingPayment, SellerProfile, Solution};
use thiserror::Error;

/// Errors raised by a record store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Filesystem failure.
    #[error("i/o error on {}: {source}", .path.display())]
    Io {
        /// File involved.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A record kept changing underneath a conditional write.
    #[error("{collection} record {key} is contended")]
    Contended {
        /// Collection of the record.
        collection: String,
        /// Key of the record.
        key: String,
    },

    /// A stored row does not match its schema.
    #[error("malformed {collection} record: {source}")]
    Schema {
        /// Collection the row came from.
        collection: String,
        /// Decode error.
        #[source]
        source: serde_json::Error,
    },
}

/// A keyed JSON row.
pub type Row = (String, Value);

/// A row value a [`WriteBatch`] requires before it applies.
#[derive(Debug, Clone, PartialEq)]
pub struct Expectation {
    /// Collection holding the row.
    pub collection: String,
    /// Row key.
    pub key: String,
    /// Expected value; `None` means the key must be absent.
    pub value: Option<Value>,
}

/// An all-or-nothing set of upserts guarded by expected row values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WriteBatch {
    expectations: Vec<Expectation>,
    writes: Vec<(String, Row)>,
}

impl WriteBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires the row under `key` to equal `value` (or be absent for `None`).
    #[must_use]
    pub fn expect_row(mut self, collection: &str, key: &str, value: Option<Value>) -> Self {
        self.expectations.push(Expectation {
            collection: collection.to_string(),
            key: key.to_string(),
            value,
        });
        self
    }

    /// Requires no `T` to be stored under `key`.
    #[must_use]
    pub fn expect_absent<T: Record>(self, key: &str) -> Self {
        self.expect_row(T::COLLECTION, key, None)
    }

    /// Adds an untyped upsert.
    #[must_use]
    pub fn put_row(mut self, collection: &str, row: Row) -> Self {
        self.writes.push((collection.to_string(), row));
        self
    }

    /// Adds a typed upsert.
    pub fn put<T: Record>(self, record: &T) -> Result<Self, StoreError> {
        Ok(self.put_row(T::COLLECTION, encode(record)?))
    }

    /// Conditions the batch must satisfy.
    #[must_use]
    pub fn expectations(&self) -> &[Expectation] {
        &self.expectations
    }

    /// Upserts grouped by collection, in the order they were added.
    #[must_use]
    pub fn into_writes(self) -> Vec<(String, Vec<Row>)> {
        let mut grouped: Vec<(String, Vec<Row>)> = Vec::new();
        for (collection, row) in self.writes {
            match grouped.iter_mut().find(|(c, _)| *c == collection) {
                Some((_, rows)) => rows.push(row),
                None => grouped.push((collection, vec![row])),
            }
        }
        grouped
    }
}

/// Untyped storage for named collections of keyed rows.
///
/// Upserts are row-level: existing keys are replaced in place, new keys are
/// appended, and insertion order is preserved. [`RecordStore::commit`] is
/// the only write primitive and must be atomic with respect to every other
/// commit on the same data, including commits from other processes when the
/// backing medium is shared.
pub trait RecordStore: Send + Sync {
    /// Returns every row in `collection`, in insertion order.
    fn load_all(&self, collection: &str) -> Result<Vec<Row>, StoreError>;

    /// Returns the row stored under `key`, if any.
    fn fetch(&self, collection: &str, key: &str) -> Result<Option<Value>, StoreError>;

    /// Applies `batch` if every expectation holds.
    ///
    /// Returns `false`, having written nothing, when an expected row differs.
    fn commit(&self, batch: WriteBatch) -> Result<bool, StoreError>;

    /// Upserts `rows` into `collection` unconditionally.
    fn put_all(&self, collection: &str, rows: Vec<Row>) -> Result<(), StoreError> {
        let batch = rows
            .into_iter()
            .fold(WriteBatch::new(), |batch, row| batch.put_row(collection, row));
        self.commit(batch).map(|_| ())
    }
}

/// A typed record living in one collection.
pub trait Record: Serialize + DeserializeOwned {
    /// Collection name.
    const COLLECTION: &'static str;

    /// Unique key within the collection.
    fn key(&self) -> &str;
}

impl Record for Solution {
    const COLLECTION: &'static str = "solutions";

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for SellerProfile {
    const COLLECTION: &'static str = "sellers";

    fn key(&self) -> &str {
        &self.wallet
    }
}

impl Record for Bounty {
    const COLLECTION: &'static str = "bounties";

    fn key(&self) -> &str {
        &self.id
    }
}

impl Record for PendingPayment {
    const COLLECTION: &'static str = "pending_payments";

    fn key(&self) -> &str {
        &self.id
    }
}

/// The cached result of a purchase, keyed by the inbound transaction.
///
/// Replaying a payment proof returns this receipt instead of opening a
/// second escrow entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseReceipt {
    /// Inbound payment transaction reference.
    pub tx_ref: String,
    /// Purchased solution.
    pub solution_id: String,
    /// Escrow entry opened for the purchase.
    pub payment_id: String,
    /// Paying wallet.
    pub buyer: String,
    /// The fix payload delivered.
    pub fix: String,
    /// Purchase time.
    pub created_at: DateTime<Utc>,
}

impl Record for PurchaseReceipt {
    const COLLECTION: &'static str = "purchase_receipts";

    fn key(&self) -> &str {
        &self.tx_ref
    }
}

pub(crate) fn decode<T: Record>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(|source| StoreError::Schema {
        collection: T::COLLECTION.to_string(),
        source,
    })
}

fn encode<T: Record>(record: &T) -> Result<Row, StoreError> {
    let value = serde_json::to_value(record).map_err(|source| StoreError::Schema {
        collection: T::COLLECTION.to_string(),
        source,
    })?;
    Ok((record.key().to_string(), value))
}

/// Typed access to a [`RecordStore`].
pub trait RecordStoreExt: RecordStore {
    /// Loads and decodes every record of type `T`.
    fn all<T: Record>(&self) -> Result<Vec<T>, StoreError> {
        self.load_all(T::COLLECTION)?
            .into_iter()
            .map(|(_, value)| decode(value))
            .collect()
    }

    /// Loads and decodes the record stored under `key`.
    fn get<T: Record>(&self, key: &str) -> Result<Option<T>, StoreError> {
        self.fetch(T::COLLECTION, key)?.map(decode).transpose()
    }

    /// Upserts a single record.
    fn put<T: Record>(&self, record: &T) -> Result<(), StoreError> {
        self.put_all(T::COLLECTION, vec![encode(record)?])
    }
}

impl<S: RecordStore + ?Sized> RecordStoreExt for S {}

/// Checks `expectations` against `lookup`, which finds a row by collection and key.
pub(crate) fn expectations_hold(
    expectations: &[Expectation],
    mut lookup: impl FnMut(&str, &str) -> Result<Option<Value>, StoreError>,
) -> Result<bool, StoreError> {
    for expectation in expectations {
        if lookup(&expectation.collection, &expectation.key)? != expectation.value {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Upserts `incoming` into `rows`, keeping insertion order.
pub(crate) fn upsert_rows(rows: &mut Vec<Row>, incoming: Vec<Row>) {
    for (key, value) in incoming {
        match rows.iter_mut().find(|(existing, _)| *existing == key) {
            Some(slot) => slot.1 = value,
            None => rows.push((key, value)),
        }
    }
}
