//! Serialized read-modify-write access to shared records.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use symbiont_core::SellerProfile;
use tracing::debug;

use crate::store::{Record, RecordStore, StoreError, WriteBatch, decode};

/// Attempts before a contended record is reported.
const MAX_ATTEMPTS: usize = 16;

/// What a [`Records::transact`] plan decided.
pub(crate) enum Step<R> {
    /// Commit the batch, then return the value.
    Commit(WriteBatch, R),
    /// Return the value without writing.
    Stop(R),
}

/// Store handle whose updates run one at a time.
///
/// Solutions, seller profiles, escrow entries and bounties are touched by
/// purchases, votes, bounty payouts and uploads. Each update reads the
/// freshest row, applies the change and commits it on the condition that
/// the row is still what was read. The in-process lock keeps threads from
/// racing; the condition catches writers in other processes. The lock is
/// never held across a rail call.
pub(crate) struct Records {
    store: Arc<dyn RecordStore>,
    lock: Mutex<()>,
}

impl Records {
    pub(crate) fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            lock: Mutex::new(()),
        }
    }

    pub(crate) fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    /// Reads the `T` under `key`, lets `plan` decide what to write, and
    /// commits only if that record is unchanged since the read.
    ///
    /// `plan` runs again with the fresh record whenever the commit loses a
    /// race, so it must not have side effects beyond building the batch.
    pub(crate) fn transact<T, R, E>(
        &self,
        key: &str,
        mut plan: impl FnMut(Option<T>) -> Result<Step<R>, E>,
    ) -> Result<R, E>
    where
        T: Record,
        E: From<StoreError>,
    {
        let _guard = self.lock.lock();
        for _ in 0..MAX_ATTEMPTS {
            let current = self.store.fetch(T::COLLECTION, key)?;
            let record = current.clone().map(decode::<T>).transpose()?;
            match plan(record)? {
                Step::Stop(value) => return Ok(value),
                Step::Commit(batch, value) => {
                    if self.store.commit(batch.expect_row(T::COLLECTION, key, current))? {
                        return Ok(value);
                    }
                    debug!(collection = T::COLLECTION, key, "record changed before commit, retrying");
                }
            }
        }
        Err(StoreError::Contended {
            collection: T::COLLECTION.to_string(),
            key: key.to_string(),
        }
        .into())
    }

    /// Applies `change` to the record under `key`. Returns `None` if absent.
    pub(crate) fn update<T: Record>(
        &self,
        key: &str,
        mut change: impl FnMut(&mut T),
    ) -> Result<Option<T>, StoreError> {
        self.transact(key, |current: Option<T>| {
            let Some(mut record) = current else {
                return Ok(Step::Stop(None));
            };
            change(&mut record);
            Ok(Step::Commit(WriteBatch::new().put(&record)?, Some(record)))
        })
    }

    /// Applies `change` to a seller, registering the wallet first if needed.
    pub(crate) fn upsert_seller(
        &self,
        wallet: &str,
        now: DateTime<Utc>,
        mut change: impl FnMut(&mut SellerProfile),
    ) -> Result<SellerProfile, StoreError> {
        self.transact(wallet, |current: Option<SellerProfile>| {
            let mut profile = current.unwrap_or_else(|| SellerProfile::new(wallet, now));
            change(&mut profile);
            Ok(Step::Commit(WriteBatch::new().put(&profile)?, profile))
        })
    }

    /// Inserts `record` unless its key is taken; returns the existing one.
    pub(crate) fn insert_new<T: Record>(&self, record: &T) -> Result<Option<T>, StoreError> {
        self.transact(record.key(), |current: Option<T>| match current {
            Some(existing) => Ok(Step::Stop(Some(existing))),
            None => Ok(Step::Commit(WriteBatch::new().put(record)?, None)),
        })
    }
}
