//! Where extracted records end up
use chrono::NaiveDate;
use itertools::Itertools;
use std::{
    collections::HashMap,
    future::Future,
    sync::Mutex,
};

use crate::model::{Metadata, OutputRecord};

#[derive(thiserror::Error, Debug)]
pub enum SinkError {
    #[error("database error")]
    Database(#[from] sqlx::Error),

    #[error("the record store is poisoned")]
    Poisoned,
}

/// Persists named collections of route records and answers lookups on them.
///
/// Deleting and inserting aren't retried. Whether both happen atomically is up to the
/// implementation.
pub trait RecordSink {
    /// Deletes every record of `collection`, then inserts `records`.
    /// Returns the number of inserted records.
    fn replace_all(
        &self,
        collection: &str,
        records: &[OutputRecord],
    ) -> impl Future<Output = Result<u64, SinkError>> + Send;

    /// Deletes the records of `collection` whose metadata contains every field of `filter`,
    /// then inserts `records`. Returns the number of inserted records.
    fn replace_matching(
        &self,
        collection: &str,
        filter: &Metadata,
        records: &[OutputRecord],
    ) -> impl Future<Output = Result<u64, SinkError>> + Send;

    /// Deletes the records of `collection` whose `endDate` is before `today`.
    /// Returns the number of deleted records.
    fn delete_expired(
        &self,
        collection: &str,
        today: NaiveDate,
    ) -> impl Future<Output = Result<u64, SinkError>> + Send;

    /// Every distinct stop of the records matching `filter`, sorted.
    fn stops(
        &self,
        collection: &str,
        filter: &Metadata,
    ) -> impl Future<Output = Result<Vec<String>, SinkError>> + Send;

    /// Records matching `filter` with a stop that contains `stop`, ignoring case.
    /// They come back in the order they were stored.
    fn buses(
        &self,
        collection: &str,
        stop: &str,
        filter: &Metadata,
    ) -> impl Future<Output = Result<Vec<OutputRecord>, SinkError>> + Send;
}

/// Keeps collections in memory. Backs dry runs.
#[derive(Debug, Default)]
pub struct MemoryRecordSink {
    collections: Mutex<HashMap<String, Vec<OutputRecord>>>,
}

impl MemoryRecordSink {
    pub fn collection(&self, collection: &str) -> Result<Vec<OutputRecord>, SinkError> {
        let collections = self.collections.lock().map_err(|_| SinkError::Poisoned)?;

        Ok(collections.get(collection).cloned().unwrap_or_default())
    }

    fn update<T>(
        &self,
        collection: &str,
        f: impl FnOnce(&mut Vec<OutputRecord>) -> T,
    ) -> Result<T, SinkError> {
        let mut collections = self.collections.lock().map_err(|_| SinkError::Poisoned)?;

        Ok(f(collections.entry(collection.to_string()).or_default()))
    }
}

impl RecordSink for MemoryRecordSink {
    async fn replace_all(
        &self,
        collection: &str,
        records: &[OutputRecord],
    ) -> Result<u64, SinkError> {
        self.update(collection, |stored| {
            stored.clear();
            stored.extend_from_slice(records);
            records.len() as u64
        })
    }

    async fn replace_matching(
        &self,
        collection: &str,
        filter: &Metadata,
        records: &[OutputRecord],
    ) -> Result<u64, SinkError> {
        self.update(collection, |stored| {
            stored.retain(|record| !record.metadata.contains(filter));
            stored.extend_from_slice(records);
            records.len() as u64
        })
    }

    async fn delete_expired(&self, collection: &str, today: NaiveDate) -> Result<u64, SinkError> {
        self.update(collection, |stored| {
            let before = stored.len();
            stored.retain(|record| !record.metadata.ended_before(today));
            (before - stored.len()) as u64
        })
    }

    async fn stops(&self, collection: &str, filter: &Metadata) -> Result<Vec<String>, SinkError> {
        Ok(self
            .collection(collection)?
            .into_iter()
            .filter(|record| record.metadata.contains(filter))
            .flat_map(|record| record.stops)
            .sorted()
            .dedup()
            .collect())
    }

    async fn buses(
        &self,
        collection: &str,
        stop: &str,
        filter: &Metadata,
    ) -> Result<Vec<OutputRecord>, SinkError> {
        Ok(self
            .collection(collection)?
            .into_iter()
            .filter(|record| record.metadata.contains(filter) && record.serves(stop))
            .collect())
    }
}
