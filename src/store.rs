//! Store contracts and the data that flows through a transfer.
//!
//! Records are never interpreted: whatever attribute map the source
//! returns is written to the destination unchanged.

use aws_sdk_dynamodb::types::AttributeValue;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use crate::errors::StoreError;

/// One stored item.
pub type Record = HashMap<String, AttributeValue>;

/// Continuation key returned by a scan (`LastEvaluatedKey`).
pub type Cursor = HashMap<String, AttributeValue>;

/// One unit of paginated scan output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub records: Vec<Record>,
    /// `Some` while the source has more data.
    pub cursor: Option<Cursor>,
}

impl Page {
    pub fn new(records: Vec<Record>, cursor: Option<Cursor>) -> Self {
        Self { records, cursor }
    }
}

/// A bounded group of records written in one call.
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    pub table: String,
    pub records: Vec<Record>,
}

impl Batch {
    pub fn new(table: impl Into<String>, records: Vec<Record>) -> Self {
        Self {
            table: table.into(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Records a write call did not persist, keyed by destination table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnprocessedSet {
    by_table: HashMap<String, Vec<Record>>,
}

impl UnprocessedSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records for `table`. Empty inputs leave the set unchanged.
    pub fn insert(&mut self, table: impl Into<String>, records: Vec<Record>) {
        if records.is_empty() {
            return;
        }
        self.by_table.entry(table.into()).or_default().extend(records);
    }

    pub fn merge(&mut self, other: UnprocessedSet) {
        for (table, records) in other.by_table {
            self.insert(table, records);
        }
    }

    pub fn get(&self, table: &str) -> Option<&[Record]> {
        self.by_table.get(table).map(Vec::as_slice)
    }

    /// Total number of records across all tables.
    pub fn len(&self) -> usize {
        self.by_table.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Turn the set into write batches of at most `max_items` records.
    pub fn into_batches(self, max_items: usize) -> Vec<Batch> {
        let max_items = max_items.max(1);
        let mut tables: Vec<_> = self.by_table.into_iter().collect();
        tables.sort_by(|a, b| a.0.cmp(&b.0));

        let mut batches = Vec::new();
        for (table, records) in tables {
            batches.extend(crate::writer::chunk_into_batches(&table, records, max_items));
        }
        batches
    }
}

/// Read side of a transfer.
pub trait SourceStore: Send + Sync {
    /// Fetch one page of `table`, starting after `cursor` when given.
    fn scan(
        &self,
        table: &str,
        cursor: Option<Cursor>,
    ) -> impl Future<Output = Result<Page, StoreError>> + Send;
}

/// Write side of a transfer.
pub trait DestinationStore: Send + Sync {
    /// Put every record of `batch` in a single call.
    ///
    /// Records the store did not accept come back in the returned set; an
    /// `Err` means the call failed as a whole.
    fn batch_write(
        &self,
        batch: &Batch,
    ) -> impl Future<Output = Result<UnprocessedSet, StoreError>> + Send;
}

impl<T: SourceStore> SourceStore for Arc<T> {
    fn scan(
        &self,
        table: &str,
        cursor: Option<Cursor>,
    ) -> impl Future<Output = Result<Page, StoreError>> + Send {
        (**self).scan(table, cursor)
    }
}

impl<T: DestinationStore> DestinationStore for Arc<T> {
    fn batch_write(
        &self,
        batch: &Batch,
    ) -> impl Future<Output = Result<UnprocessedSet, StoreError>> + Send {
        (**self).batch_write(batch)
    }
}
