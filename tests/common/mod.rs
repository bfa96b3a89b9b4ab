//! In-memory stores for exercising the transfer engine.

#![allow(dead_code)]

use aws_sdk_dynamodb::types::AttributeValue;
use dynamo_transfer::{
    Batch, Cursor, DestinationStore, Page, ProgressEvent, ProgressObserver, Record, SourceStore,
    StoreError, StoreErrorKind, UnprocessedSet,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub fn pk_of(index: usize) -> String {
    format!("item-{index:04}")
}

pub fn record(index: usize) -> Record {
    HashMap::from([
        ("pk".to_string(), AttributeValue::S(pk_of(index))),
        ("n".to_string(), AttributeValue::N(index.to_string())),
    ])
}

fn pk(record: &Record) -> String {
    record
        .get("pk")
        .and_then(|v| v.as_s().ok())
        .cloned()
        .unwrap_or_default()
}

/// Serves fixed pages; each page's cursor is the key of its last record.
#[derive(Default)]
pub struct FakeSource {
    pages: Vec<Page>,
    pub fail_on_scan: Option<usize>,
    pub scans: AtomicUsize,
    pub cursors: Mutex<Vec<Option<Cursor>>>,
}

impl FakeSource {
    pub fn with_page_sizes(sizes: &[usize]) -> Self {
        let mut next = 0;
        let mut pages = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let records: Vec<Record> = (next..next + size).map(record).collect();
            next += size;
            let cursor = (i + 1 < sizes.len())
                .then(|| HashMap::from([("pk".to_string(), AttributeValue::S(pk_of(next - 1)))]));
            pages.push(Page::new(records, cursor));
        }
        Self {
            pages,
            ..Self::default()
        }
    }
}

impl SourceStore for FakeSource {
    async fn scan(&self, _table: &str, cursor: Option<Cursor>) -> Result<Page, StoreError> {
        let index = self.scans.fetch_add(1, Ordering::SeqCst);
        self.cursors.lock().unwrap().push(cursor);
        if self.fail_on_scan == Some(index) {
            return Err(StoreError::new(
                StoreErrorKind::AccessDenied,
                "not authorized to perform dynamodb:Scan",
            ));
        }
        Ok(self.pages.get(index).cloned().unwrap_or_default())
    }
}

/// Accepts records unless told to reject or fail them.
#[derive(Default)]
pub struct FakeDestination {
    /// pk -> number of calls that report the record unprocessed.
    rejections: Mutex<HashMap<String, u32>>,
    /// Any batch containing this pk fails as a whole.
    fail_on: Option<String>,
    latency: Option<Duration>,
    pub written: Mutex<Vec<Record>>,
    pub calls: AtomicUsize,
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
}

impl FakeDestination {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(self, index: usize, times: u32) -> Self {
        self.rejections.lock().unwrap().insert(pk_of(index), times);
        self
    }

    pub fn fail_on(mut self, index: usize) -> Self {
        self.fail_on = Some(pk_of(index));
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn written_pks(&self) -> Vec<String> {
        let mut pks: Vec<_> = self.written.lock().unwrap().iter().map(pk).collect();
        pks.sort();
        pks
    }
}

impl DestinationStore for FakeDestination {
    async fn batch_write(&self, batch: &Batch) -> Result<UnprocessedSet, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(failing) = &self.fail_on {
            if batch.records.iter().any(|r| &pk(r) == failing) {
                return Err(StoreError::new(
                    StoreErrorKind::Connection,
                    "connection reset by peer",
                ));
            }
        }

        let mut unprocessed = Vec::new();
        let mut rejections = self.rejections.lock().unwrap();
        let mut written = self.written.lock().unwrap();
        for record in &batch.records {
            match rejections.get_mut(&pk(record)) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    unprocessed.push(record.clone());
                }
                _ => written.push(record.clone()),
            }
        }

        let mut set = UnprocessedSet::new();
        set.insert(batch.table.clone(), unprocessed);
        Ok(set)
    }
}

/// Keeps every event for later assertions.
#[derive(Default)]
pub struct RecordingProgress {
    events: Mutex<Vec<ProgressEvent>>,
}

impl RecordingProgress {
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl ProgressObserver for RecordingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
