//! Transfer orchestration: read everything, chunk, write, retry.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uuid::Uuid;

use crate::backoff::Backoff;
use crate::errors::{Result, TransferError};
use crate::progress::{ProgressEvent, ProgressObserver, TracingProgress};
use crate::reader::fetch_all;
use crate::retry::{DEFAULT_MAX_CONCURRENCY, RetryCoordinator};
use crate::store::{DestinationStore, SourceStore};
use crate::writer::{BATCH_WRITE_MAX_ITEMS, chunk_into_batches};

/// Engine knobs for one transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOptions {
    pub source_table: String,
    pub destination_table: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub backoff: Backoff,
    /// `None` retries until every record is accepted.
    pub max_rounds: Option<u32>,
    /// Read and chunk only; no write calls are made.
    pub dry_run: bool,
}

impl TransferOptions {
    pub fn new(source_table: impl Into<String>, destination_table: impl Into<String>) -> Self {
        Self {
            source_table: source_table.into(),
            destination_table: destination_table.into(),
            batch_size: BATCH_WRITE_MAX_ITEMS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            backoff: Backoff::default(),
            max_rounds: None,
            dry_run: false,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source_table.trim().is_empty() {
            return Err(TransferError::Config("source table name is empty".into()));
        }
        if self.destination_table.trim().is_empty() {
            return Err(TransferError::Config(
                "destination table name is empty".into(),
            ));
        }
        if self.batch_size == 0 || self.batch_size > BATCH_WRITE_MAX_ITEMS {
            return Err(TransferError::Config(format!(
                "batch size must be between 1 and {} (got {})",
                BATCH_WRITE_MAX_ITEMS, self.batch_size
            )));
        }
        if self.max_concurrency == 0 {
            return Err(TransferError::Config(
                "max concurrency must be at least 1".into(),
            ));
        }
        if self.max_rounds == Some(0) {
            return Err(TransferError::Config(
                "max rounds must be at least 1 when set".into(),
            ));
        }
        Ok(())
    }
}

/// Final report of a completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferSummary {
    pub transfer_id: Uuid,
    pub source_table: String,
    pub destination_table: String,
    pub records_read: usize,
    pub pages_read: usize,
    pub batches: usize,
    pub batch_calls: usize,
    pub rounds: u32,
    pub unprocessed_per_round: Vec<usize>,
    #[serde(with = "duration_ms")]
    pub last_delay: Option<Duration>,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl TransferSummary {
    /// Write the summary as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let summary_err = |source| TransferError::Summary {
            path: path.to_path_buf(),
            source,
        };
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| summary_err(std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(summary_err)
    }
}

mod duration_ms {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&crate::backoff::millis(*d)),
            None => s.serialize_none(),
        }
    }
}

/// One full-table copy from `source` into `destination`.
pub struct Transfer<S, D> {
    source: S,
    destination: Arc<D>,
    options: TransferOptions,
    observer: Arc<dyn ProgressObserver>,
}

impl<S, D> Transfer<S, D>
where
    S: SourceStore,
    D: DestinationStore + 'static,
{
    pub fn new(source: S, destination: D, options: TransferOptions) -> Self {
        Self::with_shared_destination(source, Arc::new(destination), options)
    }

    pub fn with_shared_destination(source: S, destination: Arc<D>, options: TransferOptions) -> Self {
        Self {
            source,
            destination,
            options,
            observer: Arc::new(TracingProgress),
        }
    }

    /// Replace the default `tracing` observer.
    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn options(&self) -> &TransferOptions {
        &self.options
    }

    /// Run the transfer to completion.
    ///
    /// Fails fast on a read error or a failed write call. Records written
    /// before a failure stay in the destination.
    pub async fn run(self) -> Result<TransferSummary> {
        self.options.validate()?;

        let transfer_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "transfer",
            %transfer_id,
            source = %self.options.source_table,
            destination = %self.options.destination_table,
        );

        self.execute(transfer_id).instrument(span).await
    }

    async fn execute(self, transfer_id: Uuid) -> Result<TransferSummary> {
        let started_at = Utc::now();
        let options = &self.options;

        let read = fetch_all(&self.source, &options.source_table, self.observer.as_ref()).await?;
        let pages_read = read.page_count();
        let records_read = read.record_count();

        let batches = chunk_into_batches(
            &options.destination_table,
            read.into_records(),
            options.batch_size,
        );
        let batch_count = batches.len();

        let mut summary = TransferSummary {
            transfer_id,
            source_table: options.source_table.clone(),
            destination_table: options.destination_table.clone(),
            records_read,
            pages_read,
            batches: batch_count,
            batch_calls: 0,
            rounds: 0,
            unprocessed_per_round: Vec::new(),
            last_delay: None,
            dry_run: options.dry_run,
            started_at,
            finished_at: started_at,
        };

        if options.dry_run {
            tracing::info!(
                records = records_read,
                batches = batch_count,
                "Dry run: skipping batch writes"
            );
            summary.finished_at = Utc::now();
            return Ok(summary);
        }

        tracing::info!(
            table = %options.destination_table,
            batches = batch_count,
            "Sending batch requests to destination table"
        );

        let mut coordinator = RetryCoordinator::new(Arc::clone(&self.destination), Arc::clone(&self.observer))
            .with_backoff(options.backoff)
            .with_max_concurrency(options.max_concurrency)
            .with_batch_size(options.batch_size)
            .with_max_rounds(options.max_rounds);

        let outcome = coordinator.run(batches).await?;

        summary.batch_calls = outcome.batch_calls;
        summary.rounds = outcome.rounds;
        summary.unprocessed_per_round = outcome.unprocessed_per_round;
        summary.last_delay = outcome.last_delay;
        summary.finished_at = Utc::now();

        self.observer.on_event(&ProgressEvent::TransferCompleted {
            records: records_read,
            rounds: summary.rounds,
            batch_calls: summary.batch_calls,
        });

        Ok(summary)
    }
}
