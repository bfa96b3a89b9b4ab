//! Progress events emitted while a transfer runs.

use serde::Serialize;

/// One observable step of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    ScanStarted {
        table: String,
    },
    /// `iteration` is the 1-based scan call count.
    PageFetched {
        iteration: u32,
        page_records: usize,
        records_fetched: usize,
    },
    ScanCompleted {
        pages: u32,
        records: usize,
    },
    RoundStarted {
        round: u32,
        batches: usize,
        records: usize,
    },
    /// Emitted once every call of the round has settled.
    BatchesSent {
        round: u32,
        batch_calls: usize,
    },
    RoundCompleted {
        round: u32,
        unprocessed: usize,
    },
    BackoffScheduled {
        round: u32,
        delay_ms: u64,
    },
    TransferCompleted {
        records: usize,
        rounds: u32,
        batch_calls: usize,
    },
}

/// Receives progress events. Called from the task driving the transfer.
pub trait ProgressObserver: Send + Sync {
    fn on_event(&self, event: &ProgressEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressObserver for TracingProgress {
    fn on_event(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::ScanStarted { table } => {
                tracing::info!(table = %table, "Fetching all items from source table");
            }
            ProgressEvent::PageFetched {
                iteration,
                page_records,
                records_fetched,
            } => {
                tracing::info!(
                    iteration,
                    page_records,
                    records_fetched,
                    "Scan page fetched"
                );
            }
            ProgressEvent::ScanCompleted { pages, records } => {
                tracing::info!(pages, records, "Fetched all items from source table");
            }
            ProgressEvent::RoundStarted {
                round,
                batches,
                records,
            } => {
                tracing::info!(round, batches, records, "Sending batch write round");
            }
            ProgressEvent::BatchesSent { round, batch_calls } => {
                tracing::info!(round, batch_calls, "Batch calls settled");
            }
            ProgressEvent::RoundCompleted { round, unprocessed } => {
                if *unprocessed == 0 {
                    tracing::info!(round, unprocessed, "Round completed");
                } else {
                    tracing::warn!(round, unprocessed, "Round left unprocessed items");
                }
            }
            ProgressEvent::BackoffScheduled { round, delay_ms } => {
                tracing::info!(round, delay_ms, "Waiting before retrying unprocessed items");
            }
            ProgressEvent::TransferCompleted {
                records,
                rounds,
                batch_calls,
            } => {
                tracing::info!(records, rounds, batch_calls, "All items written successfully");
            }
        }
    }
}
