//! Batch writes against the destination table.

use crate::errors::{Result, TransferError};
use crate::store::{Batch, DestinationStore, Record, UnprocessedSet};

/// Maximum items per batch write request (DynamoDB limit).
pub const BATCH_WRITE_MAX_ITEMS: usize = 25;

/// Split `records` into batches of at most `batch_size` items, in order.
///
/// `batch_size` is clamped to `1..=BATCH_WRITE_MAX_ITEMS`.
pub fn chunk_into_batches(table: &str, records: Vec<Record>, batch_size: usize) -> Vec<Batch> {
    let batch_size = batch_size.clamp(1, BATCH_WRITE_MAX_ITEMS);
    let mut batches = Vec::with_capacity(records.len().div_ceil(batch_size));
    let mut records = records.into_iter().peekable();

    while records.peek().is_some() {
        let chunk: Vec<Record> = records.by_ref().take(batch_size).collect();
        batches.push(Batch::new(table, chunk));
    }

    batches
}

/// Submit one batch as a single write call.
///
/// Returns the records the store reported as unprocessed (possibly none).
/// A failed call is fatal for the transfer and is not retried here.
pub async fn write_batch<D>(destination: &D, batch: Batch) -> Result<UnprocessedSet>
where
    D: DestinationStore,
{
    debug_assert!(batch.len() <= BATCH_WRITE_MAX_ITEMS);

    match destination.batch_write(&batch).await {
        Ok(unprocessed) => {
            tracing::debug!(
                table = %batch.table,
                sent = batch.len(),
                unprocessed = unprocessed.len(),
                "Batch write returned"
            );
            Ok(unprocessed)
        }
        Err(source) => {
            tracing::error!(table = %batch.table, error = %source, "An error occurred in batch write call");
            Err(TransferError::Write {
                table: batch.table,
                source,
            })
        }
    }
}
