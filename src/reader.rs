//! Paginated scan of the source table.

use crate::errors::{Result, TransferError};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::store::{Record, SourceStore};

/// Everything read from the source, page by page in read order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOutput {
    pub pages: Vec<Vec<Record>>,
}

impl ReadOutput {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn record_count(&self) -> usize {
        self.pages.iter().map(Vec::len).sum()
    }

    /// Flatten into a single list, keeping read order.
    pub fn into_records(self) -> Vec<Record> {
        self.pages.into_iter().flatten().collect()
    }
}

/// Scan `table` until a page comes back without a cursor.
///
/// Pages are fetched one at a time since each request needs the previous
/// cursor. A failed page aborts the whole read.
pub async fn fetch_all<S>(
    source: &S,
    table: &str,
    observer: &dyn ProgressObserver,
) -> Result<ReadOutput>
where
    S: SourceStore,
{
    observer.on_event(&ProgressEvent::ScanStarted {
        table: table.to_string(),
    });

    let mut output = ReadOutput::default();
    let mut cursor = None;
    let mut iteration = 0u32;
    let mut fetched = 0usize;

    loop {
        iteration += 1;
        tracing::debug!(table, iteration, "Scanning page");

        let page = source
            .scan(table, cursor.take())
            .await
            .map_err(|source| TransferError::Read {
                table: table.to_string(),
                source,
            })?;

        fetched += page.records.len();
        observer.on_event(&ProgressEvent::PageFetched {
            iteration,
            page_records: page.records.len(),
            records_fetched: fetched,
        });

        output.pages.push(page.records);
        match page.cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    observer.on_event(&ProgressEvent::ScanCompleted {
        pages: iteration,
        records: fetched,
    });

    Ok(output)
}
