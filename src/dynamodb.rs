//! DynamoDB implementation of the store contracts.

use aws_sdk_dynamodb::Client;
use aws_sdk_dynamodb::types::{PutRequest, WriteRequest};
use std::collections::HashMap;

use crate::errors::{StoreError, StoreErrorKind, map_sdk_error};
use crate::store::{Batch, Cursor, DestinationStore, Page, SourceStore, UnprocessedSet};

/// A DynamoDB table endpoint usable as either side of a transfer.
#[derive(Debug, Clone)]
pub struct DynamoStore {
    client: Client,
    page_size: Option<i32>,
    consistent_read: bool,
}

impl DynamoStore {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            page_size: None,
            consistent_read: false,
        }
    }

    /// Scan `Limit`: the maximum number of items evaluated per page.
    pub fn with_page_size(mut self, page_size: Option<i32>) -> Self {
        self.page_size = page_size;
        self
    }

    /// Use strongly consistent reads when scanning.
    pub fn with_consistent_read(mut self, consistent_read: bool) -> Self {
        self.consistent_read = consistent_read;
        self
    }
}

impl SourceStore for DynamoStore {
    async fn scan(&self, table: &str, cursor: Option<Cursor>) -> Result<Page, StoreError> {
        let output = self
            .client
            .scan()
            .table_name(table)
            .set_exclusive_start_key(cursor)
            .set_limit(self.page_size)
            .consistent_read(self.consistent_read)
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(table)))?;

        // An empty LastEvaluatedKey means the same as none at all.
        let cursor = output.last_evaluated_key.filter(|key| !key.is_empty());
        Ok(Page::new(output.items.unwrap_or_default(), cursor))
    }
}

impl DestinationStore for DynamoStore {
    async fn batch_write(&self, batch: &Batch) -> Result<UnprocessedSet, StoreError> {
        let requests = build_put_requests(batch)?;

        let mut request_items = HashMap::new();
        request_items.insert(batch.table.clone(), requests);

        let output = self
            .client
            .batch_write_item()
            .set_request_items(Some(request_items))
            .send()
            .await
            .map_err(|e| map_sdk_error(e, Some(&batch.table)))?;

        Ok(unprocessed_from_requests(output.unprocessed_items))
    }
}

/// Wrap every record of the batch in a `PutRequest`.
fn build_put_requests(batch: &Batch) -> Result<Vec<WriteRequest>, StoreError> {
    batch
        .records
        .iter()
        .map(|record| {
            let put_request = PutRequest::builder()
                .set_item(Some(record.clone()))
                .build()
                .map_err(|e| {
                    StoreError::new(
                        StoreErrorKind::Validation,
                        format!("Failed to build put request: {}", e),
                    )
                })?;
            Ok(WriteRequest::builder().put_request(put_request).build())
        })
        .collect()
}

/// Recover the records of unprocessed put requests.
///
/// Only puts are ever sent, so delete requests cannot appear here.
fn unprocessed_from_requests(
    unprocessed: Option<HashMap<String, Vec<WriteRequest>>>,
) -> UnprocessedSet {
    let mut set = UnprocessedSet::new();
    for (table, requests) in unprocessed.unwrap_or_default() {
        let records = requests
            .into_iter()
            .filter_map(|request| request.put_request)
            .map(|put| put.item)
            .collect();
        set.insert(table, records);
    }
    set
}
