//! Bulk copy of a DynamoDB table into another table.
//!
//! The engine reads the whole source table page by page, splits the items
//! into batch write calls of at most 25 items, and keeps retrying whatever
//! the destination reports as unprocessed, with exponential backoff
//! between rounds.
//!
//! The stores are reached through the [`SourceStore`] and
//! [`DestinationStore`] traits; [`DynamoStore`] implements both.

pub mod backoff;
pub mod cli;
pub mod client;
pub mod config;
pub mod dynamodb;
pub mod errors;
pub mod logging;
pub mod progress;
pub mod reader;
pub mod retry;
pub mod store;
pub mod transfer;
pub mod writer;

pub use backoff::Backoff;
pub use config::{BackoffConfig, StoreConfig, TransferConfig};
pub use dynamodb::DynamoStore;
pub use errors::{StoreError, StoreErrorKind, TransferError};
pub use progress::{ProgressEvent, ProgressObserver, TracingProgress};
pub use retry::{CoordinatorState, RetryCoordinator, RetryOutcome};
pub use store::{Batch, Cursor, DestinationStore, Page, Record, SourceStore, UnprocessedSet};
pub use transfer::{Transfer, TransferOptions, TransferSummary};
