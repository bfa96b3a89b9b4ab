//! Error types for dynamo-transfer.
//!
//! Store failures are classified into a small [`StoreErrorKind`] taxonomy.
//! Classification matches on typed `SdkError` variants and service error
//! codes, never on debug output.

use aws_sdk_dynamodb::error::{ProvideErrorMetadata, SdkError};
use std::fmt;
use std::path::PathBuf;

use crate::store::UnprocessedSet;

/// Result alias used across the transfer engine.
pub type Result<T, E = TransferError> = std::result::Result<T, E>;

/// Broad category of a store failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreErrorKind {
    NotFound,
    Validation,
    Throttled,
    AccessDenied,
    Credentials,
    Connection,
    Other,
}

impl fmt::Display for StoreErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StoreErrorKind::NotFound => "resource not found",
            StoreErrorKind::Validation => "validation error",
            StoreErrorKind::Throttled => "throttled",
            StoreErrorKind::AccessDenied => "access denied",
            StoreErrorKind::Credentials => "credentials error",
            StoreErrorKind::Connection => "connection error",
            StoreErrorKind::Other => "store error",
        };
        f.write_str(name)
    }
}

/// A failed call against the source or destination store.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct StoreError {
    pub kind: StoreErrorKind,
    pub message: String,
}

impl StoreError {
    pub fn new(kind: StoreErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Everything that can abort a transfer.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// A page fetch failed. Later pages are unreachable without its cursor.
    #[error("failed to read from table '{table}': {source}")]
    Read { table: String, source: StoreError },

    /// A batch write call failed as a whole. Not retried.
    #[error("batch write to table '{table}' failed: {source}")]
    Write { table: String, source: StoreError },

    /// The configured round ceiling was reached with records still pending.
    /// Carries the records the destination never accepted.
    #[error("{} records still unprocessed after {rounds} write rounds", .unprocessed.len())]
    RetriesExhausted {
        rounds: u32,
        unprocessed: UnprocessedSet,
    },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("client setup failed: {0}")]
    Client(String),

    /// A write task panicked or was cancelled.
    #[error("write task failed: {0}")]
    Task(String),

    #[error("failed to write summary to {}: {source}", .path.display())]
    Summary {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// AWS service type for error context.
#[derive(Debug, Clone, Copy)]
pub enum AwsService {
    DynamoDB,
    Sts,
}

impl AwsService {
    fn name(&self) -> &'static str {
        match self {
            AwsService::DynamoDB => "DynamoDB",
            AwsService::Sts => "STS",
        }
    }
}

// ========== TYPED ERROR MAPPING ==========

/// Map non-service `SdkError` variants (dispatch failures, timeouts, etc.).
///
/// Returns `None` for `ServiceError`, which needs the error code.
fn map_outer_sdk_error<E, R>(err: &SdkError<E, R>, service: AwsService) -> Option<StoreError>
where
    E: fmt::Debug,
    R: fmt::Debug,
{
    match err {
        SdkError::DispatchFailure(dispatch) => {
            let message = if dispatch.is_timeout() {
                format!(
                    "Connection timed out to {}. Check your network or endpoint.",
                    service.name()
                )
            } else if dispatch.is_io() {
                format!(
                    "Connection failed to {} (I/O error). Check if the endpoint is reachable.",
                    service.name()
                )
            } else {
                format!(
                    "Connection failed to {}. Check if the endpoint is reachable.",
                    service.name()
                )
            };
            Some(StoreError::new(StoreErrorKind::Connection, message))
        }
        SdkError::TimeoutError(_) => Some(StoreError::new(
            StoreErrorKind::Connection,
            format!(
                "Connection timed out to {}. Check your network or endpoint.",
                service.name()
            ),
        )),
        SdkError::ConstructionFailure(err) => {
            let msg = format!("{:?}", err);
            if msg.contains("credentials")
                || msg.contains("Credentials")
                || msg.contains("NoCredentialsError")
            {
                Some(StoreError::new(
                    StoreErrorKind::Credentials,
                    "No AWS credentials found. Configure credentials via flags, environment \
                    variables, an AWS profile, or an IAM role.",
                ))
            } else {
                Some(StoreError::new(
                    StoreErrorKind::Other,
                    format!("Failed to build request: {}", msg),
                ))
            }
        }
        SdkError::ResponseError(err) => Some(StoreError::new(
            StoreErrorKind::Other,
            format!("Invalid response from {}: {:?}", service.name(), err),
        )),
        SdkError::ServiceError(_) => None,
        _ => Some(StoreError::new(
            StoreErrorKind::Other,
            format!("Unknown error from {}: {:?}", service.name(), err),
        )),
    }
}

/// Map a DynamoDB service error code + message to a [`StoreError`].
pub(crate) fn map_dynamodb_code(
    code: Option<&str>,
    message: Option<&str>,
    display: &str,
    table: Option<&str>,
) -> StoreError {
    let detail = message.unwrap_or(display);

    match code {
        Some("UnrecognizedClientException") => StoreError::new(
            StoreErrorKind::Credentials,
            "Invalid AWS credentials. Check your access key and secret.",
        ),
        Some("ExpiredTokenException") | Some("ExpiredToken") => StoreError::new(
            StoreErrorKind::Credentials,
            "AWS credentials have expired. Refresh your session token.",
        ),
        Some("AccessDeniedException") | Some("AccessDenied") => StoreError::new(
            StoreErrorKind::AccessDenied,
            format!(
                "Access denied to DynamoDB: {}",
                message.unwrap_or("Check your IAM permissions.")
            ),
        ),
        Some("ProvisionedThroughputExceededException")
        | Some("LimitExceededException")
        | Some("RequestLimitExceeded")
        | Some("ThrottlingException") => StoreError::new(
            StoreErrorKind::Throttled,
            format!("DynamoDB request rate too high: {}", detail),
        ),
        Some("ResourceNotFoundException") => {
            let msg = match table {
                Some(t) => format!("Table '{}' not found", t),
                None => "Resource not found".to_string(),
            };
            StoreError::new(StoreErrorKind::NotFound, msg)
        }
        Some("ValidationException") => StoreError::new(StoreErrorKind::Validation, detail),
        Some("ItemCollectionSizeLimitExceededException") => StoreError::new(
            StoreErrorKind::Validation,
            "Item collection size limit exceeded",
        ),
        _ => StoreError::new(StoreErrorKind::Other, detail),
    }
}

/// Map a DynamoDB SDK error into a [`StoreError`].
///
/// For `ServiceError`, uses `ProvideErrorMetadata` to get the error code and
/// message instead of parsing debug strings.
pub fn map_sdk_error<E, R>(err: SdkError<E, R>, table: Option<&str>) -> StoreError
where
    E: ProvideErrorMetadata + fmt::Debug + fmt::Display,
    R: fmt::Debug,
{
    if let Some(store_err) = map_outer_sdk_error(&err, AwsService::DynamoDB) {
        return store_err;
    }

    if let Some(service_err) = err.as_service_error() {
        let meta = ProvideErrorMetadata::meta(service_err);
        let display = service_err.to_string();
        return map_dynamodb_code(meta.code(), meta.message(), &display, table);
    }

    StoreError::new(
        StoreErrorKind::Other,
        format!("Unexpected DynamoDB error: {:?}", err),
    )
}

/// Map STS SDK errors (identity checks) into a [`StoreError`].
pub fn map_sts_error<E, R>(err: SdkError<E, R>) -> StoreError
where
    E: aws_sdk_sts::error::ProvideErrorMetadata + fmt::Debug + fmt::Display,
    R: fmt::Debug,
{
    if let Some(store_err) = map_outer_sdk_error(&err, AwsService::Sts) {
        return store_err;
    }

    if let Some(service_err) = err.as_service_error() {
        let meta = aws_sdk_sts::error::ProvideErrorMetadata::meta(service_err);
        let kind = match meta.code() {
            Some("InvalidClientTokenId")
            | Some("SignatureDoesNotMatch")
            | Some("ExpiredToken")
            | Some("ExpiredTokenException") => StoreErrorKind::Credentials,
            Some("AccessDenied") => StoreErrorKind::AccessDenied,
            Some("Throttling") => StoreErrorKind::Throttled,
            _ => StoreErrorKind::Other,
        };
        let message = meta
            .message()
            .map(str::to_string)
            .unwrap_or_else(|| service_err.to_string());
        return StoreError::new(kind, format!("STS request failed: {}", message));
    }

    StoreError::new(
        StoreErrorKind::Other,
        format!("Unexpected STS error: {:?}", err),
    )
}
