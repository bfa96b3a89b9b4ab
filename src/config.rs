//! Transfer configuration.
//!
//! A [`TransferConfig`] can be loaded from a JSON file and is then
//! overridden by command-line flags (see `cli`).

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::time::Duration;

use crate::backoff::{self, Backoff, DEFAULT_BASE_DELAY};
use crate::errors::{Result, TransferError};
use crate::retry::DEFAULT_MAX_CONCURRENCY;
use crate::transfer::TransferOptions;
use crate::writer::BATCH_WRITE_MAX_ITEMS;

/// Connection settings for one side of the transfer.
///
/// Credentials priority:
/// 1. Static credentials (access_key, secret_key, session_token)
/// 2. AWS profile from ~/.aws/credentials
/// 3. Default credential chain (environment, instance profile, etc.)
///
/// When `role_arn` is set, the resolved credentials are used to assume that
/// role, which is how a transfer reaches a table in another account.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    pub region: Option<String>,
    #[serde(skip_serializing)]
    pub access_key: Option<String>,
    #[serde(skip_serializing)]
    pub secret_key: Option<String>,
    #[serde(skip_serializing)]
    pub session_token: Option<String>,
    pub profile: Option<String>,
    pub role_arn: Option<String>,
    pub role_session_name: Option<String>,
    pub external_id: Option<String>,
    /// Custom endpoint for local testing (DynamoDB Local, localstack).
    pub endpoint_url: Option<String>,
    /// Custom STS endpoint for the identity check. `endpoint_url` only
    /// applies to DynamoDB.
    pub sts_endpoint_url: Option<String>,
}

impl fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "<redacted>");
        f.debug_struct("StoreConfig")
            .field("region", &self.region)
            .field("access_key", &redact(&self.access_key))
            .field("secret_key", &redact(&self.secret_key))
            .field("session_token", &redact(&self.session_token))
            .field("profile", &self.profile)
            .field("role_arn", &self.role_arn)
            .field("role_session_name", &self.role_session_name)
            .field("external_id", &self.external_id)
            .field("endpoint_url", &self.endpoint_url)
            .field("sts_endpoint_url", &self.sts_endpoint_url)
            .finish()
    }
}

impl StoreConfig {
    fn validate(&self, side: &str) -> Result<()> {
        match (&self.access_key, &self.secret_key) {
            (Some(_), None) | (None, Some(_)) => Err(TransferError::Config(format!(
                "{side}: access key and secret key must be given together"
            ))),
            _ if self.session_token.is_some() && self.access_key.is_none() => {
                Err(TransferError::Config(format!(
                    "{side}: session token requires an access key and secret key"
                )))
            }
            _ if self.external_id.is_some() && self.role_arn.is_none() => {
                Err(TransferError::Config(format!(
                    "{side}: external id requires a role ARN"
                )))
            }
            _ => Ok(()),
        }
    }
}

/// Retry schedule settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BackoffConfig {
    pub base_delay_ms: u64,
    pub max_delay_ms: Option<u64>,
    pub max_rounds: Option<u32>,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base_delay_ms: backoff::millis(DEFAULT_BASE_DELAY),
            max_delay_ms: None,
            max_rounds: None,
        }
    }
}

impl BackoffConfig {
    pub fn backoff(&self) -> Backoff {
        Backoff::new(Duration::from_millis(self.base_delay_ms))
            .with_max_delay(self.max_delay_ms.map(Duration::from_millis))
    }
}

/// Everything needed to run one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    pub source: StoreConfig,
    pub destination: StoreConfig,
    pub source_table: String,
    pub destination_table: String,
    pub batch_size: usize,
    pub max_concurrency: usize,
    pub backoff: BackoffConfig,
    /// Scan `Limit` per page; the store default applies when unset.
    pub page_size: Option<i32>,
    pub consistent_read: bool,
    pub dry_run: bool,
    /// Call STS `GetCallerIdentity` for both sides before transferring.
    pub verify_identity: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            source: StoreConfig::default(),
            destination: StoreConfig::default(),
            source_table: String::new(),
            destination_table: String::new(),
            batch_size: BATCH_WRITE_MAX_ITEMS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            backoff: BackoffConfig::default(),
            page_size: None,
            consistent_read: false,
            dry_run: false,
            verify_identity: false,
        }
    }
}

impl TransferConfig {
    /// Load a configuration file in JSON format.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            TransferError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            TransferError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn validate(&self) -> Result<()> {
        self.source.validate("source")?;
        self.destination.validate("destination")?;
        if self.page_size.is_some_and(|size| size < 1) {
            return Err(TransferError::Config("page size must be at least 1".into()));
        }
        self.options().validate()
    }

    /// Engine options derived from this configuration.
    pub fn options(&self) -> TransferOptions {
        TransferOptions {
            source_table: self.source_table.clone(),
            destination_table: self.destination_table.clone(),
            batch_size: self.batch_size,
            max_concurrency: self.max_concurrency,
            backoff: self.backoff.backoff(),
            max_rounds: self.backoff.max_rounds,
            dry_run: self.dry_run,
        }
    }
}
