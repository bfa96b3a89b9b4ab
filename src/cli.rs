//! Command-line interface.
//!
//! Flags override values from `--config`; every flag can also come from
//! the environment variable named in its help text.

use clap::{Args, Parser};
use std::path::PathBuf;

use crate::config::{StoreConfig, TransferConfig};
use crate::errors::Result;

#[derive(Debug, Parser)]
#[command(
    name = "dynamo-transfer",
    version,
    about = "Copy every item of a DynamoDB table into another table, across accounts or regions"
)]
pub struct Cli {
    /// JSON configuration file; flags take precedence over its values.
    #[arg(long, env = "TRANSFER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Table to read from.
    #[arg(long, env = "SOURCE_TABLE")]
    pub source_table: Option<String>,

    /// Table to write into.
    #[arg(long, env = "DEST_TABLE")]
    pub destination_table: Option<String>,

    #[command(flatten)]
    pub source: SourceArgs,

    #[command(flatten)]
    pub destination: DestinationArgs,

    /// Items per batch write call (1-25).
    #[arg(long, env = "BATCH_SIZE")]
    pub batch_size: Option<usize>,

    /// Batch write calls in flight at once.
    #[arg(long, env = "MAX_CONCURRENCY")]
    pub max_concurrency: Option<usize>,

    /// Delay before the first retry round, doubled every round.
    #[arg(long, env = "BASE_DELAY_MS")]
    pub base_delay_ms: Option<u64>,

    /// Upper bound for the retry delay. Unbounded when unset.
    #[arg(long, env = "MAX_DELAY_MS")]
    pub max_delay_ms: Option<u64>,

    /// Give up after this many write rounds. Unbounded when unset.
    #[arg(long, env = "MAX_ROUNDS")]
    pub max_rounds: Option<u32>,

    /// Scan page size (`Limit`).
    #[arg(long, env = "PAGE_SIZE")]
    pub page_size: Option<i32>,

    /// Use strongly consistent reads on the source.
    #[arg(long)]
    pub consistent_read: bool,

    /// Read and chunk the source without writing anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Resolve both callers through STS before transferring.
    #[arg(long)]
    pub verify_identity: bool,

    /// Print the effective configuration as JSON (secrets omitted) and exit.
    #[arg(long)]
    pub print_config: bool,

    /// Write the final transfer summary as JSON to this file.
    #[arg(long, env = "SUMMARY_JSON")]
    pub summary_json: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Connection flags for the source side.
#[derive(Debug, Clone, Default, Args)]
pub struct SourceArgs {
    #[arg(id = "source_region", long = "source-region", env = "SOURCE_REGION")]
    pub region: Option<String>,
    #[arg(id = "source_access_key", long = "source-access-key", env = "SOURCE_AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,
    #[arg(id = "source_secret_key", long = "source-secret-key", env = "SOURCE_AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    #[arg(id = "source_session_token", long = "source-session-token", env = "SOURCE_AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,
    #[arg(id = "source_profile", long = "source-profile", env = "SOURCE_PROFILE")]
    pub profile: Option<String>,
    #[arg(id = "source_role_arn", long = "source-role-arn", env = "SOURCE_ROLE_ARN")]
    pub role_arn: Option<String>,
    #[arg(id = "source_external_id", long = "source-external-id", env = "SOURCE_EXTERNAL_ID")]
    pub external_id: Option<String>,
    #[arg(id = "source_endpoint_url", long = "source-endpoint-url", env = "SOURCE_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
    /// STS endpoint for `--verify-identity`; the DynamoDB endpoint is not reused.
    #[arg(id = "source_sts_endpoint_url", long = "source-sts-endpoint-url", env = "SOURCE_STS_ENDPOINT_URL")]
    pub sts_endpoint_url: Option<String>,
}

/// Connection flags for the destination side.
#[derive(Debug, Clone, Default, Args)]
pub struct DestinationArgs {
    #[arg(id = "dest_region", long = "dest-region", env = "DEST_REGION")]
    pub region: Option<String>,
    #[arg(id = "dest_access_key", long = "dest-access-key", env = "DEST_AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key: Option<String>,
    #[arg(id = "dest_secret_key", long = "dest-secret-key", env = "DEST_AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,
    #[arg(id = "dest_session_token", long = "dest-session-token", env = "DEST_AWS_SESSION_TOKEN", hide_env_values = true)]
    pub session_token: Option<String>,
    #[arg(id = "dest_profile", long = "dest-profile", env = "DEST_PROFILE")]
    pub profile: Option<String>,
    #[arg(id = "dest_role_arn", long = "dest-role-arn", env = "DEST_ROLE_ARN")]
    pub role_arn: Option<String>,
    #[arg(id = "dest_external_id", long = "dest-external-id", env = "DEST_EXTERNAL_ID")]
    pub external_id: Option<String>,
    #[arg(id = "dest_endpoint_url", long = "dest-endpoint-url", env = "DEST_ENDPOINT_URL")]
    pub endpoint_url: Option<String>,
    /// STS endpoint for `--verify-identity`; the DynamoDB endpoint is not reused.
    #[arg(id = "dest_sts_endpoint_url", long = "dest-sts-endpoint-url", env = "DEST_STS_ENDPOINT_URL")]
    pub sts_endpoint_url: Option<String>,
}

/// Overwrite `target` with `value` when the flag was given.
fn set<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}

/// Like [`set`] for settings that are optional themselves.
fn set_opt<T>(target: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *target = value;
    }
}

#[allow(clippy::too_many_arguments)]
fn apply_store(
    store: &mut StoreConfig,
    region: Option<String>,
    access_key: Option<String>,
    secret_key: Option<String>,
    session_token: Option<String>,
    profile: Option<String>,
    role_arn: Option<String>,
    external_id: Option<String>,
    endpoint_url: Option<String>,
    sts_endpoint_url: Option<String>,
) {
    set_opt(&mut store.region, region);
    set_opt(&mut store.access_key, access_key);
    set_opt(&mut store.secret_key, secret_key);
    set_opt(&mut store.session_token, session_token);
    set_opt(&mut store.profile, profile);
    set_opt(&mut store.role_arn, role_arn);
    set_opt(&mut store.external_id, external_id);
    set_opt(&mut store.endpoint_url, endpoint_url);
    set_opt(&mut store.sts_endpoint_url, sts_endpoint_url);
}

impl SourceArgs {
    fn apply(self, store: &mut StoreConfig) {
        apply_store(
            store,
            self.region,
            self.access_key,
            self.secret_key,
            self.session_token,
            self.profile,
            self.role_arn,
            self.external_id,
            self.endpoint_url,
            self.sts_endpoint_url,
        );
    }
}

impl DestinationArgs {
    fn apply(self, store: &mut StoreConfig) {
        apply_store(
            store,
            self.region,
            self.access_key,
            self.secret_key,
            self.session_token,
            self.profile,
            self.role_arn,
            self.external_id,
            self.endpoint_url,
            self.sts_endpoint_url,
        );
    }
}

impl Cli {
    /// Build the effective configuration: file first, then flags.
    ///
    /// The result is not validated yet.
    pub fn to_config(&self) -> Result<TransferConfig> {
        let mut config = match &self.config {
            Some(path) => TransferConfig::from_file(path)?,
            None => TransferConfig::default(),
        };

        set(&mut config.source_table, self.source_table.clone());
        set(&mut config.destination_table, self.destination_table.clone());
        self.source.clone().apply(&mut config.source);
        self.destination.clone().apply(&mut config.destination);

        set(&mut config.batch_size, self.batch_size);
        set(&mut config.max_concurrency, self.max_concurrency);
        set(&mut config.backoff.base_delay_ms, self.base_delay_ms);
        set_opt(&mut config.backoff.max_delay_ms, self.max_delay_ms);
        set_opt(&mut config.backoff.max_rounds, self.max_rounds);
        set_opt(&mut config.page_size, self.page_size);

        // Switches can only turn a setting on.
        config.consistent_read |= self.consistent_read;
        config.dry_run |= self.dry_run;
        config.verify_identity |= self.verify_identity;

        Ok(config)
    }
}
