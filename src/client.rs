//! AWS client construction for each side of a transfer.
//!
//! Supports multiple credential sources:
//! - Static credentials
//! - AWS profiles
//! - Default credential chain (environment, instance profile, etc.)
//! - An assumed IAM role on top of any of the above

use aws_config::meta::region::RegionProviderChain;
use aws_config::profile::ProfileFileCredentialsProvider;
use aws_config::sts::AssumeRoleProvider;
use aws_config::{BehaviorVersion, SdkConfig};
use aws_sdk_dynamodb::config::{Credentials, Region, SharedCredentialsProvider};
use aws_sdk_dynamodb::Client;

use crate::config::StoreConfig;
use crate::errors::{Result, TransferError, map_sts_error};

/// Default session name for assumed roles.
const DEFAULT_ROLE_SESSION_NAME: &str = "dynamo-transfer";

/// Fallback region when neither configuration nor environment name one.
const DEFAULT_REGION: &str = "us-east-1";

/// Load the shared AWS configuration for one side.
///
/// Region priority: explicit > default provider chain > `us-east-1`.
/// Credentials priority: static > profile > default chain; a role ARN wraps
/// whichever of those applies.
pub async fn load_sdk_config(config: &StoreConfig) -> SdkConfig {
    let region_provider = RegionProviderChain::first_try(config.region.clone().map(Region::new))
        .or_default_provider()
        .or_else(DEFAULT_REGION);

    let mut config_loader = aws_config::defaults(BehaviorVersion::latest()).region(region_provider);

    if let (Some(ak), Some(sk)) = (&config.access_key, &config.secret_key) {
        let creds = Credentials::new(
            ak,
            sk,
            config.session_token.clone(),
            None,
            "dynamo-transfer-static",
        );
        config_loader = config_loader.credentials_provider(creds);
    } else if let Some(profile_name) = &config.profile {
        let profile_provider = ProfileFileCredentialsProvider::builder()
            .profile_name(profile_name)
            .build();
        config_loader = config_loader.credentials_provider(profile_provider);
    }
    // else: uses default credential chain (env vars, instance profile, etc)

    let sdk_config = config_loader.load().await;

    let Some(role_arn) = &config.role_arn else {
        return sdk_config;
    };

    let session_name = config
        .role_session_name
        .as_deref()
        .unwrap_or(DEFAULT_ROLE_SESSION_NAME);
    let mut role = AssumeRoleProvider::builder(role_arn).session_name(session_name);
    if let Some(external_id) = &config.external_id {
        role = role.external_id(external_id);
    }
    let provider = role.configure(&sdk_config).build().await;

    tracing::debug!(role_arn = %role_arn, session_name, "Assuming role for store access");

    sdk_config
        .into_builder()
        .credentials_provider(SharedCredentialsProvider::new(provider))
        .build()
}

/// Build a DynamoDB client, honoring a custom endpoint when configured.
pub fn dynamodb_client(sdk_config: &SdkConfig, config: &StoreConfig) -> Client {
    let mut dynamo_config = aws_sdk_dynamodb::config::Builder::from(sdk_config);

    if let Some(url) = &config.endpoint_url {
        dynamo_config = dynamo_config.endpoint_url(url);
    }

    Client::from_conf(dynamo_config.build())
}

/// Endpoint override for the STS client, if any.
///
/// DynamoDB Local and similar emulators do not serve STS, so the DynamoDB
/// `endpoint_url` is never carried over.
fn sts_endpoint_url(config: &StoreConfig) -> Option<&str> {
    config.sts_endpoint_url.as_deref()
}

fn sts_client(sdk_config: &SdkConfig, config: &StoreConfig) -> aws_sdk_sts::Client {
    let mut sts_config = aws_sdk_sts::config::Builder::from(sdk_config);
    if let Some(url) = sts_endpoint_url(config) {
        sts_config = sts_config.endpoint_url(url);
    }
    aws_sdk_sts::Client::from_conf(sts_config.build())
}

/// Account and principal resolved through STS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerIdentity {
    pub account: Option<String>,
    pub arn: Option<String>,
}

/// Resolve the caller identity of one side and log it.
///
/// Fails fast when credentials are missing or rejected, before any data
/// is read.
pub async fn verify_identity(
    sdk_config: &SdkConfig,
    config: &StoreConfig,
    side: &str,
) -> Result<CallerIdentity> {
    let sts = sts_client(sdk_config, config);

    let output = sts
        .get_caller_identity()
        .send()
        .await
        .map_err(|e| {
            TransferError::Client(format!(
                "{side}: failed to verify identity: {}",
                map_sts_error(e)
            ))
        })?;

    let identity = CallerIdentity {
        account: output.account,
        arn: output.arn,
    };

    tracing::info!(
        side,
        region = ?sdk_config.region(),
        account = identity.account.as_deref().unwrap_or("unknown"),
        arn = identity.arn.as_deref().unwrap_or("unknown"),
        "Resolved caller identity"
    );

    Ok(identity)
}
