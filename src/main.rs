use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

use dynamo_transfer::cli::Cli;
use dynamo_transfer::{DynamoStore, Transfer, TransferConfig, client, logging};

/// Exit status for a run stopped with Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, thiserror::Error)]
#[error("transfer interrupted by operator")]
struct Interrupted;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(err) = logging::init_logging(cli.verbose) {
        eprintln!("dynamo-transfer error: {:#}", err);
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is::<Interrupted>() => {
            tracing::warn!("Transfer interrupted; records already written stay in the destination");
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(err) => {
            tracing::error!(error = ?err, "An error occurred while running the transfer");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = cli.to_config()?;

    if cli.print_config {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    config.validate()?;
    tracing::debug!(?config, "Effective configuration");

    let transfer = build_transfer(&config).await?;

    let summary = tokio::select! {
        result = transfer.run() => result.context("transfer failed")?,
        _ = tokio::signal::ctrl_c() => return Err(Interrupted.into()),
    };

    if let Some(path) = &cli.summary_json {
        summary.write_json(path)?;
        tracing::info!(path = %path.display(), "Transfer summary written");
    }

    tracing::info!(
        records = summary.records_read,
        rounds = summary.rounds,
        table = %summary.destination_table,
        dry_run = summary.dry_run,
        "All items added to destination table successfully"
    );

    Ok(())
}

async fn build_transfer(config: &TransferConfig) -> Result<Transfer<DynamoStore, DynamoStore>> {
    let source_sdk = client::load_sdk_config(&config.source).await;
    let destination_sdk = client::load_sdk_config(&config.destination).await;

    if config.verify_identity {
        client::verify_identity(&source_sdk, &config.source, "source").await?;
        client::verify_identity(&destination_sdk, &config.destination, "destination").await?;
    }

    let source = DynamoStore::new(client::dynamodb_client(&source_sdk, &config.source))
        .with_page_size(config.page_size)
        .with_consistent_read(config.consistent_read);
    let destination = DynamoStore::new(client::dynamodb_client(
        &destination_sdk,
        &config.destination,
    ));

    Ok(Transfer::new(source, destination, config.options()))
}
