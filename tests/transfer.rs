mod common;

use common::{FakeDestination, FakeSource, RecordingProgress, pk_of, record};
use dynamo_transfer::{
    Backoff, ProgressEvent, Transfer, TransferError, TransferOptions, TransferSummary,
};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::time::Instant;

struct Run {
    result: Result<TransferSummary, TransferError>,
    source: Arc<FakeSource>,
    destination: Arc<FakeDestination>,
    events: Vec<ProgressEvent>,
}

async fn run_transfer(
    source: FakeSource,
    destination: FakeDestination,
    options: TransferOptions,
) -> Run {
    let source = Arc::new(source);
    let destination = Arc::new(destination);
    let progress = Arc::new(RecordingProgress::default());

    let result = Transfer::with_shared_destination(
        Arc::clone(&source),
        Arc::clone(&destination),
        options,
    )
    .with_observer(progress.clone())
    .run()
    .await;

    Run {
        result,
        source,
        destination,
        events: progress.events(),
    }
}

fn options() -> TransferOptions {
    TransferOptions::new("source-table", "destination-table")
}

fn backoff_delays(events: &[ProgressEvent]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::BackoffScheduled { delay_ms, .. } => Some(*delay_ms),
            _ => None,
        })
        .collect()
}

fn rounds_started(events: &[ProgressEvent]) -> Vec<(u32, usize, usize)> {
    events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::RoundStarted {
                round,
                batches,
                records,
            } => Some((*round, *batches, *records)),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn unprocessed_items_are_retried_after_base_delay() {
    // Items 3, 7 and 11 sit in the first batch of 25.
    let destination = FakeDestination::new()
        .reject(3, 1)
        .reject(7, 1)
        .reject(11, 1);
    let started = Instant::now();

    let run = run_transfer(FakeSource::with_page_sizes(&[30]), destination, options()).await;
    let summary = run.result.unwrap();

    assert_eq!(summary.records_read, 30);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.rounds, 2);
    assert_eq!(summary.batch_calls, 3);
    assert_eq!(summary.unprocessed_per_round, vec![3, 0]);
    assert_eq!(summary.last_delay, Some(Duration::from_millis(1000)));

    assert_eq!(rounds_started(&run.events), vec![(1, 2, 30), (2, 1, 3)]);
    assert_eq!(backoff_delays(&run.events), vec![1000]);
    assert!(started.elapsed() >= Duration::from_millis(1000));

    let expected: Vec<String> = (0..30).map(pk_of).collect();
    assert_eq!(run.destination.written_pks(), expected);

    // Retried records arrive with every attribute intact.
    let written = run.destination.written.lock().unwrap();
    assert!(written.contains(&record(7)));
}

#[tokio::test(start_paused = true)]
async fn reads_every_page_before_writing() {
    let run = run_transfer(
        FakeSource::with_page_sizes(&[100, 100, 40]),
        FakeDestination::new(),
        options(),
    )
    .await;
    let summary = run.result.unwrap();

    assert_eq!(summary.records_read, 240);
    assert_eq!(summary.pages_read, 3);
    assert_eq!(run.source.scans.load(Ordering::SeqCst), 3);

    let cursors = run.source.cursors.lock().unwrap().clone();
    assert!(cursors[0].is_none());
    assert!(cursors[1].is_some());
    assert!(cursors[2].is_some());

    let fetched: Vec<_> = run
        .events
        .iter()
        .filter_map(|e| match e {
            ProgressEvent::PageFetched {
                iteration,
                records_fetched,
                ..
            } => Some((*iteration, *records_fetched)),
            _ => None,
        })
        .collect();
    assert_eq!(fetched, vec![(1, 100), (2, 200), (3, 240)]);

    assert_eq!(summary.batches, 10);
    assert_eq!(summary.rounds, 1);
    assert_eq!(run.destination.written_pks().len(), 240);
}

#[tokio::test(start_paused = true)]
async fn write_error_aborts_without_retry_rounds() {
    // Item 4 breaks the first batch; item 27 would need a retry round.
    let destination = FakeDestination::new().fail_on(4).reject(27, 1);

    let run = run_transfer(FakeSource::with_page_sizes(&[30]), destination, options()).await;

    match run.result {
        Err(TransferError::Write { table, .. }) => assert_eq!(table, "destination-table"),
        other => panic!("expected write error, got {other:?}"),
    }
    assert_eq!(rounds_started(&run.events), vec![(1, 2, 30)]);
    assert!(backoff_delays(&run.events).is_empty());
    assert!(
        !run.events
            .iter()
            .any(|e| matches!(e, ProgressEvent::TransferCompleted { .. }))
    );

    // The second batch was in flight and is not rolled back.
    let written = run.destination.written_pks();
    assert_eq!(written.len(), 4);
    assert!(!written.contains(&pk_of(4)));
}

#[tokio::test(start_paused = true)]
async fn backoff_doubles_every_round() {
    let destination = FakeDestination::new().reject(0, 4);
    let started = Instant::now();

    let run = run_transfer(FakeSource::with_page_sizes(&[10]), destination, options()).await;
    let summary = run.result.unwrap();

    assert_eq!(summary.rounds, 5);
    assert_eq!(summary.unprocessed_per_round, vec![1, 1, 1, 1, 0]);
    assert_eq!(backoff_delays(&run.events), vec![1000, 2000, 4000, 8000]);
    assert!(started.elapsed() >= Duration::from_millis(15_000));
}

#[tokio::test(start_paused = true)]
async fn max_delay_caps_the_schedule() {
    let destination = FakeDestination::new().reject(0, 4);
    let mut options = options();
    options.backoff = Backoff::new(Duration::from_millis(500))
        .with_max_delay(Some(Duration::from_millis(1500)));

    let run = run_transfer(FakeSource::with_page_sizes(&[1]), destination, options).await;

    assert!(run.result.is_ok());
    assert_eq!(backoff_delays(&run.events), vec![500, 1000, 1500, 1500]);
}

#[tokio::test(start_paused = true)]
async fn max_rounds_gives_up_with_pending_records() {
    let destination = FakeDestination::new().reject(2, u32::MAX).reject(3, u32::MAX);
    let mut options = options();
    options.max_rounds = Some(3);

    let run = run_transfer(FakeSource::with_page_sizes(&[5]), destination, options).await;

    match run.result {
        Err(TransferError::RetriesExhausted { rounds, unprocessed }) => {
            assert_eq!(rounds, 3);
            let pending = unprocessed.get("destination-table").unwrap();
            assert_eq!(pending, [record(2), record(3)].as_slice());
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
    assert_eq!(backoff_delays(&run.events), vec![1000, 2000]);
    assert_eq!(run.destination.written_pks().len(), 3);
}

#[tokio::test(start_paused = true)]
async fn dry_run_issues_no_writes() {
    let mut options = options();
    options.dry_run = true;

    let run = run_transfer(
        FakeSource::with_page_sizes(&[25, 25, 1]),
        FakeDestination::new(),
        options,
    )
    .await;
    let summary = run.result.unwrap();

    assert!(summary.dry_run);
    assert_eq!(summary.records_read, 51);
    assert_eq!(summary.batches, 3);
    assert_eq!(summary.batch_calls, 0);
    assert_eq!(run.destination.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn empty_source_completes_without_rounds() {
    let run = run_transfer(FakeSource::with_page_sizes(&[0]), FakeDestination::new(), options()).await;
    let summary = run.result.unwrap();

    assert_eq!(summary.records_read, 0);
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.rounds, 0);
    assert_eq!(run.destination.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn in_flight_calls_respect_concurrency_cap() {
    let destination = FakeDestination::new().with_latency(Duration::from_millis(10));
    let mut options = options();
    options.batch_size = 5;
    options.max_concurrency = 4;

    let run = run_transfer(FakeSource::with_page_sizes(&[100]), destination, options).await;
    let summary = run.result.unwrap();

    assert_eq!(summary.batch_calls, 20);
    assert_eq!(run.destination.max_in_flight.load(Ordering::SeqCst), 4);
    assert_eq!(run.destination.written_pks().len(), 100);
}

#[tokio::test(start_paused = true)]
async fn retry_rounds_keep_the_configured_batch_size() {
    let destination = (0..20).fold(FakeDestination::new(), |d, i| d.reject(i, 1));
    let mut options = options();
    options.batch_size = 5;

    let run = run_transfer(FakeSource::with_page_sizes(&[20]), destination, options).await;
    let summary = run.result.unwrap();

    assert_eq!(rounds_started(&run.events), vec![(1, 4, 20), (2, 4, 20)]);
    assert_eq!(summary.batch_calls, 8);
    assert_eq!(run.destination.written_pks().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn read_error_aborts_before_any_write() {
    let mut source = FakeSource::with_page_sizes(&[10, 10, 10]);
    source.fail_on_scan = Some(1);

    let run = run_transfer(source, FakeDestination::new(), options()).await;

    match run.result {
        Err(TransferError::Read { table, .. }) => assert_eq!(table, "source-table"),
        other => panic!("expected read error, got {other:?}"),
    }
    assert_eq!(run.source.scans.load(Ordering::SeqCst), 2);
    assert_eq!(run.destination.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn invalid_options_fail_before_reading() {
    let mut options = options();
    options.batch_size = 0;

    let run = run_transfer(FakeSource::with_page_sizes(&[1]), FakeDestination::new(), options).await;

    assert!(matches!(run.result, Err(TransferError::Config(_))));
    assert_eq!(run.source.scans.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn summary_is_written_as_json() {
    let run = run_transfer(FakeSource::with_page_sizes(&[3]), FakeDestination::new(), options()).await;
    let summary = run.result.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("summary.json");
    summary.write_json(&path).unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["records_read"], 3);
    assert_eq!(json["destination_table"], "destination-table");
    assert_eq!(json["last_delay"], serde_json::Value::Null);
    assert_eq!(json["transfer_id"], summary.transfer_id.to_string());
}
