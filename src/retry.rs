//! Write rounds with exponential backoff over unprocessed records.
//!
//! Each round submits its batches through a bounded pool of tokio tasks and
//! waits for every call to settle. The unprocessed sets returned by the
//! calls are merged after the barrier and become the next round's input.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

use crate::backoff::{self, Backoff};
use crate::errors::{Result, TransferError};
use crate::progress::{ProgressEvent, ProgressObserver};
use crate::store::{Batch, DestinationStore, UnprocessedSet};
use crate::writer::{BATCH_WRITE_MAX_ITEMS, write_batch};

/// Default number of batch calls in flight at once.
pub const DEFAULT_MAX_CONCURRENCY: usize = 16;

/// Where the coordinator is in its round cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    RoundInFlight { round: u32 },
    Evaluating { round: u32 },
    Done,
}

/// What the write rounds did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryOutcome {
    pub rounds: u32,
    pub batch_calls: usize,
    /// Unprocessed count after each round; the last entry is always zero.
    pub unprocessed_per_round: Vec<usize>,
    pub last_delay: Option<Duration>,
}

/// Drives write rounds until the destination has accepted every record.
pub struct RetryCoordinator<D> {
    destination: Arc<D>,
    backoff: Backoff,
    max_concurrency: usize,
    batch_size: usize,
    max_rounds: Option<u32>,
    observer: Arc<dyn ProgressObserver>,
    state: CoordinatorState,
}

impl<D> RetryCoordinator<D>
where
    D: DestinationStore + 'static,
{
    pub fn new(destination: Arc<D>, observer: Arc<dyn ProgressObserver>) -> Self {
        Self {
            destination,
            backoff: Backoff::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            batch_size: BATCH_WRITE_MAX_ITEMS,
            max_rounds: None,
            observer,
            state: CoordinatorState::Idle,
        }
    }

    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Cap the number of batch calls in flight. Zero is treated as one.
    pub fn with_max_concurrency(mut self, max_concurrency: usize) -> Self {
        self.max_concurrency = max_concurrency.max(1);
        self
    }

    /// Items per call when unprocessed records are rebatched, clamped to
    /// 1..=25.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, BATCH_WRITE_MAX_ITEMS);
        self
    }

    /// Give up with [`TransferError::RetriesExhausted`] after `max_rounds` rounds.
    pub fn with_max_rounds(mut self, max_rounds: Option<u32>) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn state(&self) -> CoordinatorState {
        self.state
    }

    fn transition(&mut self, next: CoordinatorState) {
        tracing::trace!(from = ?self.state, to = ?next, "Coordinator state change");
        self.state = next;
    }

    /// Write `batches`, then keep retrying whatever comes back unprocessed.
    ///
    /// Returns once a round leaves nothing unprocessed. A failed write call
    /// ends the run immediately, with no further rounds.
    pub async fn run(&mut self, batches: Vec<Batch>) -> Result<RetryOutcome> {
        self.transition(CoordinatorState::Idle);
        let mut outcome = RetryOutcome::default();
        let mut pending = batches;

        if pending.iter().all(Batch::is_empty) {
            self.transition(CoordinatorState::Done);
            return Ok(outcome);
        }

        let mut round = 0u32;
        loop {
            round += 1;
            self.transition(CoordinatorState::RoundInFlight { round });
            self.observer.on_event(&ProgressEvent::RoundStarted {
                round,
                batches: pending.len(),
                records: pending.iter().map(Batch::len).sum(),
            });

            let (unprocessed, calls) = self.run_round(round, pending).await?;
            outcome.rounds = round;
            outcome.batch_calls += calls;

            self.transition(CoordinatorState::Evaluating { round });
            let remaining = unprocessed.len();
            outcome.unprocessed_per_round.push(remaining);
            self.observer.on_event(&ProgressEvent::RoundCompleted {
                round,
                unprocessed: remaining,
            });

            if remaining == 0 {
                self.transition(CoordinatorState::Done);
                return Ok(outcome);
            }

            if self.max_rounds.is_some_and(|max| round >= max) {
                return Err(TransferError::RetriesExhausted {
                    rounds: round,
                    unprocessed,
                });
            }

            let delay = self.backoff.next_delay();
            outcome.last_delay = Some(delay);
            self.observer.on_event(&ProgressEvent::BackoffScheduled {
                round,
                delay_ms: backoff::millis(delay),
            });
            tokio::time::sleep(delay).await;

            pending = unprocessed.into_batches(self.batch_size);
        }
    }

    /// Fan out one round and wait for every call to settle.
    ///
    /// After the first failure no new calls are started, but calls already
    /// in flight are still awaited before the error is returned.
    async fn run_round(&self, round: u32, batches: Vec<Batch>) -> Result<(UnprocessedSet, usize)> {
        let mut queue = batches.into_iter();
        let mut join_set = JoinSet::new();
        let mut collected = UnprocessedSet::new();
        let mut first_error: Option<TransferError> = None;
        let mut sent = 0usize;

        loop {
            while first_error.is_none() && join_set.len() < self.max_concurrency {
                let Some(batch) = queue.next() else {
                    break;
                };
                let destination = Arc::clone(&self.destination);
                join_set.spawn(async move { write_batch(destination.as_ref(), batch).await });
                sent += 1;
            }

            let Some(joined) = join_set.join_next().await else {
                break;
            };

            match joined {
                Ok(Ok(unprocessed)) => collected.merge(unprocessed),
                Ok(Err(err)) => {
                    if first_error.is_none() {
                        tracing::warn!(round, error = %err, "Stopping round after failed batch call");
                        first_error = Some(err);
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(TransferError::Task(join_err.to_string()));
                    }
                }
            }
        }

        self.observer.on_event(&ProgressEvent::BatchesSent {
            round,
            batch_calls: sent,
        });

        match first_error {
            Some(err) => Err(err),
            None => Ok((collected, sent)),
        }
    }
}
