//! Report dispatch: one notification per store, bounded concurrency.
//!
//! Every store gets its own task. A semaphore caps how many sends are in
//! flight; the remaining tasks wait for a permit. The coordinator joins all
//! tasks before returning. A failed or panicking send is recorded for its
//! store only and never touches the others.

use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use playerwatch_core::{Notifier, Player};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{Instrument, Span};

/// Result of one store's notification attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Sent,
    Failed(String),
    /// Never started: the run deadline passed while waiting for a slot.
    Skipped(String),
}

/// Outcome for one store.
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    pub store_number: i64,
    pub players: usize,
    pub outcome: DispatchOutcome,
}

/// Everything the coordinator did in one run.
#[derive(Debug, Clone, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<StoreOutcome>,
}

impl DispatchReport {
    pub fn sent(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Sent))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Failed(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DispatchOutcome::Skipped(_)))
    }

    /// Outcome for a given store, if it was dispatched.
    pub fn outcome(&self, store_number: i64) -> Option<&DispatchOutcome> {
        self.outcomes
            .iter()
            .find(|o| o.store_number == store_number)
            .map(|o| &o.outcome)
    }

    fn count(&self, pred: impl Fn(&DispatchOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.outcome)).count()
    }
}

/// Fans store reports out to a [`Notifier`].
pub struct Dispatcher {
    notifier: Arc<dyn Notifier>,
    max_concurrency: usize,
    span: Span,
}

impl Dispatcher {
    pub fn new(notifier: Arc<dyn Notifier>, max_concurrency: usize, span: Span) -> Self {
        let max_concurrency = if max_concurrency == 0 {
            span.in_scope(|| tracing::warn!("⚠️ max_concurrency is 0, using 1"));
            1
        } else {
            max_concurrency
        };
        Self {
            notifier,
            max_concurrency,
            span,
        }
    }

    /// Send one report per store and wait for all of them.
    ///
    /// With a `deadline`, stores still waiting for a slot when it passes are
    /// skipped and sends still running are cut off and counted as failed.
    pub async fn dispatch(
        &self,
        stores: HashMap<i64, Vec<Player>>,
        deadline: Option<Instant>,
    ) -> DispatchReport {
        let start = Instant::now();
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (store_number, players) in stores {
            let notifier = self.notifier.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(
                send_store(notifier, semaphore, store_number, players, deadline)
                    .instrument(self.span.clone()),
            );
        }

        let mut report = DispatchReport::default();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(outcome) => report.outcomes.push(outcome),
                // Tasks catch their own panics; this is only reachable on runtime shutdown.
                Err(e) => self
                    .span
                    .in_scope(|| tracing::error!("Dispatch task did not complete: {e}")),
            }
        }

        self.span.in_scope(|| {
            tracing::debug!(
                sent = report.sent(),
                failed = report.failed(),
                skipped = report.skipped(),
                elapsed = ?start.elapsed(),
                "Dispatch finished"
            )
        });
        report
    }
}

async fn send_store(
    notifier: Arc<dyn Notifier>,
    semaphore: Arc<Semaphore>,
    store_number: i64,
    players: Vec<Player>,
    deadline: Option<Instant>,
) -> StoreOutcome {
    let count = players.len();
    let finish = |outcome| StoreOutcome {
        store_number,
        players: count,
        outcome,
    };

    let _permit = match within(deadline, semaphore.acquire_owned()).await {
        Some(Ok(permit)) => permit,
        Some(Err(_)) => return finish(DispatchOutcome::Skipped("admission gate closed".into())),
        None => {
            tracing::warn!(store = store_number, players = count, "Deadline reached before send started");
            return finish(DispatchOutcome::Skipped("run deadline reached".into()));
        }
    };
    // A permit handed over at the deadline itself must not start a send.
    if deadline.is_some_and(|at| Instant::now() >= at) {
        tracing::warn!(store = store_number, players = count, "Deadline reached before send started");
        return finish(DispatchOutcome::Skipped("run deadline reached".into()));
    }

    let send = AssertUnwindSafe(notifier.send(store_number, &players)).catch_unwind();
    let outcome = match within(deadline, send).await {
        Some(Ok(Ok(()))) => {
            tracing::info!(store = store_number, players = count, "📤 Report sent");
            DispatchOutcome::Sent
        }
        Some(Ok(Err(e))) => {
            tracing::error!(store = store_number, players = count, "Failed to send report: {e}");
            DispatchOutcome::Failed(e.to_string())
        }
        Some(Err(_panic)) => {
            tracing::error!(store = store_number, players = count, "Notifier panicked");
            DispatchOutcome::Failed("notifier panicked".into())
        }
        None => {
            tracing::error!(store = store_number, players = count, "Send aborted at run deadline");
            DispatchOutcome::Failed("run deadline exceeded".into())
        }
    };
    finish(outcome)
}

/// Await `fut`, giving up at `deadline`. `None` means the deadline won.
async fn within<F: Future>(deadline: Option<Instant>, fut: F) -> Option<F::Output> {
    match deadline {
        Some(at) => tokio::time::timeout_at(at, fut).await.ok(),
        None => Some(fut.await),
    }
}
