//! Scheduler loop: fires the run callback at every cron slot.

use std::future::Future;

use chrono::{DateTime, Utc};

use crate::cron::Schedule;

/// Run `on_tick` at every slot of `schedule`, forever.
///
/// The callback returns a short description of the run or an error message;
/// a failed run is logged and the loop waits for the next slot. Slots that
/// pass while a run is still going are skipped.
///
/// Taking a callback keeps this crate independent of the pipeline.
pub async fn spawn_scheduler<F, Fut>(schedule: Schedule, on_tick: F)
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<String, String>> + Send,
{
    run_schedule(schedule, on_tick, Utc::now).await
}

async fn run_schedule<F, Fut, C>(schedule: Schedule, on_tick: F, clock: C)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<String, String>>,
    C: Fn() -> DateTime<Utc>,
{
    tracing::info!("⏰ Scheduler started ({})", schedule.expression());

    loop {
        let now = clock();
        let Some(next) = schedule.next_after(now) else {
            tracing::error!("Schedule '{}' has no next run, stopping", schedule.expression());
            return;
        };

        let wait = (next - now).to_std().unwrap_or_default();
        tracing::debug!("Next scheduled run at {next}");
        tokio::time::sleep(wait).await;

        tracing::info!("🔔 Scheduled run triggered");
        match on_tick().await {
            Ok(outcome) => tracing::info!("✅ Scheduled run done: {outcome}"),
            Err(e) => tracing::warn!("⚠️ Scheduled run failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeDelta, TimeZone};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Wall clock that follows tokio's (paused) time, starting at `base`.
    fn virtual_clock(base: DateTime<Utc>) -> impl Fn() -> DateTime<Utc> {
        let start = tokio::time::Instant::now();
        move || base + TimeDelta::from_std(start.elapsed()).unwrap_or(TimeDelta::zero())
    }

    /// Let the scheduler task run without moving the clock past its timer.
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    fn start(result: Result<String, String>) -> (Arc<AtomicUsize>, tokio::task::JoinHandle<()>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let base = Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 30).unwrap();
        let schedule = Schedule::parse("* * * * *").unwrap();

        let handle = tokio::spawn(run_schedule(
            schedule,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                let result = result.clone();
                async move { result }
            },
            virtual_clock(base),
        ));
        (calls, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn test_fires_at_slot_not_before() {
        let (calls, handle) = start(Ok("2 stores".into()));
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(29)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::advance(Duration::from_secs(2)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_run_keeps_loop_alive() {
        let (calls, handle) = start(Err("fetch failed".into()));
        tokio::task::yield_now().await;

        tokio::time::advance(Duration::from_secs(31)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(60)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert!(!handle.is_finished());

        handle.abort();
    }
}
