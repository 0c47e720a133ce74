//! Cancelable periodic task.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::observability::metrics;

const MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Longest interval a job can be scheduled with. Longer ones are clamped.
pub const MAX_INTERVAL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Handle to a job running on a fixed interval.
///
/// Dropping the handle cancels the job.
#[derive(Debug)]
pub struct PeriodicTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PeriodicTask {
    /// Spawn `job` every `interval`. The first run happens immediately when
    /// `execute_first` is set, otherwise after one interval.
    pub fn start<F, Fut, E>(
        name: &'static str,
        interval: Duration,
        execute_first: bool,
        mut job: F,
    ) -> Self
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Display + Send + 'static,
    {
        let interval = if interval.is_zero() {
            tracing::warn!(job = name, "Zero interval, using {:?}", MIN_INTERVAL);
            MIN_INTERVAL
        } else if interval > MAX_INTERVAL {
            tracing::warn!(job = name, interval = ?interval, "Interval too long, using {:?}", MAX_INTERVAL);
            MAX_INTERVAL
        } else {
            interval
        };

        let token = CancellationToken::new();
        let cancelled = token.clone();

        let handle = tokio::spawn(async move {
            let first = if execute_first {
                Instant::now()
            } else {
                Instant::now() + interval
            };
            let mut ticker = time::interval_at(first, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            tracing::debug!(job = name, interval = ?interval, "Periodic task started");
            loop {
                tokio::select! {
                    biased;
                    _ = cancelled.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match job().await {
                    Ok(()) => metrics::record_job_run(name, true),
                    Err(e) => {
                        tracing::warn!(job = name, error = %e, "Periodic task run failed");
                        metrics::record_job_run(name, false);
                    }
                }
            }
            tracing::debug!(job = name, "Periodic task stopped");
        });

        Self {
            name,
            token,
            handle,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Stop scheduling further runs. Safe to call more than once.
    pub fn close(&self) {
        self.token.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Whether the underlying tokio task has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting(counter: Arc<AtomicUsize>, fail: bool) -> impl FnMut() -> std::future::Ready<Result<(), String>> {
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(if fail { Err("boom".to_string()) } else { Ok(()) })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_on_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::start("t", Duration::from_secs(10), true, counting(runs.clone(), false));

        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        task.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_first_run() {
        let runs = Arc::new(AtomicUsize::new(0));
        let _task = PeriodicTask::start("t", Duration::from_secs(10), false, counting(runs.clone(), false));

        time::sleep(Duration::from_secs(5)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        time::sleep(Duration::from_secs(10)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_keep_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::start("t", Duration::from_secs(10), true, counting(runs.clone(), true));

        time::sleep(Duration::from_secs(25)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        assert!(!task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_stops_future_runs() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::start("t", Duration::from_secs(10), true, counting(runs.clone(), false));

        time::sleep(Duration::from_secs(1)).await;
        task.close();
        task.close();
        assert!(task.is_closed());

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(task.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_run_completes() {
        let started = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicUsize::new(0));
        let (s, f) = (started.clone(), finished.clone());

        let task = PeriodicTask::start("t", Duration::from_secs(10), true, move || {
            let (s, f) = (s.clone(), f.clone());
            async move {
                s.fetch_add(1, Ordering::SeqCst);
                time::sleep(Duration::from_secs(5)).await;
                f.fetch_add(1, Ordering::SeqCst);
                Ok::<(), String>(())
            }
        });

        time::sleep(Duration::from_secs(1)).await;
        task.close();
        time::sleep(Duration::from_secs(30)).await;

        assert_eq!(started.load(Ordering::SeqCst), 1);
        assert_eq!(finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_huge_interval_is_clamped() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::start(
            "t",
            Duration::from_secs(u64::MAX / 2),
            false,
            counting(runs.clone(), false),
        );

        time::sleep(Duration::from_secs(1)).await;
        assert!(!task.is_finished());
        assert!(!task.is_closed());

        time::sleep(MAX_INTERVAL).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!task.is_finished());
        task.close();
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_cancels() {
        let runs = Arc::new(AtomicUsize::new(0));
        let task = PeriodicTask::start("t", Duration::from_secs(10), true, counting(runs.clone(), false));
        time::sleep(Duration::from_secs(1)).await;
        drop(task);

        time::sleep(Duration::from_secs(60)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
