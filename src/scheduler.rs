//! Wall-clock aligned periodic scheduler.
//!
//! Fires one registered job on a fixed period ("every minute" by default),
//! with the first fire on the next period boundary of UTC wall-clock time.
//! Every fire runs the job in its own task: the scheduler never looks at
//! what the job did, and a job that fails or panics cannot stop the timer.
//!
//! # Clock injection
//! Alignment is computed by `delay_until_next_boundary`, which takes `now`
//! as a parameter so it can be tested without waiting for real minutes.

use crate::logging::{self, DataSource};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// What to do when a tick fires while the previous one is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// Drop the new tick and log a warning.
    #[default]
    Skip,
    /// Run both concurrently.
    Allow,
}

impl FromStr for OverlapPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "skip" => Ok(OverlapPolicy::Skip),
            "allow" => Ok(OverlapPolicy::Allow),
            other => Err(format!("expected 'skip' or 'allow', got '{}'", other)),
        }
    }
}

/// Time from `now` until the next multiple of `period` since the Unix epoch.
///
/// Exactly on a boundary, the next boundary is a full period away.
pub fn delay_until_next_boundary(now: DateTime<Utc>, period: Duration) -> Duration {
    let period_ms = (period.as_millis() as i64).max(1);
    let into_period = now.timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis((period_ms - into_period) as u64)
}

/// Clears the running flag when a tick ends, including by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Clone)]
pub struct Scheduler {
    period: Duration,
    aligned: bool,
    overlap: OverlapPolicy,
}

impl Scheduler {
    pub fn every_minute() -> Self {
        Self::every(Duration::from_secs(60))
    }

    pub fn every(period: Duration) -> Self {
        Scheduler {
            period: period.max(Duration::from_millis(1)),
            aligned: true,
            overlap: OverlapPolicy::default(),
        }
    }

    /// When false, the first fire is one period after `spawn`.
    pub fn aligned(mut self, aligned: bool) -> Self {
        self.aligned = aligned;
        self
    }

    pub fn overlap(mut self, policy: OverlapPolicy) -> Self {
        self.overlap = policy;
        self
    }

    /// Delay before the first fire if started at `now`.
    pub fn first_delay(&self, now: DateTime<Utc>) -> Duration {
        if self.aligned {
            delay_until_next_boundary(now, self.period)
        } else {
            self.period
        }
    }

    /// Start firing `job` until `shutdown` is cancelled.
    pub fn spawn<F, Fut>(self, job: F, shutdown: CancellationToken) -> JoinHandle<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let first = self.first_delay(Utc::now());
        logging::info(
            DataSource::Scheduler,
            None,
            &format!(
                "Scheduled every {}s, first tick in {}ms (overlap: {:?})",
                self.period.as_secs(),
                first.as_millis(),
                self.overlap
            ),
        );

        let job = Arc::new(job);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + first, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let running = Arc::new(AtomicBool::new(false));

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match self.overlap {
                    OverlapPolicy::Skip => {
                        if running.swap(true, Ordering::AcqRel) {
                            logging::warn(
                                DataSource::Scheduler,
                                None,
                                "Previous tick still running, skipping this one",
                            );
                            continue;
                        }
                        let guard = RunningGuard(running.clone());
                        let job = job.clone();
                        tokio::spawn(async move {
                            let _guard = guard;
                            (*job)().await;
                        });
                    }
                    OverlapPolicy::Allow => {
                        let job = job.clone();
                        tokio::spawn(async move { (*job)().await });
                    }
                }
            }

            logging::info(DataSource::Scheduler, None, "Scheduler stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn delay_reaches_next_minute_boundary() {
        let now = Utc.with_ymd_and_hms(2023, 9, 15, 22, 59, 15).unwrap();
        assert_eq!(
            delay_until_next_boundary(now, Duration::from_secs(60)),
            Duration::from_secs(45)
        );
    }

    #[test]
    fn delay_on_exact_boundary_is_a_full_period() {
        let now = Utc.with_ymd_and_hms(2023, 9, 15, 23, 0, 0).unwrap();
        assert_eq!(
            delay_until_next_boundary(now, Duration::from_secs(60)),
            Duration::from_secs(60)
        );
    }

    #[test]
    fn delay_accounts_for_milliseconds() {
        let now = Utc.with_ymd_and_hms(2023, 9, 15, 23, 0, 59).unwrap()
            + chrono::Duration::milliseconds(750);
        assert_eq!(
            delay_until_next_boundary(now, Duration::from_secs(60)),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn unaligned_first_delay_is_one_period() {
        let now = Utc.with_ymd_and_hms(2023, 9, 15, 22, 59, 15).unwrap();
        let scheduler = Scheduler::every_minute().aligned(false);
        assert_eq!(scheduler.first_delay(now), Duration::from_secs(60));
        assert_eq!(Scheduler::every_minute().first_delay(now), Duration::from_secs(45));
    }

    #[test]
    fn overlap_policy_parses() {
        assert_eq!("skip".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Skip));
        assert_eq!("Allow".parse::<OverlapPolicy>(), Ok(OverlapPolicy::Allow));
        assert!("queue".parse::<OverlapPolicy>().is_err());
    }

    /// Spawns an unaligned every-minute scheduler whose job sleeps for
    /// `work` and counts how many times it started.
    fn counting(policy: OverlapPolicy, work: Duration) -> (Arc<AtomicUsize>, CancellationToken) {
        let started = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = started.clone();
        Scheduler::every_minute().aligned(false).overlap(policy).spawn(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(work).await;
                }
            },
            shutdown.clone(),
        );
        (started, shutdown)
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_per_period() {
        let (started, shutdown) = counting(OverlapPolicy::Skip, Duration::from_secs(1));
        tokio::time::sleep(Duration::from_secs(200)).await;
        // Ticks at 60s, 120s, 180s.
        assert_eq!(started.load(Ordering::SeqCst), 3);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn skip_policy_drops_overlapping_tick() {
        let (started, shutdown) = counting(OverlapPolicy::Skip, Duration::from_secs(90));
        tokio::time::sleep(Duration::from_secs(200)).await;
        // 60s runs until 150s, so 120s is dropped; 180s runs.
        assert_eq!(started.load(Ordering::SeqCst), 2);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn allow_policy_runs_overlapping_ticks() {
        let (started, shutdown) = counting(OverlapPolicy::Allow, Duration::from_secs(90));
        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_further_ticks() {
        let started = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = started.clone();
        let handle = Scheduler::every_minute().aligned(false).spawn(
            move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            },
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(130)).await;
        shutdown.cancel();
        handle.await.unwrap();
        tokio::time::sleep(Duration::from_secs(300)).await;

        assert_eq!(started.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn panicking_tick_does_not_stop_the_timer() {
        let started = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = started.clone();
        Scheduler::every_minute().aligned(false).spawn(
            move || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        panic!("first tick blows up");
                    }
                }
            },
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(200)).await;
        // The guard released the running flag during unwinding.
        assert_eq!(started.load(Ordering::SeqCst), 3);
        shutdown.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn job_panicking_before_its_future_exists_does_not_stop_the_timer() {
        let started = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let counter = started.clone();
        let handle = Scheduler::every_minute().aligned(false).spawn(
            move || {
                if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                    panic!("first tick fails to start");
                }
                async {}
            },
            shutdown.clone(),
        );

        tokio::time::sleep(Duration::from_secs(200)).await;
        assert_eq!(started.load(Ordering::SeqCst), 3);
        assert!(!handle.is_finished(), "scheduler loop died with the tick");
        shutdown.cancel();
    }
}
