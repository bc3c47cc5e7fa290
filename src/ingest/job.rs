/// Scheduled ingestion of the monitored location.
///
/// Each tick walks `Idle -> Fetching -> (Persisting | Failed) -> Idle`:
/// one provider call for the fixed coordinate, then one store insert of
/// the reading exactly as fetched. A failed tick is not retried; the next
/// attempt is the next scheduled tick.

use crate::db::ReadingStore;
use crate::ingest::AirQualityProvider;
use crate::location::MonitoredLocation;
use crate::logging::{self, DataSource};
use crate::model::{AirQualityError, Reading};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickState {
    Idle,
    Fetching,
    Persisting,
    Failed,
}

impl fmt::Display for TickState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickState::Idle => write!(f, "idle"),
            TickState::Fetching => write!(f, "fetching"),
            TickState::Persisting => write!(f, "persisting"),
            TickState::Failed => write!(f, "failed"),
        }
    }
}

/// A failed tick, wrapping whichever step failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    #[error("Job failed: {0}")]
    Failed(#[source] AirQualityError),
}

impl JobError {
    pub fn cause(&self) -> &AirQualityError {
        match self {
            JobError::Failed(err) => err,
        }
    }
}

pub struct IngestionTask {
    provider: Arc<dyn AirQualityProvider>,
    store: Arc<dyn ReadingStore>,
    location: &'static MonitoredLocation,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl IngestionTask {
    pub fn new(
        provider: Arc<dyn AirQualityProvider>,
        store: Arc<dyn ReadingStore>,
        location: &'static MonitoredLocation,
    ) -> Self {
        IngestionTask {
            provider,
            store,
            location,
            succeeded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
        }
    }

    fn enter(&self, state: TickState) {
        logging::debug(
            DataSource::Scheduler,
            Some(self.location.name),
            &format!("tick {}", state),
        );
    }

    /// Run one tick and return the stored reading.
    pub async fn run_once(&self) -> Result<Reading, JobError> {
        self.enter(TickState::Fetching);
        let at = self.location.coordinate();
        let fetched = match self.provider.fetch_current(at.longitude, at.latitude).await {
            Ok(reading) => reading,
            Err(err) => {
                self.enter(TickState::Failed);
                return Err(JobError::Failed(err));
            }
        };

        self.enter(TickState::Persisting);
        let row = Reading {
            timestamp: fetched.timestamp,
            us_index: fetched.us_index,
            us_main_pollutant: fetched.us_main_pollutant,
            cn_index: fetched.cn_index,
            cn_main_pollutant: fetched.cn_main_pollutant,
        };
        if let Err(err) = self.store.insert(&row).await {
            self.enter(TickState::Failed);
            return Err(JobError::Failed(err));
        }

        self.enter(TickState::Idle);
        Ok(row)
    }

    /// Run one tick, catching and logging its outcome.
    ///
    /// This is what the scheduler drives: nothing escapes from here.
    pub async fn run_logged(&self) {
        logging::info(DataSource::Scheduler, Some(self.location.name), "Cron job is running!");

        let last_ok = match self.run_once().await {
            Ok(reading) => {
                self.succeeded.fetch_add(1, Ordering::Relaxed);
                logging::info(
                    DataSource::Scheduler,
                    Some(self.location.name),
                    &format!(
                        "Stored reading ts={} aqius={} mainus={}",
                        crate::model::format_timestamp(&reading.timestamp),
                        reading.us_index,
                        reading.us_main_pollutant
                    ),
                );
                true
            }
            Err(err) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                logging::log_job_failure(self.location.name, self.provider.provider_name(), &err);
                false
            }
        };

        let (succeeded, failed) = self.totals();
        logging::log_tick_summary(self.location.name, succeeded, failed, last_ok);
    }

    /// (stored, failed) tick counts since start.
    pub fn totals(&self) -> (u64, u64) {
        (
            self.succeeded.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
