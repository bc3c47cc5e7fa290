//! In-process reading store.
//!
//! Same contract and tie-break as the PostgreSQL store; backs the router
//! and ingestion tests.

use crate::db::ReadingStore;
use crate::model::{AirQualityError, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
pub struct MemoryReadingStore {
    rows: Mutex<Vec<Reading>>,
}

impl MemoryReadingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Reading>> {
        // A panicked writer can only have pushed a whole row or nothing.
        self.rows.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn len(&self) -> usize {
        self.rows().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows().is_empty()
    }

    pub fn snapshot(&self) -> Vec<Reading> {
        self.rows().clone()
    }
}

#[async_trait]
impl ReadingStore for MemoryReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), AirQualityError> {
        self.rows().push(reading.clone());
        Ok(())
    }

    async fn insert_many(&self, readings: &[Reading]) -> Result<u64, AirQualityError> {
        self.rows().extend_from_slice(readings);
        Ok(readings.len() as u64)
    }

    async fn most_polluted(&self) -> Result<Option<DateTime<Utc>>, AirQualityError> {
        let rows = self.rows();
        let peak = rows.iter().enumerate().min_by(|(ia, a), (ib, b)| {
            b.us_index
                .cmp(&a.us_index)
                .then(a.timestamp.cmp(&b.timestamp))
                .then(ia.cmp(ib))
        });
        Ok(peak.map(|(_, reading)| reading.timestamp))
    }
}
