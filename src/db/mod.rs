//! Reading persistence.
//!
//! Submodules:
//! - `postgres`: the production store, one `air_quality` table.
//! - `memory`: an in-process store with the same ordering rules.

pub mod memory;
pub mod postgres;

pub use memory::MemoryReadingStore;
pub use postgres::{DbError, PgReadingStore};

use crate::model::{AirQualityError, Reading};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Append-only storage of readings.
///
/// "Most polluted" is the row with the highest `us_index`; ties go to the
/// earliest timestamp, then to the first row stored.
#[async_trait]
pub trait ReadingStore: Send + Sync {
    /// Store one reading. No deduplication.
    async fn insert(&self, reading: &Reading) -> Result<(), AirQualityError>;

    /// Store several readings at once (fixtures). Returns the row count.
    async fn insert_many(&self, readings: &[Reading]) -> Result<u64, AirQualityError>;

    /// Timestamp of the most polluted reading, `None` when the store is empty.
    async fn most_polluted(&self) -> Result<Option<DateTime<Utc>>, AirQualityError>;
}
