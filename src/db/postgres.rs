/// PostgreSQL reading store.
///
/// One `tokio_postgres::Client` shared by the ingestion job and the HTTP
/// handlers; concurrent statements are pipelined on its connection and
/// PostgreSQL alone orders concurrent inserts.

use crate::config::DatabaseConfig;
use crate::db::ReadingStore;
use crate::logging::{self, DataSource};
use crate::model::{AirQualityError, Reading, QUERY_CONTEXT, SAVE_CONTEXT};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio_postgres::types::ToSql;
use tokio_postgres::{Client, NoTls};

/// Schema applied at startup. Idempotent.
pub const SCHEMA_SQL: &str = include_str!("../../sql/001_air_quality.sql");

const INSERT_SQL: &str =
    "INSERT INTO air_quality (ts, aqius, mainus, aqicn, maincn) VALUES ($1, $2, $3, $4, $5)";

const MOST_POLLUTED_SQL: &str =
    "SELECT ts FROM air_quality ORDER BY aqius DESC, ts ASC, id ASC LIMIT 1";

/// Startup failures. Runtime failures are `AirQualityError::Persistence`.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Failed to connect to PostgreSQL at {host}:{port}/{dbname}")]
    Connect {
        host: String,
        port: u16,
        dbname: String,
        #[source]
        source: tokio_postgres::Error,
    },

    #[error("Failed to apply air_quality schema")]
    Schema(#[source] tokio_postgres::Error),
}

pub struct PgReadingStore {
    client: Client,
}

impl PgReadingStore {
    /// Connect and spawn the connection driver onto the current runtime.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, DbError> {
        let mut pg = tokio_postgres::Config::new();
        pg.host(config.host.as_str())
            .port(config.port)
            .user(config.user.as_str())
            .password(config.password.as_str())
            .dbname(config.dbname.as_str());

        let (client, connection) = pg.connect(NoTls).await.map_err(|source| DbError::Connect {
            host: config.host.clone(),
            port: config.port,
            dbname: config.dbname.clone(),
            source,
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                logging::error(DataSource::Database, None, &format!("connection closed: {}", e));
            }
        });

        logging::info(
            DataSource::Database,
            None,
            &format!("Connected to {}:{}/{}", config.host, config.port, config.dbname),
        );
        Ok(PgReadingStore { client })
    }

    pub async fn ensure_schema(&self) -> Result<(), DbError> {
        self.client.batch_execute(SCHEMA_SQL).await.map_err(DbError::Schema)
    }

    /// Number of stored rows.
    pub async fn count(&self) -> Result<i64, AirQualityError> {
        let row = self
            .client
            .query_one("SELECT COUNT(*) FROM air_quality", &[])
            .await
            .map_err(|e| AirQualityError::persistence(QUERY_CONTEXT, e))?;
        row.try_get(0)
            .map_err(|e| AirQualityError::persistence(QUERY_CONTEXT, e))
    }

    /// Test cleanup only; the service itself never deletes readings.
    pub async fn delete_all(&self) -> Result<u64, AirQualityError> {
        self.client
            .execute("DELETE FROM air_quality", &[])
            .await
            .map_err(|e| AirQualityError::persistence(SAVE_CONTEXT, e))
    }
}

/// `INSERT ... VALUES ($1..$5), ($6..$10), ...` for `rows` readings.
fn multi_row_insert_sql(rows: usize) -> String {
    let mut sql = String::from("INSERT INTO air_quality (ts, aqius, mainus, aqicn, maincn) VALUES ");
    for i in 0..rows {
        if i > 0 {
            sql.push_str(", ");
        }
        let base = i * 5;
        sql.push_str(&format!(
            "(${}, ${}, ${}, ${}, ${})",
            base + 1,
            base + 2,
            base + 3,
            base + 4,
            base + 5
        ));
    }
    sql
}

#[async_trait]
impl ReadingStore for PgReadingStore {
    async fn insert(&self, reading: &Reading) -> Result<(), AirQualityError> {
        self.client
            .execute(
                INSERT_SQL,
                &[
                    &reading.timestamp,
                    &reading.us_index,
                    &reading.us_main_pollutant,
                    &reading.cn_index,
                    &reading.cn_main_pollutant,
                ],
            )
            .await
            .map_err(|e| AirQualityError::persistence(SAVE_CONTEXT, e))?;
        Ok(())
    }

    async fn insert_many(&self, readings: &[Reading]) -> Result<u64, AirQualityError> {
        if readings.is_empty() {
            return Ok(0);
        }

        // One statement, so the batch lands entirely or not at all.
        // PostgreSQL caps a statement at 65535 parameters (13107 rows).
        let sql = multi_row_insert_sql(readings.len());
        let mut params: Vec<&(dyn ToSql + Sync)> = Vec::with_capacity(readings.len() * 5);
        for r in readings {
            params.push(&r.timestamp);
            params.push(&r.us_index);
            params.push(&r.us_main_pollutant);
            params.push(&r.cn_index);
            params.push(&r.cn_main_pollutant);
        }

        self.client
            .execute(sql.as_str(), &params)
            .await
            .map_err(|e| AirQualityError::persistence(SAVE_CONTEXT, e))
    }

    async fn most_polluted(&self) -> Result<Option<DateTime<Utc>>, AirQualityError> {
        let row = self
            .client
            .query_opt(MOST_POLLUTED_SQL, &[])
            .await
            .map_err(|e| AirQualityError::persistence(QUERY_CONTEXT, e))?;

        match row {
            Some(row) => row
                .try_get::<_, DateTime<Utc>>(0)
                .map(Some)
                .map_err(|e| AirQualityError::persistence(QUERY_CONTEXT, e)),
            None => Ok(None),
        }
    }
}
