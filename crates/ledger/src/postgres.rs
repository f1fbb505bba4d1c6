use std::collections::HashMap;

use async_trait::async_trait;
use common::BookingRef;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    Claim, EntryId, EntryQuery, IdempotencyStore, LedgerEntry, LedgerError, Result, StreamKey,
    Version,
    idempotency::DEFAULT_IN_FLIGHT_TTL_SECS,
    store::{AppendOptions, Ledger, validate_append},
};

const ENTRY_COLUMNS: &str =
    "id, entry_type, stream_type, booking_ref, version, recorded_at, payload, metadata";

/// PostgreSQL-backed ledger.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_entry(row: PgRow) -> Result<LedgerEntry> {
        let metadata_json: serde_json::Value = row.try_get("metadata")?;
        let metadata: HashMap<String, serde_json::Value> = serde_json::from_value(metadata_json)?;
        let booking_ref: String = row.try_get("booking_ref")?;
        let booking_ref = BookingRef::parse(booking_ref)
            .map_err(|e| LedgerError::InvalidAppend(format!("stored booking ref: {e}")))?;

        Ok(LedgerEntry {
            entry_id: EntryId::from_uuid(row.try_get::<Uuid, _>("id")?),
            entry_type: row.try_get("entry_type")?,
            stream_type: row.try_get("stream_type")?,
            booking_ref,
            version: Version::new(row.try_get("version")?),
            recorded_at: row.try_get("recorded_at")?,
            payload: row.try_get("payload")?,
            metadata,
        })
    }
}

#[async_trait]
impl Ledger for PostgresLedger {
    #[tracing::instrument(skip(self, entries), fields(count = entries.len()))]
    async fn append(&self, entries: Vec<LedgerEntry>, options: AppendOptions) -> Result<Version> {
        validate_append(&entries)?;
        let stream = match entries.first() {
            Some(first) => first.stream_key(),
            None => return Err(LedgerError::InvalidAppend("empty batch".to_string())),
        };

        let mut tx = self.pool.begin().await?;

        if let Some(expected) = options.expected_version {
            let current: Option<i64> = sqlx::query_scalar(
                "SELECT MAX(version) FROM ledger_entries WHERE stream_type = $1 AND booking_ref = $2",
            )
            .bind(&stream.stream_type)
            .bind(stream.booking_ref.as_str())
            .fetch_one(&mut *tx)
            .await?;

            let actual = Version::new(current.unwrap_or(0));
            if actual != expected {
                return Err(LedgerError::ConcurrencyConflict {
                    stream,
                    expected,
                    actual,
                });
            }
        }

        let mut last_version = Version::initial();
        for entry in &entries {
            let metadata_json = serde_json::to_value(&entry.metadata)?;

            sqlx::query(
                r#"
                INSERT INTO ledger_entries (id, entry_type, stream_type, booking_ref, version, recorded_at, payload, metadata)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(entry.entry_id.as_uuid())
            .bind(&entry.entry_type)
            .bind(&entry.stream_type)
            .bind(entry.booking_ref.as_str())
            .bind(entry.version.as_i64())
            .bind(entry.recorded_at)
            .bind(&entry.payload)
            .bind(metadata_json)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("unique_stream_version")
                {
                    return LedgerError::ConcurrencyConflict {
                        stream: stream.clone(),
                        expected: options.expected_version.unwrap_or(Version::initial()),
                        actual: entry.version,
                    };
                }
                LedgerError::Database(e)
            })?;

            last_version = entry.version;
        }

        tx.commit().await?;
        Ok(last_version)
    }

    async fn read_stream(&self, stream: &StreamKey) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM ledger_entries \
             WHERE stream_type = $1 AND booking_ref = $2 ORDER BY version ASC"
        ))
        .bind(&stream.stream_type)
        .bind(stream.booking_ref.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn query(&self, query: EntryQuery) -> Result<Vec<LedgerEntry>> {
        let mut sql = format!("SELECT {ENTRY_COLUMNS} FROM ledger_entries WHERE 1=1");
        let mut param_count = 0;

        if query.booking_ref.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND booking_ref = ${param_count}"));
        }
        if query.stream_type.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND stream_type = ${param_count}"));
        }
        if query.entry_types.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND entry_type = ANY(${param_count})"));
        }
        if query.from_recorded.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND recorded_at >= ${param_count}"));
        }
        if query.to_recorded.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND recorded_at <= ${param_count}"));
        }

        sql.push_str(" ORDER BY recorded_at ASC, version ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut q = sqlx::query(&sql);
        if let Some(booking_ref) = query.booking_ref {
            q = q.bind(booking_ref.as_str().to_string());
        }
        if let Some(stream_type) = query.stream_type {
            q = q.bind(stream_type);
        }
        if let Some(entry_types) = query.entry_types {
            q = q.bind(entry_types);
        }
        if let Some(from) = query.from_recorded {
            q = q.bind(from);
        }
        if let Some(to) = query.to_recorded {
            q = q.bind(to);
        }
        if let Some(limit) = query.limit {
            q = q.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            q = q.bind(offset as i64);
        }

        let rows = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_entry).collect()
    }

    async fn stream_version(&self, stream: &StreamKey) -> Result<Option<Version>> {
        let version: Option<i64> = sqlx::query_scalar(
            "SELECT MAX(version) FROM ledger_entries WHERE stream_type = $1 AND booking_ref = $2",
        )
        .bind(&stream.stream_type)
        .bind(stream.booking_ref.as_str())
        .fetch_one(&self.pool)
        .await?;

        Ok(version.map(Version::new))
    }
}

/// Idempotency keys stored next to the ledger tables.
#[derive(Clone)]
pub struct PostgresIdempotencyStore {
    pool: PgPool,
    in_flight_ttl_secs: i64,
}

impl PostgresIdempotencyStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            in_flight_ttl_secs: DEFAULT_IN_FLIGHT_TTL_SECS,
        }
    }

    pub fn with_ttl_secs(mut self, secs: i64) -> Self {
        self.in_flight_ttl_secs = secs;
        self
    }
}

#[async_trait]
impl IdempotencyStore for PostgresIdempotencyStore {
    async fn begin(&self, key: &str) -> Result<Claim> {
        // Insert a fresh claim, or take over one whose in-flight claim expired.
        let acquired: Option<String> = sqlx::query_scalar(
            r#"
            INSERT INTO idempotency_keys (key, status, response, created_at, updated_at)
            VALUES ($1, 'in_flight', NULL, NOW(), NOW())
            ON CONFLICT (key) DO UPDATE SET updated_at = NOW()
                WHERE idempotency_keys.status = 'in_flight'
                  AND idempotency_keys.updated_at < NOW() - make_interval(secs => $2)
            RETURNING key
            "#,
        )
        .bind(key)
        .bind(self.in_flight_ttl_secs as f64)
        .fetch_optional(&self.pool)
        .await?;

        if acquired.is_some() {
            return Ok(Claim::Acquired);
        }

        let row = sqlx::query("SELECT status, response FROM idempotency_keys WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let status: String = row.try_get("status")?;
                if status == "completed" {
                    let response: Option<serde_json::Value> = row.try_get("response")?;
                    Ok(Claim::Completed(response.unwrap_or(serde_json::Value::Null)))
                } else {
                    Ok(Claim::InFlight)
                }
            }
            // Released between the two statements.
            None => Ok(Claim::InFlight),
        }
    }

    async fn complete(&self, key: &str, response: serde_json::Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO idempotency_keys (key, status, response, created_at, updated_at)
            VALUES ($1, 'completed', $2, NOW(), NOW())
            ON CONFLICT (key) DO UPDATE SET
                status = 'completed',
                response = EXCLUDED.response,
                updated_at = NOW()
            "#,
        )
        .bind(key)
        .bind(response)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn release(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM idempotency_keys WHERE key = $1 AND status = 'in_flight'")
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
