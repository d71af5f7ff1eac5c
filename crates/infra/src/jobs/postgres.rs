//! Postgres-backed job queue.
//!
//! Jobs are stored as JSONB next to the columns the claim query filters on.
//! Claiming uses `SELECT ... FOR UPDATE SKIP LOCKED` inside a transaction so
//! concurrent workers never receive the same delivery.
//!
//! ## Error Mapping
//!
//! | SQLx error | Code | QueueError |
//! |------------|------|------------|
//! | Database (unique violation) | `23505` | `AlreadyExists` |
//! | Any other | n/a | `Storage` |

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{PgPool, Row};
use tracing::instrument;

use folio_core::JobId;

use super::queue::{JobQueue, QueueError, QueueStats};
use super::types::{DeadLetterEntry, Job, Topic};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS pipeline_jobs (
    id           UUID PRIMARY KEY,
    topic        TEXT NOT NULL,
    state        TEXT NOT NULL,
    run_at       TIMESTAMPTZ,
    lease_until  TIMESTAMPTZ,
    enqueued_at  TIMESTAMPTZ NOT NULL,
    data         JSONB NOT NULL
);
CREATE INDEX IF NOT EXISTS pipeline_jobs_claim_idx
    ON pipeline_jobs (topic, state, enqueued_at);
CREATE TABLE IF NOT EXISTS pipeline_dead_letters (
    job_id            UUID PRIMARY KEY,
    reason            TEXT NOT NULL,
    dead_lettered_at  TIMESTAMPTZ NOT NULL,
    data              JSONB NOT NULL
);
"#;

#[derive(Debug, Clone)]
pub struct PostgresJobQueue {
    pool: PgPool,
}

impl PostgresJobQueue {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, QueueError> {
        let pool = PgPool::connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        Ok(Self::new(pool))
    }

    /// Create the queue tables if they do not exist.
    pub async fn ensure_schema(&self) -> Result<(), QueueError> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        Ok(())
    }
}

fn encode(job: &Job) -> Result<serde_json::Value, QueueError> {
    serde_json::to_value(job).map_err(|e| QueueError::Serialization(e.to_string()))
}

fn decode(data: serde_json::Value) -> Result<Job, QueueError> {
    serde_json::from_value(data).map_err(|e| QueueError::Serialization(e.to_string()))
}

#[async_trait]
impl JobQueue for PostgresJobQueue {
    #[instrument(skip(self, job), fields(job_id = %job.id, topic = %job.topic), err)]
    async fn enqueue(&self, job: Job) -> Result<JobId, QueueError> {
        sqlx::query(
            r#"
            INSERT INTO pipeline_jobs (id, topic, state, run_at, lease_until, enqueued_at, data)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(job.id.as_uuid())
        .bind(job.topic.as_str())
        .bind(job.state.as_str())
        .bind(job.run_at)
        .bind(job.lease_until)
        .bind(job.enqueued_at)
        .bind(encode(&job)?)
        .execute(&self.pool)
        .await
        .map_err(|e| match map_sqlx_error("enqueue", e) {
            QueueError::AlreadyExists(_) => QueueError::AlreadyExists(job.id),
            other => other,
        })?;
        Ok(job.id)
    }

    #[instrument(skip(self), fields(job_id = %job_id), err)]
    async fn get(&self, job_id: JobId) -> Result<Option<Job>, QueueError> {
        let row = sqlx::query(
            r#"
            SELECT data FROM pipeline_jobs WHERE id = $1
            UNION ALL
            SELECT data FROM pipeline_dead_letters WHERE job_id = $1
            LIMIT 1
            "#,
        )
        .bind(job_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| decode(r.get("data"))).transpose()
    }

    #[instrument(skip(self), fields(topic = %topic), err)]
    async fn claim_next(&self, topic: Topic, lease: Duration) -> Result<Option<Job>, QueueError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("claim_next", e))?;

        let row = sqlx::query(
            r#"
            SELECT data FROM pipeline_jobs
            WHERE topic = $1
              AND (
                (state IN ('pending', 'failed') AND (run_at IS NULL OR run_at <= $2))
                OR (state = 'running' AND lease_until <= $2)
              )
            ORDER BY enqueued_at ASC
            LIMIT 1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(topic.as_str())
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("claim_next", e))?;

        let Some(row) = row else {
            tx.commit().await.map_err(|e| map_sqlx_error("claim_next", e))?;
            return Ok(None);
        };

        let mut job = decode(row.get("data"))?;
        job.mark_running(lease);
        write_job(&mut *tx, &job).await?;
        tx.commit().await.map_err(|e| map_sqlx_error("claim_next", e))?;

        Ok(Some(job))
    }

    #[instrument(skip(self, job), fields(job_id = %job.id, state = job.state.as_str()), err)]
    async fn update(&self, job: &Job) -> Result<(), QueueError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| map_sqlx_error("update", e))?;
        write_job(&mut *conn, job).await
    }

    #[instrument(skip(self, job), fields(job_id = %job.id), err)]
    async fn dead_letter(&self, job: Job, reason: String) -> Result<(), QueueError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("dead_letter", e))?;
        let entry = DeadLetterEntry::new(job, reason);

        sqlx::query("DELETE FROM pipeline_jobs WHERE id = $1")
            .bind(entry.job.id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("dead_letter", e))?;

        sqlx::query(
            r#"
            INSERT INTO pipeline_dead_letters (job_id, reason, dead_lettered_at, data)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (job_id) DO NOTHING
            "#,
        )
        .bind(entry.job.id.as_uuid())
        .bind(&entry.reason)
        .bind(entry.dead_lettered_at)
        .bind(encode(&entry.job)?)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("dead_letter", e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("dead_letter", e))
    }

    async fn list_dead_letters(&self, limit: usize) -> Result<Vec<DeadLetterEntry>, QueueError> {
        let rows = sqlx::query(
            r#"
            SELECT reason, dead_lettered_at, data FROM pipeline_dead_letters
            ORDER BY dead_lettered_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_dead_letters", e))?;

        rows.into_iter()
            .map(|row| {
                Ok(DeadLetterEntry {
                    job: decode(row.get("data"))?,
                    dead_lettered_at: row.get("dead_lettered_at"),
                    reason: row.get("reason"),
                })
            })
            .collect()
    }

    async fn stats(&self) -> Result<QueueStats, QueueError> {
        let rows = sqlx::query("SELECT state, COUNT(*) AS n FROM pipeline_jobs GROUP BY state")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stats", e))?;
        let dead: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pipeline_dead_letters")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("stats", e))?;

        let mut stats = QueueStats {
            dead_lettered: dead as usize,
            ..QueueStats::default()
        };
        for row in rows {
            let state: String = row.get("state");
            let n = row.get::<i64, _>("n") as usize;
            match state.as_str() {
                "pending" => stats.pending += n,
                "running" => stats.running += n,
                "completed" => stats.completed += n,
                "failed" => stats.failed += n,
                _ => stats.dead_lettered += n,
            }
        }
        Ok(stats)
    }
}

async fn write_job(conn: &mut sqlx::PgConnection, job: &Job) -> Result<(), QueueError> {
    let result = sqlx::query(
        r#"
        UPDATE pipeline_jobs
        SET state = $2, run_at = $3, lease_until = $4, data = $5
        WHERE id = $1
        "#,
    )
    .bind(job.id.as_uuid())
    .bind(job.state.as_str())
    .bind(job.run_at)
    .bind(job.lease_until)
    .bind(encode(job)?)
    .execute(conn)
    .await
    .map_err(|e| map_sqlx_error("update", e))?;

    if result.rows_affected() == 0 {
        return Err(QueueError::NotFound(job.id));
    }
    Ok(())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> QueueError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => QueueError::AlreadyExists(JobId::default()),
                _ => QueueError::Storage(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            QueueError::Storage(format!("connection pool closed in {}", operation))
        }
        _ => QueueError::Storage(format!("sqlx error in {}: {}", operation, err)),
    }
}
