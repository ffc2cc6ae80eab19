use anyhow::Result;
use async_trait::async_trait;
use beads_protocol::TopicFilter;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};

/// Page size used when scanning the ledger with a topic filter applied
const SCAN_BATCH: i64 = 500;

/// One dispatched event, as handed to the ledger
#[derive(Debug, Clone, Copy)]
pub struct LedgerEntry<'a> {
    pub topic: &'a str,
    pub correlation_id: &'a str,
    pub actor: &'a str,
    /// Serialized JSON payload
    pub payload: &'a str,
}

/// Stored ledger row. `id` is the ledger's own cursor, never a hub sequence.
#[derive(Debug, Clone, Serialize)]
pub struct LedgerRecord {
    pub id: i64,
    pub topic: String,
    pub correlation_id: String,
    pub actor: String,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Durable, append-only record of dispatched events
#[async_trait]
pub trait EventLedger: Send + Sync {
    /// Append an entry (returns the assigned id)
    async fn append(&self, entry: LedgerEntry<'_>) -> Result<i64>;

    /// Records with id > `after` whose topic passes `topics`, oldest first
    async fn query(&self, after: i64, topics: &TopicFilter, limit: usize) -> Result<Vec<LedgerRecord>>;

    /// Latest assigned id (0 when empty)
    async fn latest_id(&self) -> Result<i64>;
}

// ============================================================================
// In-memory ledger
// ============================================================================

/// Ledger kept in process memory, used when no database is configured
#[derive(Default)]
pub struct MemoryLedger {
    records: RwLock<Vec<LedgerRecord>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventLedger for MemoryLedger {
    async fn append(&self, entry: LedgerEntry<'_>) -> Result<i64> {
        let payload: serde_json::Value = serde_json::from_str(entry.payload)?;

        let mut records = self.records.write().await;
        let id = records.last().map(|r| r.id).unwrap_or(0) + 1;
        records.push(LedgerRecord {
            id,
            topic: entry.topic.to_string(),
            correlation_id: entry.correlation_id.to_string(),
            actor: entry.actor.to_string(),
            payload,
            created_at: Utc::now(),
        });

        Ok(id)
    }

    async fn query(&self, after: i64, topics: &TopicFilter, limit: usize) -> Result<Vec<LedgerRecord>> {
        let records = self.records.read().await;
        let start = records.partition_point(|r| r.id <= after);

        Ok(records[start..]
            .iter()
            .filter(|r| topics.matches(&r.topic))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn latest_id(&self) -> Result<i64> {
        Ok(self.records.read().await.last().map(|r| r.id).unwrap_or(0))
    }
}

// ============================================================================
// PostgreSQL ledger
// ============================================================================

/// PostgreSQL implementation of the event ledger
pub struct PgLedger {
    client: Client,
}

impl PgLedger {
    pub async fn connect(database_url: &str) -> crate::Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "ledger database connection closed");
            }
        });

        Ok(Self { client })
    }

    /// Create the ledger table if it does not exist yet
    pub async fn migrate(&self) -> crate::Result<()> {
        self.client
            .batch_execute(
                r#"
                CREATE TABLE IF NOT EXISTS events (
                    id BIGSERIAL PRIMARY KEY,
                    topic TEXT NOT NULL,
                    correlation_id TEXT NOT NULL,
                    actor TEXT NOT NULL,
                    payload JSONB NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
                );
                CREATE INDEX IF NOT EXISTS events_topic_idx ON events (topic);
                "#,
            )
            .await?;

        info!("Ledger migrations completed successfully");
        Ok(())
    }
}

fn record_from_row(row: &Row) -> LedgerRecord {
    LedgerRecord {
        id: row.get("id"),
        topic: row.get("topic"),
        correlation_id: row.get("correlation_id"),
        actor: row.get("actor"),
        payload: row.get("payload"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl EventLedger for PgLedger {
    async fn append(&self, entry: LedgerEntry<'_>) -> Result<i64> {
        let row = self
            .client
            .query_one(
                r#"
                INSERT INTO events (topic, correlation_id, actor, payload)
                VALUES ($1, $2, $3, $4::TEXT::JSONB)
                RETURNING id
                "#,
                &[&entry.topic, &entry.correlation_id, &entry.actor, &entry.payload],
            )
            .await?;

        Ok(row.get("id"))
    }

    async fn query(&self, after: i64, topics: &TopicFilter, limit: usize) -> Result<Vec<LedgerRecord>> {
        let mut cursor = after;
        let mut records = Vec::new();

        // Patterns are glob-style, so the topic filter runs here rather than in SQL.
        loop {
            let rows = self
                .client
                .query(
                    r#"
                    SELECT id, topic, correlation_id, actor, payload, created_at
                    FROM events
                    WHERE id > $1
                    ORDER BY id ASC
                    LIMIT $2
                    "#,
                    &[&cursor, &SCAN_BATCH],
                )
                .await?;

            let exhausted = (rows.len() as i64) < SCAN_BATCH;
            for row in &rows {
                let record = record_from_row(row);
                cursor = record.id;
                if topics.matches(&record.topic) {
                    records.push(record);
                    if records.len() >= limit {
                        return Ok(records);
                    }
                }
            }

            if exhausted {
                return Ok(records);
            }
        }
    }

    async fn latest_id(&self) -> Result<i64> {
        let row = self
            .client
            .query_one("SELECT COALESCE(MAX(id), 0) AS id FROM events", &[])
            .await?;

        Ok(row.get("id"))
    }
}
