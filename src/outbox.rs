//! Transactional outbox for automation webhooks.
//!
//! Mutations call [`enqueue`] inside their own transaction, so a committed
//! state change always has its notification recorded. The [`OutboxWorker`]
//! delivers due rows in the background with exponential backoff and keeps
//! the outcome of every attempt on the row.

use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{timestamp_now, DbState};
use crate::error::{KitchenError, KitchenResult};
use crate::settings::{self, WebhookTarget};
use crate::webhook::{DeliveryError, WebhookTransport};

const DEFAULT_RETRY_DELAY_MS: i64 = 5_000;
const MAX_RETRY_DELAY_MS: i64 = 300_000;
pub const DEFAULT_BATCH_SIZE: usize = 25;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Topic {
    Order,
    Payment,
    Menu,
}

impl Topic {
    pub fn as_str(self) -> &'static str {
        match self {
            Topic::Order => "order",
            Topic::Payment => "payment",
            Topic::Menu => "menu",
        }
    }

    fn parse(raw: &str) -> KitchenResult<Self> {
        match raw {
            "order" => Ok(Topic::Order),
            "payment" => Ok(Topic::Payment),
            "menu" => Ok(Topic::Menu),
            other => Err(KitchenError::malformed(
                "outbox entry",
                format!("unknown topic '{other}'"),
            )),
        }
    }

    pub fn webhook_target(self) -> WebhookTarget {
        match self {
            Topic::Order => WebhookTarget::Order,
            Topic::Payment => WebhookTarget::Payment,
            Topic::Menu => WebhookTarget::Menu,
        }
    }
}

/// Record the intent to notify automations. Call with the same transaction
/// as the state change it describes.
pub fn enqueue(
    conn: &Connection,
    topic: Topic,
    entity_id: &str,
    action: &str,
    payload: &Value,
) -> KitchenResult<i64> {
    let now = timestamp_now();
    let idempotency_key = format!("{}:{entity_id}:{action}:{}", topic.as_str(), Uuid::new_v4());
    conn.execute(
        "INSERT INTO outbox (
            topic, entity_id, action, payload, idempotency_key,
            status, created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6, ?6)",
        params![
            topic.as_str(),
            entity_id,
            action,
            serde_json::to_string(payload)?,
            idempotency_key,
            now
        ],
    )?;
    let id = conn.last_insert_rowid();
    debug!(outbox_id = id, topic = topic.as_str(), entity_id = %entity_id, action = %action, "Outbox entry queued");
    Ok(id)
}

#[derive(Debug, Clone)]
pub struct OutboxEntry {
    pub id: i64,
    pub topic: Topic,
    pub entity_id: String,
    pub action: String,
    pub payload: Value,
    pub retry_count: i64,
    pub max_retries: i64,
    pub retry_delay_ms: i64,
}

/// Pending rows whose retry time has come, oldest first.
pub fn due_entries(conn: &Connection, limit: usize) -> KitchenResult<Vec<OutboxEntry>> {
    let now = timestamp_now();
    let mut stmt = conn.prepare(
        "SELECT id, topic, entity_id, action, payload, retry_count, max_retries, retry_delay_ms
         FROM outbox
         WHERE status = 'pending'
           AND (next_retry_at IS NULL OR next_retry_at <= ?1)
         ORDER BY id ASC
         LIMIT ?2",
    )?;
    let rows = stmt
        .query_map(params![now, limit as i64], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
                row.get::<_, i64>(7)?,
            ))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut entries = Vec::with_capacity(rows.len());
    for (id, topic, entity_id, action, payload, retry_count, max_retries, retry_delay_ms) in rows {
        let payload = serde_json::from_str(&payload)
            .map_err(|e| KitchenError::malformed("outbox entry", format!("{id}: {e}")))?;
        entries.push(OutboxEntry {
            id,
            topic: Topic::parse(&topic)?,
            entity_id,
            action,
            payload,
            retry_count,
            max_retries,
            retry_delay_ms,
        });
    }
    Ok(entries)
}

fn deterministic_jitter_ms(seed: i64) -> i64 {
    (seed.unsigned_abs() % 700) as i64 + 50
}

fn schedule_next_retry(delay_ms: i64, seed: i64) -> String {
    let bounded = delay_ms.clamp(1_000, MAX_RETRY_DELAY_MS);
    let jitter = deterministic_jitter_ms(seed);
    (Utc::now() + ChronoDuration::milliseconds(bounded + jitter))
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn mark_delivered(conn: &Connection, id: i64, http_status: u16) -> KitchenResult<()> {
    let now = timestamp_now();
    conn.execute(
        "UPDATE outbox
         SET status = 'delivered', delivered_at = ?1, updated_at = ?1,
             last_http_status = ?2, last_error = NULL, next_retry_at = NULL
         WHERE id = ?3",
        params![now, http_status, id],
    )?;
    Ok(())
}

fn mark_skipped(conn: &Connection, id: i64, reason: &str) -> KitchenResult<()> {
    conn.execute(
        "UPDATE outbox SET status = 'skipped', last_error = ?1, updated_at = ?2 WHERE id = ?3",
        params![reason, timestamp_now(), id],
    )?;
    Ok(())
}

/// How a failed attempt was recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailureOutcome {
    Deferred,
    Retrying,
    Failed,
}

fn mark_attempt_failed(
    conn: &Connection,
    entry: &OutboxEntry,
    error: &DeliveryError,
) -> KitchenResult<FailureOutcome> {
    let message = error.to_string();
    let http_status = error.http_status();

    if error.is_backpressure() {
        // Receiver is shedding load; wait without spending a retry.
        let delay_ms = (error.retry_after_secs().unwrap_or(5) as i64 * 1000)
            .clamp(1_000, MAX_RETRY_DELAY_MS);
        conn.execute(
            "UPDATE outbox
             SET next_retry_at = ?1, last_error = ?2, last_http_status = ?3, updated_at = ?4
             WHERE id = ?5",
            params![
                schedule_next_retry(delay_ms, entry.id),
                message,
                http_status,
                timestamp_now(),
                entry.id
            ],
        )?;
        return Ok(FailureOutcome::Deferred);
    }

    let new_count = entry.retry_count + 1;
    let exhausted = error.is_permanent() || new_count >= entry.max_retries;
    // Wait the stored delay now and keep the doubled one for the next failure.
    let wait_ms = entry
        .retry_delay_ms
        .clamp(DEFAULT_RETRY_DELAY_MS, MAX_RETRY_DELAY_MS);
    let next_delay = (wait_ms * 2).min(MAX_RETRY_DELAY_MS);
    let next_retry_at = if exhausted {
        None
    } else {
        Some(schedule_next_retry(wait_ms, entry.id))
    };
    conn.execute(
        "UPDATE outbox
         SET status = ?1, retry_count = ?2, next_retry_at = ?3, retry_delay_ms = ?4,
             last_error = ?5, last_http_status = ?6, updated_at = ?7
         WHERE id = ?8",
        params![
            if exhausted { "failed" } else { "pending" },
            new_count,
            next_retry_at,
            next_delay,
            message,
            http_status,
            timestamp_now(),
            entry.id
        ],
    )?;
    Ok(if exhausted {
        FailureOutcome::Failed
    } else {
        FailureOutcome::Retrying
    })
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboxStats {
    pub pending: i64,
    pub delivered: i64,
    pub failed: i64,
    pub skipped: i64,
    pub last_error: Option<String>,
}

pub fn stats(conn: &Connection) -> KitchenResult<OutboxStats> {
    let mut out = OutboxStats::default();
    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM outbox GROUP BY status")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
    for row in rows {
        let (status, count) = row?;
        match status.as_str() {
            "pending" => out.pending = count,
            "delivered" => out.delivered = count,
            "failed" => out.failed = count,
            "skipped" => out.skipped = count,
            _ => {}
        }
    }
    out.last_error = conn
        .query_row(
            "SELECT last_error FROM outbox
             WHERE last_error IS NOT NULL AND status IN ('pending', 'failed')
             ORDER BY updated_at DESC, id DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()?;
    Ok(out)
}

/// Put failed rows back in the queue with a fresh retry budget.
pub fn retry_failed(conn: &Connection) -> KitchenResult<usize> {
    let count = conn.execute(
        "UPDATE outbox
         SET status = 'pending', retry_count = 0, retry_delay_ms = ?1,
             next_retry_at = NULL, updated_at = ?2
         WHERE status = 'failed'",
        params![DEFAULT_RETRY_DELAY_MS, timestamp_now()],
    )?;
    if count > 0 {
        info!(count, "Requeued failed outbox entries");
    }
    Ok(count)
}

// ---------------------------------------------------------------------------
// Worker
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub attempted: usize,
    pub delivered: usize,
    pub retrying: usize,
    pub deferred: usize,
    pub failed: usize,
    pub skipped: usize,
}

pub struct OutboxWorker<T> {
    db: Arc<DbState>,
    transport: T,
    batch_size: usize,
    interval: Duration,
}

impl<T: WebhookTransport + 'static> OutboxWorker<T> {
    pub fn new(db: Arc<DbState>, transport: T, batch_size: usize, interval: Duration) -> Self {
        Self {
            db,
            transport,
            batch_size: batch_size.max(1),
            interval,
        }
    }

    /// Run one delivery cycle over the rows that are due now.
    pub async fn deliver_due(&self) -> KitchenResult<DeliveryReport> {
        let batch = self.db.read(|conn| {
            let entries = due_entries(conn, self.batch_size)?;
            entries
                .into_iter()
                .map(|entry| {
                    let url = settings::webhook_url_for(conn, entry.topic.webhook_target())?;
                    Ok((entry, url))
                })
                .collect::<KitchenResult<Vec<_>>>()
        })?;

        let mut report = DeliveryReport::default();
        for (entry, url) in batch {
            let Some(url) = url else {
                self.db.read(|conn| {
                    mark_skipped(conn, entry.id, "no webhook URL configured")
                })?;
                report.skipped += 1;
                continue;
            };

            report.attempted += 1;
            let result = self.transport.post(&url, &entry.payload).await;
            match result {
                Ok(status) => {
                    self.db.read(|conn| mark_delivered(conn, entry.id, status))?;
                    report.delivered += 1;
                }
                Err(error) => {
                    let outcome = self.db.read(|conn| mark_attempt_failed(conn, &entry, &error))?;
                    warn!(
                        outbox_id = entry.id,
                        topic = entry.topic.as_str(),
                        entity_id = %entry.entity_id,
                        retry_count = entry.retry_count + 1,
                        outcome = ?outcome,
                        error = %error,
                        "Webhook delivery failed"
                    );
                    match outcome {
                        FailureOutcome::Deferred => report.deferred += 1,
                        FailureOutcome::Retrying => report.retrying += 1,
                        FailureOutcome::Failed => report.failed += 1,
                    }
                }
            }
        }
        Ok(report)
    }

    /// Deliver on a fixed interval until `shutdown` is cancelled.
    pub async fn run(self, shutdown: CancellationToken) {
        info!(
            interval_secs = self.interval.as_secs(),
            batch_size = self.batch_size,
            "Outbox worker started"
        );
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Outbox worker stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match self.deliver_due().await {
                        Ok(report) if report.attempted > 0 || report.skipped > 0 => {
                            info!(
                                attempted = report.attempted,
                                delivered = report.delivered,
                                retrying = report.retrying,
                                failed = report.failed,
                                skipped = report.skipped,
                                "Outbox cycle complete"
                            );
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Outbox cycle failed: {e}"),
                    }
                }
            }
        }
    }
}
