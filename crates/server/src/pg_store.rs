//! PostgreSQL implementation of the attack, rule and notification stores.
//!
//! Predicates are translated into SQL with `QueryBuilder`; the cooldown
//! compare-and-set and the dedup-aware notification insert are single
//! statements, so they stay atomic across processes sharing the database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use attackwatch_core::{
    AttackEvent, AttackRef, DetailMap, GeoLocation, Notification, NotificationRule, RuleId,
    RuleInput, VOLUME_SENTINEL,
};
use attackwatch_rules::{
    AttackPage, AttackPredicate, AttackStatistics, EventStore, NotificationStore, RuleStore,
    StoreError, StoreResult,
};

const ATTACK_COLUMNS: &str = "id, attack_type, severity, \
     source_latitude, source_longitude, source_country, \
     destination_latitude, destination_longitude, destination_country, \
     \"timestamp\", additional_details";

const RULE_COLUMNS: &str = "id, name, attack_type, country, min_severity, max_severity, \
     active, threshold_count, time_window_minutes, cooldown_minutes, \
     last_triggered_at, created_at";

/// Rows per multi-row INSERT, well under the bind parameter limit.
const INSERT_CHUNK: usize = 1_000;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn db_error(e: sqlx::Error) -> StoreError {
    match e {
        sqlx::Error::Decode(_) | sqlx::Error::ColumnDecode { .. } => {
            StoreError::InvalidData(e.to_string())
        }
        other => StoreError::Unavailable(other.to_string()),
    }
}

// ── Rows ────────────────────────────────────────────────────────────

#[derive(Debug, sqlx::FromRow)]
struct AttackRow {
    id: Uuid,
    attack_type: String,
    severity: i32,
    source_latitude: f64,
    source_longitude: f64,
    source_country: String,
    destination_latitude: f64,
    destination_longitude: f64,
    destination_country: String,
    timestamp: DateTime<Utc>,
    additional_details: Json<DetailMap>,
}

impl From<AttackRow> for AttackEvent {
    fn from(row: AttackRow) -> Self {
        AttackEvent {
            id: row.id,
            attack_type: row.attack_type,
            severity: row.severity,
            source: GeoLocation {
                latitude: row.source_latitude,
                longitude: row.source_longitude,
                country: row.source_country,
            },
            destination: GeoLocation {
                latitude: row.destination_latitude,
                longitude: row.destination_longitude,
                country: row.destination_country,
            },
            timestamp: row.timestamp,
            extra: row.additional_details.0,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct RuleRow {
    id: Uuid,
    name: String,
    attack_type: Option<String>,
    country: Option<String>,
    min_severity: Option<i32>,
    max_severity: Option<i32>,
    active: bool,
    threshold_count: Option<i32>,
    time_window_minutes: Option<i32>,
    cooldown_minutes: Option<i32>,
    last_triggered_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RuleRow> for NotificationRule {
    fn from(row: RuleRow) -> Self {
        NotificationRule {
            id: row.id,
            name: row.name,
            attack_type: row.attack_type,
            country: row.country,
            min_severity: row.min_severity,
            max_severity: row.max_severity,
            active: row.active,
            threshold_count: row.threshold_count,
            time_window_minutes: row.time_window_minutes,
            cooldown_minutes: row.cooldown_minutes,
            last_triggered_at: row.last_triggered_at,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    rule_name: String,
    attack_id: String,
    triggered_at: DateTime<Utc>,
    details: Json<DetailMap>,
}

impl From<NotificationRow> for Notification {
    fn from(row: NotificationRow) -> Self {
        Notification {
            id: row.id,
            rule_name: row.rule_name,
            attack_id: AttackRef::from(row.attack_id),
            triggered_at: row.triggered_at,
            details: row.details.0,
        }
    }
}

// ── Predicate translation ───────────────────────────────────────────

fn push_predicate(qb: &mut QueryBuilder<'_, Postgres>, predicate: &AttackPredicate) {
    qb.push(" WHERE TRUE");
    if let Some(t) = &predicate.attack_type {
        qb.push(" AND attack_type = ").push_bind(t.clone());
    }
    if let Some(c) = &predicate.country {
        qb.push(" AND (source_country = ")
            .push_bind(c.clone())
            .push(" OR destination_country = ")
            .push_bind(c.clone())
            .push(")");
    }
    if let Some(min) = predicate.min_severity {
        qb.push(" AND severity >= ").push_bind(min);
    }
    if let Some(max) = predicate.max_severity {
        qb.push(" AND severity <= ").push_bind(max);
    }
    if let Some(since) = predicate.since {
        qb.push(" AND \"timestamp\" >= ").push_bind(since);
    }
    if let Some(until) = predicate.until {
        qb.push(" AND \"timestamp\" <= ").push_bind(until);
    }
}

// ── Events ──────────────────────────────────────────────────────────

#[async_trait]
impl EventStore for PgStore {
    async fn find(&self, predicate: &AttackPredicate) -> StoreResult<Vec<AttackEvent>> {
        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM attacks", ATTACK_COLUMNS));
        push_predicate(&mut qb, predicate);

        let rows: Vec<AttackRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(AttackEvent::from).collect())
    }

    async fn page(
        &self,
        predicate: &AttackPredicate,
        offset: usize,
        limit: usize,
    ) -> StoreResult<AttackPage> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM attacks");
        push_predicate(&mut count, predicate);
        let total: i64 = count
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;

        let mut qb = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM attacks", ATTACK_COLUMNS));
        push_predicate(&mut qb, predicate);
        qb.push(" ORDER BY \"timestamp\" DESC LIMIT ")
            .push_bind(limit as i64)
            .push(" OFFSET ")
            .push_bind(offset as i64);

        let rows: Vec<AttackRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        Ok(AttackPage {
            total: total.max(0) as usize,
            items: rows.into_iter().map(AttackEvent::from).collect(),
        })
    }

    async fn insert_many(&self, events: &[AttackEvent]) -> StoreResult<usize> {
        let mut inserted = 0u64;
        for chunk in events.chunks(INSERT_CHUNK) {
            let mut qb = QueryBuilder::<Postgres>::new(format!("INSERT INTO attacks ({}) ", ATTACK_COLUMNS));
            qb.push_values(chunk, |mut row, e| {
                row.push_bind(e.id)
                    .push_bind(e.attack_type.clone())
                    .push_bind(e.severity)
                    .push_bind(e.source.latitude)
                    .push_bind(e.source.longitude)
                    .push_bind(e.source.country.clone())
                    .push_bind(e.destination.latitude)
                    .push_bind(e.destination.longitude)
                    .push_bind(e.destination.country.clone())
                    .push_bind(e.timestamp)
                    .push_bind(Json(e.extra.clone()));
            });
            qb.push(" ON CONFLICT (id) DO NOTHING");

            let result = qb.build().execute(&self.pool).await.map_err(db_error)?;
            inserted += result.rows_affected();
        }
        Ok(inserted as usize)
    }

    async fn statistics(&self) -> StoreResult<AttackStatistics> {
        let countries = sqlx::query_as::<_, (String, i64)>(
            "SELECT country, COUNT(*) FROM (
                 SELECT source_country AS country FROM attacks
                 UNION ALL
                 SELECT destination_country AS country FROM attacks
             ) endpoints GROUP BY country",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let types = sqlx::query_as::<_, (String, i64)>(
            "SELECT attack_type, COUNT(*) FROM attacks GROUP BY attack_type",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let severities = sqlx::query_as::<_, (i32, i64)>(
            "SELECT severity, COUNT(*) FROM attacks GROUP BY severity",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(AttackStatistics {
            by_country: countries.into_iter().map(|(k, n)| (k, n as u64)).collect(),
            by_attack_type: types.into_iter().map(|(k, n)| (k, n as u64)).collect(),
            by_severity: severities.into_iter().map(|(k, n)| (k, n as u64)).collect(),
        })
    }
}

// ── Rules ───────────────────────────────────────────────────────────

#[async_trait]
impl RuleStore for PgStore {
    async fn list_active(&self) -> StoreResult<Vec<NotificationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {} FROM notification_rules WHERE active ORDER BY created_at",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(NotificationRule::from).collect())
    }

    async fn update_last_triggered(
        &self,
        rule_id: RuleId,
        expected: Option<DateTime<Utc>>,
        at: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_rules SET last_triggered_at = $1
             WHERE id = $2 AND last_triggered_at IS NOT DISTINCT FROM $3",
        )
        .bind(at)
        .bind(rule_id)
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn release_last_triggered(
        &self,
        rule_id: RuleId,
        claimed: DateTime<Utc>,
        previous: Option<DateTime<Utc>>,
    ) -> StoreResult<bool> {
        let result = sqlx::query(
            "UPDATE notification_rules SET last_triggered_at = $1
             WHERE id = $2 AND last_triggered_at = $3",
        )
        .bind(previous)
        .bind(rule_id)
        .bind(claimed)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_all(&self) -> StoreResult<Vec<NotificationRule>> {
        let rows = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {} FROM notification_rules ORDER BY created_at DESC",
            RULE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(rows.into_iter().map(NotificationRule::from).collect())
    }

    async fn get(&self, rule_id: RuleId) -> StoreResult<Option<NotificationRule>> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "SELECT {} FROM notification_rules WHERE id = $1",
            RULE_COLUMNS
        ))
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(NotificationRule::from))
    }

    async fn create(&self, rule: NotificationRule) -> StoreResult<NotificationRule> {
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "INSERT INTO notification_rules ({cols})
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {cols}",
            cols = RULE_COLUMNS
        ))
        .bind(rule.id)
        .bind(&rule.name)
        .bind(&rule.attack_type)
        .bind(&rule.country)
        .bind(rule.min_severity)
        .bind(rule.max_severity)
        .bind(rule.active)
        .bind(rule.threshold_count)
        .bind(rule.time_window_minutes)
        .bind(rule.cooldown_minutes)
        .bind(rule.last_triggered_at)
        .bind(rule.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.into())
    }

    async fn update(
        &self,
        rule_id: RuleId,
        input: RuleInput,
    ) -> StoreResult<Option<NotificationRule>> {
        let input = input.normalized();
        let row = sqlx::query_as::<_, RuleRow>(&format!(
            "UPDATE notification_rules SET
                 name = $2, attack_type = $3, country = $4,
                 min_severity = $5, max_severity = $6, active = $7,
                 threshold_count = $8, time_window_minutes = $9, cooldown_minutes = $10
             WHERE id = $1
             RETURNING {}",
            RULE_COLUMNS
        ))
        .bind(rule_id)
        .bind(&input.name)
        .bind(&input.attack_type)
        .bind(&input.country)
        .bind(input.min_severity)
        .bind(input.max_severity)
        .bind(input.active)
        .bind(input.threshold_count)
        .bind(input.time_window_minutes)
        .bind(input.cooldown_minutes)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(NotificationRule::from))
    }

    async fn delete(&self, rule_id: RuleId) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM notification_rules WHERE id = $1")
            .bind(rule_id)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() > 0)
    }
}

// ── Notifications ───────────────────────────────────────────────────

#[async_trait]
impl NotificationStore for PgStore {
    async fn exists(&self, rule_name: &str, attack_id: &AttackRef) -> StoreResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM notifications WHERE rule_name = $1 AND attack_id = $2)",
        )
        .bind(rule_name)
        .bind(attack_id.to_string())
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)
    }

    async fn insert(&self, notification: &Notification) -> StoreResult<bool> {
        // The conflict target must repeat the partial index predicate.
        let sql = format!(
            "INSERT INTO notifications (id, rule_name, attack_id, triggered_at, details)
             VALUES ($1, $2, $3, $4, $5)
             ON CONFLICT (rule_name, attack_id) WHERE attack_id <> '{}' DO NOTHING",
            VOLUME_SENTINEL
        );
        let result = sqlx::query(&sql)
            .bind(notification.id)
            .bind(&notification.rule_name)
            .bind(notification.attack_id.to_string())
            .bind(notification.triggered_at)
            .bind(Json(notification.details.clone()))
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(result.rows_affected() == 1)
    }

    async fn list(
        &self,
        rule_name: Option<&str>,
        limit: usize,
    ) -> StoreResult<Vec<Notification>> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, rule_name, attack_id, triggered_at, details FROM notifications",
        );
        if let Some(name) = rule_name {
            qb.push(" WHERE rule_name = ").push_bind(name.to_string());
        }
        qb.push(" ORDER BY triggered_at DESC LIMIT ")
            .push_bind(limit as i64);

        let rows: Vec<NotificationRow> = qb
            .build_query_as()
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(rows.into_iter().map(Notification::from).collect())
    }
}
