use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::event::{NewSuspiciousEvent, SuspiciousEvent};

#[derive(Clone)]
pub struct SuspiciousEventsRepo {
    pub pool: PgPool,
}

impl SuspiciousEventsRepo {
    pub async fn insert(&self, event: &NewSuspiciousEvent) -> Result<SuspiciousEvent> {
        let row = sqlx::query(
            r#"
            INSERT INTO suspicious_events (ip, user_id, user_agent, path, method, reason, score, meta)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&event.ip)
        .bind(event.user_id)
        .bind(&event.user_agent)
        .bind(&event.path)
        .bind(&event.method)
        .bind(event.reason.as_str())
        .bind(event.score)
        .bind(&event.meta)
        .fetch_one(&self.pool)
        .await?;

        Ok(map_event(&row))
    }

    pub async fn list(&self, q: Option<&str>, limit: i64, skip: i64) -> Result<Vec<SuspiciousEvent>> {
        let pattern = q.map(|q| format!("%{}%", q));
        let rows = sqlx::query(
            r#"
            SELECT * FROM suspicious_events
            WHERE ($1::text IS NULL OR reason ILIKE $1 OR path ILIKE $1 OR user_agent ILIKE $1 OR ip ILIKE $1)
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(pattern)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_event).collect())
    }

    pub async fn count(&self, q: Option<&str>) -> Result<i64> {
        let pattern = q.map(|q| format!("%{}%", q));
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM suspicious_events
            WHERE ($1::text IS NULL OR reason ILIKE $1 OR path ILIKE $1 OR user_agent ILIKE $1 OR ip ILIKE $1)
            "#,
        )
        .bind(pattern)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("cnt"))
    }

    pub async fn list_for_user(&self, user_id: Uuid, limit: i64, skip: i64) -> Result<Vec<SuspiciousEvent>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM suspicious_events
            WHERE user_id = $1 OR user_id IS NULL
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(skip)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(map_event).collect())
    }

    pub async fn count_for_user(&self, user_id: Uuid) -> Result<i64> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS cnt FROM suspicious_events
            WHERE user_id = $1 OR user_id IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("cnt"))
    }
}

fn map_event(r: &PgRow) -> SuspiciousEvent {
    SuspiciousEvent {
        id: r.get("id"),
        ip: r.get("ip"),
        user_id: r.get("user_id"),
        user_agent: r.get("user_agent"),
        path: r.get("path"),
        method: r.get("method"),
        reason: r.get("reason"),
        score: r.get("score"),
        meta: r.get("meta"),
        created_at: r.get("created_at"),
    }
}
