use anyhow::Result;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::domain::event::BlockEntry;

#[derive(Clone)]
pub struct BlockListRepo {
    pub pool: PgPool,
}

impl BlockListRepo {
    // Read fresh on every admission; block-list changes apply immediately.
    pub async fn is_blocked(&self, ip: &str, user_id: Option<Uuid>) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM block_list
                WHERE ip = $1 OR ($2::uuid IS NOT NULL AND user_id = $2)
            ) AS blocked
            "#,
        )
        .bind(ip)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.get("blocked"))
    }

    pub async fn insert(&self, ip: Option<&str>, user_id: Option<Uuid>) -> Result<BlockEntry> {
        let row = sqlx::query(
            r#"
            INSERT INTO block_list (ip, user_id)
            VALUES ($1, $2)
            RETURNING *
            "#,
        )
        .bind(ip)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(map_entry(&row))
    }

    pub async fn remove(&self, ip: Option<&str>, user_id: Option<Uuid>) -> Result<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM block_list
            WHERE ($1::text IS NOT NULL AND ip = $1)
               OR ($2::uuid IS NOT NULL AND user_id = $2)
            "#,
        )
        .bind(ip)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

fn map_entry(r: &PgRow) -> BlockEntry {
    BlockEntry {
        id: r.get("id"),
        ip: r.get("ip"),
        user_id: r.get("user_id"),
        created_at: r.get("created_at"),
    }
}
