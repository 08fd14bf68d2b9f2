use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::BloodTestAnalysis;

/// Immutable once inserted; edits happen before saving, never after.
#[derive(Debug, Clone, FromRow)]
pub struct TestRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub taken_at: OffsetDateTime,
    pub analysis: Json<BloodTestAnalysis>,
}

pub async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    id: Uuid,
    user_id: Uuid,
    taken_at: OffsetDateTime,
    analysis: &BloodTestAnalysis,
) -> anyhow::Result<TestRecord> {
    let record = sqlx::query_as::<_, TestRecord>(
        r#"
        INSERT INTO test_records (id, user_id, taken_at, analysis)
        VALUES ($1, $2, $3, $4)
        RETURNING id, user_id, taken_at, analysis
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(taken_at)
    .bind(Json(analysis))
    .fetch_one(&mut **tx)
    .await?;
    Ok(record)
}

pub async fn list_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<TestRecord>> {
    let rows = sqlx::query_as::<_, TestRecord>(
        r#"
        SELECT id, user_id, taken_at, analysis
        FROM test_records
        WHERE user_id = $1
        ORDER BY taken_at DESC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<Option<TestRecord>> {
    let record = sqlx::query_as::<_, TestRecord>(
        r#"
        SELECT id, user_id, taken_at, analysis
        FROM test_records
        WHERE id = $1 AND user_id = $2
        "#,
    )
    .bind(id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(record)
}

pub async fn delete_all(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM test_records WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
