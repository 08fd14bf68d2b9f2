use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::RecommendationBundle;

use super::merge::MergedBiomarker;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
}

impl Trend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Up => "up",
            Trend::Down => "down",
            Trend::Stable => "stable",
        }
    }

    pub fn parse(s: &str) -> Trend {
        match s {
            "up" => Trend::Up,
            "down" => Trend::Down,
            _ => Trend::Stable,
        }
    }
}

/// One point of a biomarker's time series. Only numeric readings land here;
/// the date order is append order and therefore non-decreasing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HistoryEntry {
    pub value: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_test_id: Option<Uuid>,
}

/// One tracked biomarker: last-write-wins current fields plus the full
/// unpruned history.
#[derive(Debug, Clone, FromRow)]
pub struct Biomarker {
    pub user_id: Uuid,
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub ref_range: Option<String>,
    pub description: Option<String>,
    pub trend: String,
    pub history: Json<Vec<HistoryEntry>>,
    pub recommendations: Option<Json<RecommendationBundle>>,
    pub updated_at: OffsetDateTime,
}

pub async fn get(db: &PgPool, user_id: Uuid, name: &str) -> anyhow::Result<Option<Biomarker>> {
    let biomarker = sqlx::query_as::<_, Biomarker>(
        r#"
        SELECT user_id, name, value, unit, status, ref_range, description, trend,
               history, recommendations, updated_at
        FROM biomarkers
        WHERE user_id = $1 AND name = $2
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(biomarker)
}

pub async fn list(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Biomarker>> {
    let rows = sqlx::query_as::<_, Biomarker>(
        r#"
        SELECT user_id, name, value, unit, status, ref_range, description, trend,
               history, recommendations, updated_at
        FROM biomarkers
        WHERE user_id = $1
        ORDER BY name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// Upsert one merged biomarker inside the save batch.
pub async fn upsert_tx(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    merged: &MergedBiomarker,
    recommendations: &RecommendationBundle,
    now: OffsetDateTime,
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO biomarkers
            (user_id, name, value, unit, status, ref_range, description, trend,
             history, recommendations, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (user_id, name) DO UPDATE SET
            value = EXCLUDED.value,
            unit = EXCLUDED.unit,
            status = EXCLUDED.status,
            ref_range = EXCLUDED.ref_range,
            description = EXCLUDED.description,
            trend = EXCLUDED.trend,
            history = EXCLUDED.history,
            recommendations = EXCLUDED.recommendations,
            updated_at = EXCLUDED.updated_at
        "#,
    )
    .bind(user_id)
    .bind(&merged.name)
    .bind(&merged.value)
    .bind(&merged.unit)
    .bind(&merged.status)
    .bind(&merged.ref_range)
    .bind(&merged.description)
    .bind(merged.trend.as_str())
    .bind(Json(&merged.history))
    .bind(Json(recommendations))
    .bind(now)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn delete_all(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM biomarkers WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
