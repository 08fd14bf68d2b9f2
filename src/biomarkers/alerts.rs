//! User-configured threshold alerts. The triggered flag is a pure predicate
//! recomputed on every read, never persisted.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::merge::parse_value;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AlertConfig {
    pub name: String,
    pub enabled: bool,
    pub threshold_below: Option<f64>,
    pub threshold_above: Option<f64>,
}

/// Triggered iff enabled, the current value is numeric, and a set threshold
/// is breached. Non-numeric values fail closed.
pub fn triggered(current_value: &str, alert: &AlertConfig) -> bool {
    if !alert.enabled {
        return false;
    }
    let Some(value) = parse_value(current_value) else {
        return false;
    };
    alert.threshold_below.is_some_and(|t| value < t)
        || alert.threshold_above.is_some_and(|t| value > t)
}

pub async fn get(db: &PgPool, user_id: Uuid, name: &str) -> anyhow::Result<Option<AlertConfig>> {
    let alert = sqlx::query_as::<_, AlertConfig>(
        r#"
        SELECT name, enabled, threshold_below, threshold_above
        FROM biomarker_alerts
        WHERE user_id = $1 AND name = $2
        "#,
    )
    .bind(user_id)
    .bind(name)
    .fetch_optional(db)
    .await?;
    Ok(alert)
}

pub async fn list(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<AlertConfig>> {
    let rows = sqlx::query_as::<_, AlertConfig>(
        r#"
        SELECT name, enabled, threshold_below, threshold_above
        FROM biomarker_alerts
        WHERE user_id = $1
        ORDER BY name ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn upsert(
    db: &PgPool,
    user_id: Uuid,
    alert: &AlertConfig,
) -> anyhow::Result<AlertConfig> {
    let saved = sqlx::query_as::<_, AlertConfig>(
        r#"
        INSERT INTO biomarker_alerts (user_id, name, enabled, threshold_below, threshold_above)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (user_id, name) DO UPDATE SET
            enabled = EXCLUDED.enabled,
            threshold_below = EXCLUDED.threshold_below,
            threshold_above = EXCLUDED.threshold_above
        RETURNING name, enabled, threshold_below, threshold_above
        "#,
    )
    .bind(user_id)
    .bind(&alert.name)
    .bind(alert.enabled)
    .bind(alert.threshold_below)
    .bind(alert.threshold_above)
    .fetch_one(db)
    .await?;
    Ok(saved)
}

pub async fn delete_all(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM biomarker_alerts WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert(enabled: bool, below: Option<f64>, above: Option<f64>) -> AlertConfig {
        AlertConfig {
            name: "Glucose".into(),
            enabled,
            threshold_below: below,
            threshold_above: above,
        }
    }

    #[test]
    fn below_threshold_triggers() {
        assert!(triggered("5", &alert(true, Some(10.0), None)));
        assert!(!triggered("15", &alert(true, Some(10.0), None)));
    }

    #[test]
    fn above_threshold_triggers() {
        assert!(triggered("12", &alert(true, None, Some(10.0))));
        assert!(!triggered("10", &alert(true, None, Some(10.0))));
    }

    #[test]
    fn disabled_alert_never_triggers() {
        assert!(!triggered("5", &alert(false, Some(10.0), Some(1.0))));
    }

    #[test]
    fn non_numeric_value_fails_closed() {
        assert!(!triggered("abc", &alert(true, Some(10.0), Some(1.0))));
    }

    #[test]
    fn enabled_without_thresholds_never_triggers() {
        assert!(!triggered("5", &alert(true, None, None)));
    }

    #[test]
    fn both_thresholds_form_a_band() {
        let a = alert(true, Some(4.0), Some(6.0));
        assert!(triggered("3.5", &a));
        assert!(triggered("6.5", &a));
        assert!(!triggered("5.0", &a));
    }
}
