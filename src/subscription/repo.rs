use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Free,
    Pro,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Free => "free",
            Plan::Pro => "pro",
        }
    }

    pub fn parse(s: &str) -> Plan {
        match s {
            "pro" => Plan::Pro,
            _ => Plan::Free,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub plan: Plan,
    pub expires_at: Option<OffsetDateTime>,
}

impl Subscription {
    pub fn free() -> Self {
        Self {
            plan: Plan::Free,
            expires_at: None,
        }
    }

    /// Pro with a lapsed expiry counts as free.
    pub fn active_plan(&self, now: OffsetDateTime) -> Plan {
        match (self.plan, self.expires_at) {
            (Plan::Pro, Some(expires)) if expires <= now => Plan::Free,
            (plan, _) => plan,
        }
    }
}

#[derive(Debug, FromRow)]
struct SubscriptionRow {
    plan: String,
    expires_at: Option<OffsetDateTime>,
}

/// Missing row means the user never upgraded: free.
pub async fn get(db: &PgPool, user_id: Uuid) -> anyhow::Result<Subscription> {
    let row = sqlx::query_as::<_, SubscriptionRow>(
        r#"SELECT plan, expires_at FROM subscriptions WHERE user_id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;

    Ok(row
        .map(|r| Subscription {
            plan: Plan::parse(&r.plan),
            expires_at: r.expires_at,
        })
        .unwrap_or_else(Subscription::free))
}

pub async fn grant_pro(
    db: &PgPool,
    user_id: Uuid,
    expires_at: Option<OffsetDateTime>,
) -> anyhow::Result<Subscription> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (user_id, plan, expires_at)
        VALUES ($1, 'pro', $2)
        ON CONFLICT (user_id) DO UPDATE SET plan = 'pro', expires_at = EXCLUDED.expires_at
        "#,
    )
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await?;

    Ok(Subscription {
        plan: Plan::Pro,
        expires_at,
    })
}

pub async fn delete_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM subscriptions WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    #[test]
    fn lapsed_pro_reads_as_free() {
        let now = OffsetDateTime::now_utc();
        let sub = Subscription {
            plan: Plan::Pro,
            expires_at: Some(now - Duration::days(1)),
        };
        assert_eq!(sub.active_plan(now), Plan::Free);
    }

    #[test]
    fn open_ended_pro_stays_pro() {
        let now = OffsetDateTime::now_utc();
        let sub = Subscription {
            plan: Plan::Pro,
            expires_at: None,
        };
        assert_eq!(sub.active_plan(now), Plan::Pro);

        let sub = Subscription {
            plan: Plan::Pro,
            expires_at: Some(now + Duration::days(30)),
        };
        assert_eq!(sub.active_plan(now), Plan::Pro);
    }

    #[test]
    fn unknown_plan_string_parses_as_free() {
        assert_eq!(Plan::parse("enterprise"), Plan::Free);
        assert_eq!(Plan::parse("pro"), Plan::Pro);
    }
}
