use sqlx::{types::Json, FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, FromRow)]
pub struct HealthProfile {
    pub user_id: Uuid,
    pub age: Option<i32>,
    pub sex: Option<String>,
    pub height_cm: Option<f64>,
    pub weight_kg: Option<f64>,
    pub activity_level: Option<String>,
    pub goals: Json<Vec<String>>,
    pub diet: Option<String>,
    pub conditions: Option<String>,
    pub allergies: Option<String>,
    pub supplements: Option<String>,
    pub updated_at: OffsetDateTime,
}

impl HealthProfile {
    /// Complete iff age is present.
    pub fn is_complete(&self) -> bool {
        self.age.is_some()
    }
}

pub async fn get(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<HealthProfile>> {
    let profile = sqlx::query_as::<_, HealthProfile>(
        r#"
        SELECT user_id, age, sex, height_cm, weight_kg, activity_level, goals,
               diet, conditions, allergies, supplements, updated_at
        FROM health_profiles
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(profile)
}

/// Completeness flag without pulling the whole document.
pub async fn is_complete(db: &PgPool, user_id: Uuid) -> anyhow::Result<bool> {
    let complete = sqlx::query_scalar::<_, bool>(
        r#"SELECT age IS NOT NULL FROM health_profiles WHERE user_id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(complete.unwrap_or(false))
}

#[allow(clippy::too_many_arguments)]
pub async fn upsert(
    db: &PgPool,
    user_id: Uuid,
    age: Option<i32>,
    sex: Option<&str>,
    height_cm: Option<f64>,
    weight_kg: Option<f64>,
    activity_level: Option<&str>,
    goals: &[String],
    diet: Option<&str>,
    conditions: Option<&str>,
    allergies: Option<&str>,
    supplements: Option<&str>,
) -> anyhow::Result<HealthProfile> {
    let profile = sqlx::query_as::<_, HealthProfile>(
        r#"
        INSERT INTO health_profiles
            (user_id, age, sex, height_cm, weight_kg, activity_level, goals,
             diet, conditions, allergies, supplements, updated_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
        ON CONFLICT (user_id) DO UPDATE SET
            age = EXCLUDED.age,
            sex = EXCLUDED.sex,
            height_cm = EXCLUDED.height_cm,
            weight_kg = EXCLUDED.weight_kg,
            activity_level = EXCLUDED.activity_level,
            goals = EXCLUDED.goals,
            diet = EXCLUDED.diet,
            conditions = EXCLUDED.conditions,
            allergies = EXCLUDED.allergies,
            supplements = EXCLUDED.supplements,
            updated_at = now()
        RETURNING user_id, age, sex, height_cm, weight_kg, activity_level, goals,
                  diet, conditions, allergies, supplements, updated_at
        "#,
    )
    .bind(user_id)
    .bind(age)
    .bind(sex)
    .bind(height_cm)
    .bind(weight_kg)
    .bind(activity_level)
    .bind(Json(goals.to_vec()))
    .bind(diet)
    .bind(conditions)
    .bind(allergies)
    .bind(supplements)
    .fetch_one(db)
    .await?;
    Ok(profile)
}

pub async fn delete_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM health_profiles WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_age(age: Option<i32>) -> HealthProfile {
        HealthProfile {
            user_id: Uuid::new_v4(),
            age,
            sex: None,
            height_cm: None,
            weight_kg: None,
            activity_level: None,
            goals: Json(vec![]),
            diet: None,
            conditions: None,
            allergies: None,
            supplements: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn completeness_follows_age() {
        assert!(!profile_with_age(None).is_complete());
        assert!(profile_with_age(Some(34)).is_complete());
    }
}
