use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{auth::extractors::AuthUser, retry, state::AppState};

use super::dto::{ProfileResponse, PutProfileRequest, MAX_GOALS};
use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile))
        .route("/profile", put(put_profile))
}

fn validate(payload: &PutProfileRequest) -> Result<(), String> {
    if let Some(age) = payload.age {
        if age <= 0 {
            return Err("age must be positive".into());
        }
    }
    if matches!(payload.height_cm, Some(h) if h <= 0.0) {
        return Err("height must be positive".into());
    }
    if matches!(payload.weight_kg, Some(w) if w <= 0.0) {
        return Err("weight must be positive".into());
    }
    if payload.goals.len() > MAX_GOALS {
        return Err(format!("at most {} goals", MAX_GOALS));
    }
    if payload.goals.iter().any(|g| g.trim().is_empty()) {
        return Err("goals must be non-empty".into());
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    let profile = retry::with_retry("profile.get", || repo::get(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "load profile failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or((StatusCode::NOT_FOUND, "Profile not set".to_string()))?;

    Ok(Json(ProfileResponse::from(profile)))
}

/// Whole-document replace; the multi-step form submits everything at once.
#[instrument(skip(state, payload))]
pub async fn put_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PutProfileRequest>,
) -> Result<Json<ProfileResponse>, (StatusCode, String)> {
    if let Err(msg) = validate(&payload) {
        return Err((StatusCode::BAD_REQUEST, msg));
    }

    let profile = repo::upsert(
        &state.db,
        user_id,
        payload.age,
        payload.sex.as_deref(),
        payload.height_cm,
        payload.weight_kg,
        payload.activity_level.map(|a| a.as_str()),
        &payload.goals,
        payload.diet.as_deref(),
        payload.conditions.as_deref(),
        payload.allergies.as_deref(),
        payload.supplements.as_deref(),
    )
    .await
    .map_err(|e| {
        error!(error = %e, user_id = %user_id, "save profile failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(user_id = %user_id, complete = profile.is_complete(), "profile saved");
    Ok(Json(ProfileResponse::from(profile)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::dto::ActivityLevel;

    fn empty_payload() -> PutProfileRequest {
        PutProfileRequest {
            age: None,
            sex: None,
            height_cm: None,
            weight_kg: None,
            activity_level: None,
            goals: vec![],
            diet: None,
            conditions: None,
            allergies: None,
            supplements: None,
        }
    }

    #[test]
    fn rejects_non_positive_required_fields() {
        let mut p = empty_payload();
        p.age = Some(0);
        assert!(validate(&p).is_err());
        p.age = Some(34);
        p.weight_kg = Some(-1.0);
        assert!(validate(&p).is_err());
    }

    #[test]
    fn caps_goals_at_three() {
        let mut p = empty_payload();
        p.goals = vec!["a".into(), "b".into(), "c".into()];
        assert!(validate(&p).is_ok());
        p.goals.push("d".into());
        assert!(validate(&p).is_err());
    }

    #[test]
    fn activity_level_roundtrip() {
        for level in [
            ActivityLevel::Sedentary,
            ActivityLevel::Light,
            ActivityLevel::Moderate,
            ActivityLevel::Active,
            ActivityLevel::VeryActive,
        ] {
            assert_eq!(ActivityLevel::parse(level.as_str()), Some(level));
        }
        assert_eq!(ActivityLevel::parse("extreme"), None);
    }
}
