use std::collections::HashMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{auth::extractors::AuthUser, retry, state::AppState};

use super::alerts::{self, AlertConfig};
use super::dto::{AlertView, BiomarkerView, PutAlertRequest};
use super::repo;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/biomarkers", get(list_biomarkers))
        .route("/biomarkers/:name", get(get_biomarker))
        .route("/biomarkers/:name/alert", put(put_alert))
        .route("/alerts", get(list_alerts))
}

#[instrument(skip(state))]
pub async fn list_biomarkers(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<BiomarkerView>>, (StatusCode, String)> {
    let rows = retry::with_retry("biomarkers.list", || repo::list(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "list biomarkers failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(rows.into_iter().map(BiomarkerView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_biomarker(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(name): Path<String>,
) -> Result<Json<BiomarkerView>, (StatusCode, String)> {
    let biomarker = retry::with_retry("biomarkers.get", || repo::get(&state.db, user_id, &name))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, name, "load biomarker failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or((StatusCode::NOT_FOUND, "Biomarker not found".to_string()))?;
    Ok(Json(BiomarkerView::from(biomarker)))
}

#[instrument(skip(state, payload))]
pub async fn put_alert(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(name): Path<String>,
    Json(payload): Json<PutAlertRequest>,
) -> Result<Json<AlertConfig>, (StatusCode, String)> {
    if name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Biomarker name required".into()));
    }

    let alert = AlertConfig {
        name,
        enabled: payload.enabled,
        threshold_below: payload.threshold_below,
        threshold_above: payload.threshold_above,
    };
    let saved = alerts::upsert(&state.db, user_id, &alert).await.map_err(|e| {
        error!(error = %e, user_id = %user_id, "save alert failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(user_id = %user_id, name = %saved.name, enabled = saved.enabled, "alert saved");
    Ok(Json(saved))
}

/// Alert page payload: configs and biomarkers load as an unordered parallel
/// pair, triggered state is evaluated per render.
#[instrument(skip(state))]
pub async fn list_alerts(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<AlertView>>, (StatusCode, String)> {
    let (configs, biomarkers) = tokio::try_join!(
        retry::with_retry("alerts.list", || alerts::list(&state.db, user_id)),
        retry::with_retry("alerts.biomarkers", || repo::list(&state.db, user_id)),
    )
    .map_err(|e| {
        error!(error = %e, user_id = %user_id, "load alerts failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let values: HashMap<&str, &str> = biomarkers
        .iter()
        .map(|b| (b.name.as_str(), b.value.as_str()))
        .collect();

    let views = configs
        .into_iter()
        .map(|config| {
            let current = values.get(config.name.as_str()).copied();
            let triggered = current
                .map(|value| alerts::triggered(value, &config))
                .unwrap_or(false);
            AlertView {
                name: config.name,
                enabled: config.enabled,
                threshold_below: config.threshold_below,
                threshold_above: config.threshold_above,
                current_value: current.map(str::to_string),
                triggered,
            }
        })
        .collect();

    Ok(Json(views))
}
