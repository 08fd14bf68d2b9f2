use axum::{
    extract::{DefaultBodyLimit, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{ai::BloodTestAnalysis, auth::extractors::AuthUser, retry, state::AppState};

use super::dto::{AnalyzeTestRequest, SaveTestRequest, TestRecordView};
use super::repo;
use super::services::{self, SaveError};

const ANALYSIS_FALLBACK: &str =
    "We couldn't read this test image right now. Please try again in a moment.";
const RECOMMENDATION_FALLBACK: &str =
    "Your test couldn't be saved because recommendations are unavailable. Nothing was stored; please try again.";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tests/analyze", post(analyze_test))
        .route("/tests", post(save_test).get(list_tests))
        .route("/tests/:id", get(get_test))
        .layer(DefaultBodyLimit::max(20 * 1024 * 1024)) // 20MB report scans
}

/// Extraction only; nothing is persisted until the user saves.
#[instrument(skip(state, payload))]
pub async fn analyze_test(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<AnalyzeTestRequest>,
) -> Result<Json<BloodTestAnalysis>, (StatusCode, String)> {
    if payload.image.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "image is required".into()));
    }

    let analysis = match state
        .ai
        .analyze_blood_test(&payload.image, &payload.mime_type)
        .await
    {
        Ok(a) => a,
        Err(e) => {
            error!(error = %e, user_id = %user_id, "blood test analysis failed");
            return Err((StatusCode::BAD_GATEWAY, ANALYSIS_FALLBACK.into()));
        }
    };

    info!(user_id = %user_id, biomarkers = analysis.biomarkers.len(), "blood test analyzed");
    Ok(Json(analysis))
}

#[instrument(skip(state, payload))]
pub async fn save_test(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SaveTestRequest>,
) -> Result<(StatusCode, Json<TestRecordView>), (StatusCode, String)> {
    let record = match services::save_test(&state, user_id, payload.analysis).await {
        Ok(r) => r,
        Err(SaveError::Recommendation { name, source }) => {
            error!(error = %source, user_id = %user_id, biomarker = %name, "recommendation fetch failed");
            return Err((StatusCode::BAD_GATEWAY, RECOMMENDATION_FALLBACK.into()));
        }
        Err(SaveError::Store(e)) => {
            error!(error = %e, user_id = %user_id, "save test failed");
            return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
        }
    };

    info!(user_id = %user_id, record_id = %record.id, "blood test saved");
    Ok((StatusCode::CREATED, Json(TestRecordView::from(record))))
}

#[instrument(skip(state))]
pub async fn list_tests(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Vec<TestRecordView>>, (StatusCode, String)> {
    let rows = retry::with_retry("tests.list", || repo::list_by_user(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "list tests failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(rows.into_iter().map(TestRecordView::from).collect()))
}

#[instrument(skip(state))]
pub async fn get_test(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<TestRecordView>, (StatusCode, String)> {
    let record = retry::with_retry("tests.get", || repo::get(&state.db, user_id, id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, %id, "load test failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?
        .ok_or((StatusCode::NOT_FOUND, "Test not found".to_string()))?;
    Ok(Json(TestRecordView::from(record)))
}
