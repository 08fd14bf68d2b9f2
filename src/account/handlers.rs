use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::{delete, get},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::{auth::extractors::AuthUser, state::AppState};

use super::services::{self, ExportDump};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/account/export", get(export))
        .route("/account/data", delete(wipe))
}

/// Full dump, served as a file download.
#[instrument(skip(state))]
pub async fn export(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<(HeaderMap, Json<ExportDump>), (StatusCode, String)> {
    let dump = services::export_user_data(&state, user_id)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "export failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_DISPOSITION,
        "attachment; filename=\"labmind-export.json\"".parse().unwrap(),
    );

    info!(user_id = %user_id, "account data exported");
    Ok((headers, Json(dump)))
}

#[instrument(skip(state))]
pub async fn wipe(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<StatusCode, (StatusCode, String)> {
    services::wipe_user_data(&state, user_id).await.map_err(|e| {
        error!(error = %e, user_id = %user_id, "wipe failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    info!(user_id = %user_id, "account data wiped");
    Ok(StatusCode::NO_CONTENT)
}
