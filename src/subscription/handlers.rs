use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::{Duration, OffsetDateTime};
use tracing::{error, info, instrument};

use crate::{auth::extractors::AuthUser, retry, state::AppState};

use super::menu::{self, MenuItem};
use super::repo;

/// Simulated grant length; there is no payment backend behind this endpoint.
const GRANT_DAYS: i64 = 30;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/subscription", get(get_subscription))
        .route("/subscription/activate", post(activate))
        .route("/menu", get(get_menu))
}

#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    pub plan: &'static str,
    pub expires_at: Option<OffsetDateTime>,
}

#[derive(Debug, Serialize)]
pub struct MenuResponse {
    pub plan: &'static str,
    pub items: Vec<&'static MenuItem>,
}

#[instrument(skip(state))]
pub async fn get_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SubscriptionResponse>, (StatusCode, String)> {
    let sub = retry::with_retry("subscription.get", || repo::get(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "load subscription failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    Ok(Json(SubscriptionResponse {
        plan: sub.active_plan(OffsetDateTime::now_utc()).as_str(),
        expires_at: sub.expires_at,
    }))
}

#[instrument(skip(state))]
pub async fn activate(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<SubscriptionResponse>, (StatusCode, String)> {
    let expires_at = OffsetDateTime::now_utc() + Duration::days(GRANT_DAYS);
    let sub = repo::grant_pro(&state.db, user_id, Some(expires_at))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "grant pro failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    info!(user_id = %user_id, expires_at = %expires_at, "pro subscription granted");
    Ok(Json(SubscriptionResponse {
        plan: sub.plan.as_str(),
        expires_at: sub.expires_at,
    }))
}

#[instrument(skip(state))]
pub async fn get_menu(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<MenuResponse>, (StatusCode, String)> {
    let sub = retry::with_retry("menu.subscription", || repo::get(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "load subscription failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    let plan = sub.active_plan(OffsetDateTime::now_utc());
    Ok(Json(MenuResponse {
        plan: plan.as_str(),
        items: menu::visible_for(plan),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::repo::Plan;

    #[test]
    fn menu_response_serializes_items() {
        let response = MenuResponse {
            plan: Plan::Free.as_str(),
            items: menu::visible_for(Plan::Free),
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"plan\":\"free\""));
        assert!(json.contains("dashboard"));
        assert!(!json.contains("meditations"));
    }
}
