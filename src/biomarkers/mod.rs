pub mod alerts;
pub mod dto;
pub mod handlers;
pub mod merge;
pub mod repo;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    Router::new().merge(handlers::routes())
}
