use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Redirect},
    routing::{get, put},
    Json, Router,
};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    auth::extractors::{AdminUser, AuthUser},
    retry,
    state::AppState,
    storage::meditation_audio_key,
};

use super::dto::{
    ArticleUpsertRequest, AudioSynthesisResponse, LikesResponse, MeditationUpsertRequest,
};
use super::repo::{self, Article, ContentError, Meditation};
use super::services::{self, AudioError};

const AUDIO_FALLBACK: &str =
    "Audio couldn't be generated right now. The script is saved; try again later.";
const PRESIGN_TTL_SECS: u64 = 10 * 60;

pub fn routes() -> Router<AppState> {
    Router::new()
        // likes before :id so the static segment wins
        .route("/articles/likes", get(list_likes))
        .route("/articles", get(list_articles).post(create_article))
        .route(
            "/articles/:id",
            get(get_article).put(update_article).delete(delete_article),
        )
        .route("/articles/:id/like", put(like_article).delete(unlike_article))
        .route("/meditations", get(list_meditations).post(create_meditation))
        .route(
            "/meditations/:id",
            get(get_meditation)
                .put(update_meditation)
                .delete(delete_meditation),
        )
        .route(
            "/meditations/:id/audio",
            get(get_meditation_audio).post(synthesize_audio),
        )
}

fn content_response(e: ContentError) -> (StatusCode, String) {
    match e {
        ContentError::PermissionDenied => (
            StatusCode::FORBIDDEN,
            "Shared content is not readable: backend permissions are misconfigured.".into(),
        ),
        ContentError::Other(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

fn internal(e: anyhow::Error) -> (StatusCode, String) {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

// --- articles ---

#[instrument(skip(state))]
pub async fn list_articles(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<Article>>, (StatusCode, String)> {
    let rows = retry::with_retry("articles.list", || repo::list_articles(&state.db))
        .await
        .map_err(|e| {
            error!(error = %e, "list articles failed");
            content_response(ContentError::from_store(e))
        })?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_article(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Article>, (StatusCode, String)> {
    let article = retry::with_retry("articles.get", || repo::get_article(&state.db, id))
        .await
        .map_err(|e| {
            error!(error = %e, %id, "load article failed");
            content_response(ContentError::from_store(e))
        })?
        .ok_or((StatusCode::NOT_FOUND, "Article not found".to_string()))?;
    Ok(Json(article))
}

#[instrument(skip(state, payload))]
pub async fn create_article(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(payload): Json<ArticleUpsertRequest>,
) -> Result<(StatusCode, Json<Article>), (StatusCode, String)> {
    if payload.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title required".into()));
    }
    let article = repo::insert_article(
        &state.db,
        &payload.title,
        &payload.category,
        &payload.summary,
        payload.image_url.as_deref(),
        &payload.content,
    )
    .await
    .map_err(internal)?;

    info!(admin_id = %admin_id, article_id = %article.id, "article created");
    Ok((StatusCode::CREATED, Json(article)))
}

#[instrument(skip(state, payload))]
pub async fn update_article(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<ArticleUpsertRequest>,
) -> Result<Json<Article>, (StatusCode, String)> {
    let article = repo::update_article(
        &state.db,
        id,
        &payload.title,
        &payload.category,
        &payload.summary,
        payload.image_url.as_deref(),
        &payload.content,
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "Article not found".to_string()))?;

    info!(admin_id = %admin_id, article_id = %article.id, "article updated");
    Ok(Json(article))
}

#[instrument(skip(state))]
pub async fn delete_article(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let deleted = repo::delete_article(&state.db, id).await.map_err(internal)?;
    if !deleted {
        return Err((StatusCode::NOT_FOUND, "Article not found".into()));
    }
    info!(admin_id = %admin_id, article_id = %id, "article deleted");
    Ok(StatusCode::NO_CONTENT)
}

// --- likes ---

#[instrument(skip(state))]
pub async fn like_article(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    repo::like_article(&state.db, user_id, id)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn unlike_article(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    repo::unlike_article(&state.db, user_id, id)
        .await
        .map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state))]
pub async fn list_likes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<LikesResponse>, (StatusCode, String)> {
    let article_ids = retry::with_retry("likes.list", || repo::list_likes(&state.db, user_id))
        .await
        .map_err(internal)?;
    Ok(Json(LikesResponse { article_ids }))
}

// --- meditations ---

#[instrument(skip(state))]
pub async fn list_meditations(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
) -> Result<Json<Vec<Meditation>>, (StatusCode, String)> {
    let rows = retry::with_retry("meditations.list", || repo::list_meditations(&state.db))
        .await
        .map_err(|e| {
            error!(error = %e, "list meditations failed");
            content_response(ContentError::from_store(e))
        })?;
    Ok(Json(rows))
}

#[instrument(skip(state))]
pub async fn get_meditation(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Meditation>, (StatusCode, String)> {
    let meditation = retry::with_retry("meditations.get", || repo::get_meditation(&state.db, id))
        .await
        .map_err(|e| {
            error!(error = %e, %id, "load meditation failed");
            content_response(ContentError::from_store(e))
        })?
        .ok_or((StatusCode::NOT_FOUND, "Meditation not found".to_string()))?;
    Ok(Json(meditation))
}

#[instrument(skip(state, payload))]
pub async fn create_meditation(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Json(payload): Json<MeditationUpsertRequest>,
) -> Result<(StatusCode, Json<Meditation>), (StatusCode, String)> {
    if payload.title.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "title required".into()));
    }
    let meditation = repo::insert_meditation(
        &state.db,
        &payload.title,
        &payload.category,
        &payload.summary,
        &payload.script,
    )
    .await
    .map_err(internal)?;

    info!(admin_id = %admin_id, meditation_id = %meditation.id, "meditation created");
    Ok((StatusCode::CREATED, Json(meditation)))
}

#[instrument(skip(state, payload))]
pub async fn update_meditation(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<MeditationUpsertRequest>,
) -> Result<Json<Meditation>, (StatusCode, String)> {
    let meditation = repo::update_meditation(
        &state.db,
        id,
        &payload.title,
        &payload.category,
        &payload.summary,
        &payload.script,
    )
    .await
    .map_err(internal)?
    .ok_or((StatusCode::NOT_FOUND, "Meditation not found".to_string()))?;

    info!(admin_id = %admin_id, meditation_id = %meditation.id, "meditation updated");
    Ok(Json(meditation))
}

#[instrument(skip(state))]
pub async fn delete_meditation(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, (StatusCode, String)> {
    let meditation = repo::delete_meditation(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Meditation not found".to_string()))?;

    // Stored audio goes with it; a failed object delete only leaves an
    // orphan blob, so log and move on.
    if meditation.audio_key.is_some() {
        if let Err(e) = state
            .storage
            .delete_object(&meditation_audio_key(meditation.id))
            .await
        {
            error!(error = %e, meditation_id = %id, "delete meditation audio failed");
        }
    }

    info!(admin_id = %admin_id, meditation_id = %id, "meditation deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 302 to a short-lived presigned URL for the synthesized track.
#[instrument(skip(state))]
pub async fn get_meditation_audio(
    State(state): State<AppState>,
    AuthUser(_user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> impl IntoResponse {
    let meditation = match retry::with_retry("meditations.audio", || {
        repo::get_meditation(&state.db, id)
    })
    .await
    {
        Ok(Some(m)) => m,
        Ok(None) => return (StatusCode::NOT_FOUND, "Meditation not found").into_response(),
        Err(e) => {
            error!(error = %e, %id, "load meditation failed");
            return content_response(ContentError::from_store(e)).into_response();
        }
    };

    let Some(key) = meditation.audio_key else {
        return (StatusCode::NOT_FOUND, "Audio not generated yet").into_response();
    };

    let Ok(url) = state.storage.presign_get(&key, PRESIGN_TTL_SECS).await else {
        return (StatusCode::INTERNAL_SERVER_ERROR, "presign failed").into_response();
    };

    Redirect::temporary(&url).into_response()
}

#[instrument(skip(state))]
pub async fn synthesize_audio(
    State(state): State<AppState>,
    AdminUser(admin_id): AdminUser,
    Path(id): Path<Uuid>,
) -> Result<Json<AudioSynthesisResponse>, (StatusCode, String)> {
    let meditation = repo::get_meditation(&state.db, id)
        .await
        .map_err(internal)?
        .ok_or((StatusCode::NOT_FOUND, "Meditation not found".to_string()))?;

    if meditation.script.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "meditation has no script".into()));
    }

    let audio_key =
        match services::synthesize_meditation_audio(&state, meditation.id, &meditation.script)
            .await
        {
            Ok(key) => key,
            Err(AudioError::Synthesis(e)) => {
                error!(error = %e, meditation_id = %id, "speech synthesis failed");
                return Err((StatusCode::BAD_GATEWAY, AUDIO_FALLBACK.into()));
            }
            Err(AudioError::Store(e)) => {
                error!(error = %e, meditation_id = %id, "store audio failed");
                return Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()));
            }
        };

    info!(admin_id = %admin_id, meditation_id = %id, "meditation audio ready");
    Ok(Json(AudioSynthesisResponse { audio_key }))
}
