use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

/// Public content reads distinguish a misconfigured-permissions backend from
/// generic failures so clients can show a useful hint.
#[derive(Debug, Error)]
pub enum ContentError {
    #[error("content store denied access")]
    PermissionDenied,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ContentError {
    pub fn from_store(e: anyhow::Error) -> Self {
        if let Some(sqlx::Error::Database(db)) = e.downcast_ref::<sqlx::Error>() {
            // 42501: insufficient_privilege
            if db.code().as_deref() == Some("42501") {
                return ContentError::PermissionDenied;
            }
        }
        ContentError::Other(e)
    }
}

/// Editorial article, shared across all users.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Article {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub image_url: Option<String>,
    pub content: String,
    pub created_at: OffsetDateTime,
}

/// Guided meditation; `script` feeds speech synthesis, `audio_key` points at
/// the stored result.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Meditation {
    pub id: Uuid,
    pub title: String,
    pub category: String,
    pub summary: String,
    pub script: String,
    pub audio_key: Option<String>,
    pub created_at: OffsetDateTime,
}

// --- articles ---

pub async fn list_articles(db: &PgPool) -> anyhow::Result<Vec<Article>> {
    let rows = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, category, summary, image_url, content, created_at
        FROM articles
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_article(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Article>> {
    let article = sqlx::query_as::<_, Article>(
        r#"
        SELECT id, title, category, summary, image_url, content, created_at
        FROM articles
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(article)
}

pub async fn insert_article(
    db: &PgPool,
    title: &str,
    category: &str,
    summary: &str,
    image_url: Option<&str>,
    content: &str,
) -> anyhow::Result<Article> {
    let article = sqlx::query_as::<_, Article>(
        r#"
        INSERT INTO articles (title, category, summary, image_url, content)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, title, category, summary, image_url, content, created_at
        "#,
    )
    .bind(title)
    .bind(category)
    .bind(summary)
    .bind(image_url)
    .bind(content)
    .fetch_one(db)
    .await?;
    Ok(article)
}

pub async fn update_article(
    db: &PgPool,
    id: Uuid,
    title: &str,
    category: &str,
    summary: &str,
    image_url: Option<&str>,
    content: &str,
) -> anyhow::Result<Option<Article>> {
    let article = sqlx::query_as::<_, Article>(
        r#"
        UPDATE articles
        SET title = $2, category = $3, summary = $4, image_url = $5, content = $6
        WHERE id = $1
        RETURNING id, title, category, summary, image_url, content, created_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(category)
    .bind(summary)
    .bind(image_url)
    .bind(content)
    .fetch_optional(db)
    .await?;
    Ok(article)
}

pub async fn delete_article(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let result = sqlx::query(r#"DELETE FROM articles WHERE id = $1"#)
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

// --- meditations ---

pub async fn list_meditations(db: &PgPool) -> anyhow::Result<Vec<Meditation>> {
    let rows = sqlx::query_as::<_, Meditation>(
        r#"
        SELECT id, title, category, summary, script, audio_key, created_at
        FROM meditations
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn get_meditation(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Meditation>> {
    let meditation = sqlx::query_as::<_, Meditation>(
        r#"
        SELECT id, title, category, summary, script, audio_key, created_at
        FROM meditations
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(meditation)
}

pub async fn insert_meditation(
    db: &PgPool,
    title: &str,
    category: &str,
    summary: &str,
    script: &str,
) -> anyhow::Result<Meditation> {
    let meditation = sqlx::query_as::<_, Meditation>(
        r#"
        INSERT INTO meditations (title, category, summary, script)
        VALUES ($1, $2, $3, $4)
        RETURNING id, title, category, summary, script, audio_key, created_at
        "#,
    )
    .bind(title)
    .bind(category)
    .bind(summary)
    .bind(script)
    .fetch_one(db)
    .await?;
    Ok(meditation)
}

pub async fn update_meditation(
    db: &PgPool,
    id: Uuid,
    title: &str,
    category: &str,
    summary: &str,
    script: &str,
) -> anyhow::Result<Option<Meditation>> {
    let meditation = sqlx::query_as::<_, Meditation>(
        r#"
        UPDATE meditations
        SET title = $2, category = $3, summary = $4, script = $5
        WHERE id = $1
        RETURNING id, title, category, summary, script, audio_key, created_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(category)
    .bind(summary)
    .bind(script)
    .fetch_optional(db)
    .await?;
    Ok(meditation)
}

pub async fn set_meditation_audio(db: &PgPool, id: Uuid, audio_key: &str) -> anyhow::Result<()> {
    sqlx::query(r#"UPDATE meditations SET audio_key = $2 WHERE id = $1"#)
        .bind(id)
        .bind(audio_key)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn delete_meditation(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Meditation>> {
    let meditation = sqlx::query_as::<_, Meditation>(
        r#"
        DELETE FROM meditations
        WHERE id = $1
        RETURNING id, title, category, summary, script, audio_key, created_at
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(meditation)
}

// --- likes ---

pub async fn like_article(db: &PgPool, user_id: Uuid, article_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO article_likes (user_id, article_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, article_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(article_id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn unlike_article(db: &PgPool, user_id: Uuid, article_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM article_likes WHERE user_id = $1 AND article_id = $2"#)
        .bind(user_id)
        .bind(article_id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn list_likes(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Uuid>> {
    let rows = sqlx::query_scalar::<_, Uuid>(
        r#"
        SELECT article_id FROM article_likes
        WHERE user_id = $1
        ORDER BY created_at ASC
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn delete_all_likes(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM article_likes WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}
