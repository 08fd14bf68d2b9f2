use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct ArticleUpsertRequest {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub summary: String,
    pub image_url: Option<String>,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct MeditationUpsertRequest {
    pub title: String,
    pub category: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub script: String,
}

#[derive(Debug, Serialize)]
pub struct LikesResponse {
    pub article_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct AudioSynthesisResponse {
    pub audio_key: String,
}
