use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// Remote generative-AI provider settings.
#[derive(Debug, Clone, Deserialize)]
pub struct AiConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub tts_model: String,
    pub tts_voice: String,
}

/// S3/MinIO bucket holding synthesized meditation audio.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub ai: AiConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "labmind".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "labmind-users".into()),
            ttl_minutes: std::env::var("JWT_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60),
            refresh_ttl_minutes: std::env::var("JWT_REFRESH_TTL_MINUTES")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(60 * 24 * 14),
        };
        let ai = AiConfig {
            api_key: std::env::var("AI_API_KEY")?,
            base_url: std::env::var("AI_BASE_URL")
                .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into()),
            model: std::env::var("AI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into()),
            tts_model: std::env::var("AI_TTS_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash-preview-tts".into()),
            tts_voice: std::env::var("AI_TTS_VOICE").unwrap_or_else(|_| "Aoede".into()),
        };
        let media = MediaConfig {
            endpoint: std::env::var("MEDIA_ENDPOINT")?,
            bucket: std::env::var("MEDIA_BUCKET").unwrap_or_else(|_| "labmind-media".into()),
            access_key: std::env::var("MEDIA_ACCESS_KEY")?,
            secret_key: std::env::var("MEDIA_SECRET_KEY")?,
        };
        Ok(Self {
            database_url,
            jwt,
            ai,
            media,
        })
    }
}
