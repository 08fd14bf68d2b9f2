//! Gateway to the remote generative-AI provider.
//!
//! Four one-shot tasks: blood-test image extraction, per-biomarker
//! recommendation bundles, context-injected assistant chat, and speech
//! synthesis for meditation scripts. No caching, no retry, no circuit
//! breaker on this path; a failure surfaces to the caller immediately.

pub mod gemini;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AiError {
    #[error("API key not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Request(String),

    #[error("provider error: {0}")]
    Api(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Structured interpretation of one blood-test report.
///
/// Produced by the extraction call, optionally edited by the user, then
/// persisted verbatim inside the immutable test record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BloodTestAnalysis {
    pub summary: String,
    #[serde(default)]
    pub biomarkers: Vec<BiomarkerReading>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// One extracted reading. `value` stays a string: provider output is not
/// always numeric ("negative", "<0.1") and the record keeps it verbatim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BiomarkerReading {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub range: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationBundle {
    #[serde(default)]
    pub nutrition: Vec<String>,
    #[serde(default)]
    pub lifestyle: Vec<String>,
    #[serde(default)]
    pub supplements: Vec<String>,
    #[serde(default)]
    pub next_checkup: Option<String>,
}

/// Current state of one biomarker, fed into recommendation generation.
#[derive(Debug, Clone)]
pub struct BiomarkerSnapshot {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub range: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatRole {
    User,
    Model,
}

#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct SpeechAudio {
    pub data: Vec<u8>,
    pub mime_type: String,
}

#[async_trait]
pub trait AiClient: Send + Sync {
    async fn analyze_blood_test(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<BloodTestAnalysis, AiError>;

    async fn biomarker_recommendations(
        &self,
        snapshot: &BiomarkerSnapshot,
    ) -> Result<RecommendationBundle, AiError>;

    async fn chat_reply(
        &self,
        context: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AiError>;

    async fn daily_tip(&self) -> Result<String, AiError>;

    async fn synthesize_speech(&self, script: &str) -> Result<SpeechAudio, AiError>;
}
