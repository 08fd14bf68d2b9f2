//! Gemini-style provider client.
//!
//! One reqwest client, one request/response pair per task. Structured calls
//! pin a response schema and still run the tolerant JSON extractor, because
//! the provider occasionally fences its output anyway.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as B64, Engine};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::ai::{
    AiClient, AiError, BiomarkerSnapshot, BloodTestAnalysis, ChatRole, ChatTurn,
    RecommendationBundle, SpeechAudio,
};
use crate::config::AiConfig;

const ANALYSIS_SYSTEM: &str = include_str!("prompts/analysis_system.txt");
const RECOMMENDATIONS_SYSTEM: &str = include_str!("prompts/recommendations_system.txt");
const CHAT_SYSTEM: &str = include_str!("prompts/chat_system.txt");
const DAILY_TIP_PROMPT: &str = include_str!("prompts/daily_tip.txt");

// --- wire types ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct Content {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl Content {
    fn text(role: Option<&str>, text: impl Into<String>) -> Self {
        Self {
            role: role.map(str::to_string),
            parts: vec![Part {
                text: Some(text.into()),
                inline_data: None,
            }],
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentOut>,
}

#[derive(Debug, Deserialize)]
struct ContentOut {
    #[serde(default)]
    parts: Vec<PartOut>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PartOut {
    text: Option<String>,
    inline_data: Option<InlineDataOut>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineDataOut {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorResponse {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

// --- client ---

pub struct GeminiClient {
    client: reqwest::Client,
    cfg: AiConfig,
}

impl GeminiClient {
    pub fn new(cfg: AiConfig) -> Result<Self, AiError> {
        if cfg.api_key.is_empty() {
            return Err(AiError::MissingApiKey);
        }
        Ok(Self {
            client: reqwest::Client::new(),
            cfg,
        })
    }

    fn url(&self, model: &str, method: &str) -> String {
        format!(
            "{}/models/{}:{}?key={}",
            self.cfg.base_url, model, method, self.cfg.api_key
        )
    }

    async fn generate(
        &self,
        model: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, AiError> {
        let response = self
            .client
            .post(self.url(model, "generateContent"))
            .json(request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ProviderErrorResponse>(&body) {
                return Err(AiError::Api(err.error.message));
            }
            return Err(AiError::Api(format!("HTTP {}: {}", status, body)));
        }

        serde_json::from_str(&body).map_err(|e| AiError::Parse(e.to_string()))
    }

    /// Text of the first candidate, parts concatenated.
    fn first_text(response: &GenerateResponse) -> Result<String, AiError> {
        let text: String = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| {
                c.parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(AiError::Parse("no text content in response".into()));
        }
        Ok(text)
    }

    fn structured_config(schema: serde_json::Value) -> serde_json::Value {
        json!({
            "responseMimeType": "application/json",
            "responseSchema": schema,
        })
    }
}

fn analysis_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": { "type": "STRING" },
            "biomarkers": {
                "type": "ARRAY",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "name": { "type": "STRING" },
                        "value": { "type": "STRING" },
                        "unit": { "type": "STRING" },
                        "status": { "type": "STRING" },
                        "range": { "type": "STRING" },
                        "explanation": { "type": "STRING" }
                    },
                    "required": ["name", "value"]
                }
            },
            "recommendations": { "type": "ARRAY", "items": { "type": "STRING" } }
        },
        "required": ["summary", "biomarkers", "recommendations"]
    })
}

fn bundle_schema() -> serde_json::Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "nutrition": { "type": "ARRAY", "items": { "type": "STRING" } },
            "lifestyle": { "type": "ARRAY", "items": { "type": "STRING" } },
            "supplements": { "type": "ARRAY", "items": { "type": "STRING" } },
            "next_checkup": { "type": "STRING" }
        },
        "required": ["nutrition", "lifestyle", "supplements", "next_checkup"]
    })
}

#[async_trait]
impl AiClient for GeminiClient {
    async fn analyze_blood_test(
        &self,
        image: &[u8],
        mime_type: &str,
    ) -> Result<BloodTestAnalysis, AiError> {
        let request = GenerateRequest {
            system_instruction: Some(Content::text(None, ANALYSIS_SYSTEM)),
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: B64.encode(image),
                        }),
                    },
                    Part {
                        text: Some("Extract and interpret this blood-test report.".into()),
                        inline_data: None,
                    },
                ],
            }],
            generation_config: Some(Self::structured_config(analysis_schema())),
        };

        let response = self.generate(&self.cfg.model, &request).await?;
        let text = Self::first_text(&response)?;
        let json_str = extract_json(&text)?;
        let analysis: BloodTestAnalysis = serde_json::from_str(&json_str)
            .map_err(|e| AiError::Parse(format!("{}: {}", e, json_str)))?;
        debug!(biomarkers = analysis.biomarkers.len(), "blood test analyzed");
        Ok(analysis)
    }

    async fn biomarker_recommendations(
        &self,
        snapshot: &BiomarkerSnapshot,
    ) -> Result<RecommendationBundle, AiError> {
        let user_message = format!(
            "Biomarker: {}\nValue: {} {}\nStatus: {}\nReference range: {}",
            snapshot.name,
            snapshot.value,
            snapshot.unit.as_deref().unwrap_or(""),
            snapshot.status.as_deref().unwrap_or("unknown"),
            snapshot.range.as_deref().unwrap_or("not provided"),
        );
        let request = GenerateRequest {
            system_instruction: Some(Content::text(None, RECOMMENDATIONS_SYSTEM)),
            contents: vec![Content::text(Some("user"), user_message)],
            generation_config: Some(Self::structured_config(bundle_schema())),
        };

        let response = self.generate(&self.cfg.model, &request).await?;
        let text = Self::first_text(&response)?;
        let json_str = extract_json(&text)?;
        serde_json::from_str(&json_str).map_err(|e| AiError::Parse(format!("{}: {}", e, json_str)))
    }

    async fn chat_reply(
        &self,
        context: &str,
        history: &[ChatTurn],
        message: &str,
    ) -> Result<String, AiError> {
        let system = format!("{}\n\nUSER CONTEXT:\n{}", CHAT_SYSTEM, context);
        let mut contents: Vec<Content> = history
            .iter()
            .map(|turn| {
                Content::text(
                    Some(match turn.role {
                        ChatRole::User => "user",
                        ChatRole::Model => "model",
                    }),
                    turn.text.clone(),
                )
            })
            .collect();
        contents.push(Content::text(Some("user"), message));

        let request = GenerateRequest {
            system_instruction: Some(Content::text(None, system)),
            contents,
            generation_config: None,
        };

        // The provider streams the reply as SSE; fold the text deltas into
        // one buffer. Dropping this future (client gone) aborts the call.
        let mut response = self
            .client
            .post(self.url(&self.cfg.model, "streamGenerateContent") + "&alt=sse")
            .json(&request)
            .send()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            if let Ok(err) = serde_json::from_str::<ProviderErrorResponse>(&body) {
                return Err(AiError::Api(err.error.message));
            }
            return Err(AiError::Api(format!("HTTP {}: {}", status, body)));
        }

        let mut reply = String::new();
        let mut pending = String::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| AiError::Request(e.to_string()))?
        {
            pending.push_str(&String::from_utf8_lossy(&chunk));
            drain_sse_lines(&mut pending, &mut reply);
        }
        drain_sse_lines(&mut pending, &mut reply);

        if reply.is_empty() {
            return Err(AiError::Parse("empty streamed response".into()));
        }
        Ok(reply)
    }

    async fn daily_tip(&self) -> Result<String, AiError> {
        let request = GenerateRequest {
            system_instruction: None,
            contents: vec![Content::text(Some("user"), DAILY_TIP_PROMPT)],
            generation_config: None,
        };
        let response = self.generate(&self.cfg.model, &request).await?;
        Ok(Self::first_text(&response)?.trim().to_string())
    }

    async fn synthesize_speech(&self, script: &str) -> Result<SpeechAudio, AiError> {
        let request = GenerateRequest {
            system_instruction: None,
            contents: vec![Content::text(Some("user"), script)],
            generation_config: Some(json!({
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": {
                        "prebuiltVoiceConfig": { "voiceName": self.cfg.tts_voice }
                    }
                }
            })),
        };

        let response = self.generate(&self.cfg.tts_model, &request).await?;
        let inline = response
            .candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .and_then(|c| c.parts.iter().find_map(|p| p.inline_data.as_ref()))
            .ok_or_else(|| AiError::Parse("no audio content in response".into()))?;

        let data = B64
            .decode(&inline.data)
            .map_err(|e| AiError::Parse(format!("audio base64: {}", e)))?;
        Ok(SpeechAudio {
            data,
            mime_type: inline.mime_type.clone(),
        })
    }
}

// --- parsing helpers ---

/// Consume complete SSE lines from `pending`, folding text deltas into `out`.
fn drain_sse_lines(pending: &mut String, out: &mut String) {
    while let Some(pos) = pending.find('\n') {
        let line: String = pending.drain(..=pos).collect();
        let line = line.trim_end();
        if let Some(data) = sse_data(line) {
            if let Some(text) = delta_text(data) {
                out.push_str(&text);
            }
        }
    }
}

fn sse_data(line: &str) -> Option<&str> {
    line.strip_prefix("data:").map(str::trim)
}

/// Concatenated text parts of one streamed event, if any.
fn delta_text(data: &str) -> Option<String> {
    let event: GenerateResponse = serde_json::from_str(data).ok()?;
    let text: String = event
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())?
        .parts
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();
    (!text.is_empty()).then_some(text)
}

/// Extract JSON from provider output (handles markdown code fences).
fn extract_json(text: &str) -> Result<String, AiError> {
    if text.trim().starts_with('{') {
        return Ok(text.trim().to_string());
    }

    if let Some(start) = text.find("```json") {
        let start = start + 7;
        if let Some(end) = text[start..].find("```") {
            return Ok(text[start..start + end].trim().to_string());
        }
    }

    if let Some(start) = text.find("```") {
        let start = start + 3;
        let content_start = text[start..]
            .find('\n')
            .map(|i| start + i + 1)
            .unwrap_or(start);
        if let Some(end) = text[content_start..].find("```") {
            return Ok(text[content_start..content_start + end].trim().to_string());
        }
    }

    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        return Ok(text[start..=end].to_string());
    }

    Err(AiError::Parse("could not extract JSON from response".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AiConfig;

    fn test_config(base_url: String) -> AiConfig {
        AiConfig {
            api_key: "test-key".into(),
            base_url,
            model: "test-model".into(),
            tts_model: "test-tts".into(),
            tts_voice: "Aoede".into(),
        }
    }

    fn candidate_body(text: &str) -> String {
        serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string()
    }

    #[test]
    fn extract_json_direct() {
        let input = r#"{"summary": "ok", "biomarkers": []}"#;
        assert!(extract_json(input).unwrap().contains("summary"));
    }

    #[test]
    fn extract_json_code_block() {
        let input = "Here you go:\n\n```json\n{\"summary\": \"fenced\"}\n```\n";
        assert!(extract_json(input).unwrap().contains("fenced"));
    }

    #[test]
    fn extract_json_fallback_braces() {
        let input = r#"The result is {"summary": "inline"} as requested."#;
        assert_eq!(extract_json(input).unwrap(), r#"{"summary": "inline"}"#);
    }

    #[test]
    fn extract_json_rejects_prose() {
        assert!(extract_json("no json here").is_err());
    }

    #[test]
    fn sse_fold_accumulates_deltas_across_chunks() {
        let mut out = String::new();
        // Two deltas arriving in separate network chunks.
        let mut pending = String::from("data: ");
        pending.push_str(&candidate_body("Hel"));
        pending.push('\n');
        drain_sse_lines(&mut pending, &mut out);
        assert_eq!(out, "Hel");
        assert!(pending.is_empty());

        pending.push_str("data: ");
        pending.push_str(&candidate_body("lo"));
        pending.push_str("\n\n");
        drain_sse_lines(&mut pending, &mut out);
        assert_eq!(out, "Hello");
    }

    #[test]
    fn sse_ignores_non_data_lines() {
        let mut out = String::new();
        let mut pending = String::from(": keepalive\n\nevent: ping\n");
        drain_sse_lines(&mut pending, &mut out);
        assert!(out.is_empty());
    }

    #[tokio::test]
    async fn analyze_parses_structured_response() {
        let mut server = mockito::Server::new_async().await;
        let analysis = serde_json::json!({
            "summary": "All good.",
            "biomarkers": [{ "name": "Glucose", "value": "5.1", "unit": "mmol/L" }],
            "recommendations": ["Stay hydrated"]
        });
        let _m = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(mockito::Matcher::UrlEncoded("key".into(), "test-key".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(candidate_body(&analysis.to_string()))
            .create_async()
            .await;

        let client = GeminiClient::new(test_config(server.url())).unwrap();
        let result = client.analyze_blood_test(b"fake-image", "image/png").await.unwrap();
        assert_eq!(result.summary, "All good.");
        assert_eq!(result.biomarkers.len(), 1);
        assert_eq!(result.biomarkers[0].name, "Glucose");
        assert_eq!(result.recommendations, vec!["Stay hydrated"]);
    }

    #[tokio::test]
    async fn provider_error_surfaces_message() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("POST", "/models/test-model:generateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(429)
            .with_body(r#"{"error": {"message": "quota exceeded"}}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(test_config(server.url())).unwrap();
        let err = client.daily_tip().await.unwrap_err();
        match err {
            AiError::Api(msg) => assert_eq!(msg, "quota exceeded"),
            other => panic!("expected Api error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn chat_folds_streamed_deltas_into_one_reply() {
        let mut server = mockito::Server::new_async().await;
        let body = format!(
            "data: {}\n\ndata: {}\n\n",
            candidate_body("Hello"),
            candidate_body(" there")
        );
        let _m = server
            .mock("POST", "/models/test-model:streamGenerateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_header("content-type", "text/event-stream")
            .with_body(body)
            .create_async()
            .await;

        let client = GeminiClient::new(test_config(server.url())).unwrap();
        let reply = client.chat_reply("context", &[], "hi").await.unwrap();
        assert_eq!(reply, "Hello there");
    }

    #[tokio::test]
    async fn tts_decodes_inline_audio() {
        let mut server = mockito::Server::new_async().await;
        let body = serde_json::json!({
            "candidates": [{ "content": { "parts": [{
                "inlineData": { "mimeType": "audio/L16;rate=24000", "data": B64.encode(b"pcm") }
            }] } }]
        });
        let _m = server
            .mock("POST", "/models/test-tts:generateContent")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(body.to_string())
            .create_async()
            .await;

        let client = GeminiClient::new(test_config(server.url())).unwrap();
        let audio = client.synthesize_speech("Breathe in.").await.unwrap();
        assert_eq!(audio.data, b"pcm");
        assert!(audio.mime_type.starts_with("audio/"));
    }

    #[test]
    fn empty_api_key_is_rejected() {
        let mut cfg = test_config("http://localhost".into());
        cfg.api_key = String::new();
        assert!(matches!(GeminiClient::new(cfg), Err(AiError::MissingApiKey)));
    }
}
