use serde::{Deserialize, Serialize};

use super::repo::ChatMessage;

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub reply: ChatMessage,
}

#[derive(Debug, Deserialize)]
pub struct PutHistoryRequest {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
pub struct DailyTipResponse {
    pub tip: String,
}
