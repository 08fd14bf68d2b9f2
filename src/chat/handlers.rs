use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{error, info, instrument};

use crate::ai::{ChatRole, ChatTurn};
use crate::biomarkers::repo::Biomarker;
use crate::profile::repo::HealthProfile;
use crate::{auth::extractors::AuthUser, biomarkers, profile, retry, state::AppState};

use super::dto::{
    DailyTipResponse, HistoryResponse, PutHistoryRequest, SendMessageRequest, SendMessageResponse,
};
use super::repo::{self, ChatMessage, Sender};

const CHAT_FALLBACK: &str =
    "The assistant is unavailable right now. Please try again in a moment.";
const TIP_FALLBACK: &str = "Take a short walk and drink a glass of water today.";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/chat/history", get(get_history).put(put_history))
        .route("/chat/message", post(send_message))
        .route("/assistant/daily-tip", get(daily_tip))
}

/// Context block injected into the assistant's system prompt.
fn build_context(profile: Option<&HealthProfile>, biomarkers: &[Biomarker]) -> String {
    let mut out = String::new();
    match profile {
        Some(p) => {
            out.push_str("Health profile:\n");
            if let Some(age) = p.age {
                out.push_str(&format!("- age: {}\n", age));
            }
            if let Some(sex) = &p.sex {
                out.push_str(&format!("- sex: {}\n", sex));
            }
            if let Some(level) = &p.activity_level {
                out.push_str(&format!("- activity level: {}\n", level));
            }
            if !p.goals.0.is_empty() {
                out.push_str(&format!("- goals: {}\n", p.goals.0.join(", ")));
            }
            if let Some(conditions) = &p.conditions {
                out.push_str(&format!("- conditions: {}\n", conditions));
            }
        }
        None => out.push_str("Health profile: not filled in yet.\n"),
    }

    if biomarkers.is_empty() {
        out.push_str("No biomarker data yet; the user has not saved a blood test.");
    } else {
        out.push_str("Latest biomarkers:\n");
        for b in biomarkers {
            out.push_str(&format!(
                "- {}: {} {} ({}, trend {})\n",
                b.name,
                b.value,
                b.unit.as_deref().unwrap_or(""),
                b.status.as_deref().unwrap_or("unknown"),
                b.trend,
            ));
        }
    }
    out
}

fn to_turns(messages: &[ChatMessage]) -> Vec<ChatTurn> {
    messages
        .iter()
        .map(|m| ChatTurn {
            role: match m.sender {
                Sender::User => ChatRole::User,
                Sender::Ai => ChatRole::Model,
            },
            text: m.text.clone(),
        })
        .collect()
}

#[instrument(skip(state))]
pub async fn get_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<HistoryResponse>, (StatusCode, String)> {
    let messages = retry::with_retry("chat.history", || repo::get_history(&state.db, user_id))
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "load chat history failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(Json(HistoryResponse { messages }))
}

/// Whole-list overwrite; the client debounces.
#[instrument(skip(state, payload))]
pub async fn put_history(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<PutHistoryRequest>,
) -> Result<StatusCode, (StatusCode, String)> {
    repo::put_history(&state.db, user_id, &payload.messages)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "save chat history failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, payload))]
pub async fn send_message(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, String)> {
    let text = payload.text.trim().to_string();
    if text.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "message text required".into()));
    }

    // Context pieces are independent; fetch them as one parallel join.
    let (profile, biomarkers, mut messages) = tokio::try_join!(
        retry::with_retry("chat.profile", || profile::repo::get(&state.db, user_id)),
        retry::with_retry("chat.biomarkers", || biomarkers::repo::list(
            &state.db, user_id
        )),
        retry::with_retry("chat.messages", || repo::get_history(&state.db, user_id)),
    )
    .map_err(|e| {
        error!(error = %e, user_id = %user_id, "load chat context failed");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    let context = build_context(profile.as_ref(), &biomarkers);
    let reply_text = match state
        .ai
        .chat_reply(&context, &to_turns(&messages), &text)
        .await
    {
        Ok(r) => r,
        Err(e) => {
            error!(error = %e, user_id = %user_id, "chat reply failed");
            return Err((StatusCode::BAD_GATEWAY, CHAT_FALLBACK.into()));
        }
    };

    messages.push(ChatMessage {
        sender: Sender::User,
        text,
        image_url: None,
    });
    let reply = ChatMessage {
        sender: Sender::Ai,
        text: reply_text,
        image_url: None,
    };
    messages.push(reply.clone());

    repo::put_history(&state.db, user_id, &messages)
        .await
        .map_err(|e| {
            error!(error = %e, user_id = %user_id, "save chat history failed");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;

    info!(user_id = %user_id, turns = messages.len(), "chat message answered");
    Ok(Json(SendMessageResponse { reply }))
}

/// Stateless; clients cache the tip per calendar date.
#[instrument(skip(state))]
pub async fn daily_tip(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<DailyTipResponse>, (StatusCode, String)> {
    let tip = match state.ai.daily_tip().await {
        Ok(t) => t,
        Err(e) => {
            error!(error = %e, user_id = %user_id, "daily tip failed");
            TIP_FALLBACK.to_string()
        }
    };
    Ok(Json(DailyTipResponse { tip }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json as SqlJson;
    use time::OffsetDateTime;
    use uuid::Uuid;

    #[test]
    fn context_mentions_profile_and_biomarkers() {
        let profile = HealthProfile {
            user_id: Uuid::new_v4(),
            age: Some(41),
            sex: Some("female".into()),
            height_cm: None,
            weight_kg: None,
            activity_level: Some("moderate".into()),
            goals: SqlJson(vec!["sleep better".into()]),
            diet: None,
            conditions: None,
            allergies: None,
            supplements: None,
            updated_at: OffsetDateTime::now_utc(),
        };
        let biomarker = Biomarker {
            user_id: profile.user_id,
            name: "Ferritin".into(),
            value: "18".into(),
            unit: Some("ng/mL".into()),
            status: Some("low".into()),
            ref_range: None,
            description: None,
            trend: "down".into(),
            history: SqlJson(vec![]),
            recommendations: None,
            updated_at: OffsetDateTime::now_utc(),
        };

        let ctx = build_context(Some(&profile), std::slice::from_ref(&biomarker));
        assert!(ctx.contains("age: 41"));
        assert!(ctx.contains("sleep better"));
        assert!(ctx.contains("Ferritin: 18 ng/mL (low, trend down)"));
    }

    #[test]
    fn context_without_data_stays_honest() {
        let ctx = build_context(None, &[]);
        assert!(ctx.contains("not filled in"));
        assert!(ctx.contains("No biomarker data"));
    }

    #[test]
    fn history_maps_senders_to_roles() {
        let messages = vec![
            ChatMessage {
                sender: Sender::User,
                text: "hi".into(),
                image_url: None,
            },
            ChatMessage {
                sender: Sender::Ai,
                text: "hello".into(),
                image_url: None,
            },
        ];
        let turns = to_turns(&messages);
        assert_eq!(turns[0].role, ChatRole::User);
        assert_eq!(turns[1].role, ChatRole::Model);
    }
}
