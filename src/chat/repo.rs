use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool, Postgres, Transaction};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Ai,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub sender: Sender,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// The whole conversation lives in one document per user; saves overwrite
/// the full list.
pub async fn get_history(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<ChatMessage>> {
    let row = sqlx::query_scalar::<_, Json<Vec<ChatMessage>>>(
        r#"SELECT messages FROM chat_histories WHERE user_id = $1"#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row.map(|j| j.0).unwrap_or_default())
}

pub async fn put_history(
    db: &PgPool,
    user_id: Uuid,
    messages: &[ChatMessage],
) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO chat_histories (user_id, messages, updated_at)
        VALUES ($1, $2, now())
        ON CONFLICT (user_id) DO UPDATE SET messages = EXCLUDED.messages, updated_at = now()
        "#,
    )
    .bind(user_id)
    .bind(Json(messages))
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete_all(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(r#"DELETE FROM chat_histories WHERE user_id = $1"#)
        .bind(user_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_serde_roundtrip() {
        let msg = ChatMessage {
            sender: Sender::Ai,
            text: "hello".into(),
            image_url: None,
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"sender\":\"ai\""));
        assert!(!json.contains("image_url")); // omitted when absent

        let back: ChatMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back.sender, Sender::Ai);
        assert_eq!(back.text, "hello");
    }
}
