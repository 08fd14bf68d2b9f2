//! Whole-account data operations: the export dump and the wipe.

use anyhow::Context;
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::biomarkers::alerts::AlertConfig;
use crate::biomarkers::dto::BiomarkerView;
use crate::bloodtests::dto::TestRecordView;
use crate::chat::repo::ChatMessage;
use crate::profile::dto::ProfileResponse;
use crate::state::AppState;
use crate::{biomarkers, bloodtests, chat, content, profile, retry, subscription};

#[derive(Debug, Serialize)]
pub struct SubscriptionStatusExport {
    pub plan: &'static str,
    pub expires_at: Option<OffsetDateTime>,
}

/// Full per-user dump. Key names are part of the export contract.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportDump {
    pub health_profile: Option<ProfileResponse>,
    pub subscription_status: SubscriptionStatusExport,
    pub biomarkers: Vec<BiomarkerView>,
    pub test_history: Vec<TestRecordView>,
    pub alerts: Vec<AlertConfig>,
    pub chat_history: Vec<ChatMessage>,
    pub article_likes: Vec<Uuid>,
}

pub async fn export_user_data(state: &AppState, user_id: Uuid) -> anyhow::Result<ExportDump> {
    let db = &state.db;
    let (profile, sub, biomarkers, tests, alerts, chat_history, article_likes) = tokio::try_join!(
        retry::with_retry("export.profile", || profile::repo::get(db, user_id)),
        retry::with_retry("export.subscription", || subscription::repo::get(db, user_id)),
        retry::with_retry("export.biomarkers", || biomarkers::repo::list(db, user_id)),
        retry::with_retry("export.tests", || bloodtests::repo::list_by_user(db, user_id)),
        retry::with_retry("export.alerts", || biomarkers::alerts::list(db, user_id)),
        retry::with_retry("export.chat", || chat::repo::get_history(db, user_id)),
        retry::with_retry("export.likes", || content::repo::list_likes(db, user_id)),
    )?;

    Ok(ExportDump {
        health_profile: profile.map(ProfileResponse::from),
        subscription_status: SubscriptionStatusExport {
            plan: sub.plan.as_str(),
            expires_at: sub.expires_at,
        },
        biomarkers: biomarkers.into_iter().map(BiomarkerView::from).collect(),
        test_history: tests.into_iter().map(TestRecordView::from).collect(),
        alerts,
        chat_history,
        article_likes,
    })
}

/// Delete every per-user collection in one batch. The identity row stays;
/// wiping data does not delete the account itself.
pub async fn wipe_user_data(state: &AppState, user_id: Uuid) -> anyhow::Result<()> {
    let mut tx = state.db.begin().await.context("begin wipe")?;
    biomarkers::repo::delete_all(&mut tx, user_id).await?;
    biomarkers::alerts::delete_all(&mut tx, user_id).await?;
    bloodtests::repo::delete_all(&mut tx, user_id).await?;
    chat::repo::delete_all(&mut tx, user_id).await?;
    content::repo::delete_all_likes(&mut tx, user_id).await?;
    profile::repo::delete_tx(&mut tx, user_id).await?;
    subscription::repo::delete_tx(&mut tx, user_id).await?;
    crate::auth::repo::User::clear_identity_tx(&mut tx, user_id).await?;
    tx.commit().await.context("commit wipe")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::repo::Plan;

    #[test]
    fn export_uses_contract_key_names() {
        let dump = ExportDump {
            health_profile: None,
            subscription_status: SubscriptionStatusExport {
                plan: Plan::Free.as_str(),
                expires_at: None,
            },
            biomarkers: vec![],
            test_history: vec![],
            alerts: vec![],
            chat_history: vec![],
            article_likes: vec![],
        };
        let value = serde_json::to_value(&dump).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "healthProfile",
            "subscriptionStatus",
            "biomarkers",
            "testHistory",
            "alerts",
            "chatHistory",
            "articleLikes",
        ] {
            assert!(obj.contains_key(key), "missing export key {key}");
        }
        assert_eq!(obj.len(), 7);
    }

    #[test]
    fn export_serialization_is_deterministic() {
        let dump = || ExportDump {
            health_profile: None,
            subscription_status: SubscriptionStatusExport {
                plan: Plan::Pro.as_str(),
                expires_at: None,
            },
            biomarkers: vec![],
            test_history: vec![],
            alerts: vec![],
            chat_history: vec![],
            article_likes: vec![],
        };
        let a = serde_json::to_string(&dump()).unwrap();
        let b = serde_json::to_string(&dump()).unwrap();
        assert_eq!(a, b);
    }
}
