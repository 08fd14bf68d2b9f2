//! Save pipeline: persist a new test record and fold every numeric reading
//! into that user's running biomarker histories.
//!
//! The recommendation fetches run before the batch is opened; the batch
//! itself (record insert + all biomarker upserts) commits atomically and is
//! not retried. A failed recommendation fetch for any biomarker aborts the
//! whole save before anything is written.

use anyhow::Context;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::{AiError, BiomarkerSnapshot, BloodTestAnalysis, RecommendationBundle};
use crate::biomarkers::merge::{self, MergedBiomarker};
use crate::biomarkers::repo as biomarker_repo;
use crate::retry;
use crate::state::AppState;

use super::repo::{self, TestRecord};

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("recommendation fetch for {name} failed: {source}")]
    Recommendation { name: String, source: AiError },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

fn snapshot(merged: &MergedBiomarker) -> BiomarkerSnapshot {
    BiomarkerSnapshot {
        name: merged.name.clone(),
        value: merged.value.clone(),
        unit: merged.unit.clone(),
        status: merged.status.clone(),
        range: merged.ref_range.clone(),
    }
}

pub async fn save_test(
    state: &AppState,
    user_id: Uuid,
    analysis: BloodTestAnalysis,
) -> Result<TestRecord, SaveError> {
    let record_id = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();

    // Fold each numeric reading against its current biomarker; readings that
    // don't parse stay in the record but skip the merge. One recommendation
    // call per merged biomarker, serial, before any write.
    let mut merged: Vec<(MergedBiomarker, RecommendationBundle)> = Vec::new();
    for reading in &analysis.biomarkers {
        let existing = retry::with_retry("save.biomarker", || {
            biomarker_repo::get(&state.db, user_id, &reading.name)
        })
        .await
        .context("load biomarker for merge")?;

        let Some(folded) = merge::fold_reading(existing.as_ref(), reading, now, record_id) else {
            continue;
        };

        let bundle = state
            .ai
            .biomarker_recommendations(&snapshot(&folded))
            .await
            .map_err(|source| SaveError::Recommendation {
                name: folded.name.clone(),
                source,
            })?;

        merged.push((folded, bundle));
    }

    // Single atomic batch: the record plus every biomarker upsert.
    let mut tx = state.db.begin().await.context("begin save batch")?;
    let record = repo::insert_tx(&mut tx, record_id, user_id, now, &analysis).await?;
    for (folded, bundle) in &merged {
        biomarker_repo::upsert_tx(&mut tx, user_id, folded, bundle, now).await?;
    }
    tx.commit().await.context("commit save batch")?;

    Ok(record)
}
