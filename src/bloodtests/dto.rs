use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::BloodTestAnalysis;

use super::repo::TestRecord;

/// Raw report image for extraction; bytes travel as a JSON byte array.
#[derive(Debug, Deserialize)]
pub struct AnalyzeTestRequest {
    pub image: serde_bytes::ByteBuf,
    #[serde(default = "default_mime")]
    pub mime_type: String,
}

fn default_mime() -> String {
    "image/jpeg".into()
}

/// Save a (possibly user-edited) analysis as an immutable record.
#[derive(Debug, Deserialize)]
pub struct SaveTestRequest {
    pub analysis: BloodTestAnalysis,
}

#[derive(Debug, Serialize)]
pub struct TestRecordView {
    pub id: Uuid,
    pub taken_at: OffsetDateTime,
    pub analysis: BloodTestAnalysis,
}

impl From<TestRecord> for TestRecordView {
    fn from(r: TestRecord) -> Self {
        Self {
            id: r.id,
            taken_at: r.taken_at,
            analysis: r.analysis.0,
        }
    }
}
