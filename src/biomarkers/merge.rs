//! The fold applied to one extracted reading when a test is saved.
//!
//! Pure: callers fetch the existing biomarker, fold, then persist inside the
//! save batch. Readings without a numeric value (or without a name) are
//! skipped for the merge while staying verbatim in the saved record.

use time::OffsetDateTime;
use uuid::Uuid;

use crate::ai::BiomarkerReading;

use super::repo::{Biomarker, HistoryEntry, Trend};

/// Post-fold state of one biomarker, ready to upsert.
#[derive(Debug, Clone)]
pub struct MergedBiomarker {
    pub name: String,
    pub value: String,
    pub unit: Option<String>,
    pub status: Option<String>,
    pub ref_range: Option<String>,
    pub description: Option<String>,
    pub trend: Trend,
    pub history: Vec<HistoryEntry>,
}

pub fn parse_value(raw: &str) -> Option<f64> {
    let parsed = raw.trim().parse::<f64>().ok()?;
    parsed.is_finite().then_some(parsed)
}

/// Trend of `new` against the last recorded point; stable when there is no
/// prior history or the value is unchanged.
pub fn trend_against(history: &[HistoryEntry], new: f64) -> Trend {
    match history.last() {
        None => Trend::Stable,
        Some(prev) if new > prev.value => Trend::Up,
        Some(prev) if new < prev.value => Trend::Down,
        Some(_) => Trend::Stable,
    }
}

/// Fold one reading into the biomarker keyed by its name. Returns `None`
/// when the reading does not participate in the merge.
pub fn fold_reading(
    existing: Option<&Biomarker>,
    reading: &BiomarkerReading,
    now: OffsetDateTime,
    source_test_id: Uuid,
) -> Option<MergedBiomarker> {
    if reading.name.trim().is_empty() {
        return None;
    }
    let value = parse_value(&reading.value)?;

    let mut history = existing
        .map(|b| b.history.0.clone())
        .unwrap_or_default();
    let trend = trend_against(&history, value);
    history.push(HistoryEntry {
        value,
        date: now,
        source_test_id: Some(source_test_id),
    });

    // Current fields are last-write-wins from the newest reading, not an
    // aggregate over history.
    Some(MergedBiomarker {
        name: reading.name.clone(),
        value: reading.value.trim().to_string(),
        unit: reading.unit.clone(),
        status: reading.status.clone(),
        ref_range: reading.range.clone(),
        description: reading.explanation.clone(),
        trend,
        history,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::types::Json;

    fn reading(name: &str, value: &str) -> BiomarkerReading {
        BiomarkerReading {
            name: name.into(),
            value: value.into(),
            unit: Some("mmol/L".into()),
            status: Some("normal".into()),
            range: Some("3.9-5.6".into()),
            explanation: Some("blood sugar".into()),
        }
    }

    fn biomarker_with_history(history: Vec<HistoryEntry>) -> Biomarker {
        Biomarker {
            user_id: Uuid::new_v4(),
            name: "Glucose".into(),
            value: "5.0".into(),
            unit: Some("mmol/L".into()),
            status: Some("normal".into()),
            ref_range: None,
            description: None,
            trend: "stable".into(),
            history: Json(history),
            recommendations: None,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn entry(value: f64) -> HistoryEntry {
        HistoryEntry {
            value,
            date: OffsetDateTime::now_utc(),
            source_test_id: None,
        }
    }

    #[test]
    fn first_occurrence_starts_history_with_stable_trend() {
        let test_id = Uuid::new_v4();
        let merged =
            fold_reading(None, &reading("Glucose", "5.1"), OffsetDateTime::now_utc(), test_id)
                .unwrap();
        assert_eq!(merged.trend, Trend::Stable);
        assert_eq!(merged.history.len(), 1);
        assert_eq!(merged.history[0].value, 5.1);
        assert_eq!(merged.history[0].source_test_id, Some(test_id));
    }

    #[test]
    fn trend_compares_to_immediately_preceding_entry() {
        let existing = biomarker_with_history(vec![entry(4.0), entry(5.0)]);
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();

        let up = fold_reading(Some(&existing), &reading("Glucose", "5.5"), now, id).unwrap();
        assert_eq!(up.trend, Trend::Up);

        let down = fold_reading(Some(&existing), &reading("Glucose", "4.5"), now, id).unwrap();
        assert_eq!(down.trend, Trend::Down);

        let stable = fold_reading(Some(&existing), &reading("Glucose", "5.0"), now, id).unwrap();
        assert_eq!(stable.trend, Trend::Stable);
    }

    #[test]
    fn history_grows_by_one_per_fold_in_order() {
        let now = OffsetDateTime::now_utc();
        let id = Uuid::new_v4();
        let mut existing: Option<Biomarker> = None;
        for (i, value) in ["4.0", "4.2", "4.1"].iter().enumerate() {
            let merged =
                fold_reading(existing.as_ref(), &reading("Glucose", value), now, id).unwrap();
            assert_eq!(merged.history.len(), i + 1);
            let mut b = biomarker_with_history(merged.history.clone());
            b.value = merged.value.clone();
            existing = Some(b);
        }
        let history = existing.unwrap().history.0;
        assert_eq!(
            history.iter().map(|h| h.value).collect::<Vec<_>>(),
            vec![4.0, 4.2, 4.1]
        );
    }

    #[test]
    fn non_numeric_value_is_skipped() {
        let now = OffsetDateTime::now_utc();
        assert!(fold_reading(None, &reading("HbA1c", "negative"), now, Uuid::new_v4()).is_none());
        assert!(fold_reading(None, &reading("HbA1c", ""), now, Uuid::new_v4()).is_none());
        assert!(fold_reading(None, &reading("HbA1c", "NaN"), now, Uuid::new_v4()).is_none());
    }

    #[test]
    fn nameless_reading_is_skipped() {
        let now = OffsetDateTime::now_utc();
        assert!(fold_reading(None, &reading("  ", "5.0"), now, Uuid::new_v4()).is_none());
    }

    #[test]
    fn current_fields_are_last_write_wins() {
        let existing = biomarker_with_history(vec![entry(5.0)]);
        let mut newest = reading("Glucose", "6.0");
        newest.unit = None; // the newest reading overwrites, even with less data
        newest.status = Some("high".into());
        let merged = fold_reading(
            Some(&existing),
            &newest,
            OffsetDateTime::now_utc(),
            Uuid::new_v4(),
        )
        .unwrap();
        assert_eq!(merged.value, "6.0");
        assert_eq!(merged.unit, None);
        assert_eq!(merged.status.as_deref(), Some("high"));
    }

    #[test]
    fn parse_value_trims_and_rejects_junk() {
        assert_eq!(parse_value(" 5.25 "), Some(5.25));
        assert_eq!(parse_value("-0.5"), Some(-0.5));
        assert_eq!(parse_value("5.1 mmol/L"), None);
        assert_eq!(parse_value("abc"), None);
        assert_eq!(parse_value("inf"), None);
    }
}
