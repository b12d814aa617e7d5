//! Read path over persisted resume records.
//!
//! Records are never mutated here. Listing tolerates values that do not parse
//! (they are logged and skipped) and every summary carries an explicit
//! [`ScoreBadge`], so a record still waiting for feedback renders as pending
//! instead of breaking the list.

use crate::error::{RemoteError, ResumindError};
use crate::facade::Capabilities;
use crate::record::{record_key, Feedback, ResumeRecord, RESUME_KEY_PATTERN};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Score shown next to a record in a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "score", rename_all = "lowercase")]
pub enum ScoreBadge {
    Scored(u8),
    /// Analysis not written yet.
    Pending,
    /// The analysis came back as unstructured text.
    Unscored,
}

impl ScoreBadge {
    pub fn for_feedback(feedback: &Feedback) -> Self {
        match feedback {
            Feedback::Structured(report) => ScoreBadge::Scored(report.overall_score),
            Feedback::Pending => ScoreBadge::Pending,
            Feedback::Raw(_) => ScoreBadge::Unscored,
        }
    }
}

/// What a listing card shows for one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSummary {
    pub id: String,
    pub title: String,
    /// Job title when the title is the company name.
    pub subtitle: Option<String>,
    pub image_path: String,
    pub badge: ScoreBadge,
    pub created_at: DateTime<Utc>,
}

impl ResumeSummary {
    pub fn from_record(record: &ResumeRecord) -> Self {
        let company = record.company_name.trim();
        let job = record.job_title.trim();
        let (title, subtitle) = match (company.is_empty(), job.is_empty()) {
            (false, false) => (company.to_string(), Some(job.to_string())),
            (false, true) => (company.to_string(), None),
            (true, false) => (job.to_string(), None),
            (true, true) => ("Resume".to_string(), None),
        };
        Self {
            id: record.id.clone(),
            title,
            subtitle,
            image_path: record.image_path.clone(),
            badge: ScoreBadge::for_feedback(&record.feedback),
            created_at: record.created_at,
        }
    }
}

/// A record with its stored files, as needed by the review view.
#[derive(Debug, Clone)]
pub struct ResumeReview {
    pub record: ResumeRecord,
    pub resume_pdf: Vec<u8>,
    pub preview_png: Vec<u8>,
}

/// What [`ResumeStore::wipe`] removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WipeReport {
    pub files_deleted: usize,
    pub kv_flushed: bool,
}

pub struct ResumeStore {
    caps: Arc<Capabilities>,
}

impl ResumeStore {
    pub fn new(caps: Arc<Capabilities>) -> Self {
        Self { caps }
    }

    /// Every record, newest first.
    pub async fn list(&self) -> Result<Vec<ResumeRecord>, ResumindError> {
        let entries = self.caps.kv().list(RESUME_KEY_PATTERN, Some(true)).await?;
        let mut records: Vec<ResumeRecord> = entries
            .into_iter()
            .filter_map(|entry| {
                let Some(value) = entry.value else {
                    warn!("Record {} listed without a value; skipping", entry.key);
                    return None;
                };
                match ResumeRecord::from_json(&value) {
                    Ok(record) => Some(record),
                    Err(e) => {
                        warn!("Skipping malformed record {}: {}", entry.key, e);
                        None
                    }
                }
            })
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!("Listed {} resume records", records.len());
        Ok(records)
    }

    pub async fn summaries(&self) -> Result<Vec<ResumeSummary>, ResumindError> {
        Ok(self
            .list()
            .await?
            .iter()
            .map(ResumeSummary::from_record)
            .collect())
    }

    /// The record with `id`, if one exists.
    pub async fn get(&self, id: &str) -> Result<Option<ResumeRecord>, ResumindError> {
        let Some(value) = self.caps.kv().get(&record_key(id)).await? else {
            return Ok(None);
        };
        let record = ResumeRecord::from_json(&value).map_err(RemoteError::from)?;
        Ok(Some(record))
    }

    /// The record plus its resume and preview bytes.
    pub async fn load_review(&self, id: &str) -> Result<Option<ResumeReview>, ResumindError> {
        let Some(record) = self.get(id).await? else {
            return Ok(None);
        };
        let resume_pdf = self.caps.fs().read(&record.resume_path).await?;
        let preview_png = self.caps.fs().read(&record.image_path).await?;
        Ok(Some(ResumeReview {
            record,
            resume_pdf,
            preview_png,
        }))
    }

    /// Delete every stored file and flush the key-value store.
    pub async fn wipe(&self) -> Result<WipeReport, ResumindError> {
        let items = self.caps.fs().read_dir("./").await?;
        let mut report = WipeReport::default();
        for item in &items {
            self.caps.fs().delete(&item.path).await?;
            report.files_deleted += 1;
        }
        report.kv_flushed = self.caps.kv().flush().await?;
        info!(
            "Wiped {} files, key-value flushed: {}",
            report.files_deleted, report.kv_flushed
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::FeedbackReport;

    fn record(company: &str, job: &str) -> ResumeRecord {
        ResumeRecord::new("id", "/a.pdf", "/a.png", company, job, "")
    }

    #[test]
    fn title_falls_back_through_company_and_job() {
        let s = ResumeSummary::from_record(&record("Acme", "Engineer"));
        assert_eq!((s.title.as_str(), s.subtitle.as_deref()), ("Acme", Some("Engineer")));
        assert_eq!(ResumeSummary::from_record(&record("", "Engineer")).title, "Engineer");
        assert_eq!(ResumeSummary::from_record(&record(" ", "")).title, "Resume");
    }

    #[test]
    fn badge_covers_every_feedback_state() {
        let mut r = record("Acme", "");
        assert_eq!(ResumeSummary::from_record(&r).badge, ScoreBadge::Pending);

        r.feedback = Feedback::Raw("text".into());
        assert_eq!(ResumeSummary::from_record(&r).badge, ScoreBadge::Unscored);

        let report: FeedbackReport = serde_json::from_value(serde_json::json!({
            "overallScore": 81,
            "ATS": {"score": 1}, "toneAndStyle": {"score": 2}, "content": {"score": 3},
            "structure": {"score": 4}, "skills": {"score": 5}
        }))
        .unwrap();
        r.feedback = Feedback::Structured(report);
        assert_eq!(ResumeSummary::from_record(&r).badge, ScoreBadge::Scored(81));
    }

    #[test]
    fn badge_serialises_with_state_tag() {
        assert_eq!(
            serde_json::to_value(ScoreBadge::Scored(70)).unwrap(),
            serde_json::json!({"state": "scored", "score": 70})
        );
        assert_eq!(
            serde_json::to_value(ScoreBadge::Pending).unwrap(),
            serde_json::json!({"state": "pending"})
        );
    }
}
