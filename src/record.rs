//! Persisted resume records and the AI feedback schema.
//!
//! A [`ResumeRecord`] is stored as JSON under `resume:<id>`. Its `feedback`
//! field is a three-way [`Feedback`] union: pending, a structured report, or
//! free text when the analysis did not match the report schema.
//!
//! ## Persisted shape
//!
//! ```json
//! {
//!   "id": "3f0c…",
//!   "resumePath": "/files/resume.pdf",
//!   "imagePath": "/files/resume.png",
//!   "companyName": "Acme",
//!   "jobTitle": "Engineer",
//!   "jobDescription": "Build things.",
//!   "feedback": null,
//!   "createdAt": "2025-01-01T00:00:00Z"
//! }
//! ```
//!
//! `feedback` is `null` while pending, the report object once analysed, or
//! `{"raw": "<text>"}` when the AI answer was not valid report JSON.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Prefix shared by every record key.
pub const RESUME_KEY_PREFIX: &str = "resume:";

/// Key-value pattern matching every record.
pub const RESUME_KEY_PATTERN: &str = "resume:*";

/// Storage key for the record with the given id.
pub fn record_key(id: &str) -> String {
    format!("{RESUME_KEY_PREFIX}{id}")
}

/// One analysed (or pending) resume submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub id: String,
    pub resume_path: String,
    pub image_path: String,
    #[serde(default)]
    pub company_name: String,
    #[serde(default)]
    pub job_title: String,
    #[serde(default)]
    pub job_description: String,
    #[serde(default)]
    pub feedback: Feedback,
    pub created_at: DateTime<Utc>,
}

impl ResumeRecord {
    /// New record with pending feedback, stamped with the current time.
    pub fn new(
        id: impl Into<String>,
        resume_path: impl Into<String>,
        image_path: impl Into<String>,
        company_name: impl Into<String>,
        job_title: impl Into<String>,
        job_description: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            resume_path: resume_path.into(),
            image_path: image_path.into(),
            company_name: company_name.into(),
            job_title: job_title.into(),
            job_description: job_description.into(),
            feedback: Feedback::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn key(&self) -> String {
        record_key(&self.id)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

// ── Feedback ─────────────────────────────────────────────────────────────

/// The analysis attached to a record.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Feedback {
    /// Record saved, analysis not written yet.
    #[default]
    Pending,
    /// The AI answered with a report matching [`FeedbackReport`].
    Structured(FeedbackReport),
    /// The AI answered with text that is not report JSON.
    Raw(String),
}

impl Feedback {
    /// Interpret the text of an AI answer.
    ///
    /// An outer ```` ```json ```` fence is tolerated. Anything that does not
    /// parse as a report is kept verbatim as [`Feedback::Raw`]; this never
    /// fails.
    pub fn from_response_text(text: &str) -> Feedback {
        let candidate = strip_json_fence(text);
        match serde_json::from_str::<FeedbackReport>(candidate) {
            Ok(report) => Feedback::Structured(report),
            Err(e) => {
                tracing::debug!("Feedback is not report JSON ({e}); keeping raw text");
                Feedback::Raw(text.to_string())
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Feedback::Pending)
    }

    pub fn report(&self) -> Option<&FeedbackReport> {
        match self {
            Feedback::Structured(r) => Some(r),
            _ => None,
        }
    }

    pub fn overall_score(&self) -> Option<u8> {
        self.report().map(|r| r.overall_score)
    }
}

#[derive(Serialize, Deserialize)]
struct RawFeedback {
    raw: String,
}

impl Serialize for Feedback {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Feedback::Pending => serializer.serialize_none(),
            Feedback::Structured(report) => report.serialize(serializer),
            Feedback::Raw(text) => RawFeedback { raw: text.clone() }.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Feedback {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        if value.is_null() {
            return Ok(Feedback::Pending);
        }
        if let Ok(report) = FeedbackReport::deserialize(&value) {
            return Ok(Feedback::Structured(report));
        }
        if let Ok(raw) = RawFeedback::deserialize(&value) {
            return Ok(Feedback::Raw(raw.raw));
        }
        // Anything else the AI produced is kept as text rather than dropped.
        Ok(Feedback::Raw(value.to_string()))
    }
}

static RE_JSON_FENCE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json|JSON)?[ \t]*\n(.*?)\n?```$").unwrap());

fn strip_json_fence(text: &str) -> &str {
    let trimmed = text.trim();
    match RE_JSON_FENCE.captures(trimmed).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => trimmed,
    }
}

// ── Report schema ────────────────────────────────────────────────────────

/// Structured AI feedback: an overall score and five scored categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackReport {
    #[serde(deserialize_with = "deserialize_score")]
    pub overall_score: u8,
    #[serde(rename = "ATS")]
    pub ats: CategoryReport,
    pub tone_and_style: CategoryReport,
    pub content: CategoryReport,
    pub structure: CategoryReport,
    pub skills: CategoryReport,
}

impl FeedbackReport {
    /// Categories in display order with their headings.
    pub fn categories(&self) -> [(&'static str, &CategoryReport); 5] {
        [
            ("ATS", &self.ats),
            ("Tone & Style", &self.tone_and_style),
            ("Content", &self.content),
            ("Structure", &self.structure),
            ("Skills", &self.skills),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryReport {
    #[serde(deserialize_with = "deserialize_score")]
    pub score: u8,
    #[serde(default)]
    pub tips: Vec<Tip>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tip {
    #[serde(rename = "type")]
    pub kind: TipKind,
    pub tip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TipKind {
    Good,
    Improve,
}

/// Scores arrive as loosely-typed JSON; round and clamp them into 0–100.
fn deserialize_score<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u8, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let n = match &value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|n| n.is_finite())
    .ok_or_else(|| D::Error::custom(format!("score must be a number, got {value}")))?;

    Ok(n.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"{
        "overallScore": 78,
        "ATS": {"score": 80, "tips": [{"type": "good", "tip": "Clear headings"}]},
        "toneAndStyle": {"score": 70, "tips": [{"type": "improve", "tip": "Active voice", "explanation": "Prefer verbs."}]},
        "content": {"score": 75, "tips": []},
        "structure": {"score": 90, "tips": []},
        "skills": {"score": 65.6, "tips": []}
    }"#;

    #[test]
    fn parses_structured_report() {
        let fb = Feedback::from_response_text(REPORT);
        let report = fb.report().expect("structured");
        assert_eq!(report.overall_score, 78);
        assert_eq!(report.ats.tips[0].kind, TipKind::Good);
        assert_eq!(
            report.tone_and_style.tips[0].explanation.as_deref(),
            Some("Prefer verbs.")
        );
        assert_eq!(report.skills.score, 66);
    }

    #[test]
    fn fenced_report_is_accepted() {
        let fenced = format!("```json\n{REPORT}\n```");
        assert_eq!(Feedback::from_response_text(&fenced).overall_score(), Some(78));
    }

    #[test]
    fn invalid_json_becomes_raw() {
        assert_eq!(
            Feedback::from_response_text("not valid json"),
            Feedback::Raw("not valid json".into())
        );
    }

    #[test]
    fn json_missing_categories_becomes_raw() {
        let fb = Feedback::from_response_text(r#"{"overallScore": 50}"#);
        assert!(matches!(fb, Feedback::Raw(_)));
    }

    #[test]
    fn scores_are_clamped() {
        let text = REPORT.replace("\"overallScore\": 78", "\"overallScore\": 140");
        assert_eq!(Feedback::from_response_text(&text).overall_score(), Some(100));
    }

    #[test]
    fn feedback_serialises_as_null_object_or_raw() {
        assert_eq!(serde_json::to_string(&Feedback::Pending).unwrap(), "null");
        assert_eq!(
            serde_json::to_string(&Feedback::Raw("x".into())).unwrap(),
            r#"{"raw":"x"}"#
        );
        let structured = Feedback::from_response_text(REPORT);
        let v: Value = serde_json::to_value(&structured).unwrap();
        assert_eq!(v["overallScore"], 78);
        assert_eq!(v["ATS"]["score"], 80);
    }

    #[test]
    fn record_round_trips_through_kv_json() {
        let mut record = ResumeRecord::new("abc", "/r.pdf", "/r.png", "Acme", "Engineer", "");
        assert!(record.feedback.is_pending());
        let pending: Value = serde_json::from_str(&record.to_json().unwrap()).unwrap();
        assert!(pending["feedback"].is_null());
        assert_eq!(pending["resumePath"], "/r.pdf");

        record.feedback = Feedback::Raw("free text".into());
        let back = ResumeRecord::from_json(&record.to_json().unwrap()).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.key(), "resume:abc");
    }

    #[test]
    fn record_without_feedback_field_is_pending() {
        let json = r#"{"id":"1","resumePath":"a","imagePath":"b","createdAt":"2025-01-01T00:00:00Z"}"#;
        let record = ResumeRecord::from_json(json).unwrap();
        assert!(record.feedback.is_pending());
        assert_eq!(record.company_name, "");
    }
}
