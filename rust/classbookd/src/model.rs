//! Typed views over the stored collections.

use crate::store::{Document, Fields, StoreError};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const COL_SUBJECTS: &str = "subjects";
pub const COL_CLASSES: &str = "class_sections";
pub const COL_STUDENTS: &str = "class_students";
pub const COL_LESSON_LOGS: &str = "lesson_logs";
pub const COL_ATTENDANCE: &str = "attendance";
pub const COL_EXPORTS: &str = "exports";

/// Collections that can be written to an export workbook.
pub const EXPORTABLE_COLLECTIONS: [&str; 5] = [
    COL_SUBJECTS,
    COL_CLASSES,
    COL_STUDENTS,
    COL_LESSON_LOGS,
    COL_ATTENDANCE,
];

pub const PDF_MIME: &str = "application/pdf";

pub trait Entity: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Human-readable name used in error messages.
    const KIND: &'static str;
}

/// A decoded document together with its identity and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Stored<T> {
    pub id: String,
    pub created_at: String,
    pub updated_at: String,
    pub data: T,
}

impl<T: Entity> Stored<T> {
    pub fn from_document(doc: Document) -> Result<Self, StoreError> {
        let data = serde_json::from_value(Value::Object(doc.fields))?;
        Ok(Self {
            id: doc.id,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
            data,
        })
    }
}

pub fn to_fields<T: Serialize>(data: &T) -> Result<Fields, StoreError> {
    match serde_json::to_value(data)? {
        Value::Object(map) => Ok(map),
        _ => Ok(Fields::new()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    #[serde(rename = "1")]
    First,
    #[serde(rename = "2")]
    Second,
}

impl Term {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "1" => Some(Self::First),
            "2" => Some(Self::Second),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::First => "1",
            Self::Second => "2",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subject {
    pub name: String,
    pub year: i64,
    pub term: Term,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_mime: Option<String>,
}

impl Entity for Subject {
    const COLLECTION: &'static str = COL_SUBJECTS;
    const KIND: &'static str = "subject";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScheduleSlot {
    pub weekday: u8,
    pub period: u32,
}

impl ScheduleSlot {
    pub fn is_valid(&self) -> bool {
        (1..=7).contains(&self.weekday) && self.period >= 1
    }
}

/// A taught section of a subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassSection {
    pub subject_id: String,
    pub class_name: String,
    pub year: i64,
    pub term: Term,
    #[serde(default)]
    pub schedule: Vec<ScheduleSlot>,
}

impl Entity for ClassSection {
    const COLLECTION: &'static str = COL_CLASSES;
    const KIND: &'static str = "class";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub class_id: String,
    pub student_no: String,
    pub student_name: String,
}

impl Entity for Student {
    const COLLECTION: &'static str = COL_STUDENTS;
    const KIND: &'static str = "student";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonLog {
    pub class_id: String,
    pub date: String,
    pub period: u32,
    #[serde(default)]
    pub progress: String,
    #[serde(default)]
    pub note: String,
}

impl Entity for LessonLog {
    const COLLECTION: &'static str = COL_LESSON_LOGS;
    const KIND: &'static str = "lesson log";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub class_id: String,
    pub date: String,
    pub period: u32,
    pub student_id: String,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub remark: String,
}

impl Entity for AttendanceRecord {
    const COLLECTION: &'static str = COL_ATTENDANCE;
    const KIND: &'static str = "attendance record";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportLog {
    pub title: String,
    pub collections: Vec<String>,
    pub output_path: String,
    pub sheet_count: usize,
}

impl Entity for ExportLog {
    const COLLECTION: &'static str = COL_EXPORTS;
    const KIND: &'static str = "export";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    #[default]
    Present,
    Absent,
    Late,
    Excused,
}

/// Presentation vocabulary for attendance statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LabelSet {
    #[default]
    English,
    Korean,
    Code,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn as_str(self) -> &'static str {
        self.label(LabelSet::English)
    }

    pub fn label(self, set: LabelSet) -> &'static str {
        match (set, self) {
            (LabelSet::English, Self::Present) => "present",
            (LabelSet::English, Self::Absent) => "absent",
            (LabelSet::English, Self::Late) => "late",
            (LabelSet::English, Self::Excused) => "excused",
            (LabelSet::Korean, Self::Present) => "출석",
            (LabelSet::Korean, Self::Absent) => "결석",
            (LabelSet::Korean, Self::Late) => "지각",
            (LabelSet::Korean, Self::Excused) => "공결",
            (LabelSet::Code, Self::Present) => "P",
            (LabelSet::Code, Self::Absent) => "A",
            (LabelSet::Code, Self::Late) => "L",
            (LabelSet::Code, Self::Excused) => "E",
        }
    }

    /// Accepts a label from any vocabulary, ignoring ASCII case.
    pub fn from_label(raw: &str) -> Option<Self> {
        let t = raw.trim();
        Self::ALL.into_iter().find(|s| {
            [LabelSet::English, LabelSet::Korean, LabelSet::Code]
                .into_iter()
                .any(|set| s.label(set).eq_ignore_ascii_case(t))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_labels_parse_from_every_vocabulary() {
        assert_eq!(AttendanceStatus::from_label("late"), Some(AttendanceStatus::Late));
        assert_eq!(AttendanceStatus::from_label(" Absent "), Some(AttendanceStatus::Absent));
        assert_eq!(AttendanceStatus::from_label("공결"), Some(AttendanceStatus::Excused));
        assert_eq!(AttendanceStatus::from_label("p"), Some(AttendanceStatus::Present));
        assert_eq!(AttendanceStatus::from_label("sick"), None);
    }

    #[test]
    fn status_is_stored_in_canonical_form() {
        let v = serde_json::to_value(AttendanceStatus::Excused).expect("serialize");
        assert_eq!(v, serde_json::json!("excused"));
        for s in AttendanceStatus::ALL {
            assert_eq!(AttendanceStatus::from_label(s.label(LabelSet::Korean)), Some(s));
        }
    }

    #[test]
    fn term_round_trips_as_text() {
        assert_eq!(serde_json::to_value(Term::Second).expect("ser"), serde_json::json!("2"));
        assert_eq!(Term::parse(" 1"), Some(Term::First));
        assert_eq!(Term::parse("3"), None);
    }

    #[test]
    fn subject_without_pdf_omits_pdf_fields() {
        let s = Subject {
            name: "Math".into(),
            year: 2025,
            term: Term::First,
            pdf_path: None,
            pdf_url: None,
            pdf_size: None,
            pdf_mime: None,
        };
        let f = to_fields(&s).expect("fields");
        assert!(!f.contains_key("pdf_path"));
        assert_eq!(f["term"], serde_json::json!("1"));
    }
}
