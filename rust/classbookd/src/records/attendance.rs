use super::{parse_date, validate_period, ClassLabel, RecordManager};
use crate::blob::BlobStore;
use crate::error::RecordError;
use crate::model::{AttendanceRecord, AttendanceStatus, ClassSection, Stored, Student};
use crate::store::{DocumentStore, Filter};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceEntry {
    pub student_id: String,
    pub status: AttendanceStatus,
    pub remark: String,
}

/// One roster line of the per-period attendance editor.
#[derive(Debug, Clone, PartialEq)]
pub struct SheetRow {
    pub student: Stored<Student>,
    pub record_id: Option<String>,
    pub status: AttendanceStatus,
    pub remark: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRow {
    pub record: Stored<AttendanceRecord>,
    pub label: ClassLabel,
    pub student_no: Option<String>,
    pub student_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceDay {
    pub rows: Vec<AttendanceRow>,
    pub counts: Vec<(AttendanceStatus, usize)>,
}

impl AttendanceDay {
    pub fn count(&self, status: AttendanceStatus) -> usize {
        self.counts
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, n)| *n)
            .unwrap_or(0)
    }
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    /// At most one record exists per (class, date, period, student).
    pub fn upsert_attendance(
        &self,
        class_id: &str,
        date: &str,
        period: i64,
        student_id: &str,
        status: AttendanceStatus,
        remark: &str,
    ) -> Result<Stored<AttendanceRecord>, RecordError> {
        let entry = AttendanceEntry {
            student_id: student_id.to_string(),
            status,
            remark: remark.to_string(),
        };
        let mut saved = self.save_attendance_sheet(class_id, date, period, &[entry], None)?;
        saved
            .pop()
            .ok_or_else(|| RecordError::not_found("attendance record", student_id))
    }

    /// Upserts one record per entry. `apply_all` overrides every entry's
    /// status. Entries are validated up front so a bad student id writes nothing.
    pub fn save_attendance_sheet(
        &self,
        class_id: &str,
        date: &str,
        period: i64,
        entries: &[AttendanceEntry],
        apply_all: Option<AttendanceStatus>,
    ) -> Result<Vec<Stored<AttendanceRecord>>, RecordError> {
        self.load::<ClassSection>(class_id)?;
        let date = parse_date(date)?;
        let period = validate_period(period)?;

        let roster: HashMap<String, Stored<Student>> = self
            .list_students(class_id)?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();
        if let Some(stray) = entries.iter().find(|e| !roster.contains_key(&e.student_id)) {
            return Err(RecordError::invalid(format!(
                "student {} is not on this class roster",
                stray.student_id
            )));
        }

        let mut existing: HashMap<String, Stored<AttendanceRecord>> = self
            .period_records(class_id, &date, period)?
            .into_iter()
            .map(|r| (r.data.student_id.clone(), r))
            .collect();

        let mut saved = Vec::with_capacity(entries.len());
        for entry in entries {
            let data = AttendanceRecord {
                class_id: class_id.to_string(),
                date: date.clone(),
                period,
                student_id: entry.student_id.clone(),
                status: apply_all.unwrap_or(entry.status),
                remark: entry.remark.trim().to_string(),
            };
            let record = match existing.remove(&entry.student_id) {
                Some(found) => self.save(&found.id, &data)?,
                None => self.create(data)?,
            };
            // A repeated student in the same sheet updates the record just written.
            existing.insert(entry.student_id.clone(), record.clone());
            saved.push(record);
        }
        info!(
            class_id = %class_id,
            date = %date,
            period,
            saved = saved.len(),
            "attendance saved"
        );
        Ok(saved)
    }

    /// Roster for one period, pre-filled with stored statuses; students
    /// without a record default to present.
    pub fn attendance_sheet(
        &self,
        class_id: &str,
        date: &str,
        period: i64,
    ) -> Result<Vec<SheetRow>, RecordError> {
        self.load::<ClassSection>(class_id)?;
        let date = parse_date(date)?;
        let period = validate_period(period)?;
        let mut existing: HashMap<String, Stored<AttendanceRecord>> = self
            .period_records(class_id, &date, period)?
            .into_iter()
            .map(|r| (r.data.student_id.clone(), r))
            .collect();

        Ok(self
            .list_students(class_id)?
            .into_iter()
            .map(|student| match existing.remove(&student.id) {
                Some(r) => SheetRow {
                    student,
                    record_id: Some(r.id),
                    status: r.data.status,
                    remark: r.data.remark,
                },
                None => SheetRow {
                    student,
                    record_id: None,
                    status: AttendanceStatus::default(),
                    remark: String::new(),
                },
            })
            .collect())
    }

    /// All classes' attendance for one day, with per-status totals.
    pub fn attendance_by_date(&self, date: &str) -> Result<AttendanceDay, RecordError> {
        let date = parse_date(date)?;
        let records = self.query::<AttendanceRecord>(&[Filter::eq("date", date)])?;

        let mut labels = HashMap::new();
        let mut students: HashMap<String, Option<Student>> = HashMap::new();
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let label = self.class_label(&mut labels, &record.data.class_id)?;
            let student = match students.get(&record.data.student_id) {
                Some(s) => s.clone(),
                None => {
                    let s = self
                        .find::<Student>(&record.data.student_id)?
                        .map(|s| s.data);
                    students.insert(record.data.student_id.clone(), s.clone());
                    s
                }
            };
            rows.push(AttendanceRow {
                record,
                label,
                student_no: student.as_ref().map(|s| s.student_no.clone()),
                student_name: student.map(|s| s.student_name),
            });
        }
        rows.sort_by(|a, b| {
            a.label
                .class_name
                .cmp(&b.label.class_name)
                .then(a.record.data.period.cmp(&b.record.data.period))
                .then(a.student_no.cmp(&b.student_no))
        });

        let counts = AttendanceStatus::ALL
            .into_iter()
            .map(|s| (s, rows.iter().filter(|r| r.record.data.status == s).count()))
            .collect();
        Ok(AttendanceDay { rows, counts })
    }

    fn period_records(
        &self,
        class_id: &str,
        date: &str,
        period: u32,
    ) -> Result<Vec<Stored<AttendanceRecord>>, RecordError> {
        self.query::<AttendanceRecord>(&[
            Filter::eq("class_id", class_id),
            Filter::eq("date", date),
            Filter::eq("period", period),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::COL_ATTENDANCE;
    use crate::records::testing::fixture;

    #[test]
    fn repeated_upserts_leave_one_record_with_latest_status() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let class = fx.class(&subject.id, "1-3");
        let kim = fx.student(&class.id, "001", "Kim");

        let first = fx
            .records
            .upsert_attendance(&class.id, "2025-03-04", 1, &kim.id, AttendanceStatus::Present, "")
            .expect("first");
        fx.records
            .upsert_attendance(&class.id, "2025-03-04", 1, &kim.id, AttendanceStatus::Late, "bus")
            .expect("second");
        let last = fx
            .records
            .upsert_attendance(
                &class.id,
                "2025-03-04",
                1,
                &kim.id,
                AttendanceStatus::Excused,
                "clinic",
            )
            .expect("third");
        assert_eq!(last.id, first.id);

        let docs = fx
            .records
            .store()
            .query(
                COL_ATTENDANCE,
                &[
                    Filter::eq("class_id", class.id.as_str()),
                    Filter::eq("date", "2025-03-04"),
                    Filter::eq("period", 1),
                    Filter::eq("student_id", kim.id.as_str()),
                ],
            )
            .expect("query");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].fields["status"], "excused");
        assert_eq!(docs[0].fields["remark"], "clinic");
    }

    #[test]
    fn students_from_other_classes_are_refused() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let a = fx.class(&subject.id, "1-1");
        let b = fx.class(&subject.id, "1-2");
        let kim = fx.student(&a.id, "001", "Kim");
        let lee = fx.student(&b.id, "001", "Lee");

        let entries = [
            AttendanceEntry {
                student_id: kim.id.clone(),
                status: AttendanceStatus::Absent,
                remark: String::new(),
            },
            AttendanceEntry {
                student_id: lee.id.clone(),
                status: AttendanceStatus::Absent,
                remark: String::new(),
            },
        ];
        let e = fx
            .records
            .save_attendance_sheet(&a.id, "2025-03-04", 1, &entries, None)
            .expect_err("stray student");
        assert!(matches!(e, RecordError::Invalid(_)));
        assert!(fx
            .records
            .store()
            .query(COL_ATTENDANCE, &[])
            .expect("query")
            .is_empty());
    }

    #[test]
    fn sheet_defaults_to_present_and_apply_all_overrides() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let class = fx.class(&subject.id, "1-3");
        let kim = fx.student(&class.id, "001", "Kim");
        let lee = fx.student(&class.id, "002", "Lee");
        fx.records
            .upsert_attendance(&class.id, "2025-03-04", 2, &lee.id, AttendanceStatus::Absent, "flu")
            .expect("seed");

        let sheet = fx
            .records
            .attendance_sheet(&class.id, "2025-03-04", 2)
            .expect("sheet");
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet[0].student.id, kim.id);
        assert_eq!(sheet[0].status, AttendanceStatus::Present);
        assert!(sheet[0].record_id.is_none());
        assert_eq!(sheet[1].status, AttendanceStatus::Absent);
        assert_eq!(sheet[1].remark, "flu");

        let entries: Vec<AttendanceEntry> = sheet
            .iter()
            .map(|r| AttendanceEntry {
                student_id: r.student.id.clone(),
                status: r.status,
                remark: r.remark.clone(),
            })
            .collect();
        let saved = fx
            .records
            .save_attendance_sheet(
                &class.id,
                "2025-03-04",
                2,
                &entries,
                Some(AttendanceStatus::Late),
            )
            .expect("save");
        assert!(saved.iter().all(|r| r.data.status == AttendanceStatus::Late));
        assert_eq!(
            fx.records
                .store()
                .query(COL_ATTENDANCE, &[])
                .expect("query")
                .len(),
            2
        );
    }

    #[test]
    fn daily_view_sorts_joins_and_counts() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let b = fx.class(&subject.id, "1-B");
        let a = fx.class(&subject.id, "1-A");
        let b1 = fx.student(&b.id, "010", "Yoon");
        let a2 = fx.student(&a.id, "002", "Lee");
        let a1 = fx.student(&a.id, "001", "Kim");
        let day = "2025-03-04";
        fx.records
            .upsert_attendance(&b.id, day, 1, &b1.id, AttendanceStatus::Absent, "")
            .expect("att");
        fx.records
            .upsert_attendance(&a.id, day, 2, &a2.id, AttendanceStatus::Late, "")
            .expect("att");
        fx.records
            .upsert_attendance(&a.id, day, 2, &a1.id, AttendanceStatus::Present, "")
            .expect("att");
        fx.records
            .upsert_attendance(&a.id, "2025-03-05", 2, &a1.id, AttendanceStatus::Absent, "")
            .expect("other day");

        let view = fx.records.attendance_by_date(day).expect("by date");
        let order: Vec<(Option<&str>, u32, Option<&str>)> = view
            .rows
            .iter()
            .map(|r| {
                (
                    r.label.class_name.as_deref(),
                    r.record.data.period,
                    r.student_no.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            order,
            vec![
                (Some("1-A"), 2, Some("001")),
                (Some("1-A"), 2, Some("002")),
                (Some("1-B"), 1, Some("010")),
            ]
        );
        assert_eq!(view.count(AttendanceStatus::Present), 1);
        assert_eq!(view.count(AttendanceStatus::Absent), 1);
        assert_eq!(view.count(AttendanceStatus::Late), 1);
        assert_eq!(view.count(AttendanceStatus::Excused), 0);
    }
}
