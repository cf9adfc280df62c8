use super::{parse_date, validate_period, ClassLabel, RecordManager};
use crate::blob::BlobStore;
use crate::error::RecordError;
use crate::model::{ClassSection, LessonLog, Stored, COL_LESSON_LOGS};
use crate::store::{DocumentStore, Filter};
use std::collections::HashMap;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct LessonUpsert {
    pub log: Stored<LessonLog>,
    pub created: bool,
}

/// Lesson log with class and subject names resolved at read time.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonLogRow {
    pub log: Stored<LessonLog>,
    pub label: ClassLabel,
}

/// Lesson logs of one day; `date` is the normalized `YYYY-MM-DD` key.
#[derive(Debug, Clone, PartialEq)]
pub struct LessonDay {
    pub date: String,
    pub rows: Vec<LessonLogRow>,
}

impl<S: DocumentStore, B: BlobStore> RecordManager<S, B> {
    /// At most one log exists per (class, date, period). An existing log
    /// keeps its id and creation time; progress and note are replaced.
    pub fn upsert_lesson_log(
        &self,
        class_id: &str,
        date: &str,
        period: i64,
        progress: &str,
        note: &str,
    ) -> Result<LessonUpsert, RecordError> {
        self.load::<ClassSection>(class_id)?;
        let date = parse_date(date)?;
        let period = validate_period(period)?;
        let data = LessonLog {
            class_id: class_id.to_string(),
            date,
            period,
            progress: progress.trim().to_string(),
            note: note.trim().to_string(),
        };

        let existing = self
            .query::<LessonLog>(&[
                Filter::eq("class_id", class_id),
                Filter::eq("date", data.date.as_str()),
                Filter::eq("period", period),
            ])?
            .into_iter()
            .next();
        let (log, created) = match existing {
            Some(found) => (self.save(&found.id, &data)?, false),
            None => (self.create(data)?, true),
        };
        info!(
            lesson_log_id = %log.id,
            class_id = %class_id,
            date = %log.data.date,
            period,
            created,
            "lesson log saved"
        );
        Ok(LessonUpsert { log, created })
    }

    pub fn list_lesson_logs(
        &self,
        class_id: &str,
        date: &str,
    ) -> Result<Vec<Stored<LessonLog>>, RecordError> {
        let date = parse_date(date)?;
        let mut rows = self.query::<LessonLog>(&[
            Filter::eq("class_id", class_id),
            Filter::eq("date", date),
        ])?;
        rows.sort_by_key(|r| r.data.period);
        Ok(rows)
    }

    /// Every class's logs for one day, ordered by class label then period.
    pub fn lesson_logs_by_date(&self, date: &str) -> Result<LessonDay, RecordError> {
        let date = parse_date(date)?;
        let logs = self.query::<LessonLog>(&[Filter::eq("date", date.as_str())])?;
        let mut labels = HashMap::new();
        let mut rows = Vec::with_capacity(logs.len());
        for log in logs {
            let label = self.class_label(&mut labels, &log.data.class_id)?;
            rows.push(LessonLogRow { log, label });
        }
        rows.sort_by(|a, b| {
            a.label
                .class_name
                .cmp(&b.label.class_name)
                .then(a.log.data.period.cmp(&b.log.data.period))
        });
        Ok(LessonDay { date, rows })
    }

    pub fn delete_lesson_log(&self, id: &str) -> Result<(), RecordError> {
        self.load::<LessonLog>(id)?;
        self.store.delete(COL_LESSON_LOGS, id)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::error::RecordError;
    use crate::model::COL_LESSON_LOGS;
    use crate::records::testing::fixture;
    use crate::store::{DocumentStore, Filter};

    #[test]
    fn repeated_upserts_keep_one_log_with_latest_values() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let class = fx.class(&subject.id, "1-3");

        let first = fx
            .records
            .upsert_lesson_log(&class.id, "2025-03-04", 2, "ch1", "quiet")
            .expect("first");
        assert!(first.created);
        let mut last = first.clone();
        for (progress, note) in [("ch2", "noisy"), ("ch3", ""), ("ch4", "done")] {
            last = fx
                .records
                .upsert_lesson_log(&class.id, "2025-03-04", 2, progress, note)
                .expect("again");
            assert!(!last.created);
        }
        assert_eq!(last.log.id, first.log.id);
        assert_eq!(last.log.created_at, first.log.created_at);

        let stored = fx
            .records
            .store()
            .query(
                COL_LESSON_LOGS,
                &[
                    Filter::eq("class_id", class.id.as_str()),
                    Filter::eq("date", "2025-03-04"),
                    Filter::eq("period", 2),
                ],
            )
            .expect("query");
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].fields["progress"], "ch4");
        assert_eq!(stored[0].fields["note"], "done");
    }

    #[test]
    fn different_periods_and_dates_are_separate_logs() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let class = fx.class(&subject.id, "1-3");
        for (date, period) in [("2025-03-04", 1), ("2025-03-04", 3), ("2025-03-05", 1)] {
            fx.records
                .upsert_lesson_log(&class.id, date, period, "x", "")
                .expect("upsert");
        }
        let periods: Vec<u32> = fx
            .records
            .list_lesson_logs(&class.id, "2025-03-04")
            .expect("list")
            .into_iter()
            .map(|l| l.data.period)
            .collect();
        assert_eq!(periods, vec![1, 3]);
    }

    #[test]
    fn invalid_keys_are_rejected_without_writing() {
        let fx = fixture();
        let subject = fx.subject("Math");
        let class = fx.class(&subject.id, "1-3");
        assert!(matches!(
            fx.records.upsert_lesson_log(&class.id, "2025-13-01", 1, "", ""),
            Err(RecordError::Invalid(_))
        ));
        assert!(matches!(
            fx.records.upsert_lesson_log(&class.id, "2025-03-04", 0, "", ""),
            Err(RecordError::Invalid(_))
        ));
        assert!(matches!(
            fx.records.upsert_lesson_log("ghost", "2025-03-04", 1, "", ""),
            Err(RecordError::NotFound { .. })
        ));
        assert!(fx
            .records
            .store()
            .query(COL_LESSON_LOGS, &[])
            .expect("query")
            .is_empty());
    }

    #[test]
    fn daily_view_joins_class_and_subject_names() {
        let fx = fixture();
        let math = fx.subject("Math");
        let art = fx.subject("Art");
        let b = fx.class(&math.id, "1-B");
        let a = fx.class(&art.id, "1-A");
        fx.records
            .upsert_lesson_log(&b.id, "2025-03-04", 1, "fractions", "")
            .expect("log");
        fx.records
            .upsert_lesson_log(&a.id, "2025-03-04", 4, "colour", "")
            .expect("log");
        fx.records
            .upsert_lesson_log(&a.id, "2025-03-04", 2, "lines", "")
            .expect("log");

        let day = fx.records.lesson_logs_by_date("2025-3-4").expect("by date");
        assert_eq!(day.date, "2025-03-04");
        let view: Vec<(Option<&str>, Option<&str>, u32)> = day
            .rows
            .iter()
            .map(|r| {
                (
                    r.label.class_name.as_deref(),
                    r.label.subject_name.as_deref(),
                    r.log.data.period,
                )
            })
            .collect();
        assert_eq!(
            view,
            vec![
                (Some("1-A"), Some("Art"), 2),
                (Some("1-A"), Some("Art"), 4),
                (Some("1-B"), Some("Math"), 1),
            ]
        );
    }
}
