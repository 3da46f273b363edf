use chrono::{Datelike, NaiveDateTime, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{AttendanceStatus, LessonForAttendance, StudentForAttendance};

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceEntry {
    pub student_id: i64,
    pub status: AttendanceStatus,
    pub comment: Option<String>,
}

/// Daily attendance: per-lesson rosters with today's status and the
/// replace-on-save recording that keeps at most one record per
/// (student, lesson, date).
#[derive(Clone)]
pub struct AttendanceService {
    pool: SqlitePool,
}

/// Half-open bounds of the current UTC day.
fn today_bounds() -> (NaiveDateTime, NaiveDateTime) {
    let today = Utc::now().date_naive();
    let start = today.and_hms_opt(0, 0, 0).unwrap_or_default();
    let end = today
        .succ_opt()
        .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default())
        .unwrap_or(start);
    (start, end)
}

impl AttendanceService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn students_for_schedule(
        &self,
        schedule_id: i64,
    ) -> Result<Vec<StudentForAttendance>, AppError> {
        let class_id = sqlx::query_scalar::<_, i64>(
            "SELECT class_id FROM schedules WHERE id = ?",
        )
        .bind(schedule_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(class_id) = class_id else {
            return Err(AppError::NotFound(
                "Lesson plan with the given ID was not found".to_string(),
            ));
        };

        let (today_start, today_end) = today_bounds();

        #[derive(sqlx::FromRow)]
        struct Row {
            student_id: i64,
            full_name: String,
            status: Option<String>,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT s.id AS student_id,
                    s.first_name || ' ' || s.last_name AS full_name,
                    a.status
             FROM students s
             LEFT JOIN attendances a
               ON a.student_id = s.id AND a.schedule_id = ?
              AND a.date >= ? AND a.date < ?
             WHERE s.class_id = ?
             ORDER BY s.last_name, s.first_name",
        )
        .bind(schedule_id)
        .bind(today_start)
        .bind(today_end)
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            let status = match row.status.as_deref() {
                Some(s) => AttendanceStatus::from_str(s)?,
                None => AttendanceStatus::default(),
            };
            students.push(StudentForAttendance {
                student_id: row.student_id,
                full_name: row.full_name,
                status,
            });
        }

        Ok(students)
    }

    /// Replaces today's records for the lesson with the submitted set. Two
    /// saves for the same lesson and day leave exactly the second set.
    #[instrument(skip(self, records), fields(record_count = records.len()))]
    pub async fn save_attendance(
        &self,
        schedule_id: i64,
        records: &[AttendanceEntry],
        modified_by: Option<&str>,
    ) -> Result<(), AppError> {
        if records.is_empty() {
            return Err(AppError::InvalidArgument(
                "The attendance list is empty".to_string(),
            ));
        }

        info!("Saving attendance");

        let (today_start, today_end) = today_bounds();
        let now = Utc::now().naive_utc();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "DELETE FROM attendances WHERE schedule_id = ? AND date >= ? AND date < ?",
        )
        .bind(schedule_id)
        .bind(today_start)
        .bind(today_end)
        .execute(&mut *tx)
        .await?;

        for record in records {
            sqlx::query(
                "INSERT INTO attendances (student_id, schedule_id, date, status, comment, modified_by)
                 VALUES (?, ?, ?, ?, ?, ?)",
            )
            .bind(record.student_id)
            .bind(schedule_id)
            .bind(now)
            .bind(record.status.as_str())
            .bind(record.comment.as_deref())
            .bind(modified_by)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn today_lessons_for_teacher(
        &self,
        teacher_id: i64,
    ) -> Result<Vec<LessonForAttendance>, AppError> {
        let day_of_week = Utc::now().weekday().num_days_from_sunday() as i64;
        let (today_start, today_end) = today_bounds();

        #[derive(sqlx::FromRow)]
        struct Row {
            schedule_id: i64,
            subject_name: String,
            class_name: String,
            start_time: String,
            has_attendance: bool,
        }

        let rows = sqlx::query_as::<_, Row>(
            "SELECT sch.id AS schedule_id,
                    sub.name AS subject_name,
                    c.name AS class_name,
                    sch.start_time,
                    EXISTS (
                        SELECT 1 FROM attendances a
                        WHERE a.schedule_id = sch.id AND a.date >= ? AND a.date < ?
                    ) AS has_attendance
             FROM schedules sch
             JOIN subjects sub ON sub.id = sch.subject_id
             JOIN classes c ON c.id = sch.class_id
             WHERE sch.teacher_id = ? AND sch.day_of_week = ?
             ORDER BY sch.start_time",
        )
        .bind(today_start)
        .bind(today_end)
        .bind(teacher_id)
        .bind(day_of_week)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LessonForAttendance {
                schedule_id: row.schedule_id,
                subject_name: row.subject_name,
                class_name: row.class_name,
                start_time: row.start_time,
                has_attendance: row.has_attendance,
            })
            .collect())
    }
}
