use chrono::NaiveTime;
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{
    ClassWithSchedule, ScheduleEntryView, ScheduleForClass, StudentScheduleEntry,
    SubjectWithTeachers, TeacherScheduleEntry, TeacherView,
};

#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduleEntry {
    pub class_id: i64,
    pub subject_id: i64,
    pub teacher_id: i64,
    pub day_of_week: i64,
    pub start_time: String,
}

/// Weekly timetable entries. A class can hold one entry per (day, start
/// time); times are stored as zero-padded "HH:MM" so the textual order is
/// the chronological order.
#[derive(Clone)]
pub struct ScheduleService {
    pool: SqlitePool,
}

impl ScheduleService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, entry))]
    pub async fn add_entry(&self, entry: &NewScheduleEntry) -> Result<ScheduleEntryView, AppError> {
        info!("Adding schedule entry");

        if !(0..=6).contains(&entry.day_of_week) {
            return Err(AppError::InvalidArgument(format!(
                "Day of week must be between 0 and 6, got {}",
                entry.day_of_week
            )));
        }

        let start_time = NaiveTime::parse_from_str(&entry.start_time, "%H:%M")
            .map_err(|_| {
                AppError::InvalidArgument(format!("Invalid start time: {}", entry.start_time))
            })?
            .format("%H:%M")
            .to_string();

        let class_name = sqlx::query_scalar::<_, String>("SELECT name FROM classes WHERE id = ?")
            .bind(entry.class_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Class not found".to_string()))?;

        let subject_name = sqlx::query_scalar::<_, String>("SELECT name FROM subjects WHERE id = ?")
            .bind(entry.subject_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Subject not found".to_string()))?;

        let teacher = sqlx::query_as::<_, (String, String)>(
            "SELECT first_name, last_name FROM teachers WHERE id = ?",
        )
        .bind(entry.teacher_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

        let taken = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM schedules
                 WHERE class_id = ? AND day_of_week = ? AND start_time = ?
             )",
        )
        .bind(entry.class_id)
        .bind(entry.day_of_week)
        .bind(&start_time)
        .fetch_one(&self.pool)
        .await?;

        if taken {
            return Err(AppError::Conflict(
                "An entry for this class already exists on this day and time".to_string(),
            ));
        }

        let res = sqlx::query(
            "INSERT INTO schedules (class_id, subject_id, teacher_id, day_of_week, start_time)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(entry.class_id)
        .bind(entry.subject_id)
        .bind(entry.teacher_id)
        .bind(entry.day_of_week)
        .bind(&start_time)
        .execute(&self.pool)
        .await?;

        tracing::debug!(class = %class_name, "Schedule entry created");

        Ok(ScheduleEntryView {
            id: res.last_insert_rowid(),
            day_of_week: entry.day_of_week,
            start_time,
            subject_name,
            teacher_name: format!("{} {}", teacher.0, teacher.1),
        })
    }

    #[instrument(skip(self))]
    pub async fn schedule_for_class(&self, class_id: i64) -> Result<ScheduleForClass, AppError> {
        let class_name = sqlx::query_scalar::<_, String>("SELECT name FROM classes WHERE id = ?")
            .bind(class_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("The class was not found".to_string()))?;

        let entries = sqlx::query_as::<_, ScheduleEntryView>(
            "SELECT sch.id, sch.day_of_week, sch.start_time,
                    sub.name AS subject_name,
                    t.first_name || ' ' || t.last_name AS teacher_name
             FROM schedules sch
             JOIN subjects sub ON sub.id = sch.subject_id
             JOIN teachers t ON t.id = sch.teacher_id
             WHERE sch.class_id = ?
             ORDER BY sch.day_of_week, sch.start_time",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ScheduleForClass {
            class_id,
            class_name,
            entries,
        })
    }

    #[instrument(skip(self))]
    pub async fn schedule_for_student(
        &self,
        account_id: &str,
    ) -> Result<Vec<StudentScheduleEntry>, AppError> {
        let student = sqlx::query_as::<_, (i64, Option<i64>)>(
            "SELECT id, class_id FROM students WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((_, class_id)) = student else {
            return Err(AppError::NotFound(
                "No student associated with this user account was found".to_string(),
            ));
        };

        // A student without a class has no timetable.
        let Some(class_id) = class_id else {
            return Ok(Vec::new());
        };

        let entries = sqlx::query_as::<_, StudentScheduleEntry>(
            "SELECT sch.day_of_week, sch.start_time,
                    c.name AS class_name,
                    sub.name AS subject_name,
                    t.first_name || ' ' || t.last_name AS teacher_name
             FROM schedules sch
             JOIN classes c ON c.id = sch.class_id
             JOIN subjects sub ON sub.id = sch.subject_id
             JOIN teachers t ON t.id = sch.teacher_id
             WHERE sch.class_id = ?
             ORDER BY sch.day_of_week, sch.start_time",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    #[instrument(skip(self))]
    pub async fn schedule_for_teacher(
        &self,
        account_id: &str,
    ) -> Result<Vec<TeacherScheduleEntry>, AppError> {
        let teacher_id =
            sqlx::query_scalar::<_, i64>("SELECT id FROM teachers WHERE account_id = ?")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(teacher_id) = teacher_id else {
            return Err(AppError::NotFound(
                "No teacher associated with this user account was found".to_string(),
            ));
        };

        let entries = sqlx::query_as::<_, TeacherScheduleEntry>(
            "SELECT sch.day_of_week, sch.start_time,
                    c.name AS class_name,
                    sub.name AS subject_name
             FROM schedules sch
             JOIN classes c ON c.id = sch.class_id
             JOIN subjects sub ON sub.id = sch.subject_id
             WHERE sch.teacher_id = ?
             ORDER BY sch.day_of_week, sch.start_time",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Every class with its entry count; classes with zero entries still
    /// appear so an empty timetable can be flagged.
    #[instrument(skip(self))]
    pub async fn classes_with_schedule(&self) -> Result<Vec<ClassWithSchedule>, AppError> {
        let classes = sqlx::query_as::<_, ClassWithSchedule>(
            "SELECT c.id, c.name,
                    (SELECT COUNT(*) FROM schedules sch WHERE sch.class_id = c.id) AS entry_count
             FROM classes c
             ORDER BY c.name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(classes)
    }

    #[instrument(skip(self))]
    pub async fn subjects_for_class(
        &self,
        class_id: i64,
    ) -> Result<Vec<SubjectWithTeachers>, AppError> {
        let rows = sqlx::query_as::<_, (i64, String, i64, String, String)>(
            "SELECT cs.subject_id, sub.name, t.id, t.first_name, t.last_name
             FROM class_subjects cs
             JOIN subjects sub ON sub.id = cs.subject_id
             JOIN teachers t ON t.id = cs.teacher_id
             WHERE cs.class_id = ?
             ORDER BY sub.name, t.last_name",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        let mut grouped: Vec<SubjectWithTeachers> = Vec::new();
        for (subject_id, subject_name, teacher_id, first_name, last_name) in rows {
            let teacher = TeacherView {
                id: teacher_id,
                first_name,
                last_name,
            };

            match grouped.iter_mut().find(|g| g.subject_id == subject_id) {
                Some(group) => {
                    if !group.teachers.iter().any(|t| t.id == teacher.id) {
                        group.teachers.push(teacher);
                    }
                }
                None => grouped.push(SubjectWithTeachers {
                    subject_id,
                    subject_name,
                    teachers: vec![teacher],
                }),
            }
        }

        Ok(grouped)
    }
}
