use std::collections::HashMap;

use chrono::Utc;
use serde::Deserialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{DbSubject, SubjectAssignment, SubjectDetail, SubjectSummary};
use crate::paging::{Paged, PagedRequest, SortDirection, SubjectSortKey};

#[derive(Debug, Clone, Deserialize)]
pub struct SubjectUpdate {
    pub id: i64,
    pub name: String,
    pub assignments: Vec<SubjectAssignment>,
}

/// Subjects and their class/teacher assignment sets. The assignment set is
/// always replaced wholesale with the subject edit, never diffed.
#[derive(Clone)]
pub struct SubjectService {
    pool: SqlitePool,
}

impl SubjectService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, assignments))]
    pub async fn add_subject_with_assignments(
        &self,
        name: &str,
        assignments: &[SubjectAssignment],
    ) -> Result<i64, AppError> {
        info!("Creating subject with assignments");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        let res = sqlx::query("INSERT INTO subjects (name, created_at, updated_at) VALUES (?, ?, ?)")
            .bind(name)
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;

        let subject_id = res.last_insert_rowid();

        insert_assignments(&mut tx, subject_id, assignments).await?;

        tx.commit().await?;

        Ok(subject_id)
    }

    /// Full replace: every existing assignment row for the subject is deleted
    /// before the new set is inserted, even when the new set is a superset.
    #[instrument(skip(self, update), fields(subject_id = update.id))]
    pub async fn update_subject_with_assignments(
        &self,
        update: &SubjectUpdate,
    ) -> Result<(), AppError> {
        info!("Updating subject with assignments");

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM subjects WHERE id = ?")
            .bind(update.id)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_none() {
            return Err(AppError::NotFound(format!(
                "Subject with ID {} not found",
                update.id
            )));
        }

        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE subjects SET name = ?, updated_at = ? WHERE id = ?")
            .bind(&update.name)
            .bind(now)
            .bind(update.id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM class_subjects WHERE subject_id = ?")
            .bind(update.id)
            .execute(&mut *tx)
            .await?;

        insert_assignments(&mut tx, update.id, &update.assignments).await?;

        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_subject(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting subject");

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM subjects WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_none() {
            return Err(AppError::NotFound(format!(
                "Subject with ID {} not found",
                id
            )));
        }

        sqlx::query("DELETE FROM class_subjects WHERE subject_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM subjects WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_subject_by_id(&self, id: i64) -> Result<SubjectDetail, AppError> {
        let subject = sqlx::query_as::<_, DbSubject>(
            "SELECT id, name, created_at, updated_at FROM subjects WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(subject) = subject else {
            return Err(AppError::NotFound("Subject not found".to_string()));
        };

        let assignments = sqlx::query_as::<_, (i64, i64)>(
            "SELECT class_id, teacher_id FROM class_subjects WHERE subject_id = ?",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?
        .into_iter()
        .map(|(class_id, teacher_id)| SubjectAssignment {
            class_id,
            teacher_id,
        })
        .collect();

        Ok(SubjectDetail {
            id: subject.id,
            name: subject.name,
            assignments,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn subjects_paged(
        &self,
        request: &PagedRequest,
    ) -> Result<Paged<SubjectSummary>, AppError> {
        request.validate_window()?;

        let (order_by, direction) = match request.sort_column.as_deref() {
            Some(column) => (
                SubjectSortKey::from_column(column)?.order_by(),
                request.direction(),
            ),
            None => (SubjectSortKey::CreatedAt.order_by(), SortDirection::Desc),
        };

        let total_records = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subjects")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT s.id, s.name, s.created_at, s.updated_at
             FROM subjects s
             ORDER BY {} {}
             LIMIT ? OFFSET ?",
            order_by,
            direction.sql()
        );

        let page = sqlx::query_as::<_, DbSubject>(&sql)
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut assignments_by_subject = self
            .assignment_labels(page.iter().map(|s| s.id).collect::<Vec<_>>())
            .await?;

        let data = page
            .into_iter()
            .map(|subject| SubjectSummary {
                assignments: assignments_by_subject.remove(&subject.id).unwrap_or_default(),
                id: subject.id,
                name: subject.name,
                created_at: subject.created_at,
                updated_at: subject.updated_at,
            })
            .collect();

        Ok(Paged {
            total_records,
            data,
        })
    }

    /// "Class (Teacher Name)" labels for each subject on the page.
    async fn assignment_labels(
        &self,
        subject_ids: Vec<i64>,
    ) -> Result<HashMap<i64, Vec<String>>, AppError> {
        if subject_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let placeholders = vec!["?"; subject_ids.len()].join(", ");
        let sql = format!(
            "SELECT cs.subject_id, c.name AS class_name,
                    t.first_name || ' ' || t.last_name AS teacher_name
             FROM class_subjects cs
             JOIN classes c ON c.id = cs.class_id
             JOIN teachers t ON t.id = cs.teacher_id
             WHERE cs.subject_id IN ({})",
            placeholders
        );

        let mut query = sqlx::query_as::<_, (i64, String, String)>(&sql);
        for id in &subject_ids {
            query = query.bind(id);
        }

        let mut labels: HashMap<i64, Vec<String>> = HashMap::new();
        for (subject_id, class_name, teacher_name) in query.fetch_all(&self.pool).await? {
            labels
                .entry(subject_id)
                .or_default()
                .push(format!("{} ({})", class_name, teacher_name));
        }

        Ok(labels)
    }
}

async fn insert_assignments(
    tx: &mut Transaction<'_, Sqlite>,
    subject_id: i64,
    assignments: &[SubjectAssignment],
) -> Result<(), AppError> {
    for assignment in assignments {
        sqlx::query(
            "INSERT INTO class_subjects (class_id, subject_id, teacher_id) VALUES (?, ?, ?)",
        )
        .bind(assignment.class_id)
        .bind(subject_id)
        .bind(assignment.teacher_id)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}
