use chrono::Utc;
use serde::Deserialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{ClassDetail, ClassListItem, ClassSummary, DbClass};
use crate::paging::{ClassSortKey, Paged, PagedRequest, SortDirection};

#[derive(Debug, Clone, Deserialize)]
pub struct ClassUpdate {
    pub id: i64,
    pub name: String,
    pub homeroom_teacher_id: Option<i64>,
    pub assigned_student_ids: Vec<i64>,
}

/// Class lifecycle and class membership. Every mutation runs in one
/// transaction so a class row and its membership never diverge.
#[derive(Clone)]
pub struct ClassService {
    pool: SqlitePool,
}

impl ClassService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn add_class(
        &self,
        name: &str,
        homeroom_teacher_id: Option<i64>,
        assigned_student_ids: &[i64],
    ) -> Result<i64, AppError> {
        info!("Creating class");

        let mut tx = self.pool.begin().await?;
        let now = Utc::now().naive_utc();

        let res = sqlx::query(
            "INSERT INTO classes (name, homeroom_teacher_id, created_at, updated_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(homeroom_teacher_id)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let class_id = res.last_insert_rowid();

        if !assigned_student_ids.is_empty() {
            // Requested ids that match no student are ignored; only a fully
            // unmatched list is an error.
            let matched = existing_student_ids(&mut tx, assigned_student_ids).await?;

            if matched.is_empty() {
                return Err(AppError::NotFound(
                    "There are no students to add".to_string(),
                ));
            }

            for student_id in &matched {
                sqlx::query("UPDATE students SET class_id = ? WHERE id = ?")
                    .bind(class_id)
                    .bind(student_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(class_id)
    }

    #[instrument(skip(self))]
    pub async fn delete_class(&self, id: i64) -> Result<(), AppError> {
        info!("Deleting class");

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM classes WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_none() {
            return Err(AppError::NotFound("No class found to delete".to_string()));
        }

        // Members are detached, never deleted with the class.
        sqlx::query("UPDATE students SET class_id = NULL WHERE class_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM classes WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Reconciles membership as a set difference against the target list:
    /// current members missing from the target are detached, targets not yet
    /// in the class are attached, and unchanged members are not written.
    #[instrument(skip(self, update), fields(class_id = update.id))]
    pub async fn update_class(&self, update: &ClassUpdate) -> Result<(), AppError> {
        info!("Updating class");

        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query("SELECT id FROM classes WHERE id = ?")
            .bind(update.id)
            .fetch_optional(&mut *tx)
            .await?;

        if existing.is_none() {
            return Err(AppError::NotFound(format!(
                "Class with ID {} was not found",
                update.id
            )));
        }

        let now = Utc::now().naive_utc();
        sqlx::query("UPDATE classes SET name = ?, homeroom_teacher_id = ?, updated_at = ? WHERE id = ?")
            .bind(&update.name)
            .bind(update.homeroom_teacher_id)
            .bind(now)
            .bind(update.id)
            .execute(&mut *tx)
            .await?;

        let current: Vec<i64> =
            sqlx::query_scalar::<_, i64>("SELECT id FROM students WHERE class_id = ?")
                .bind(update.id)
                .fetch_all(&mut *tx)
                .await?;

        for student_id in current
            .iter()
            .filter(|id| !update.assigned_student_ids.contains(id))
        {
            sqlx::query("UPDATE students SET class_id = NULL WHERE id = ?")
                .bind(student_id)
                .execute(&mut *tx)
                .await?;
        }

        if !update.assigned_student_ids.is_empty() {
            let placeholders = vec!["?"; update.assigned_student_ids.len()].join(", ");
            let sql = format!(
                "SELECT id FROM students WHERE id IN ({}) AND class_id IS NOT ?",
                placeholders
            );

            let mut query = sqlx::query_scalar::<_, i64>(&sql);
            for student_id in &update.assigned_student_ids {
                query = query.bind(student_id);
            }
            let to_attach: Vec<i64> = query.bind(update.id).fetch_all(&mut *tx).await?;

            for student_id in &to_attach {
                sqlx::query("UPDATE students SET class_id = ? WHERE id = ?")
                    .bind(update.id)
                    .bind(student_id)
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get_class_by_id(&self, id: i64) -> Result<ClassDetail, AppError> {
        let class = sqlx::query_as::<_, DbClass>(
            "SELECT id, name, homeroom_teacher_id, created_at, updated_at FROM classes WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(class) = class else {
            return Err(AppError::NotFound("The class was not found".to_string()));
        };

        let assigned_student_ids =
            sqlx::query_scalar::<_, i64>("SELECT id FROM students WHERE class_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;

        Ok(ClassDetail {
            id: class.id,
            name: class.name,
            created_at: class.created_at,
            updated_at: class.updated_at,
            homeroom_teacher_id: class.homeroom_teacher_id,
            assigned_student_ids,
        })
    }

    #[instrument(skip(self))]
    pub async fn get_classes(&self) -> Result<Vec<ClassListItem>, AppError> {
        let classes = sqlx::query_as::<_, ClassListItem>(
            "SELECT id, name FROM classes ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(classes)
    }

    #[instrument(skip(self, request))]
    pub async fn classes_paged(
        &self,
        request: &PagedRequest,
    ) -> Result<Paged<ClassSummary>, AppError> {
        request.validate_window()?;

        let (order_by, direction) = match request.sort_column.as_deref() {
            Some(column) => (
                ClassSortKey::from_column(column)?.order_by(),
                request.direction(),
            ),
            None => (ClassSortKey::CreatedAt.order_by(), SortDirection::Desc),
        };

        let total_records = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM classes")
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT c.id, c.name, c.created_at, c.updated_at,
                    t.first_name || ' ' || t.last_name AS homeroom_teacher_name,
                    (SELECT COUNT(*) FROM students s WHERE s.class_id = c.id) AS student_count
             FROM classes c
             LEFT JOIN teachers t ON t.id = c.homeroom_teacher_id
             ORDER BY {} {}
             LIMIT ? OFFSET ?",
            order_by,
            direction.sql()
        );

        let data = sqlx::query_as::<_, ClassSummary>(&sql)
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged {
            total_records,
            data,
        })
    }
}

async fn existing_student_ids(
    tx: &mut Transaction<'_, Sqlite>,
    ids: &[i64],
) -> Result<Vec<i64>, AppError> {
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("SELECT id FROM students WHERE id IN ({})", placeholders);

    let mut query = sqlx::query_scalar::<_, i64>(&sql);
    for id in ids {
        query = query.bind(id);
    }

    Ok(query.fetch_all(&mut **tx).await?)
}
