use sqlx::SqlitePool;
use tracing::instrument;

use crate::error::AppError;
use crate::models::{DbStudent, DbTeacher, StudentListItem, TeacherView};

/// Role-profile lookups: handlers resolve the caller's account id to a
/// teacher/student profile before invoking a workflow on its behalf.
#[derive(Clone)]
pub struct ProfileService {
    pool: SqlitePool,
}

impl ProfileService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self))]
    pub async fn teacher_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<DbTeacher>, AppError> {
        let teacher = sqlx::query_as::<_, DbTeacher>(
            "SELECT id, account_id, first_name, last_name FROM teachers WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(teacher)
    }

    #[instrument(skip(self))]
    pub async fn student_by_account(
        &self,
        account_id: &str,
    ) -> Result<Option<DbStudent>, AppError> {
        let student = sqlx::query_as::<_, DbStudent>(
            "SELECT id, account_id, first_name, last_name, class_id FROM students WHERE account_id = ?",
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(student)
    }

    #[instrument(skip(self))]
    pub async fn get_teachers(&self) -> Result<Vec<TeacherView>, AppError> {
        let teachers = sqlx::query_as::<_, TeacherView>(
            "SELECT id, first_name, last_name FROM teachers ORDER BY last_name, first_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(teachers)
    }

    #[instrument(skip(self))]
    pub async fn get_students(&self) -> Result<Vec<StudentListItem>, AppError> {
        let students = sqlx::query_as::<_, StudentListItem>(
            "SELECT s.id, s.first_name, s.last_name, c.name AS class_name
             FROM students s
             LEFT JOIN classes c ON c.id = s.class_id
             ORDER BY s.last_name, s.first_name",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }
}
