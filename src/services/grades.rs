use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{info, instrument};

use crate::error::AppError;
use crate::models::{GradeView, StudentRef, SubjectWithClass};
use crate::paging::{
    Paged, PagedRequest, SortDirection, StudentGradeSortKey, TeacherGradeSortKey,
};

/// Grade recording and the paged grade listings. Recording checks that the
/// student and subject exist; the teaching-assignment gate is applied by the
/// roster lookup teachers grade from, not by the insert itself.
#[derive(Clone)]
pub struct GradeService {
    pool: SqlitePool,
}

impl GradeService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self, comment))]
    pub async fn add_grade(
        &self,
        teacher_id: i64,
        student_id: i64,
        subject_id: i64,
        value: i64,
        comment: Option<&str>,
    ) -> Result<GradeView, AppError> {
        info!("Adding grade");

        let student = sqlx::query_as::<_, (String, String)>(
            "SELECT first_name, last_name FROM students WHERE id = ?",
        )
        .bind(student_id)
        .fetch_optional(&self.pool)
        .await?;

        let Some((first_name, last_name)) = student else {
            return Err(AppError::NotFound("Student not found".to_string()));
        };

        let subject_name =
            sqlx::query_scalar::<_, String>("SELECT name FROM subjects WHERE id = ?")
                .bind(subject_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(subject_name) = subject_name else {
            return Err(AppError::NotFound("Subject not found".to_string()));
        };

        let now = Utc::now().naive_utc();

        sqlx::query(
            "INSERT INTO grades (student_id, subject_id, teacher_id, value, comment, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(student_id)
        .bind(subject_id)
        .bind(teacher_id)
        .bind(value)
        .bind(comment)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(GradeView {
            student_name: Some(format!("{} {}", first_name, last_name)),
            teacher_name: None,
            class_name: None,
            subject_name,
            value,
            comment: comment.unwrap_or_default().to_string(),
            date: now,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn grades_for_student_paged(
        &self,
        request: &PagedRequest,
        student_id: i64,
    ) -> Result<Paged<GradeView>, AppError> {
        request.validate_window()?;

        let (order_by, direction) = match request.sort_column.as_deref() {
            Some(column) => (
                StudentGradeSortKey::from_column(column)?.order_by(),
                request.direction(),
            ),
            None => (StudentGradeSortKey::Date.order_by(), SortDirection::Asc),
        };

        let (date_from, date_to) = request.date_range()?;
        let search = request
            .search_query
            .clone()
            .filter(|q| !q.is_empty());

        let mut filters = "WHERE g.student_id = ?".to_string();
        if search.is_some() {
            filters.push_str(" AND sub.name LIKE '%' || ? || '%'");
        }
        if date_from.is_some() {
            filters.push_str(" AND g.recorded_at >= ?");
        }
        if date_to.is_some() {
            filters.push_str(" AND g.recorded_at < ?");
        }

        let joins = "FROM grades g
             JOIN students st ON st.id = g.student_id
             LEFT JOIN classes c ON c.id = st.class_id
             JOIN teachers t ON t.id = g.teacher_id
             JOIN subjects sub ON sub.id = g.subject_id";

        let count_sql = format!("SELECT COUNT(*) {} {}", joins, filters);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(student_id);
        if let Some(search) = &search {
            count_query = count_query.bind(search);
        }
        if let Some(from) = date_from {
            count_query = count_query.bind(from);
        }
        if let Some(to) = date_to {
            count_query = count_query.bind(to);
        }
        let total_records = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT NULL AS student_name,
                    t.last_name || ' ' || t.first_name AS teacher_name,
                    COALESCE(c.name, 'No class available') AS class_name,
                    sub.name AS subject_name,
                    g.value,
                    COALESCE(g.comment, '') AS comment,
                    g.recorded_at AS date
             {} {} ORDER BY {} {} LIMIT ? OFFSET ?",
            joins,
            filters,
            order_by,
            direction.sql()
        );

        let mut query = sqlx::query_as::<_, GradeView>(&sql).bind(student_id);
        if let Some(search) = &search {
            query = query.bind(search);
        }
        if let Some(from) = date_from {
            query = query.bind(from);
        }
        if let Some(to) = date_to {
            query = query.bind(to);
        }
        let data = query
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged {
            total_records,
            data,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn grades_for_teacher_paged(
        &self,
        request: &PagedRequest,
        teacher_id: i64,
    ) -> Result<Paged<GradeView>, AppError> {
        request.validate_window()?;

        let (order_by, direction) = match request.sort_column.as_deref() {
            Some(column) => (
                TeacherGradeSortKey::from_column(column)?.order_by(),
                request.direction(),
            ),
            None => (TeacherGradeSortKey::Date.order_by(), SortDirection::Asc),
        };

        let (date_from, date_to) = request.date_range()?;
        let search = request
            .search_query
            .clone()
            .filter(|q| !q.is_empty());

        let mut filters = "WHERE g.teacher_id = ?".to_string();
        if search.is_some() {
            filters.push_str(" AND sub.name LIKE '%' || ? || '%'");
        }
        if date_from.is_some() {
            filters.push_str(" AND g.recorded_at >= ?");
        }
        if date_to.is_some() {
            filters.push_str(" AND g.recorded_at < ?");
        }

        let joins = "FROM grades g
             JOIN students st ON st.id = g.student_id
             LEFT JOIN classes c ON c.id = st.class_id
             JOIN subjects sub ON sub.id = g.subject_id";

        let count_sql = format!("SELECT COUNT(*) {} {}", joins, filters);
        let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql).bind(teacher_id);
        if let Some(search) = &search {
            count_query = count_query.bind(search);
        }
        if let Some(from) = date_from {
            count_query = count_query.bind(from);
        }
        if let Some(to) = date_to {
            count_query = count_query.bind(to);
        }
        let total_records = count_query.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT st.last_name || ' ' || st.first_name AS student_name,
                    NULL AS teacher_name,
                    COALESCE(c.name, 'No class available') AS class_name,
                    sub.name AS subject_name,
                    g.value,
                    COALESCE(g.comment, '') AS comment,
                    g.recorded_at AS date
             {} {} ORDER BY {} {} LIMIT ? OFFSET ?",
            joins,
            filters,
            order_by,
            direction.sql()
        );

        let mut query = sqlx::query_as::<_, GradeView>(&sql).bind(teacher_id);
        if let Some(search) = &search {
            query = query.bind(search);
        }
        if let Some(from) = date_from {
            query = query.bind(from);
        }
        if let Some(to) = date_to {
            query = query.bind(to);
        }
        let data = query
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;

        Ok(Paged {
            total_records,
            data,
        })
    }

    /// The authorization gate for grading and attendance entry: the caller
    /// must hold the exact (teacher, subject, class) assignment.
    #[instrument(skip(self))]
    pub async fn students_for_subject_and_class(
        &self,
        teacher_id: i64,
        subject_id: i64,
        class_id: i64,
    ) -> Result<Vec<StudentRef>, AppError> {
        let authorized = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (
                 SELECT 1 FROM class_subjects
                 WHERE teacher_id = ? AND subject_id = ? AND class_id = ?
             )",
        )
        .bind(teacher_id)
        .bind(subject_id)
        .bind(class_id)
        .fetch_one(&self.pool)
        .await?;

        if !authorized {
            return Err(AppError::Forbidden(
                "You do not have permission for this class and subject".to_string(),
            ));
        }

        let students = sqlx::query_as::<_, StudentRef>(
            "SELECT id, first_name || ' ' || last_name AS full_name
             FROM students
             WHERE class_id = ?
             ORDER BY last_name",
        )
        .bind(class_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(students)
    }

    #[instrument(skip(self))]
    pub async fn subjects_for_teacher(
        &self,
        teacher_id: i64,
    ) -> Result<Vec<SubjectWithClass>, AppError> {
        let subjects = sqlx::query_as::<_, SubjectWithClass>(
            "SELECT DISTINCT cs.subject_id, sub.name AS subject_name,
                    cs.class_id, c.name AS class_name
             FROM class_subjects cs
             JOIN subjects sub ON sub.id = cs.subject_id
             JOIN classes c ON c.id = cs.class_id
             WHERE cs.teacher_id = ?
             ORDER BY subject_name",
        )
        .bind(teacher_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(subjects)
    }
}
