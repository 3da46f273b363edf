use chrono::{NaiveDate, NaiveDateTime};
use rocket::FromForm;
use serde::Serialize;

use crate::error::AppError;

/// Common shape of every paged query: a 1-based window plus optional sort,
/// search and date-range parameters. Dates arrive as "YYYY-MM-DD" strings.
#[derive(Debug, Clone, Default, FromForm)]
pub struct PagedRequest {
    pub page_number: i64,
    pub page_size: i64,
    pub sort_column: Option<String>,
    pub sort_direction: Option<String>,
    pub search_query: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
}

impl PagedRequest {
    pub fn validate_window(&self) -> Result<(), AppError> {
        if self.page_number < 1 || self.page_size < 1 {
            return Err(AppError::InvalidArgument(format!(
                "Page number and page size must be at least 1 (got {}, {})",
                self.page_number, self.page_size
            )));
        }
        Ok(())
    }

    pub fn offset(&self) -> i64 {
        (self.page_number - 1) * self.page_size
    }

    pub fn direction(&self) -> SortDirection {
        match self.sort_direction.as_deref() {
            Some(d) if d.eq_ignore_ascii_case("desc") => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }

    pub fn date_range(&self) -> Result<(Option<NaiveDateTime>, Option<NaiveDateTime>), AppError> {
        let from = parse_date_param(self.date_from.as_deref())?
            .map(|d| d.and_hms_opt(0, 0, 0).unwrap_or_default());
        // Upper bound is exclusive: start of the day after date_to.
        let to = parse_date_param(self.date_to.as_deref())?
            .map(|d| d.succ_opt().unwrap_or(d).and_hms_opt(0, 0, 0).unwrap_or_default());
        Ok((from, to))
    }
}

fn parse_date_param(value: Option<&str>) -> Result<Option<NaiveDate>, AppError> {
    match value {
        None => Ok(None),
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| AppError::InvalidArgument(format!("Invalid date: {}", s))),
    }
}

#[derive(Serialize)]
pub struct Paged<T> {
    pub total_records: i64,
    pub data: Vec<T>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

// One enum per paged entity. An unknown column name is rejected before any
// query runs; each key maps to a fixed ORDER BY fragment, never interpolated
// from user input.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassSortKey {
    Name,
    CreatedAt,
    UpdatedAt,
}

impl ClassSortKey {
    pub fn from_column(column: &str) -> Result<Self, AppError> {
        match column.to_lowercase().as_str() {
            "name" => Ok(ClassSortKey::Name),
            "createdat" => Ok(ClassSortKey::CreatedAt),
            "updatedat" => Ok(ClassSortKey::UpdatedAt),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort column: {}",
                column
            ))),
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            ClassSortKey::Name => "c.name",
            ClassSortKey::CreatedAt => "c.created_at",
            ClassSortKey::UpdatedAt => "c.updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubjectSortKey {
    Name,
    CreatedAt,
    UpdatedAt,
}

impl SubjectSortKey {
    pub fn from_column(column: &str) -> Result<Self, AppError> {
        match column.to_lowercase().as_str() {
            "name" => Ok(SubjectSortKey::Name),
            "createdat" => Ok(SubjectSortKey::CreatedAt),
            "updatedat" => Ok(SubjectSortKey::UpdatedAt),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort column: {}",
                column
            ))),
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            SubjectSortKey::Name => "s.name",
            SubjectSortKey::CreatedAt => "s.created_at",
            SubjectSortKey::UpdatedAt => "s.updated_at",
        }
    }
}

/// Sort keys for a student's own grade listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StudentGradeSortKey {
    TeacherName,
    SubjectName,
    Value,
    Date,
}

impl StudentGradeSortKey {
    pub fn from_column(column: &str) -> Result<Self, AppError> {
        match column {
            "teacherName" => Ok(StudentGradeSortKey::TeacherName),
            "subjectName" => Ok(StudentGradeSortKey::SubjectName),
            "value" => Ok(StudentGradeSortKey::Value),
            "date" => Ok(StudentGradeSortKey::Date),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort column: {}",
                column
            ))),
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            StudentGradeSortKey::TeacherName => "teacher_name",
            StudentGradeSortKey::SubjectName => "subject_name",
            StudentGradeSortKey::Value => "g.value",
            StudentGradeSortKey::Date => "g.recorded_at",
        }
    }
}

/// Sort keys for a teacher's issued-grades listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeacherGradeSortKey {
    StudentName,
    ClassName,
    SubjectName,
    Value,
    Date,
}

impl TeacherGradeSortKey {
    pub fn from_column(column: &str) -> Result<Self, AppError> {
        match column {
            "studentName" => Ok(TeacherGradeSortKey::StudentName),
            "className" => Ok(TeacherGradeSortKey::ClassName),
            "subjectName" => Ok(TeacherGradeSortKey::SubjectName),
            "value" => Ok(TeacherGradeSortKey::Value),
            "date" => Ok(TeacherGradeSortKey::Date),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort column: {}",
                column
            ))),
        }
    }

    pub fn order_by(&self) -> &'static str {
        match self {
            TeacherGradeSortKey::StudentName => "student_name",
            TeacherGradeSortKey::ClassName => "class_name",
            TeacherGradeSortKey::SubjectName => "subject_name",
            TeacherGradeSortKey::Value => "g.value",
            TeacherGradeSortKey::Date => "g.recorded_at",
        }
    }
}

/// Sort keys for the account directory. First/last name live on the profile
/// tables and are applied as an in-memory pass over the fetched page; the
/// primary query then orders by role, as the directory always has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSortKey {
    Role,
    Email,
    LastLogin,
    FirstName,
    LastName,
}

impl UserSortKey {
    pub fn from_column(column: &str) -> Result<Self, AppError> {
        match column {
            "role" => Ok(UserSortKey::Role),
            "email" => Ok(UserSortKey::Email),
            "lastLogin" => Ok(UserSortKey::LastLogin),
            "firstName" => Ok(UserSortKey::FirstName),
            "lastName" => Ok(UserSortKey::LastName),
            _ => Err(AppError::InvalidArgument(format!(
                "Invalid sort column: {}",
                column
            ))),
        }
    }

    pub fn in_memory(&self) -> bool {
        matches!(self, UserSortKey::FirstName | UserSortKey::LastName)
    }

    pub fn order_by(&self, direction: SortDirection) -> String {
        match self {
            UserSortKey::Role => format!("a.role {}", direction.sql()),
            UserSortKey::Email => format!("a.email {}", direction.sql()),
            UserSortKey::LastLogin => format!("a.last_login_at {}", direction.sql()),
            // Name keys fall back to role ordering in SQL; the real ordering
            // happens in memory after the page is fetched.
            UserSortKey::FirstName | UserSortKey::LastName => "a.role DESC".to_string(),
        }
    }
}
