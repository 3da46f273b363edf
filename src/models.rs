use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Recorded presence for one student in one lesson on one date.
/// `NotRecorded` is the default surfaced for students without a record yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AttendanceStatus {
    #[default]
    NotRecorded,
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttendanceStatus::NotRecorded => "NotRecorded",
            AttendanceStatus::Present => "Present",
            AttendanceStatus::Absent => "Absent",
            AttendanceStatus::Late => "Late",
            AttendanceStatus::Excused => "Excused",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, AppError> {
        match s {
            "NotRecorded" => Ok(AttendanceStatus::NotRecorded),
            "Present" => Ok(AttendanceStatus::Present),
            "Absent" => Ok(AttendanceStatus::Absent),
            "Late" => Ok(AttendanceStatus::Late),
            "Excused" => Ok(AttendanceStatus::Excused),
            _ => Err(AppError::InvalidArgument(format!(
                "Unknown attendance status: {}",
                s
            ))),
        }
    }
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbStudent {
    pub id: i64,
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
    pub class_id: Option<i64>,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbTeacher {
    pub id: i64,
    pub account_id: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbClass {
    pub id: i64,
    pub name: String,
    pub homeroom_teacher_id: Option<i64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(sqlx::FromRow, Clone)]
pub struct DbSubject {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

// Projections returned by the services. Display names are resolved in SQL;
// a student without a class surfaces as "No class available".

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct StudentRef {
    pub id: i64,
    pub full_name: String,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct StudentListItem {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub class_name: Option<String>,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct TeacherView {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct GradeView {
    pub student_name: Option<String>,
    pub teacher_name: Option<String>,
    pub class_name: Option<String>,
    pub subject_name: String,
    pub value: i64,
    pub comment: String,
    pub date: NaiveDateTime,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct ClassSummary {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub homeroom_teacher_name: Option<String>,
    pub student_count: i64,
}

#[derive(Serialize, Clone)]
pub struct ClassDetail {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub homeroom_teacher_id: Option<i64>,
    pub assigned_student_ids: Vec<i64>,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct ClassListItem {
    pub id: i64,
    pub name: String,
}

#[derive(Serialize, Clone)]
pub struct SubjectSummary {
    pub id: i64,
    pub name: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    pub assignments: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub struct SubjectAssignment {
    pub class_id: i64,
    pub teacher_id: i64,
}

#[derive(Serialize, Clone)]
pub struct SubjectDetail {
    pub id: i64,
    pub name: String,
    pub assignments: Vec<SubjectAssignment>,
}

#[derive(Serialize, Clone)]
pub struct UserView {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub date_added: NaiveDateTime,
    pub last_login: Option<NaiveDateTime>,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct ScheduleEntryView {
    pub id: i64,
    pub day_of_week: i64,
    pub start_time: String,
    pub subject_name: String,
    pub teacher_name: String,
}

#[derive(Serialize, Clone)]
pub struct ScheduleForClass {
    pub class_id: i64,
    pub class_name: String,
    pub entries: Vec<ScheduleEntryView>,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct StudentScheduleEntry {
    pub day_of_week: i64,
    pub start_time: String,
    pub class_name: String,
    pub subject_name: String,
    pub teacher_name: String,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct TeacherScheduleEntry {
    pub day_of_week: i64,
    pub start_time: String,
    pub class_name: String,
    pub subject_name: String,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct ClassWithSchedule {
    pub id: i64,
    pub name: String,
    pub entry_count: i64,
}

#[derive(Serialize, Clone)]
pub struct SubjectWithTeachers {
    pub subject_id: i64,
    pub subject_name: String,
    pub teachers: Vec<TeacherView>,
}

#[derive(Serialize, sqlx::FromRow, Clone)]
pub struct SubjectWithClass {
    pub subject_id: i64,
    pub subject_name: String,
    pub class_id: i64,
    pub class_name: String,
}

#[derive(Serialize, Clone)]
pub struct StudentForAttendance {
    pub student_id: i64,
    pub full_name: String,
    pub status: AttendanceStatus,
}

#[derive(Serialize, Clone)]
pub struct LessonForAttendance {
    pub schedule_id: i64,
    pub subject_name: String,
    pub class_name: String,
    pub start_time: String,
    pub has_attendance: bool,
}
