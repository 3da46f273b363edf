use rocket::State;
use rocket::serde::json::Json;
use serde::Deserialize;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{LessonForAttendance, StudentForAttendance};
use crate::services::attendance::AttendanceEntry;
use crate::services::{AttendanceService, ProfileService};

#[derive(Deserialize)]
pub struct AttendanceSaveRequest {
    pub records: Vec<AttendanceEntry>,
}

#[get("/attendance/schedule/<schedule_id>/students")]
pub async fn api_students_for_schedule(
    user: CurrentUser,
    schedule_id: i64,
    attendance: &State<AttendanceService>,
) -> Result<Json<Vec<StudentForAttendance>>, AppError> {
    user.require_permission(Permission::RecordAttendance)?;

    Ok(Json(attendance.students_for_schedule(schedule_id).await?))
}

#[post("/attendance/schedule/<schedule_id>", data = "<request>")]
pub async fn api_save_attendance(
    user: CurrentUser,
    schedule_id: i64,
    request: Json<AttendanceSaveRequest>,
    attendance: &State<AttendanceService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::RecordAttendance)?;

    attendance
        .save_attendance(schedule_id, &request.records, Some(&user.account_id))
        .await
}

#[get("/attendance/today")]
pub async fn api_today_lessons(
    user: CurrentUser,
    attendance: &State<AttendanceService>,
    profiles: &State<ProfileService>,
) -> Result<Json<Vec<LessonForAttendance>>, AppError> {
    user.require_permission(Permission::RecordAttendance)?;

    let teacher = profiles
        .teacher_by_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

    Ok(Json(attendance.today_lessons_for_teacher(teacher.id).await?))
}
