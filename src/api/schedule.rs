use rocket::State;
use rocket::serde::json::Json;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{
    ClassWithSchedule, ScheduleEntryView, ScheduleForClass, StudentScheduleEntry,
    SubjectWithTeachers, TeacherScheduleEntry,
};
use crate::services::ScheduleService;
use crate::services::schedule::NewScheduleEntry;

#[post("/schedule", data = "<request>")]
pub async fn api_add_schedule_entry(
    user: CurrentUser,
    request: Json<NewScheduleEntry>,
    schedule: &State<ScheduleService>,
) -> Result<Json<ScheduleEntryView>, AppError> {
    user.require_permission(Permission::ManageSchedule)?;

    Ok(Json(schedule.add_entry(&request).await?))
}

#[get("/schedule/class/<class_id>")]
pub async fn api_schedule_for_class(
    _user: CurrentUser,
    class_id: i64,
    schedule: &State<ScheduleService>,
) -> Result<Json<ScheduleForClass>, AppError> {
    Ok(Json(schedule.schedule_for_class(class_id).await?))
}

#[get("/schedule/student")]
pub async fn api_schedule_for_student(
    user: CurrentUser,
    schedule: &State<ScheduleService>,
) -> Result<Json<Vec<StudentScheduleEntry>>, AppError> {
    user.require_permission(Permission::ViewOwnSchedule)?;

    Ok(Json(schedule.schedule_for_student(&user.account_id).await?))
}

#[get("/schedule/teacher")]
pub async fn api_schedule_for_teacher(
    user: CurrentUser,
    schedule: &State<ScheduleService>,
) -> Result<Json<Vec<TeacherScheduleEntry>>, AppError> {
    user.require_permission(Permission::ViewOwnSchedule)?;

    Ok(Json(schedule.schedule_for_teacher(&user.account_id).await?))
}

#[get("/schedule/classes")]
pub async fn api_classes_with_schedule(
    user: CurrentUser,
    schedule: &State<ScheduleService>,
) -> Result<Json<Vec<ClassWithSchedule>>, AppError> {
    user.require_permission(Permission::ManageSchedule)?;

    Ok(Json(schedule.classes_with_schedule().await?))
}

#[get("/schedule/class/<class_id>/subjects")]
pub async fn api_subjects_for_class(
    _user: CurrentUser,
    class_id: i64,
    schedule: &State<ScheduleService>,
) -> Result<Json<Vec<SubjectWithTeachers>>, AppError> {
    Ok(Json(schedule.subjects_for_class(class_id).await?))
}
