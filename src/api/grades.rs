use rocket::State;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::Deserialize;
use validator::Validate;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{GradeView, StudentRef, SubjectWithClass};
use crate::paging::{Paged, PagedRequest};
use crate::services::{GradeService, ProfileService};
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct GradeCreateRequest {
    pub student_id: i64,
    pub subject_id: i64,
    #[validate(range(min = 1, max = 6, message = "Grade value must be between 1 and 6"))]
    pub value: i64,
    pub comment: Option<String>,
}

#[post("/grades", data = "<request>")]
pub async fn api_add_grade(
    user: CurrentUser,
    request: Json<GradeCreateRequest>,
    grades: &State<GradeService>,
    profiles: &State<ProfileService>,
) -> Result<Json<GradeView>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::RecordGrades)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let teacher = profiles
        .teacher_by_account(&user.account_id)
        .await
        .validate_custom()?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))
        .validate_custom()?;

    let grade = grades
        .add_grade(
            teacher.id,
            validated.student_id,
            validated.subject_id,
            validated.value,
            validated.comment.as_deref(),
        )
        .await
        .validate_custom()?;

    Ok(Json(grade))
}

#[get("/grades/student/paged?<request..>")]
pub async fn api_grades_for_student_paged(
    user: CurrentUser,
    request: PagedRequest,
    grades: &State<GradeService>,
    profiles: &State<ProfileService>,
) -> Result<Json<Paged<GradeView>>, AppError> {
    user.require_permission(Permission::ViewOwnGrades)?;

    let student = profiles
        .student_by_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Student not found".to_string()))?;

    Ok(Json(
        grades.grades_for_student_paged(&request, student.id).await?,
    ))
}

#[get("/grades/teacher/paged?<request..>")]
pub async fn api_grades_for_teacher_paged(
    user: CurrentUser,
    request: PagedRequest,
    grades: &State<GradeService>,
    profiles: &State<ProfileService>,
) -> Result<Json<Paged<GradeView>>, AppError> {
    user.require_permission(Permission::RecordGrades)?;

    let teacher = profiles
        .teacher_by_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

    Ok(Json(
        grades.grades_for_teacher_paged(&request, teacher.id).await?,
    ))
}

#[get("/grades/students/<subject_id>/<class_id>")]
pub async fn api_students_for_grading(
    user: CurrentUser,
    subject_id: i64,
    class_id: i64,
    grades: &State<GradeService>,
    profiles: &State<ProfileService>,
) -> Result<Json<Vec<StudentRef>>, AppError> {
    user.require_permission(Permission::RecordGrades)?;

    let teacher = profiles
        .teacher_by_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

    Ok(Json(
        grades
            .students_for_subject_and_class(teacher.id, subject_id, class_id)
            .await?,
    ))
}

#[get("/grades/subjects")]
pub async fn api_subjects_for_teacher(
    user: CurrentUser,
    grades: &State<GradeService>,
    profiles: &State<ProfileService>,
) -> Result<Json<Vec<SubjectWithClass>>, AppError> {
    user.require_permission(Permission::ViewTeachingAssignments)?;

    let teacher = profiles
        .teacher_by_account(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Teacher not found".to_string()))?;

    Ok(Json(grades.subjects_for_teacher(teacher.id).await?))
}
