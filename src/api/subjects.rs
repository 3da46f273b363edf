use rocket::State;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{SubjectAssignment, SubjectDetail, SubjectSummary};
use crate::paging::{Paged, PagedRequest};
use crate::services::SubjectService;
use crate::services::subjects::SubjectUpdate;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct SubjectCreateRequest {
    #[validate(length(min = 1, message = "Subject name is required"))]
    pub name: String,
    #[serde(default)]
    pub assignments: Vec<SubjectAssignment>,
}

#[derive(Serialize)]
pub struct SubjectCreateResponse {
    pub id: i64,
}

#[get("/subjects/paged?<request..>")]
pub async fn api_get_subjects_paged(
    user: CurrentUser,
    request: PagedRequest,
    subjects: &State<SubjectService>,
) -> Result<Json<Paged<SubjectSummary>>, AppError> {
    user.require_permission(Permission::ManageSubjects)?;

    Ok(Json(subjects.subjects_paged(&request).await?))
}

#[get("/subjects/<id>")]
pub async fn api_get_subject(
    user: CurrentUser,
    id: i64,
    subjects: &State<SubjectService>,
) -> Result<Json<SubjectDetail>, AppError> {
    user.require_permission(Permission::ManageSubjects)?;

    Ok(Json(subjects.get_subject_by_id(id).await?))
}

#[post("/subjects", data = "<request>")]
pub async fn api_create_subject(
    user: CurrentUser,
    request: Json<SubjectCreateRequest>,
    subjects: &State<SubjectService>,
) -> Result<Json<SubjectCreateResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageSubjects)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let id = subjects
        .add_subject_with_assignments(&validated.name, &validated.assignments)
        .await
        .validate_custom()?;

    Ok(Json(SubjectCreateResponse { id }))
}

#[put("/subjects", data = "<request>")]
pub async fn api_update_subject(
    user: CurrentUser,
    request: Json<SubjectUpdate>,
    subjects: &State<SubjectService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::ManageSubjects)?;

    subjects.update_subject_with_assignments(&request).await
}

#[delete("/subjects/<id>")]
pub async fn api_delete_subject(
    user: CurrentUser,
    id: i64,
    subjects: &State<SubjectService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::ManageSubjects)?;

    subjects.delete_subject(id).await
}
