use rocket::State;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{ClassDetail, ClassListItem, ClassSummary};
use crate::paging::{Paged, PagedRequest};
use crate::services::ClassService;
use crate::services::classes::ClassUpdate;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct ClassCreateRequest {
    #[validate(length(min = 1, message = "Class name is required"))]
    pub name: String,
    pub homeroom_teacher_id: Option<i64>,
    #[serde(default)]
    pub assigned_student_ids: Vec<i64>,
}

#[derive(Serialize)]
pub struct ClassCreateResponse {
    pub id: i64,
}

#[get("/classes")]
pub async fn api_get_classes(
    _user: CurrentUser,
    classes: &State<ClassService>,
) -> Result<Json<Vec<ClassListItem>>, AppError> {
    Ok(Json(classes.get_classes().await?))
}

#[get("/classes/paged?<request..>")]
pub async fn api_get_classes_paged(
    user: CurrentUser,
    request: PagedRequest,
    classes: &State<ClassService>,
) -> Result<Json<Paged<ClassSummary>>, AppError> {
    user.require_permission(Permission::ManageClasses)?;

    Ok(Json(classes.classes_paged(&request).await?))
}

#[get("/classes/<id>")]
pub async fn api_get_class(
    user: CurrentUser,
    id: i64,
    classes: &State<ClassService>,
) -> Result<Json<ClassDetail>, AppError> {
    user.require_permission(Permission::ManageClasses)?;

    Ok(Json(classes.get_class_by_id(id).await?))
}

#[post("/classes", data = "<request>")]
pub async fn api_create_class(
    user: CurrentUser,
    request: Json<ClassCreateRequest>,
    classes: &State<ClassService>,
) -> Result<Json<ClassCreateResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageClasses)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let id = classes
        .add_class(
            &validated.name,
            validated.homeroom_teacher_id,
            &validated.assigned_student_ids,
        )
        .await
        .validate_custom()?;

    Ok(Json(ClassCreateResponse { id }))
}

#[put("/classes", data = "<request>")]
pub async fn api_update_class(
    user: CurrentUser,
    request: Json<ClassUpdate>,
    classes: &State<ClassService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::ManageClasses)?;

    classes.update_class(&request).await
}

#[delete("/classes/<id>")]
pub async fn api_delete_class(
    user: CurrentUser,
    id: i64,
    classes: &State<ClassService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::ManageClasses)?;

    classes.delete_class(id).await
}
