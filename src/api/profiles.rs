use rocket::State;
use rocket::serde::json::Json;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::{StudentListItem, TeacherView};
use crate::services::ProfileService;

#[get("/students")]
pub async fn api_get_students(
    user: CurrentUser,
    profiles: &State<ProfileService>,
) -> Result<Json<Vec<StudentListItem>>, AppError> {
    user.require_permission(Permission::ViewAllUsers)?;

    Ok(Json(profiles.get_students().await?))
}

#[get("/teachers")]
pub async fn api_get_teachers(
    user: CurrentUser,
    profiles: &State<ProfileService>,
) -> Result<Json<Vec<TeacherView>>, AppError> {
    user.require_permission(Permission::ViewAllUsers)?;

    Ok(Json(profiles.get_teachers().await?))
}
