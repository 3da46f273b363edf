use rocket::State;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::auth::{CurrentUser, Permission};
use crate::error::AppError;
use crate::models::UserView;
use crate::paging::{Paged, PagedRequest};
use crate::services::UserService;
use crate::services::users::UserUpdate;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct AddUserRequest {
    #[validate(length(min = 1, message = "Role is required"))]
    pub role: String,
    #[validate(length(min = 1, message = "First name is required"))]
    pub first_name: String,
    #[validate(length(min = 1, message = "Last name is required"))]
    pub last_name: String,
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Serialize)]
pub struct AddUserResponse {
    pub id: String,
}

#[derive(Serialize)]
pub struct UpdateUserResponse {
    pub success: bool,
}

#[post("/users", data = "<request>")]
pub async fn api_add_user(
    user: CurrentUser,
    request: Json<AddUserRequest>,
    users: &State<UserService>,
) -> Result<Json<AddUserResponse>, Custom<Json<ValidationResponse>>> {
    user.require_permission(Permission::ManageUsers)
        .validate_custom()?;

    let validated = request.validate_custom()?;

    let id = users
        .add_new_user(
            &validated.role,
            &validated.first_name,
            &validated.last_name,
            &validated.email,
            &validated.password,
        )
        .await
        .validate_custom()?;

    Ok(Json(AddUserResponse { id }))
}

#[put("/users", data = "<request>")]
pub async fn api_update_user(
    user: CurrentUser,
    request: Json<UserUpdate>,
    users: &State<UserService>,
) -> Result<Json<UpdateUserResponse>, AppError> {
    user.require_permission(Permission::ManageUsers)?;

    let success = users.update_user(&request).await?;

    Ok(Json(UpdateUserResponse { success }))
}

#[delete("/users/<id>")]
pub async fn api_delete_user(
    user: CurrentUser,
    id: &str,
    users: &State<UserService>,
) -> Result<(), AppError> {
    user.require_permission(Permission::ManageUsers)?;

    users.delete_user(id).await
}

#[get("/users/paged?<request..>")]
pub async fn api_get_users_paged(
    user: CurrentUser,
    request: PagedRequest,
    users: &State<UserService>,
) -> Result<Json<Paged<UserView>>, AppError> {
    user.require_permission(Permission::ViewAllUsers)?;

    Ok(Json(users.users_paged(&request).await?))
}

#[get("/users/roles")]
pub async fn api_get_roles(
    user: CurrentUser,
    users: &State<UserService>,
) -> Result<Json<Vec<String>>, AppError> {
    user.require_permission(Permission::ManageUsers)?;

    Ok(Json(users.get_roles()))
}

#[get("/users/<id>")]
pub async fn api_get_user(
    user: CurrentUser,
    id: &str,
    users: &State<UserService>,
) -> Result<Json<UserView>, AppError> {
    // Administrators can look anyone up; everyone else only themselves.
    if user.account_id != id {
        user.require_permission(Permission::ViewAllUsers)?;
    }

    let view = users
        .get_user_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(view))
}
