use rocket::State;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::info;
use validator::Validate;

use crate::auth::{AuthSession, BearerToken, CurrentUser, create_session, invalidate_session};
use crate::error::AppError;
use crate::identity;
use crate::models::UserView;
use crate::services::UserService;
use crate::validation::{AppErrorExt, JsonValidateExt, ValidationResponse};

#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Username is required"))]
    pub username: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Serialize, Deserialize)]
pub struct LoginResponse {
    pub success: bool,
    pub token: Option<String>,
    pub role: Option<String>,
    pub error: Option<String>,
}

#[post("/auth/login", data = "<login>")]
pub async fn api_login(
    login: Json<LoginRequest>,
    db: &State<SqlitePool>,
) -> Result<Json<LoginResponse>, Custom<Json<ValidationResponse>>> {
    let validated = login.validate_custom()?;

    info!("Login attempt");

    let mut conn = db
        .acquire()
        .await
        .map_err(AppError::from)
        .validate_custom()?;

    let account = identity::verify_password(&mut conn, &validated.username, &validated.password)
        .await
        .validate_custom()?;

    match account {
        Some(account) => {
            identity::record_login(&mut conn, &account.id)
                .await
                .validate_custom()?;

            // Release the connection before the session insert draws another
            // from the pool.
            drop(conn);

            let token = AuthSession::generate_token();

            create_session(db, &account.id, &token)
                .await
                .validate_custom()?;

            Ok(Json(LoginResponse {
                success: true,
                token: Some(token),
                role: Some(account.role),
                error: None,
            }))
        }
        None => Ok(Json(LoginResponse {
            success: false,
            token: None,
            role: None,
            error: Some("Invalid username or password".to_string()),
        })),
    }
}

#[post("/auth/logout")]
pub async fn api_logout(token: BearerToken, db: &State<SqlitePool>) -> Result<(), AppError> {
    invalidate_session(db, &token.0).await
}

#[get("/auth/me")]
pub async fn api_me(
    user: CurrentUser,
    users: &State<UserService>,
) -> Result<Json<UserView>, AppError> {
    let view = users
        .get_user_by_id(&user.account_id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(view))
}
