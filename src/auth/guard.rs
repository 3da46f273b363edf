use rocket::Request;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use serde::Serialize;
use sqlx::SqlitePool;

use crate::auth::{Permission, Role, get_session_by_token};
use crate::error::AppError;
use crate::identity;

/// The verified identity claim attached to a request: account id plus the
/// account's single role. Resolved from an opaque bearer credential; the
/// token mechanics stay outside the workflow layer.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentUser {
    pub account_id: String,
    pub role: Role,
}

impl CurrentUser {
    pub fn has_permission(&self, permission: Permission) -> bool {
        self.role.has_permission(permission)
    }

    pub fn require_permission(&self, permission: Permission) -> Result<(), AppError> {
        if self.role.has_permission(permission) {
            Ok(())
        } else {
            tracing::warn!(
                account_id = %self.account_id,
                role = %self.role.as_str(),
                permission = ?permission,
                "Permission denied"
            );
            Err(AppError::Forbidden(format!(
                "Role {} lacks permission {:?}",
                self.role, permission
            )))
        }
    }
}

/// The raw bearer credential, for endpoints that operate on the token
/// itself (logout).
pub struct BearerToken(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for BearerToken {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match bearer_token(request) {
            Some(token) => Outcome::Success(BearerToken(token.to_string())),
            None => Outcome::Error((Status::Unauthorized, ())),
        }
    }
}

fn bearer_token<'r>(request: &'r Request<'_>) -> Option<&'r str> {
    request
        .headers()
        .get_one("Authorization")
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for CurrentUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let auth_span = tracing::info_span!("bearer_auth_guard");
        let _guard = auth_span.enter();

        let Some(token) = bearer_token(request) else {
            return Outcome::Error((Status::Unauthorized, ()));
        };

        let db = match request.rocket().state::<SqlitePool>() {
            Some(pool) => pool,
            _ => {
                tracing::error!("Database pool not found in managed state");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        let session = match get_session_by_token(db, token).await {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = ?err, "Invalid bearer token");
                return Outcome::Error((Status::Unauthorized, ()));
            }
        };

        if !session.is_valid() {
            tracing::warn!("Bearer token expired");
            return Outcome::Error((Status::Unauthorized, ()));
        }

        let mut conn = match db.acquire().await {
            Ok(conn) => conn,
            Err(err) => {
                tracing::error!(error = ?err, "Failed to acquire connection for auth guard");
                return Outcome::Error((Status::InternalServerError, ()));
            }
        };

        match identity::find_by_id(&mut conn, &session.account_id).await {
            Ok(Some(account)) if account.is_active => match Role::from_str(&account.role) {
                Ok(role) => {
                    tracing::info!(account_id = %account.id, role = %role.as_str(), "Authenticated via bearer token");
                    Outcome::Success(CurrentUser {
                        account_id: account.id,
                        role,
                    })
                }
                Err(err) => {
                    tracing::error!(account_id = %account.id, error = ?err, "Account carries unknown role");
                    Outcome::Error((Status::InternalServerError, ()))
                }
            },
            Ok(Some(_)) => {
                tracing::warn!(account_id = %session.account_id, "Account is deactivated");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Ok(None) => {
                tracing::warn!(account_id = %session.account_id, "No account for valid session");
                Outcome::Error((Status::Unauthorized, ()))
            }
            Err(err) => {
                tracing::error!(account_id = %session.account_id, error = ?err, "Failed to fetch account for session");
                Outcome::Error((Status::InternalServerError, ()))
            }
        }
    }
}
