//! The identity directory: login-capable accounts with exactly one role each.
//! Functions take a `&mut SqliteConnection` so the user workflow can run them
//! inside its own transaction scope.

use chrono::{NaiveDateTime, Utc};
use rand::distr::{Alphanumeric, SampleString};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::auth::Role;
use crate::error::AppError;

const RESET_TOKEN_MINUTES: i64 = 15;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub last_login_at: Option<NaiveDateTime>,
}

const ACCOUNT_COLUMNS: &str =
    "id, username, email, role, is_active, created_at, last_login_at";

#[instrument(skip(conn))]
pub async fn find_by_username(
    conn: &mut SqliteConnection,
    username: &str,
) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM accounts WHERE username = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(username)
    .fetch_optional(conn)
    .await?;

    Ok(account)
}

#[instrument(skip(conn))]
pub async fn find_by_id(
    conn: &mut SqliteConnection,
    id: &str,
) -> Result<Option<Account>, AppError> {
    let account = sqlx::query_as::<_, Account>(&format!(
        "SELECT {} FROM accounts WHERE id = ?",
        ACCOUNT_COLUMNS
    ))
    .bind(id)
    .fetch_optional(conn)
    .await?;

    Ok(account)
}

/// Inserts a new active account with a generated id and a bcrypt-hashed
/// password. Login-name uniqueness is pre-checked by callers and backed by
/// the UNIQUE constraint.
#[instrument(skip_all, fields(username, role))]
pub async fn create_account(
    conn: &mut SqliteConnection,
    username: &str,
    email: &str,
    password: &str,
    role: Role,
) -> Result<Account, AppError> {
    info!("Creating new account");

    let id = Uuid::new_v4().to_string();
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;
    let now = Utc::now().naive_utc();

    sqlx::query(
        "INSERT INTO accounts (id, username, email, password_hash, role, is_active, created_at)
         VALUES (?, ?, ?, ?, ?, TRUE, ?)",
    )
    .bind(&id)
    .bind(username)
    .bind(email)
    .bind(&password_hash)
    .bind(role.as_str())
    .bind(now)
    .execute(conn)
    .await?;

    Ok(Account {
        id,
        username: username.to_string(),
        email: email.to_string(),
        role: role.as_str().to_string(),
        is_active: true,
        created_at: now,
        last_login_at: None,
    })
}

#[instrument(skip(conn))]
pub async fn delete_account(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    info!("Deleting account");

    sqlx::query("DELETE FROM accounts WHERE id = ?")
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn set_username(
    conn: &mut SqliteConnection,
    id: &str,
    new_username: &str,
) -> Result<(), AppError> {
    let existing = sqlx::query("SELECT id FROM accounts WHERE username = ? AND id != ?")
        .bind(new_username)
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    if existing.is_some() {
        return Err(AppError::Conflict(format!(
            "Login name '{}' is already taken",
            new_username
        )));
    }

    sqlx::query("UPDATE accounts SET username = ? WHERE id = ?")
        .bind(new_username)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

#[instrument(skip(conn))]
pub async fn set_email(
    conn: &mut SqliteConnection,
    id: &str,
    new_email: &str,
) -> Result<(), AppError> {
    sqlx::query("UPDATE accounts SET email = ? WHERE id = ?")
        .bind(new_email)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Checks the password for an active account and returns it on success.
#[instrument(skip_all, fields(username))]
pub async fn verify_password(
    conn: &mut SqliteConnection,
    username: &str,
    password: &str,
) -> Result<Option<Account>, AppError> {
    info!("Authenticating account");

    let row = sqlx::query_as::<_, (String, bool)>(
        "SELECT password_hash, is_active FROM accounts WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((password_hash, is_active)) = row else {
        return Ok(None);
    };

    if !is_active {
        return Ok(None);
    }

    match bcrypt::verify(password, &password_hash) {
        Ok(true) => find_by_username(conn, username).await,
        _ => Ok(None),
    }
}

#[instrument(skip(conn))]
pub async fn record_login(conn: &mut SqliteConnection, id: &str) -> Result<(), AppError> {
    let now = Utc::now().naive_utc();

    sqlx::query("UPDATE accounts SET last_login_at = ? WHERE id = ?")
        .bind(now)
        .bind(id)
        .execute(conn)
        .await?;

    Ok(())
}

/// Issues a short-lived single-use token for a password reset.
#[instrument(skip(conn))]
pub async fn generate_password_reset_token(
    conn: &mut SqliteConnection,
    account_id: &str,
) -> Result<String, AppError> {
    let token = Alphanumeric.sample_string(&mut rand::rng(), 40);
    let expires_at = (Utc::now() + chrono::Duration::minutes(RESET_TOKEN_MINUTES)).naive_utc();

    sqlx::query(
        "INSERT INTO password_reset_tokens (account_id, token, expires_at) VALUES (?, ?, ?)",
    )
    .bind(account_id)
    .bind(&token)
    .bind(expires_at)
    .execute(conn)
    .await?;

    Ok(token)
}

/// Consumes a reset token and replaces the account's password hash. Fails
/// with an authentication error when the token is unknown, expired, or was
/// issued for another account.
#[instrument(skip(conn, token, new_password))]
pub async fn reset_password(
    conn: &mut SqliteConnection,
    account_id: &str,
    token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    info!("Resetting account password");

    let now = Utc::now().naive_utc();

    let row = sqlx::query_as::<_, (i64,)>(
        "SELECT id FROM password_reset_tokens
         WHERE token = ? AND account_id = ? AND expires_at > ?",
    )
    .bind(token)
    .bind(account_id)
    .bind(now)
    .fetch_optional(&mut *conn)
    .await?;

    let Some((token_id,)) = row else {
        return Err(AppError::Authentication(
            "Invalid or expired password reset token".to_string(),
        ));
    };

    let password_hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)?;

    sqlx::query("UPDATE accounts SET password_hash = ? WHERE id = ?")
        .bind(&password_hash)
        .bind(account_id)
        .execute(&mut *conn)
        .await?;

    sqlx::query("DELETE FROM password_reset_tokens WHERE id = ?")
        .bind(token_id)
        .execute(conn)
        .await?;

    Ok(())
}
