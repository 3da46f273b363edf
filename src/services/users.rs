use serde::Deserialize;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{error, info, instrument};

use crate::auth::Role;
use crate::error::AppError;
use crate::identity;
use crate::models::UserView;
use crate::paging::{Paged, PagedRequest, SortDirection, UserSortKey};

#[derive(Debug, Clone, Deserialize)]
pub struct UserUpdate {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub new_password: Option<String>,
}

#[derive(sqlx::FromRow)]
struct DbUserRow {
    id: String,
    email: String,
    role: String,
    is_active: bool,
    created_at: chrono::NaiveDateTime,
    last_login_at: Option<chrono::NaiveDateTime>,
    first_name: String,
    last_name: String,
}

impl From<DbUserRow> for UserView {
    fn from(row: DbUserRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            role: row.role,
            is_active: row.is_active,
            date_added: row.created_at,
            last_login: row.last_login_at,
        }
    }
}

/// Account + profile lifecycle. An account and its role profile are created
/// and deleted together, inside one transaction, profile row first on the
/// way out so the mandatory account reference never dangles.
#[derive(Clone)]
pub struct UserService {
    pool: SqlitePool,
}

impl UserService {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    #[instrument(skip_all, fields(role, email))]
    pub async fn add_new_user(
        &self,
        role: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        password: &str,
    ) -> Result<String, AppError> {
        info!("Adding new user");

        let role = Role::from_str(role)?;

        let mut tx = self.pool.begin().await?;

        if identity::find_by_username(&mut tx, email).await?.is_some() {
            return Err(AppError::Conflict(
                "A user with the provided email already exists".to_string(),
            ));
        }

        let account = identity::create_account(&mut tx, email, email, password, role).await?;

        insert_profile(&mut tx, role, &account.id, first_name, last_name).await?;

        tx.commit().await?;

        Ok(account.id)
    }

    #[instrument(skip(self))]
    pub async fn delete_user(&self, account_id: &str) -> Result<(), AppError> {
        info!("Deleting user");

        let mut tx = self.pool.begin().await?;

        let account = identity::find_by_id(&mut tx, account_id).await?;

        let Some(account) = account else {
            return Err(AppError::NotFound("User not found".to_string()));
        };

        let role = Role::from_str(&account.role)?;

        // Profile first: the account cannot go while a profile references it.
        sqlx::query(&format!(
            "DELETE FROM {} WHERE account_id = ?",
            profile_table(role)
        ))
        .bind(account_id)
        .execute(&mut *tx)
        .await?;

        identity::delete_account(&mut tx, account_id).await?;

        tx.commit().await?;

        Ok(())
    }

    /// Returns `Ok(false)` when the account does not exist or the password
    /// reset fails; the transaction is rolled back and the caller branches on
    /// the flag.
    #[instrument(skip(self, update), fields(account_id = %update.id))]
    pub async fn update_user(&self, update: &UserUpdate) -> Result<bool, AppError> {
        info!("Updating user");

        let mut tx = self.pool.begin().await?;

        let Some(account) = identity::find_by_id(&mut tx, &update.id).await? else {
            return Ok(false);
        };

        identity::set_username(&mut tx, &account.id, &update.email).await?;
        identity::set_email(&mut tx, &account.id, &update.email).await?;

        if let Some(new_password) = update.new_password.as_deref().filter(|p| !p.is_empty()) {
            let token = identity::generate_password_reset_token(&mut tx, &account.id).await?;

            if let Err(err) =
                identity::reset_password(&mut tx, &account.id, &token, new_password).await
            {
                error!(account_id = %account.id, error = %err, "Password reset failed during user update");
                return Ok(false);
            }
        }

        let role = Role::from_str(&account.role)?;
        sqlx::query(&format!(
            "UPDATE {} SET first_name = ?, last_name = ? WHERE account_id = ?",
            profile_table(role)
        ))
        .bind(&update.first_name)
        .bind(&update.last_name)
        .bind(&account.id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(true)
    }

    #[instrument(skip(self))]
    pub async fn get_user_by_id(&self, account_id: &str) -> Result<Option<UserView>, AppError> {
        let mut conn = self.pool.acquire().await?;

        let Some(account) = identity::find_by_id(&mut conn, account_id).await? else {
            return Ok(None);
        };

        let role = Role::from_str(&account.role)?;

        let names = sqlx::query_as::<_, (String, String)>(&format!(
            "SELECT first_name, last_name FROM {} WHERE account_id = ?",
            profile_table(role)
        ))
        .bind(account_id)
        .fetch_optional(&mut *conn)
        .await?;

        let Some((first_name, last_name)) = names else {
            return Ok(None);
        };

        Ok(Some(UserView {
            id: account.id,
            first_name,
            last_name,
            email: account.email,
            role: account.role,
            is_active: account.is_active,
            date_added: account.created_at,
            last_login: account.last_login_at,
        }))
    }

    #[instrument(skip(self, request))]
    pub async fn users_paged(&self, request: &PagedRequest) -> Result<Paged<UserView>, AppError> {
        request.validate_window()?;

        let (sort_key, direction) = match request.sort_column.as_deref() {
            Some(column) => (UserSortKey::from_column(column)?, request.direction()),
            None => (UserSortKey::Role, SortDirection::Asc),
        };

        let search_filter = match request.search_query.as_deref() {
            Some(query) if !query.is_empty() => "WHERE a.role LIKE '%' || ? || '%'",
            _ => "",
        };
        let search_query = request.search_query.clone().unwrap_or_default();

        let count_sql = format!("SELECT COUNT(*) FROM accounts a {}", search_filter);
        let mut count = sqlx::query_scalar::<_, i64>(&count_sql);
        if !search_filter.is_empty() {
            count = count.bind(&search_query);
        }
        let total_records = count.fetch_one(&self.pool).await?;

        let sql = format!(
            "SELECT a.id, a.email, a.role, a.is_active, a.created_at, a.last_login_at,
                    COALESCE(ad.first_name, t.first_name, s.first_name, '') AS first_name,
                    COALESCE(ad.last_name, t.last_name, s.last_name, '') AS last_name
             FROM accounts a
             LEFT JOIN admins ad ON ad.account_id = a.id
             LEFT JOIN teachers t ON t.account_id = a.id
             LEFT JOIN students s ON s.account_id = a.id
             {}
             ORDER BY {}
             LIMIT ? OFFSET ?",
            search_filter,
            sort_key.order_by(direction)
        );

        let mut query = sqlx::query_as::<_, DbUserRow>(&sql);
        if !search_filter.is_empty() {
            query = query.bind(&search_query);
        }
        let rows = query
            .bind(request.page_size)
            .bind(request.offset())
            .fetch_all(&self.pool)
            .await?;

        let mut data: Vec<UserView> = rows.into_iter().map(UserView::from).collect();

        // First/last name are profile columns not addressable by the primary
        // ORDER BY; they re-order the fetched page in memory.
        if sort_key.in_memory() {
            data.sort_by(|a, b| {
                let ordering = match sort_key {
                    UserSortKey::FirstName => a.first_name.cmp(&b.first_name),
                    _ => a.last_name.cmp(&b.last_name),
                };
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        Ok(Paged {
            total_records,
            data,
        })
    }

    pub fn get_roles(&self) -> Vec<String> {
        Role::ALL.iter().map(|r| r.as_str().to_string()).collect()
    }
}

fn profile_table(role: Role) -> &'static str {
    match role {
        Role::Administrator => "admins",
        Role::Teacher => "teachers",
        Role::Student => "students",
    }
}

async fn insert_profile(
    tx: &mut Transaction<'_, Sqlite>,
    role: Role,
    account_id: &str,
    first_name: &str,
    last_name: &str,
) -> Result<(), AppError> {
    match role {
        Role::Student => {
            sqlx::query(
                "INSERT INTO students (account_id, first_name, last_name, class_id) VALUES (?, ?, ?, NULL)",
            )
            .bind(account_id)
            .bind(first_name)
            .bind(last_name)
            .execute(&mut **tx)
            .await?;
        }
        Role::Teacher => {
            sqlx::query("INSERT INTO teachers (account_id, first_name, last_name) VALUES (?, ?, ?)")
                .bind(account_id)
                .bind(first_name)
                .bind(last_name)
                .execute(&mut **tx)
                .await?;
        }
        Role::Administrator => {
            sqlx::query("INSERT INTO admins (account_id, first_name, last_name) VALUES (?, ?, ?)")
                .bind(account_id)
                .bind(first_name)
                .bind(last_name)
                .execute(&mut **tx)
                .await?;
        }
    }

    Ok(())
}
