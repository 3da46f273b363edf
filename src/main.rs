#[macro_use]
extern crate rocket;

mod api;
mod auth;
mod db;
mod env;
mod error;
mod identity;
mod models;
mod paging;
mod services;
mod telemetry;
#[cfg(test)]
mod test;
mod validation;

use std::sync::Mutex;

use once_cell::sync::Lazy;
use rocket::{Build, Rocket, tokio};
use sqlx::SqlitePool;
use tracing::{error, info};

use api::{
    api_add_grade, api_add_schedule_entry, api_add_user, api_classes_with_schedule,
    api_create_class, api_create_subject, api_delete_class, api_delete_subject, api_delete_user,
    api_get_class, api_get_classes, api_get_classes_paged, api_get_roles, api_get_user,
    api_get_students, api_get_subject, api_get_subjects_paged, api_get_teachers,
    api_get_users_paged, api_grades_for_student_paged, api_grades_for_teacher_paged, api_login,
    api_logout, api_me, api_save_attendance, api_schedule_for_class, api_schedule_for_student,
    api_schedule_for_teacher, api_students_for_grading, api_students_for_schedule,
    api_subjects_for_class, api_subjects_for_teacher, api_today_lessons, api_update_class,
    api_update_subject, api_update_user, health,
};
use auth::{clean_expired_sessions, forbidden_api, unauthorized_api};
use error::AppError;
use services::{
    AttendanceService, ClassService, GradeService, ProfileService, ScheduleService,
    SubjectService, UserService,
};
use telemetry::{OtelGuard, TelemetryFairing};

pub static TELEMETRY_GUARD: Lazy<Mutex<Option<OtelGuard>>> = Lazy::new(|| Mutex::new(None));

#[launch]
async fn rocket() -> _ {
    if let Err(e) = env::load_environment() {
        eprintln!("Failed to load environment: {}", e);
    }

    let guard = telemetry::init_tracing();
    if let Ok(mut slot) = TELEMETRY_GUARD.lock() {
        *slot = guard;
    }

    let database_url =
        std::env::var("DATABASE_URL").unwrap_or_else(|_| "sqlite://school.db".to_string());

    let pool = db::connect_pool(&database_url)
        .await
        .expect("Failed to connect to SQLite database");

    info!("Running database migrations...");
    match sqlx::migrate!("./migrations").run(&pool).await {
        Ok(_) => info!("Migrations completed successfully"),
        Err(e) => {
            error!("Failed to run migrations: {}", e);
            panic!("Database migration failed: {}", e);
        }
    }

    if let Err(e) = bootstrap_admin(&pool).await {
        error!("Bootstrap administrator setup failed: {}", e);
    }

    let pool_clone = pool.clone();

    tokio::spawn(async move {
        tokio::time::sleep(tokio::time::Duration::from_secs(5)).await;

        loop {
            match clean_expired_sessions(&pool_clone).await {
                Ok(count) => {
                    if count > 0 {
                        info!("Cleaned up {} expired sessions", count);
                    }
                }
                Err(e) => {
                    error!("Failed to clean expired sessions: {}", e);
                }
            }

            tokio::time::sleep(tokio::time::Duration::from_secs(3600)).await;
        }
    });

    init_rocket(pool).await
}

/// Creates the initial administrator account from the environment on first
/// start; later starts find the account already present and move on.
async fn bootstrap_admin(pool: &SqlitePool) -> anyhow::Result<()> {
    let (Ok(email), Ok(password)) = (
        std::env::var("BOOTSTRAP_ADMIN_EMAIL"),
        std::env::var("BOOTSTRAP_ADMIN_PASSWORD"),
    ) else {
        info!("No bootstrap administrator configured");
        return Ok(());
    };

    let first_name =
        std::env::var("BOOTSTRAP_ADMIN_FIRST_NAME").unwrap_or_else(|_| "System".to_string());
    let last_name =
        std::env::var("BOOTSTRAP_ADMIN_LAST_NAME").unwrap_or_else(|_| "Administrator".to_string());

    let users = UserService::new(pool.clone());

    match users
        .add_new_user("Administrator", &first_name, &last_name, &email, &password)
        .await
    {
        Ok(id) => info!(account_id = %id, "Bootstrap administrator created"),
        Err(AppError::Conflict(_)) => info!("Bootstrap administrator already exists"),
        Err(e) => return Err(e.into()),
    }

    Ok(())
}

pub async fn init_rocket(pool: SqlitePool) -> Rocket<Build> {
    info!("Starting school administration backend");

    rocket::build()
        .manage(pool.clone())
        .manage(ClassService::new(pool.clone()))
        .manage(SubjectService::new(pool.clone()))
        .manage(UserService::new(pool.clone()))
        .manage(ProfileService::new(pool.clone()))
        .manage(GradeService::new(pool.clone()))
        .manage(AttendanceService::new(pool.clone()))
        .manage(ScheduleService::new(pool))
        .mount(
            "/api",
            routes![
                api_login,
                api_logout,
                api_me,
                api_get_classes,
                api_get_classes_paged,
                api_get_class,
                api_create_class,
                api_update_class,
                api_delete_class,
                api_get_subjects_paged,
                api_get_subject,
                api_create_subject,
                api_update_subject,
                api_delete_subject,
                api_add_user,
                api_update_user,
                api_delete_user,
                api_get_users_paged,
                api_get_roles,
                api_get_user,
                api_add_grade,
                api_grades_for_student_paged,
                api_grades_for_teacher_paged,
                api_students_for_grading,
                api_subjects_for_teacher,
                api_students_for_schedule,
                api_save_attendance,
                api_today_lessons,
                api_add_schedule_entry,
                api_schedule_for_class,
                api_schedule_for_student,
                api_schedule_for_teacher,
                api_classes_with_schedule,
                api_subjects_for_class,
                api_get_students,
                api_get_teachers,
            ],
        )
        .register("/api", catchers![unauthorized_api, forbidden_api])
        .mount("/api", routes![health])
        .attach(TelemetryFairing)
}
