#[cfg(test)]
pub mod test_db {
    use crate::auth::Role;
    use crate::error::AppError;
    use crate::models::SubjectAssignment;
    use crate::services::schedule::NewScheduleEntry;
    use crate::services::{ClassService, ScheduleService, SubjectService, UserService};
    use sqlx::{Pool, Sqlite};
    use std::collections::HashMap;
    use std::sync::Once;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static INIT: Once = Once::new();
    static DB_COUNTER: AtomicUsize = AtomicUsize::new(0);
    pub static STANDARD_PASSWORD: &str = "password123";

    #[derive(Default)]
    pub struct TestDbBuilder {
        users: Vec<TestUser>,
        classes: Vec<TestClass>,
        subjects: Vec<TestSubject>,
        schedules: Vec<TestSchedule>,
    }

    pub struct TestUser {
        pub email: String,
        pub first_name: String,
        pub last_name: String,
        pub role: Role,
    }

    pub struct TestClass {
        pub name: String,
        pub homeroom_teacher_email: Option<String>,
        pub member_emails: Vec<String>,
    }

    pub struct TestSubject {
        pub name: String,
        pub assignments: Vec<(String, String)>,
    }

    pub struct TestSchedule {
        pub class_name: String,
        pub subject_name: String,
        pub teacher_email: String,
        pub day_of_week: i64,
        pub start_time: String,
    }

    impl TestDbBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn administrator(mut self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Administrator,
            });
            self
        }

        pub fn teacher(mut self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Teacher,
            });
            self
        }

        pub fn student(mut self, email: &str, first_name: &str, last_name: &str) -> Self {
            self.users.push(TestUser {
                email: email.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                role: Role::Student,
            });
            self
        }

        pub fn class(
            mut self,
            name: &str,
            homeroom_teacher_email: Option<&str>,
            member_emails: &[&str],
        ) -> Self {
            self.classes.push(TestClass {
                name: name.to_string(),
                homeroom_teacher_email: homeroom_teacher_email.map(String::from),
                member_emails: member_emails.iter().map(|e| e.to_string()).collect(),
            });
            self
        }

        pub fn subject(mut self, name: &str, assignments: &[(&str, &str)]) -> Self {
            self.subjects.push(TestSubject {
                name: name.to_string(),
                assignments: assignments
                    .iter()
                    .map(|(class, teacher)| (class.to_string(), teacher.to_string()))
                    .collect(),
            });
            self
        }

        pub fn schedule(
            mut self,
            class_name: &str,
            subject_name: &str,
            teacher_email: &str,
            day_of_week: i64,
            start_time: &str,
        ) -> Self {
            self.schedules.push(TestSchedule {
                class_name: class_name.to_string(),
                subject_name: subject_name.to_string(),
                teacher_email: teacher_email.to_string(),
                day_of_week,
                start_time: start_time.to_string(),
            });
            self
        }

        pub async fn build(self) -> Result<TestDb, AppError> {
            INIT.call_once(|| {
                let _ = env_logger::builder().is_test(true).try_init();
            });

            // A named shared-cache memory database: every pooled connection
            // sees the same schema, unlike a plain ":memory:" per connection.
            let database_url = format!(
                "sqlite:file:school_admin_test_{}?mode=memory&cache=shared",
                DB_COUNTER.fetch_add(1, Ordering::SeqCst)
            );
            let pool = crate::db::connect_pool(&database_url).await?;

            sqlx::migrate!("./migrations").run(&pool).await?;

            let users = UserService::new(pool.clone());
            let classes = ClassService::new(pool.clone());
            let subjects = SubjectService::new(pool.clone());
            let schedule = ScheduleService::new(pool.clone());

            let mut account_ids: HashMap<String, String> = HashMap::new();
            let mut teacher_ids: HashMap<String, i64> = HashMap::new();
            let mut student_ids: HashMap<String, i64> = HashMap::new();
            let mut class_ids: HashMap<String, i64> = HashMap::new();
            let mut subject_ids: HashMap<String, i64> = HashMap::new();
            let mut schedule_ids: HashMap<String, i64> = HashMap::new();

            for user in &self.users {
                let account_id = users
                    .add_new_user(
                        user.role.as_str(),
                        &user.first_name,
                        &user.last_name,
                        &user.email,
                        STANDARD_PASSWORD,
                    )
                    .await?;

                match user.role {
                    Role::Teacher => {
                        let id = sqlx::query_scalar::<_, i64>(
                            "SELECT id FROM teachers WHERE account_id = ?",
                        )
                        .bind(&account_id)
                        .fetch_one(&pool)
                        .await?;
                        teacher_ids.insert(user.email.clone(), id);
                    }
                    Role::Student => {
                        let id = sqlx::query_scalar::<_, i64>(
                            "SELECT id FROM students WHERE account_id = ?",
                        )
                        .bind(&account_id)
                        .fetch_one(&pool)
                        .await?;
                        student_ids.insert(user.email.clone(), id);
                    }
                    Role::Administrator => {}
                }

                account_ids.insert(user.email.clone(), account_id);
            }

            for class in &self.classes {
                let homeroom_teacher_id = class
                    .homeroom_teacher_email
                    .as_ref()
                    .and_then(|email| teacher_ids.get(email).copied());

                let member_ids: Vec<i64> = class
                    .member_emails
                    .iter()
                    .filter_map(|email| student_ids.get(email).copied())
                    .collect();

                let id = classes
                    .add_class(&class.name, homeroom_teacher_id, &member_ids)
                    .await?;

                class_ids.insert(class.name.clone(), id);
            }

            for subject in &self.subjects {
                let assignments: Vec<SubjectAssignment> = subject
                    .assignments
                    .iter()
                    .filter_map(|(class, teacher)| {
                        Some(SubjectAssignment {
                            class_id: class_ids.get(class).copied()?,
                            teacher_id: teacher_ids.get(teacher).copied()?,
                        })
                    })
                    .collect();

                let id = subjects
                    .add_subject_with_assignments(&subject.name, &assignments)
                    .await?;

                subject_ids.insert(subject.name.clone(), id);
            }

            for entry in &self.schedules {
                let created = schedule
                    .add_entry(&NewScheduleEntry {
                        class_id: class_ids[&entry.class_name],
                        subject_id: subject_ids[&entry.subject_name],
                        teacher_id: teacher_ids[&entry.teacher_email],
                        day_of_week: entry.day_of_week,
                        start_time: entry.start_time.clone(),
                    })
                    .await?;

                schedule_ids.insert(
                    schedule_key(&entry.class_name, entry.day_of_week, &entry.start_time),
                    created.id,
                );
            }

            Ok(TestDb {
                pool,
                account_ids,
                teacher_ids,
                student_ids,
                class_ids,
                subject_ids,
                schedule_ids,
            })
        }
    }

    fn schedule_key(class_name: &str, day_of_week: i64, start_time: &str) -> String {
        format!("{}@{}@{}", class_name, day_of_week, start_time)
    }

    pub struct TestDb {
        pub pool: Pool<Sqlite>,
        pub account_ids: HashMap<String, String>,
        pub teacher_ids: HashMap<String, i64>,
        pub student_ids: HashMap<String, i64>,
        pub class_ids: HashMap<String, i64>,
        pub subject_ids: HashMap<String, i64>,
        pub schedule_ids: HashMap<String, i64>,
    }

    impl TestDb {
        pub fn account_id(&self, email: &str) -> Option<&str> {
            self.account_ids.get(email).map(String::as_str)
        }

        pub fn teacher_id(&self, email: &str) -> Option<i64> {
            self.teacher_ids.get(email).copied()
        }

        pub fn student_id(&self, email: &str) -> Option<i64> {
            self.student_ids.get(email).copied()
        }

        pub fn class_id(&self, name: &str) -> Option<i64> {
            self.class_ids.get(name).copied()
        }

        pub fn subject_id(&self, name: &str) -> Option<i64> {
            self.subject_ids.get(name).copied()
        }

        pub fn schedule_id(&self, class_name: &str, day_of_week: i64, start_time: &str) -> Option<i64> {
            self.schedule_ids
                .get(&schedule_key(class_name, day_of_week, start_time))
                .copied()
        }

        pub async fn student_class(&self, email: &str) -> Result<Option<i64>, sqlx::Error> {
            let student_id = self.student_id(email).ok_or(sqlx::Error::RowNotFound)?;

            sqlx::query_scalar::<_, Option<i64>>("SELECT class_id FROM students WHERE id = ?")
                .bind(student_id)
                .fetch_one(&self.pool)
                .await
        }

        pub async fn class_member_ids(&self, class_name: &str) -> Result<Vec<i64>, sqlx::Error> {
            let class_id = self.class_id(class_name).ok_or(sqlx::Error::RowNotFound)?;

            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM students WHERE class_id = ? ORDER BY id",
            )
            .bind(class_id)
            .fetch_all(&self.pool)
            .await
        }

        pub async fn assignment_row_ids(&self, subject_name: &str) -> Result<Vec<i64>, sqlx::Error> {
            let subject_id = self.subject_id(subject_name).ok_or(sqlx::Error::RowNotFound)?;

            sqlx::query_scalar::<_, i64>(
                "SELECT id FROM class_subjects WHERE subject_id = ? ORDER BY id",
            )
            .bind(subject_id)
            .fetch_all(&self.pool)
            .await
        }
    }
}

#[cfg(test)]
pub mod test_client {
    use rocket::http::{ContentType, Header};
    use rocket::local::asynchronous::Client;
    use serde_json::json;

    use crate::api::LoginResponse;

    use super::test_db::TestDb;

    pub async fn setup_test_client(test_db: TestDb) -> (Client, TestDb) {
        let client = Client::tracked(crate::init_rocket(test_db.pool.clone()).await)
            .await
            .expect("valid rocket instance");

        (client, test_db)
    }

    pub async fn login_test_user(client: &Client, username: &str, password: &str) -> String {
        let response = client
            .post("/api/auth/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        let body = response.into_string().await.expect("login response body");
        let login: LoginResponse = serde_json::from_str(&body).expect("login response json");

        login.token.expect("login should produce a token")
    }

    pub fn bearer(token: &str) -> Header<'static> {
        Header::new("Authorization", format!("Bearer {}", token))
    }
}
