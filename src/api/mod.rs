pub mod attendance;
pub mod auth;
pub mod classes;
pub mod grades;
pub mod profiles;
pub mod schedule;
pub mod subjects;
pub mod users;

pub use attendance::*;
pub use auth::*;
pub use classes::*;
pub use grades::*;
pub use profiles::*;
pub use schedule::*;
pub use subjects::*;
pub use users::*;

#[get("/health")]
pub fn health() -> &'static str {
    "OK"
}
