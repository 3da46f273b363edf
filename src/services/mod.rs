pub mod attendance;
pub mod classes;
pub mod grades;
pub mod profiles;
pub mod schedule;
pub mod subjects;
pub mod users;

pub use attendance::AttendanceService;
pub use classes::ClassService;
pub use grades::GradeService;
pub use profiles::ProfileService;
pub use schedule::ScheduleService;
pub use subjects::SubjectService;
pub use users::UserService;
