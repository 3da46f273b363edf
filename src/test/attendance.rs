use chrono::{Datelike, Utc};
use rocket::tokio;

use crate::error::AppError;
use crate::models::AttendanceStatus;
use crate::services::AttendanceService;
use crate::services::attendance::AttendanceEntry;
use crate::test::utils::test_db::{TestDb, TestDbBuilder};

fn today_dow() -> i64 {
    Utc::now().weekday().num_days_from_sunday() as i64
}

async fn attendance_fixture() -> TestDb {
    TestDbBuilder::new()
        .teacher("tess@school.test", "Tess", "Talbot")
        .student("ada@school.test", "Ada", "Archer")
        .student("ben@school.test", "Ben", "Brook")
        .class("1A", None, &["ada@school.test", "ben@school.test"])
        .subject("Mathematics", &[("1A", "tess@school.test")])
        .schedule("1A", "Mathematics", "tess@school.test", 1, "08:00")
        .build()
        .await
        .expect("Failed to build test DB")
}

fn entry(student_id: i64, status: AttendanceStatus) -> AttendanceEntry {
    AttendanceEntry {
        student_id,
        status,
        comment: None,
    }
}

#[tokio::test]
async fn test_students_for_schedule_defaults_to_not_recorded() {
    let test_db = attendance_fixture().await;
    let attendance = AttendanceService::new(test_db.pool.clone());

    let students = attendance
        .students_for_schedule(test_db.schedule_id("1A", 1, "08:00").unwrap())
        .await
        .expect("Failed to list students");

    assert_eq!(students.len(), 2);
    for student in &students {
        assert_eq!(student.status, AttendanceStatus::NotRecorded);
    }
}

#[tokio::test]
async fn test_students_for_missing_schedule_fails() {
    let test_db = attendance_fixture().await;
    let attendance = AttendanceService::new(test_db.pool.clone());

    let result = attendance.students_for_schedule(9999).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_save_attendance_rejects_empty_list() {
    let test_db = attendance_fixture().await;
    let attendance = AttendanceService::new(test_db.pool.clone());

    let result = attendance
        .save_attendance(test_db.schedule_id("1A", 1, "08:00").unwrap(), &[], None)
        .await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_save_attendance_roundtrip() {
    let test_db = attendance_fixture().await;
    let attendance = AttendanceService::new(test_db.pool.clone());

    let schedule_id = test_db.schedule_id("1A", 1, "08:00").unwrap();
    let ada = test_db.student_id("ada@school.test").unwrap();
    let ben = test_db.student_id("ben@school.test").unwrap();

    attendance
        .save_attendance(
            schedule_id,
            &[
                entry(ada, AttendanceStatus::Present),
                entry(ben, AttendanceStatus::Late),
            ],
            None,
        )
        .await
        .expect("Failed to save attendance");

    let students = attendance
        .students_for_schedule(schedule_id)
        .await
        .expect("Failed to list students");

    let ada_status = students.iter().find(|s| s.student_id == ada).unwrap().status;
    let ben_status = students.iter().find(|s| s.student_id == ben).unwrap().status;

    assert_eq!(ada_status, AttendanceStatus::Present);
    assert_eq!(ben_status, AttendanceStatus::Late);
}

#[tokio::test]
async fn test_save_attendance_overwrites_same_day_records() {
    let test_db = attendance_fixture().await;
    let attendance = AttendanceService::new(test_db.pool.clone());

    let schedule_id = test_db.schedule_id("1A", 1, "08:00").unwrap();
    let ada = test_db.student_id("ada@school.test").unwrap();
    let ben = test_db.student_id("ben@school.test").unwrap();

    // First submission covers both students.
    attendance
        .save_attendance(
            schedule_id,
            &[
                entry(ada, AttendanceStatus::Present),
                entry(ben, AttendanceStatus::Present),
            ],
            None,
        )
        .await
        .expect("first save");

    // Second submission covers only Ada with a new status; it must fully
    // replace the first set, not merge with it.
    attendance
        .save_attendance(schedule_id, &[entry(ada, AttendanceStatus::Excused)], None)
        .await
        .expect("second save");

    #[derive(sqlx::FromRow)]
    struct Row {
        student_id: i64,
        status: String,
    }

    let rows = sqlx::query_as::<_, Row>(
        "SELECT student_id, status FROM attendances WHERE schedule_id = ? ORDER BY student_id",
    )
    .bind(schedule_id)
    .fetch_all(&test_db.pool)
    .await
    .unwrap();

    assert_eq!(rows.len(), 1, "exactly the second set must remain");
    assert_eq!(rows[0].student_id, ada);
    assert_eq!(rows[0].status, "Excused");
}

#[tokio::test]
async fn test_today_lessons_flag_and_order() {
    let dow = today_dow();

    let test_db = TestDbBuilder::new()
        .teacher("tess@school.test", "Tess", "Talbot")
        .student("ada@school.test", "Ada", "Archer")
        .class("1A", None, &["ada@school.test"])
        .class("1B", None, &[])
        .subject("Mathematics", &[("1A", "tess@school.test")])
        .schedule("1A", "Mathematics", "tess@school.test", dow, "10:00")
        .schedule("1B", "Mathematics", "tess@school.test", dow, "08:00")
        .schedule("1A", "Mathematics", "tess@school.test", (dow + 1) % 7, "08:00")
        .build()
        .await
        .expect("Failed to build test DB");

    let attendance = AttendanceService::new(test_db.pool.clone());
    let teacher_id = test_db.teacher_id("tess@school.test").unwrap();

    attendance
        .save_attendance(
            test_db.schedule_id("1A", dow, "10:00").unwrap(),
            &[entry(
                test_db.student_id("ada@school.test").unwrap(),
                AttendanceStatus::Present,
            )],
            None,
        )
        .await
        .expect("Failed to save attendance");

    let lessons = attendance
        .today_lessons_for_teacher(teacher_id)
        .await
        .expect("Failed to list lessons");

    // Only today's two lessons, ordered by start time.
    assert_eq!(lessons.len(), 2);
    assert_eq!(lessons[0].start_time, "08:00");
    assert_eq!(lessons[1].start_time, "10:00");

    assert!(!lessons[0].has_attendance);
    assert!(lessons[1].has_attendance);
    assert_eq!(lessons[1].class_name, "1A");
}
