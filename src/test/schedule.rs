use rocket::tokio;

use crate::error::AppError;
use crate::services::ScheduleService;
use crate::services::schedule::NewScheduleEntry;
use crate::test::utils::test_db::{TestDb, TestDbBuilder};

async fn schedule_fixture() -> TestDb {
    TestDbBuilder::new()
        .teacher("tess@school.test", "Tess", "Talbot")
        .student("ada@school.test", "Ada", "Archer")
        .class("1A", None, &["ada@school.test"])
        .subject("Mathematics", &[("1A", "tess@school.test")])
        .build()
        .await
        .expect("Failed to build test DB")
}

fn new_entry(test_db: &TestDb, day_of_week: i64, start_time: &str) -> NewScheduleEntry {
    NewScheduleEntry {
        class_id: test_db.class_id("1A").unwrap(),
        subject_id: test_db.subject_id("Mathematics").unwrap(),
        teacher_id: test_db.teacher_id("tess@school.test").unwrap(),
        day_of_week,
        start_time: start_time.to_string(),
    }
}

#[tokio::test]
async fn test_add_entry_resolves_display_names() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    let entry = schedule
        .add_entry(&new_entry(&test_db, 1, "08:00"))
        .await
        .expect("Failed to add entry");

    assert_eq!(entry.day_of_week, 1);
    assert_eq!(entry.start_time, "08:00");
    assert_eq!(entry.subject_name, "Mathematics");
    assert_eq!(entry.teacher_name, "Tess Talbot");
}

#[tokio::test]
async fn test_add_entry_missing_references_fail() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    let mut missing_class = new_entry(&test_db, 1, "08:00");
    missing_class.class_id = 9999;
    assert!(matches!(
        schedule.add_entry(&missing_class).await,
        Err(AppError::NotFound(_))
    ));

    let mut missing_subject = new_entry(&test_db, 1, "08:00");
    missing_subject.subject_id = 9999;
    assert!(matches!(
        schedule.add_entry(&missing_subject).await,
        Err(AppError::NotFound(_))
    ));

    let mut missing_teacher = new_entry(&test_db, 1, "08:00");
    missing_teacher.teacher_id = 9999;
    assert!(matches!(
        schedule.add_entry(&missing_teacher).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_add_entry_rejects_malformed_time_and_day() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    for bad_time in ["8 o'clock", "25:00", ""] {
        let result = schedule.add_entry(&new_entry(&test_db, 1, bad_time)).await;
        assert!(
            matches!(result, Err(AppError::InvalidArgument(_))),
            "time {:?} must be rejected",
            bad_time
        );
    }

    let result = schedule.add_entry(&new_entry(&test_db, 7, "08:00")).await;
    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}

#[tokio::test]
async fn test_add_entry_rejects_double_booked_slot() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    schedule
        .add_entry(&new_entry(&test_db, 1, "08:00"))
        .await
        .expect("first entry");

    let result = schedule.add_entry(&new_entry(&test_db, 1, "08:00")).await;
    assert!(matches!(result, Err(AppError::Conflict(_))));

    // A different slot on the same day is fine and queryable afterwards.
    schedule
        .add_entry(&new_entry(&test_db, 1, "09:00"))
        .await
        .expect("non-colliding entry");

    let for_class = schedule
        .schedule_for_class(test_db.class_id("1A").unwrap())
        .await
        .expect("Failed to read class schedule");

    assert_eq!(for_class.entries.len(), 2);
}

#[tokio::test]
async fn test_schedule_for_class_orders_by_day_then_time() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    for (day, time) in [(2, "08:00"), (1, "10:00"), (1, "08:00")] {
        schedule
            .add_entry(&new_entry(&test_db, day, time))
            .await
            .expect("Failed to add entry");
    }

    let for_class = schedule
        .schedule_for_class(test_db.class_id("1A").unwrap())
        .await
        .expect("Failed to read class schedule");

    assert_eq!(for_class.class_name, "1A");

    let slots: Vec<(i64, &str)> = for_class
        .entries
        .iter()
        .map(|e| (e.day_of_week, e.start_time.as_str()))
        .collect();
    assert_eq!(slots, vec![(1, "08:00"), (1, "10:00"), (2, "08:00")]);
}

#[tokio::test]
async fn test_schedule_for_missing_class_fails() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    let result = schedule.schedule_for_class(9999).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_schedule_for_student_resolves_class() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    schedule
        .add_entry(&new_entry(&test_db, 3, "09:00"))
        .await
        .expect("Failed to add entry");

    let entries = schedule
        .schedule_for_student(test_db.account_id("ada@school.test").unwrap())
        .await
        .expect("Failed to read student schedule");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].class_name, "1A");
    assert_eq!(entries[0].subject_name, "Mathematics");
    assert_eq!(entries[0].teacher_name, "Tess Talbot");
}

#[tokio::test]
async fn test_schedule_for_student_without_profile_fails() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    // A teacher account has no student profile behind it.
    let result = schedule
        .schedule_for_student(test_db.account_id("tess@school.test").unwrap())
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_schedule_for_unassigned_student_is_empty() {
    let test_db = TestDbBuilder::new()
        .student("solo@school.test", "Sol", "Singleton")
        .build()
        .await
        .expect("Failed to build test DB");

    let schedule = ScheduleService::new(test_db.pool.clone());

    let entries = schedule
        .schedule_for_student(test_db.account_id("solo@school.test").unwrap())
        .await
        .expect("a classless student simply has no timetable");

    assert!(entries.is_empty());
}

#[tokio::test]
async fn test_schedule_for_teacher_lists_own_entries() {
    let test_db = schedule_fixture().await;
    let schedule = ScheduleService::new(test_db.pool.clone());

    schedule
        .add_entry(&new_entry(&test_db, 4, "11:00"))
        .await
        .expect("Failed to add entry");

    let entries = schedule
        .schedule_for_teacher(test_db.account_id("tess@school.test").unwrap())
        .await
        .expect("Failed to read teacher schedule");

    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].class_name, "1A");

    let result = schedule
        .schedule_for_teacher(test_db.account_id("ada@school.test").unwrap())
        .await;
    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_classes_with_schedule_counts_entries() {
    let test_db = TestDbBuilder::new()
        .teacher("tess@school.test", "Tess", "Talbot")
        .class("1B", None, &[])
        .class("1A", None, &[])
        .subject("Mathematics", &[])
        .schedule("1B", "Mathematics", "tess@school.test", 1, "08:00")
        .schedule("1B", "Mathematics", "tess@school.test", 2, "08:00")
        .build()
        .await
        .expect("Failed to build test DB");

    let schedule = ScheduleService::new(test_db.pool.clone());

    let classes = schedule
        .classes_with_schedule()
        .await
        .expect("Failed to list classes");

    assert_eq!(classes.len(), 2);
    assert_eq!(classes[0].name, "1A");
    assert_eq!(classes[0].entry_count, 0);
    assert_eq!(classes[1].name, "1B");
    assert_eq!(classes[1].entry_count, 2);
}

#[tokio::test]
async fn test_subjects_for_class_groups_distinct_teachers() {
    let test_db = TestDbBuilder::new()
        .teacher("tess@school.test", "Tess", "Talbot")
        .teacher("ugo@school.test", "Ugo", "Usher")
        .class("1A", None, &[])
        .subject(
            "Mathematics",
            &[("1A", "tess@school.test"), ("1A", "ugo@school.test")],
        )
        .subject("Biology", &[("1A", "tess@school.test")])
        .build()
        .await
        .expect("Failed to build test DB");

    let schedule = ScheduleService::new(test_db.pool.clone());

    let subjects = schedule
        .subjects_for_class(test_db.class_id("1A").unwrap())
        .await
        .expect("Failed to group subjects");

    assert_eq!(subjects.len(), 2);
    assert_eq!(subjects[0].subject_name, "Biology");
    assert_eq!(subjects[0].teachers.len(), 1);
    assert_eq!(subjects[1].subject_name, "Mathematics");
    assert_eq!(subjects[1].teachers.len(), 2);
}
