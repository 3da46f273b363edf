use rocket::tokio;

use crate::error::AppError;
use crate::models::SubjectAssignment;
use crate::paging::PagedRequest;
use crate::services::SubjectService;
use crate::services::subjects::SubjectUpdate;
use crate::test::utils::test_db::TestDbBuilder;

#[tokio::test]
async fn test_add_subject_with_assignments() {
    let test_db = TestDbBuilder::new()
        .teacher("t1@school.test", "Tess", "Talbot")
        .class("1A", None, &[])
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    let subject_id = subjects
        .add_subject_with_assignments(
            "Mathematics",
            &[SubjectAssignment {
                class_id: test_db.class_id("1A").unwrap(),
                teacher_id: test_db.teacher_id("t1@school.test").unwrap(),
            }],
        )
        .await
        .expect("Failed to create subject");

    let detail = subjects.get_subject_by_id(subject_id).await.unwrap();

    assert_eq!(detail.name, "Mathematics");
    assert_eq!(detail.assignments.len(), 1);
    assert_eq!(
        detail.assignments[0].class_id,
        test_db.class_id("1A").unwrap()
    );
}

#[tokio::test]
async fn test_update_subject_replaces_assignments_wholesale() {
    let test_db = TestDbBuilder::new()
        .teacher("t1@school.test", "Tess", "Talbot")
        .teacher("t2@school.test", "Ugo", "Usher")
        .class("1A", None, &[])
        .class("1B", None, &[])
        .subject("Mathematics", &[("1A", "t1@school.test")])
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());
    let subject_id = test_db.subject_id("Mathematics").unwrap();

    let before = test_db.assignment_row_ids("Mathematics").await.unwrap();
    assert_eq!(before.len(), 1);

    // The new set is a superset of the old one; the old rows must still be
    // deleted and re-inserted, not kept in place.
    subjects
        .update_subject_with_assignments(&SubjectUpdate {
            id: subject_id,
            name: "Mathematics".to_string(),
            assignments: vec![
                SubjectAssignment {
                    class_id: test_db.class_id("1A").unwrap(),
                    teacher_id: test_db.teacher_id("t1@school.test").unwrap(),
                },
                SubjectAssignment {
                    class_id: test_db.class_id("1B").unwrap(),
                    teacher_id: test_db.teacher_id("t2@school.test").unwrap(),
                },
            ],
        })
        .await
        .expect("Failed to update subject");

    let after = test_db.assignment_row_ids("Mathematics").await.unwrap();

    assert_eq!(after.len(), 2);
    for old_id in &before {
        assert!(
            !after.contains(old_id),
            "assignment row {} survived the wholesale replace",
            old_id
        );
    }
}

#[tokio::test]
async fn test_update_missing_subject_fails() {
    let test_db = TestDbBuilder::new()
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    let result = subjects
        .update_subject_with_assignments(&SubjectUpdate {
            id: 42,
            name: "Mathematics".to_string(),
            assignments: vec![],
        })
        .await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_delete_subject_removes_assignments() {
    let test_db = TestDbBuilder::new()
        .teacher("t1@school.test", "Tess", "Talbot")
        .class("1A", None, &[])
        .subject("Mathematics", &[("1A", "t1@school.test")])
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    subjects
        .delete_subject(test_db.subject_id("Mathematics").unwrap())
        .await
        .expect("Failed to delete subject");

    let assignment_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM class_subjects")
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(assignment_count, 0);

    let subject_count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM subjects")
        .fetch_one(&test_db.pool)
        .await
        .unwrap();
    assert_eq!(subject_count, 0);
}

#[tokio::test]
async fn test_delete_missing_subject_fails() {
    let test_db = TestDbBuilder::new()
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    let result = subjects.delete_subject(42).await;

    assert!(matches!(result, Err(AppError::NotFound(_))));
}

#[tokio::test]
async fn test_subjects_paged_labels_and_sorting() {
    let test_db = TestDbBuilder::new()
        .teacher("t1@school.test", "Tess", "Talbot")
        .class("1A", None, &[])
        .subject("Mathematics", &[("1A", "t1@school.test")])
        .subject("Biology", &[])
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    let request = PagedRequest {
        page_number: 1,
        page_size: 10,
        sort_column: Some("name".to_string()),
        sort_direction: Some("desc".to_string()),
        ..Default::default()
    };

    let page = subjects.subjects_paged(&request).await.expect("paged query");

    assert_eq!(page.total_records, 2);
    assert_eq!(page.data[0].name, "Mathematics");
    assert_eq!(page.data[1].name, "Biology");

    assert_eq!(page.data[0].assignments, vec!["1A (Tess Talbot)".to_string()]);
    assert!(page.data[1].assignments.is_empty());
}

#[tokio::test]
async fn test_subjects_paged_rejects_unknown_sort_column() {
    let test_db = TestDbBuilder::new()
        .build()
        .await
        .expect("Failed to build test DB");

    let subjects = SubjectService::new(test_db.pool.clone());

    let request = PagedRequest {
        page_number: 1,
        page_size: 10,
        sort_column: Some("teacherName".to_string()),
        ..Default::default()
    };

    let result = subjects.subjects_paged(&request).await;

    assert!(matches!(result, Err(AppError::InvalidArgument(_))));
}
