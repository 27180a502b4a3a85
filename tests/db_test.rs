mod common;

use common::{add_catalogue, add_user, create_test_db};
use coursework::db::{
    ActivityFilter, ActivityUpdate, AnswerDraft, AnswerKey, Assignment, Db, FileUpload,
    MarkRequest, NewUser, QuestionMark, Role, RosterEntry, SaveRequest, SelfUpdate, Transition,
    UserFilter, UserUpdate, Write,
};
use coursework::workflow::{Outcome, SaveKind, Status};
use serde_json::json;

async fn assign(db: &Db, class_code: &str, course_id: i64, unit_id: i64, assessor_id: i64) -> (usize, usize) {
    let report = db
        .assign_unit_to_class(&Assignment {
            class_code: class_code.to_string(),
            course_id,
            unit_id,
            assessor_id,
        })
        .await
        .unwrap();
    (report.inserted, report.skipped)
}

async fn activity_for(db: &Db, student_id: i64) -> i64 {
    let activities = db
        .list_activities(&ActivityFilter {
            student_id: Some(student_id),
            ..Default::default()
        })
        .await
        .unwrap();
    activities[0].id
}

fn save(activity_id: i64, student_id: i64, kind: SaveKind, answers: &[(i64, &str)]) -> SaveRequest {
    SaveRequest {
        activity_id,
        student_id,
        kind,
        answers: answers
            .iter()
            .map(|(question_id, text)| AnswerDraft {
                question_id: *question_id,
                answer: json!({ "type": "doc", "text": text }),
                references: None,
            })
            .collect(),
    }
}

fn mark(activity_id: i64, student_id: i64, final_status: Status, marks: &[(i64, Outcome)]) -> MarkRequest {
    MarkRequest {
        activity_id,
        student_id,
        final_status,
        marks: marks
            .iter()
            .map(|(question_id, outcome)| QuestionMark {
                question_id: *question_id,
                outcome: *outcome,
                comment: "Checked".to_string(),
            })
            .collect(),
        assessor_comment: None,
    }
}

fn applied<T: std::fmt::Debug>(transition: Transition<T>) -> T {
    match transition {
        Transition::Applied(value) => value,
        other => panic!("expected the write to apply, got {other:?}"),
    }
}

#[tokio::test]
async fn duplicate_email_is_reported_not_raised() {
    let (db, _dir) = create_test_db().await;
    add_user(&db, "ada@school.test", Some("10A"), Role::Student).await;

    let again = db
        .create_user(&NewUser {
            email: "ADA@school.test".to_string(),
            password: "password123".to_string(),
            user_name: "Ada again".to_string(),
            class_code: None,
            role: Role::Student,
            avatar: None,
        })
        .await
        .unwrap();
    assert_eq!(again, None);
}

#[tokio::test]
async fn users_filter_by_class_and_role() {
    let (db, _dir) = create_test_db().await;
    add_user(&db, "zoe@school.test", Some("10A"), Role::Student).await;
    add_user(&db, "amy@school.test", Some("10A"), Role::Student).await;
    add_user(&db, "bob@school.test", Some("11B"), Role::Student).await;
    add_user(&db, "mr.t@school.test", Some("10A"), Role::Teacher).await;

    let class = db
        .list_users(&UserFilter {
            class_code: Some("10A".to_string()),
            role: Some(0),
            ..Default::default()
        })
        .await
        .unwrap();
    let names: Vec<_> = class.iter().map(|u| u.user_name.as_str()).collect();
    assert_eq!(names, ["amy", "zoe"]);

    assert_eq!(db.class_codes().await.unwrap(), ["10A", "11B"]);
    assert_eq!(
        db.teacher_emails_for_class("10A").await.unwrap(),
        ["mr.t@school.test"]
    );
}

#[tokio::test]
async fn admin_password_reset_forces_a_change_on_next_login() {
    let (db, _dir) = create_test_db().await;
    let id = add_user(&db, "ada@school.test", None, Role::Student).await;

    let written = db
        .update_user(&UserUpdate {
            id,
            email: "ada@school.test".to_string(),
            user_name: "Ada".to_string(),
            password: Some("temporary1".to_string()),
            class_code: Some("10A".to_string()),
            role: Role::Student,
            avatar: None,
        })
        .await
        .unwrap();
    assert_eq!(written, Write::Done);
    assert!(db.find_user(id).await.unwrap().unwrap().change_login);

    let written = db
        .update_self(&SelfUpdate {
            id,
            password: Some("my-own-secret".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(written, Write::Done);

    let user = db.find_user(id).await.unwrap().unwrap();
    assert!(!user.change_login);
    assert_eq!(user.class_code.as_deref(), Some("10A"));
    let hash = db.password_hash(id).await.unwrap().unwrap();
    assert!(coursework::db::verify_password("my-own-secret", &hash));
}

#[tokio::test]
async fn updating_to_a_taken_email_is_a_duplicate() {
    let (db, _dir) = create_test_db().await;
    add_user(&db, "ada@school.test", None, Role::Student).await;
    let bob = add_user(&db, "bob@school.test", None, Role::Student).await;

    let written = db
        .update_self(&SelfUpdate {
            id: bob,
            email: Some("ada@school.test".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(written, Write::Duplicate);

    let missing = db
        .update_self(&SelfUpdate {
            id: 9999,
            avatar: Some("cat.png".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(missing, Write::NotFound);
}

#[tokio::test]
async fn roster_import_skips_existing_emails() {
    let (db, _dir) = create_test_db().await;
    add_user(&db, "taken@school.test", Some("10A"), Role::Student).await;

    let entries = [
        RosterEntry {
            line: 2,
            email: "new@school.test".to_string(),
            user_name: "New".to_string(),
            class_code: "10A".to_string(),
        },
        RosterEntry {
            line: 3,
            email: "taken@school.test".to_string(),
            user_name: "Taken".to_string(),
            class_code: "10A".to_string(),
        },
    ];
    let report = db.import_students(&entries, "welcome-2024").await.unwrap();

    assert_eq!(report.inserted, 1);
    assert_eq!(report.skipped, 1);
    assert_eq!(report.errors, ["Line 3: taken@school.test already exists"]);

    let imported = db.find_user_by_email("new@school.test").await.unwrap().unwrap();
    assert_eq!(imported.status, Role::Student);
    assert!(imported.change_login);
}

#[tokio::test]
async fn assigning_a_unit_twice_skips_students_already_working_on_it() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let teacher = add_user(&db, "teacher@school.test", Some("10A"), Role::Teacher).await;
    for name in ["a", "b", "c"] {
        add_user(&db, &format!("{name}@school.test"), Some("10A"), Role::Student).await;
    }

    let first = assign(&db, "10A", catalogue.course_id, catalogue.unit_id, teacher).await;
    assert_eq!(first, (3, 0));

    let second = assign(&db, "10A", catalogue.course_id, catalogue.unit_id, teacher).await;
    assert_eq!(second, (0, 3));

    let activities = db.list_activities(&ActivityFilter::default()).await.unwrap();
    assert_eq!(activities.len(), 3);
    assert!(activities
        .iter()
        .all(|a| a.status == Status::InProgress && a.date_set.is_some()));

    let empty = assign(&db, "99Z", catalogue.course_id, catalogue.unit_id, teacher).await;
    assert_eq!(empty, (0, 0));
}

#[tokio::test]
async fn draft_saves_are_idempotent() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;
    let [q1, q2] = catalogue.questions;

    for _ in 0..2 {
        let report = applied(
            db.save_answers(&save(activity, student, SaveKind::Draft, &[(q1, "first"), (q2, "second")]))
                .await
                .unwrap(),
        );
        assert_eq!(report.saved, 2);
        assert_eq!(report.activity_status, Status::InProgress);
    }

    let rows = db.answers_for(activity, student).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].answer.0["text"], "first");
    assert!(rows.iter().all(|r| r.status == Status::InProgress));
}

#[tokio::test]
async fn references_survive_a_save_that_omits_them() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;
    let q1 = catalogue.questions[0];

    let mut first = save(activity, student, SaveKind::Draft, &[(q1, "draft")]);
    first.answers[0].references = Some(vec!["https://owasp.org".to_string()]);
    applied(db.save_answers(&first).await.unwrap());
    applied(
        db.save_answers(&save(activity, student, SaveKind::Draft, &[(q1, "edited")]))
            .await
            .unwrap(),
    );

    let rows = db.answers_for(activity, student).await.unwrap();
    assert_eq!(rows[0].reference_urls.0, ["https://owasp.org"]);
    assert_eq!(rows[0].answer.0["text"], "edited");
}

#[tokio::test]
async fn full_marking_cycle() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;
    let [q1, q2] = catalogue.questions;

    let submitted = applied(
        db.save_answers(&save(activity, student, SaveKind::Submit, &[(q1, "answer")]))
            .await
            .unwrap(),
    );
    assert_eq!(submitted.activity_status, Status::Submitted);
    assert_eq!(submitted.answer_status, Status::Submitted);

    let marked = applied(
        db.mark_answers(&mark(
            activity,
            student,
            Status::Redoing,
            &[(q1, Outcome::NotAchieved), (q2, Outcome::Achieved)],
        ))
        .await
        .unwrap(),
    );
    assert_eq!(marked.updated, 1);
    assert_eq!(marked.missing_questions, [q2]);

    // A draft while redoing keeps the activity in REDOING.
    let draft = applied(
        db.save_answers(&save(activity, student, SaveKind::Draft, &[(q1, "better")]))
            .await
            .unwrap(),
    );
    assert_eq!(draft.activity_status, Status::Redoing);

    let resubmitted = applied(
        db.save_answers(&save(activity, student, SaveKind::Submit, &[(q1, "best")]))
            .await
            .unwrap(),
    );
    assert_eq!(resubmitted.activity_status, Status::Resubmitted);

    applied(
        db.mark_answers(&mark(activity, student, Status::Passed, &[(q1, Outcome::Achieved)]))
            .await
            .unwrap(),
    );

    let done = db.find_activity(activity, student).await.unwrap().unwrap();
    assert_eq!(done.status, Status::Passed);
    assert!(done.date_submitted.is_some());
    assert!(done.date_resubmitted.is_some());
    assert!(done.date_marked.is_some());
    assert!(done.date_complete.is_some());

    let rows = db.answers_for(activity, student).await.unwrap();
    assert_eq!(rows[0].outcome.as_deref(), Some("ACHIEVED"));
    assert_eq!(rows[0].status, Status::Passed);

    let refused = db
        .save_answers(&save(activity, student, SaveKind::Draft, &[(q1, "late edit")]))
        .await
        .unwrap();
    assert!(matches!(
        refused,
        Transition::Refused {
            from: Status::Passed,
            to: Status::InProgress
        }
    ));
}

#[tokio::test]
async fn marking_work_that_was_never_submitted_is_refused() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;

    let result = db
        .mark_answers(&mark(activity, student, Status::Passed, &[]))
        .await
        .unwrap();
    assert!(matches!(result, Transition::Refused { .. }));

    let unchanged = db.find_activity(activity, student).await.unwrap().unwrap();
    assert_eq!(unchanged.status, Status::InProgress);
    assert!(unchanged.date_marked.is_none());

    let other_student = db
        .mark_answers(&mark(activity, student + 100, Status::Passed, &[]))
        .await
        .unwrap();
    assert!(matches!(other_student, Transition::NotFound));
}

#[tokio::test]
async fn activity_updates_follow_the_workflow() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;

    let skip_ahead = db
        .update_activity(&ActivityUpdate {
            id: activity,
            status: Some(Status::Passed),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(matches!(skip_ahead, Transition::Refused { .. }));

    let comment_only = db
        .update_activity(&ActivityUpdate {
            id: activity,
            assessor_comment: Some("Keep going".to_string()),
            date_set: Some(None),
            ..Default::default()
        })
        .await
        .unwrap();
    applied(comment_only);

    let current = db.find_activity(activity, student).await.unwrap().unwrap();
    assert_eq!(current.status, Status::InProgress);
    assert_eq!(current.assessor_comment.as_deref(), Some("Keep going"));
    assert!(current.date_set.is_none());

    applied(
        db.update_activity(&ActivityUpdate {
            id: activity,
            status: Some(Status::Discontinued),
            ..Default::default()
        })
        .await
        .unwrap(),
    );

    let missing = db
        .update_activity(&ActivityUpdate {
            id: 9999,
            status: Some(Status::InProgress),
            ..Default::default()
        })
        .await
        .unwrap();
    assert!(matches!(missing, Transition::NotFound));
}

fn upload_entry(id: &str) -> FileUpload {
    FileUpload {
        id: id.to_string(),
        original_name: "essay.pdf".to_string(),
        mime_type: "application/pdf".to_string(),
        size: 8,
        uploaded_at: "2024-09-02T08:30:00+00:00".to_string(),
        path: format!("1/{id}"),
    }
}

#[tokio::test]
async fn a_failed_file_move_records_nothing() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let key = AnswerKey {
        activity_id: activity_for(&db, student).await,
        student_id: student,
        question_id: catalogue.questions[1],
    };

    let failed = db
        .attach_file(key, &upload_entry("a.pdf"), || async {
            Err(color_eyre::eyre::eyre!("disk full"))
        })
        .await;
    assert!(failed.is_err());
    assert_eq!(db.attachments(key).await.unwrap(), None);

    db.attach_file(key, &upload_entry("a.pdf"), || async { Ok(()) })
        .await
        .unwrap();
    let files = db
        .attach_file(key, &upload_entry("b.pdf"), || async { Ok(()) })
        .await
        .unwrap();
    assert_eq!(files.len(), 2);

    let (removed, remaining) = db.detach_file(key, "a.pdf").await.unwrap().unwrap();
    assert_eq!(removed.id, "a.pdf");
    assert_eq!(remaining, [upload_entry("b.pdf")]);
    assert!(db.detach_file(key, "a.pdf").await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_an_activity_returns_its_attachments() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;
    let student = add_user(&db, "a@school.test", Some("10A"), Role::Student).await;
    assign(&db, "10A", catalogue.course_id, catalogue.unit_id, student).await;
    let activity = activity_for(&db, student).await;
    let key = AnswerKey {
        activity_id: activity,
        student_id: student,
        question_id: catalogue.questions[1],
    };
    db.attach_file(key, &upload_entry("a.pdf"), || async { Ok(()) })
        .await
        .unwrap();

    let files = db.delete_activity(activity).await.unwrap().unwrap();
    assert_eq!(files, [upload_entry("a.pdf")]);
    assert!(db.answers_for(activity, student).await.unwrap().is_empty());
    assert!(db.delete_activity(activity).await.unwrap().is_none());
}

#[tokio::test]
async fn deleting_a_course_removes_its_units() {
    let (db, _dir) = create_test_db().await;
    let catalogue = add_catalogue(&db).await;

    assert!(db.delete_course(catalogue.course_id).await.unwrap());
    assert!(db.list_units(None, Some(catalogue.course_id)).await.unwrap().is_empty());
    assert!(db.find_question(catalogue.questions[0]).await.unwrap().is_none());
    assert!(!db.delete_course(catalogue.course_id).await.unwrap());
}

#[tokio::test]
async fn schema_migration_is_recorded() {
    let (db, _dir) = create_test_db().await;
    assert!(db.migration_applied("V1").await.unwrap());
    assert!(!db.migration_applied("V99").await.unwrap());
}
