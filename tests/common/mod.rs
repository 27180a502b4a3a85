#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use coursework::{
    config::Config,
    db::{Db, NewUser, QuestionInput, Role},
    router, AppState,
};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

pub const API_BASE: &str = "http://localhost:8080";

/// A fresh database in its own temporary directory. The directory doubles as
/// the attachment root and must outlive the test.
pub async fn create_test_db() -> (Db, TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let url = format!("sqlite://{}", dir.path().join("coursework.db").display());
    let db = Db::new(&url).await.expect("failed to create test database");
    (db, dir)
}

pub fn test_config(dir: &TempDir) -> Config {
    let raw = serde_json::json!({
        "databaseUrl": "sqlite::memory:",
        "api": format!("{API_BASE}/"),
        "fileStoragePath": dir.path().join("uploads"),
    });
    Config::from_json(&raw.to_string()).expect("test config should parse")
}

pub struct TestApp {
    pub router: Router,
    pub db: Db,
    pub dir: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let (db, dir) = create_test_db().await;
        let router = router(AppState::new(db.clone(), test_config(&dir)));
        Self { router, db, dir }
    }

    pub fn uploads(&self) -> std::path::PathBuf {
        self.dir.path().join("uploads")
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router should respond");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("body should be readable")
            .to_bytes()
            .to_vec();
        (status, headers, body)
    }

    pub async fn json(&self, method: Method, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build should succeed");
        let (status, _, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes).expect("response should be JSON");
        (status, value)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.json(Method::POST, uri, body).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request build should succeed");
        let (status, _, bytes) = self.send(request).await;
        let value = serde_json::from_slice(&bytes).expect("response should be JSON");
        (status, value)
    }
}

pub async fn add_user(db: &Db, email: &str, class_code: Option<&str>, role: Role) -> i64 {
    db.create_user(&NewUser {
        email: email.to_string(),
        password: "password123".to_string(),
        user_name: email.split('@').next().unwrap_or(email).to_string(),
        class_code: class_code.map(str::to_string),
        role,
        avatar: None,
    })
    .await
    .expect("create user")
    .expect("email should be free")
}

/// Course `Cyber`, unit `Intro` and two questions; the second allows uploads.
pub struct Catalogue {
    pub course_id: i64,
    pub unit_id: i64,
    pub questions: [i64; 2],
}

pub async fn add_catalogue(db: &Db) -> Catalogue {
    let course_id = db.create_course("Cyber", Some("CS1")).await.expect("create course");
    let unit_id = db
        .create_unit(course_id, "Intro", Some("U1"))
        .await
        .expect("create unit");

    let mut questions = [0; 2];
    for (i, upload_permitted) in [false, true].into_iter().enumerate() {
        questions[i] = db
            .create_question(&QuestionInput {
                course_id,
                unit_id,
                question_ref: Some(format!("1.{}", i + 1)),
                question: format!("Question {}", i + 1),
                upload_permitted,
            })
            .await
            .expect("create question");
    }

    Catalogue {
        course_id,
        unit_id,
        questions,
    }
}

/// A multipart body with the three id fields and one file part.
pub fn upload_request(
    activity_id: i64,
    student_id: i64,
    question_id: i64,
    file_name: &str,
    content: &[u8],
) -> Request<Body> {
    const BOUNDARY: &str = "coursework-test-boundary";
    let mut body = Vec::new();
    for (name, value) in [
        ("activityId", activity_id),
        ("studentId", student_id),
        ("questionId", question_id),
    ] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method(Method::POST)
        .uri("/upload-answer-file")
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .expect("request build should succeed")
}

/// Regular files under `root`, staging area included.
pub fn stored_files(root: &std::path::Path) -> usize {
    fn walk(dir: &std::path::Path, count: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, count);
            } else {
                *count += 1;
            }
        }
    }
    let mut count = 0;
    walk(root, &mut count);
    count
}
