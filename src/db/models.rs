// Database model structs

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;

use crate::dates;
use crate::workflow::{Outcome, Status, TransitionError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Role {
    Student,
    Teacher,
    Admin,
}

#[derive(Debug, thiserror::Error)]
#[error("unknown role {0}")]
pub struct UnknownRole(pub i64);

impl Role {
    pub fn code(self) -> i64 {
        match self {
            Role::Student => 0,
            Role::Teacher => 2,
            Role::Admin => 3,
        }
    }

    pub fn is_staff(self) -> bool {
        matches!(self, Role::Teacher | Role::Admin)
    }
}

impl TryFrom<i64> for Role {
    type Error = UnknownRole;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Role::Student),
            2 => Ok(Role::Teacher),
            3 => Ok(Role::Admin),
            other => Err(UnknownRole(other)),
        }
    }
}

impl From<Role> for i64 {
    fn from(role: Role) -> Self {
        role.code()
    }
}

/// A user as returned by the API. The password hash is never loaded here.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub user_name: String,
    pub class_code: Option<String>,
    #[sqlx(try_from = "i64")]
    pub status: Role,
    pub avatar: Option<String>,
    pub change_login: bool,
}

pub struct NewUser {
    pub email: String,
    pub password: String,
    pub user_name: String,
    pub class_code: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
}

pub struct UserUpdate {
    pub id: i64,
    pub email: String,
    pub user_name: String,
    /// `None` keeps the current password.
    pub password: Option<String>,
    pub class_code: Option<String>,
    pub role: Role,
    pub avatar: Option<String>,
}

#[derive(Default)]
pub struct SelfUpdate {
    pub id: i64,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

impl SelfUpdate {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.password.is_none() && self.avatar.is_none()
    }
}

#[derive(Default)]
pub struct UserFilter {
    pub id: Option<i64>,
    pub class_code: Option<String>,
    pub role: Option<i64>,
}

/// One roster line ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterEntry {
    /// 1-based line in the uploaded file, header included.
    pub line: usize,
    pub email: String,
    pub user_name: String,
    pub class_code: String,
}

#[derive(Debug, Default, Serialize)]
pub struct ImportReport {
    pub inserted: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: i64,
    pub course_name: String,
    pub course_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Unit {
    pub id: i64,
    #[serde(rename = "courseid")]
    pub course_id: i64,
    pub unit_name: String,
    pub unit_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Question {
    pub id: i64,
    #[serde(rename = "courseid")]
    pub course_id: i64,
    #[serde(rename = "unitid")]
    pub unit_id: i64,
    #[serde(rename = "QuestionRef")]
    pub question_ref: Option<String>,
    #[serde(rename = "Question")]
    pub question: String,
    #[serde(rename = "uploadPermitted")]
    pub upload_permitted: bool,
}

pub struct QuestionInput {
    pub course_id: i64,
    pub unit_id: i64,
    pub question_ref: Option<String>,
    pub question: String,
    pub upload_permitted: bool,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: i64,
    pub student_id: i64,
    pub course_id: i64,
    pub unit_id: i64,
    pub assessor_id: Option<i64>,
    #[sqlx(try_from = "String")]
    pub status: Status,
    #[serde(serialize_with = "dates::serialize_opt")]
    pub date_set: Option<NaiveDateTime>,
    #[serde(serialize_with = "dates::serialize_opt")]
    pub date_submitted: Option<NaiveDateTime>,
    #[serde(serialize_with = "dates::serialize_opt")]
    pub date_marked: Option<NaiveDateTime>,
    #[serde(serialize_with = "dates::serialize_opt")]
    pub date_resubmitted: Option<NaiveDateTime>,
    #[serde(serialize_with = "dates::serialize_opt")]
    pub date_complete: Option<NaiveDateTime>,
    pub assessor_comment: Option<String>,
}

/// An activity with the names a student's assessment list shows.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub activity: Activity,
    pub course_name: String,
    pub unit_name: String,
}

pub struct NewActivity {
    pub student_id: i64,
    pub course_id: i64,
    pub unit_id: i64,
    pub assessor_id: Option<i64>,
    pub status: Status,
    pub date_set: Option<NaiveDateTime>,
    pub date_submitted: Option<NaiveDateTime>,
    pub date_marked: Option<NaiveDateTime>,
    pub date_resubmitted: Option<NaiveDateTime>,
    pub date_complete: Option<NaiveDateTime>,
}

/// Partial update; `None` leaves a column as it is, `Some(None)` clears a date.
#[derive(Default)]
pub struct ActivityUpdate {
    pub id: i64,
    pub status: Option<Status>,
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub assessor_id: Option<i64>,
    pub assessor_comment: Option<String>,
    pub date_set: Option<Option<NaiveDateTime>>,
    pub date_submitted: Option<Option<NaiveDateTime>>,
    pub date_marked: Option<Option<NaiveDateTime>>,
    pub date_resubmitted: Option<Option<NaiveDateTime>>,
    pub date_complete: Option<Option<NaiveDateTime>>,
}

#[derive(Default)]
pub struct ActivityFilter {
    pub id: Option<i64>,
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub status: Option<Status>,
}

pub struct Assignment {
    pub class_code: String,
    pub course_id: i64,
    pub unit_id: i64,
    pub assessor_id: i64,
}

#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct AssignReport {
    pub inserted: usize,
    pub skipped: usize,
}

/// Result of an update keyed by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Write {
    Done,
    NotFound,
    Duplicate,
}

/// Rows a write points at through a foreign key. Absent ids are not checked.
#[derive(Debug, Default, Clone, Copy)]
pub struct References {
    pub student_id: Option<i64>,
    pub course_id: Option<i64>,
    pub unit_id: Option<i64>,
    pub assessor_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingReference {
    Student,
    Course,
    Unit,
    Assessor,
}

impl MissingReference {
    pub fn message(self) -> &'static str {
        match self {
            MissingReference::Student => "Student not found",
            MissingReference::Course => "Course not found",
            MissingReference::Unit => "Unit not found",
            MissingReference::Assessor => "Assessor not found",
        }
    }
}

/// Result of a write that is subject to the status workflow.
#[derive(Debug)]
pub enum Transition<T> {
    Applied(T),
    NotFound,
    Refused { from: Status, to: Status },
}

impl<T> From<TransitionError> for Transition<T> {
    fn from(refused: TransitionError) -> Self {
        Transition::Refused {
            from: refused.from,
            to: refused.to,
        }
    }
}

/// Attachment metadata kept in `answers.file_uploads`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileUpload {
    pub id: String,
    pub original_name: String,
    pub mime_type: String,
    pub size: u64,
    pub uploaded_at: String,
    pub path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerKey {
    pub activity_id: i64,
    pub student_id: i64,
    pub question_id: i64,
}

#[derive(Debug, sqlx::FromRow)]
pub struct AnswerRow {
    pub question_id: i64,
    pub answer: Json<serde_json::Value>,
    pub answer_schema: i64,
    pub reference_urls: Json<Vec<String>>,
    pub file_uploads: Json<Vec<FileUpload>>,
    #[sqlx(try_from = "String")]
    pub status: Status,
    pub outcome: Option<String>,
    pub comment: Option<String>,
    pub updated_at: NaiveDateTime,
}

pub struct AnswerDraft {
    pub question_id: i64,
    pub answer: serde_json::Value,
    /// `None` keeps the stored references.
    pub references: Option<Vec<String>>,
}

pub struct SaveRequest {
    pub activity_id: i64,
    pub student_id: i64,
    pub kind: crate::workflow::SaveKind,
    pub answers: Vec<AnswerDraft>,
}

#[derive(Debug)]
pub struct SaveReport {
    pub saved: usize,
    /// Status written to the answer rows.
    pub answer_status: Status,
    /// Activity status after the save.
    pub activity_status: Status,
}

pub struct QuestionMark {
    pub question_id: i64,
    pub outcome: Outcome,
    pub comment: String,
}

pub struct MarkRequest {
    pub activity_id: i64,
    pub student_id: i64,
    pub final_status: Status,
    pub marks: Vec<QuestionMark>,
    pub assessor_comment: Option<String>,
}

#[derive(Debug, Default)]
pub struct MarkReport {
    pub updated: usize,
    pub missing_questions: Vec<i64>,
}
