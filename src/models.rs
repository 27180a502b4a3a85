//! Request payloads. Fields are optional so that missing values can be
//! reported by name; ids and flags accept both JSON numbers and the numeric
//! strings that form encoders and query strings produce.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Deserializer};

use crate::dates;

#[derive(Deserialize)]
#[serde(untagged)]
enum Lenient {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

/// Deserialize an optional id from a number or a numeric string. Empty
/// strings and `0` read as absent.
pub fn lenient_id<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    let value = Option::<Lenient>::deserialize(d)?;
    let id = match value {
        None => None,
        Some(Lenient::Int(v)) => Some(v),
        Some(Lenient::Float(v)) => Some(v as i64),
        Some(Lenient::Text(s)) if s.trim().is_empty() => None,
        Some(Lenient::Text(s)) => Some(s.trim().parse().map_err(serde::de::Error::custom)?),
        Some(Lenient::Bool(_)) => {
            return Err(serde::de::Error::custom("expected a number or numeric string"))
        }
    };
    Ok(id.filter(|v| *v != 0))
}

/// Like [`lenient_id`] but keeps `0`, for role numbers.
pub fn lenient_int<'de, D: Deserializer<'de>>(d: D) -> Result<Option<i64>, D::Error> {
    match Option::<Lenient>::deserialize(d)? {
        None => Ok(None),
        Some(Lenient::Int(v)) => Ok(Some(v)),
        Some(Lenient::Float(v)) => Ok(Some(v as i64)),
        Some(Lenient::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Lenient::Text(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
        Some(Lenient::Bool(_)) => Err(serde::de::Error::custom("expected an integer")),
    }
}

/// Booleans arrive as `true`, `1` or `"1"`.
pub fn lenient_bool<'de, D: Deserializer<'de>>(d: D) -> Result<Option<bool>, D::Error> {
    match Option::<Lenient>::deserialize(d)? {
        None => Ok(None),
        Some(Lenient::Bool(b)) => Ok(Some(b)),
        Some(Lenient::Int(v)) => Ok(Some(v != 0)),
        Some(Lenient::Float(v)) => Ok(Some(v != 0.0)),
        Some(Lenient::Text(s)) => match s.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" => Ok(Some(true)),
            "0" | "false" | "no" | "" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!("invalid flag '{other}'"))),
        },
    }
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateUserBody {
    pub email: Option<String>,
    #[serde(alias = "passwordHash")]
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub class_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub status: Option<i64>,
    pub avatar: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub email: Option<String>,
    #[serde(alias = "passwordHash")]
    pub password: Option<String>,
    pub user_name: Option<String>,
    pub class_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub status: Option<i64>,
    pub avatar: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSelfBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct IdBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub class_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_int")]
    pub status: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct BulkUploadBody {
    pub class_code: Option<String>,
    pub default_password: Option<String>,
    pub csv_content: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct LoginBody {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub current_password: Option<String>,
    pub new_password: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct EmailBody {
    pub email: Option<String>,
}

// ---------------------------------------------------------------------------
// Courses, units, questions
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CourseBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub course_name: Option<String>,
    pub course_code: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UnitBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default, alias = "courseid", deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    pub unit_name: Option<String>,
    pub unit_code: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct QuestionBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default, rename = "courseid", alias = "courseId", deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    #[serde(default, rename = "unitid", alias = "unitId", deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    #[serde(rename = "QuestionRef")]
    pub question_ref: Option<String>,
    #[serde(rename = "Question")]
    pub question: Option<String>,
    #[serde(default, rename = "uploadPermitted", deserialize_with = "lenient_bool")]
    pub upload_permitted: Option<bool>,
}

#[derive(Deserialize, Default)]
pub struct QuestionQuery {
    #[serde(default, rename = "unitId", alias = "unitid", deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    #[serde(default, rename = "courseId", alias = "courseid", deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivityBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub assessor_id: Option<i64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub date_set: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub date_submitted: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub date_marked: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub date_resubmitted: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "dates::deserialize_opt")]
    pub date_complete: Option<NaiveDateTime>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateActivityBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub assessor_id: Option<i64>,
    pub assessor_comment: Option<String>,
    #[serde(default, deserialize_with = "dates::deserialize_patch")]
    pub date_set: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "dates::deserialize_patch")]
    pub date_submitted: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "dates::deserialize_patch")]
    pub date_marked: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "dates::deserialize_patch")]
    pub date_resubmitted: Option<Option<NaiveDateTime>>,
    #[serde(default, deserialize_with = "dates::deserialize_patch")]
    pub date_complete: Option<Option<NaiveDateTime>>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivityQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AssignUnitBody {
    pub class_code: Option<String>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub course_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub unit_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub assessor_id: Option<i64>,
}

// ---------------------------------------------------------------------------
// Answers and attachments
// ---------------------------------------------------------------------------

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SaveAnswersBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub activity_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    /// Question id → answer document.
    pub answers: Option<BTreeMap<String, serde_json::Value>>,
    /// Question id → reference URLs.
    #[serde(default)]
    pub references: BTreeMap<String, Vec<String>>,
    pub status: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct Mark {
    pub outcome: Option<String>,
    pub comment: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct MarkAnswersBody {
    #[serde(default, deserialize_with = "lenient_id")]
    pub activity_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    pub marks: Option<BTreeMap<String, Mark>>,
    pub final_status: Option<String>,
    pub assessor_comment: Option<String>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerSheetQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub activity_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFileQuery {
    #[serde(default, deserialize_with = "lenient_id")]
    pub activity_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub student_id: Option<i64>,
    #[serde(default, deserialize_with = "lenient_id")]
    pub question_id: Option<i64>,
    pub file_id: Option<String>,
}

/// Parse the string keys of an answers/marks map into question ids.
pub fn question_id(key: &str) -> Option<i64> {
    key.trim().parse().ok().filter(|id| *id > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_accept_numbers_and_numeric_strings() {
        let body: AssignUnitBody = serde_json::from_str(
            r#"{"classCode":"10A","courseId":"3","unitId":7,"assessorId":""}"#,
        )
        .unwrap();
        assert_eq!(body.course_id, Some(3));
        assert_eq!(body.unit_id, Some(7));
        assert_eq!(body.assessor_id, None);
    }

    #[test]
    fn role_zero_is_kept() {
        let q: UserQuery = serde_json::from_str(r#"{"status":"0"}"#).unwrap();
        assert_eq!(q.status, Some(0));
    }

    #[test]
    fn question_fields_use_legacy_names() {
        let body: QuestionBody = serde_json::from_str(
            r#"{"courseid":1,"unitid":"2","Question":"What is a firewall?","uploadPermitted":"1"}"#,
        )
        .unwrap();
        assert_eq!(body.course_id, Some(1));
        assert_eq!(body.unit_id, Some(2));
        assert_eq!(body.question.as_deref(), Some("What is a firewall?"));
        assert_eq!(body.upload_permitted, Some(true));
    }

    #[test]
    fn unknown_flag_is_an_error() {
        let result = serde_json::from_str::<QuestionBody>(r#"{"uploadPermitted":"sometimes"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn question_keys_must_be_positive_ids() {
        assert_eq!(question_id("12"), Some(12));
        assert_eq!(question_id("0"), None);
        assert_eq!(question_id("q1"), None);
    }
}
