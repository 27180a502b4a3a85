use std::collections::BTreeMap;

use axum::{extract::State, response::Response, routing::get, routing::post, Router};
use serde::Serialize;

use super::{refused, Endpoints};
use crate::{
    db::models::{
        AnswerDraft, FileUpload, MarkRequest, QuestionMark, SaveRequest, Transition,
    },
    envelope,
    extractors::Payload,
    models::{question_id, AnswerSheetQuery, MarkAnswersBody, SaveAnswersBody},
    names,
    rejections::{AppError, Required, ResultExt},
    workflow::{parse_final_status, Outcome, SaveKind, Status},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::SAVE_ANSWERS, post(save_answers))
        .endpoint(names::MARK_ANSWERS, post(mark_answers))
        .endpoint(names::GET_ANSWERS, get(get_answers).post(get_answers))
}

fn parse_question_id(key: &str) -> Result<i64, AppError> {
    question_id(key).ok_or_else(|| AppError::Invalid(format!("Invalid question id '{key}'")))
}

/// An attachment entry with its download link.
#[derive(Serialize)]
pub(crate) struct AttachmentView {
    #[serde(flatten)]
    pub file: FileUpload,
    pub url: String,
}

pub(crate) fn attachment_views(
    state: &AppState,
    activity_id: i64,
    student_id: i64,
    question_id: i64,
    files: Vec<FileUpload>,
) -> Vec<AttachmentView> {
    files
        .into_iter()
        .map(|file| AttachmentView {
            url: names::download_url(
                state.config.api_base(),
                activity_id,
                student_id,
                question_id,
                &file.id,
            ),
            file,
        })
        .collect()
}

#[derive(Serialize)]
struct Saved {
    message: &'static str,
    status: Status,
    saved: usize,
}

async fn save_answers(
    State(state): State<AppState>,
    Payload(body): Payload<SaveAnswersBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let activity_id = required.id("activityId", body.activity_id);
    let student_id = required.id("studentId", body.student_id);
    let answers = required.value("answers", body.answers.filter(|a| !a.is_empty()));
    required.check()?;

    let requested = body
        .status
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("DRAFT");
    let kind = SaveKind::parse(requested)
        .ok_or_else(|| AppError::Invalid(format!("Invalid status '{requested}'")))?;

    let mut references = body.references;
    let answers = answers
        .into_iter()
        .map(|(key, answer)| {
            Ok(AnswerDraft {
                question_id: parse_question_id(&key)?,
                references: references.remove(&key),
                answer,
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let request = SaveRequest {
        activity_id,
        student_id,
        kind,
        answers,
    };

    let report = match state
        .db
        .save_answers(&request)
        .await
        .reject("could not save answers")?
    {
        Transition::Applied(report) => report,
        Transition::NotFound => return Err(AppError::NotFound("Activity not found")),
        Transition::Refused { from, to } => return Err(refused(from, to)),
    };

    if kind == SaveKind::Submit {
        state
            .notifier
            .answers_submitted(student_id, activity_id, report.activity_status.as_str())
            .await;
    }

    Ok(envelope::ok(Saved {
        message: "Answers saved",
        status: report.activity_status,
        saved: report.saved,
    }))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Marked {
    message: &'static str,
    updated: usize,
    final_status: Status,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    missing_questions: Vec<i64>,
}

async fn mark_answers(
    State(state): State<AppState>,
    Payload(body): Payload<MarkAnswersBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let activity_id = required.id("activityId", body.activity_id);
    let student_id = required.id("studentId", body.student_id);
    let marks = required.value("marks", body.marks);
    required.check()?;

    let final_status = body
        .final_status
        .as_deref()
        .map(str::trim)
        .and_then(parse_final_status)
        .ok_or(AppError::Input("Invalid finalStatus. Use PASSED or REDOING"))?;

    let marks = marks
        .into_iter()
        .map(|(key, mark)| {
            Ok(QuestionMark {
                question_id: parse_question_id(&key)?,
                outcome: Outcome::from_mark(mark.outcome.as_deref()),
                comment: mark
                    .comment
                    .unwrap_or_default()
                    .trim()
                    .chars()
                    .take(names::MARK_COMMENT_MAX_CHARS)
                    .collect(),
            })
        })
        .collect::<Result<Vec<_>, AppError>>()?;

    let request = MarkRequest {
        activity_id,
        student_id,
        final_status,
        marks,
        assessor_comment: body
            .assessor_comment
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty()),
    };

    match state
        .db
        .mark_answers(&request)
        .await
        .reject("could not save marking")?
    {
        Transition::Applied(report) => Ok(envelope::ok(Marked {
            message: "Marking saved",
            updated: report.updated,
            final_status,
            missing_questions: report.missing_questions,
        })),
        Transition::NotFound => Err(AppError::NotFound("Activity not found")),
        Transition::Refused { from, to } => Err(refused(from, to)),
    }
}

#[derive(Serialize, Default)]
#[serde(rename_all = "camelCase")]
struct AnswerSheet {
    answers: BTreeMap<i64, serde_json::Value>,
    references: BTreeMap<i64, Vec<String>>,
    status: BTreeMap<i64, Status>,
    outcomes: BTreeMap<i64, Outcome>,
    comments: BTreeMap<i64, String>,
    file_uploads: BTreeMap<i64, Vec<AttachmentView>>,
    assessor_comment: Option<String>,
}

#[derive(Serialize)]
struct SheetData {
    data: AnswerSheet,
}

async fn get_answers(
    State(state): State<AppState>,
    Payload(query): Payload<AnswerSheetQuery>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let activity_id = required.id("activityId", query.activity_id);
    let student_id = required.id("studentId", query.student_id);
    required.check()?;

    let activity = state
        .db
        .find_activity(activity_id, student_id)
        .await
        .reject("could not load answers")?
        .ok_or(AppError::NotFound("Activity not found"))?;

    let rows = state
        .db
        .answers_for(activity_id, student_id)
        .await
        .reject("could not load answers")?;

    let mut sheet = AnswerSheet {
        assessor_comment: activity.assessor_comment,
        ..Default::default()
    };
    for row in rows {
        let qid = row.question_id;
        sheet.answers.insert(qid, row.answer.0);
        sheet.references.insert(qid, row.reference_urls.0);
        sheet.status.insert(qid, row.status);
        sheet
            .outcomes
            .insert(qid, Outcome::from_mark(row.outcome.as_deref()));
        sheet.comments.insert(qid, row.comment.unwrap_or_default());
        sheet.file_uploads.insert(
            qid,
            attachment_views(&state, activity_id, student_id, qid, row.file_uploads.0),
        );
    }

    Ok(envelope::ok(SheetData { data: sheet }))
}
