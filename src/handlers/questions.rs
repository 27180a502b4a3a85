use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};

use super::{check_references, Endpoints};
use crate::{
    db::models::{QuestionInput, References},
    envelope,
    extractors::Payload,
    models::{IdBody, QuestionBody, QuestionQuery},
    names,
    rejections::{AppError, Required, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::CREATE_QUESTION, post(create_question))
        .endpoint(names::UPDATE_QUESTION, post(update_question).put(update_question))
        .endpoint(names::DELETE_QUESTION, post(delete_question).delete(delete_question))
        .endpoint(names::GET_QUESTIONS, get(get_questions).post(get_questions))
}

/// Validates the shared fields of create and update. `id` is only required
/// for updates.
fn question_input(body: QuestionBody, with_id: bool) -> Result<(i64, QuestionInput), AppError> {
    let mut required = Required::new();
    let id = if with_id { required.id("id", body.id) } else { 0 };
    let course_id = required.id("courseid", body.course_id);
    let unit_id = required.id("unitid", body.unit_id);
    let question = required.text("Question", body.question);
    required.check()?;

    let input = QuestionInput {
        course_id,
        unit_id,
        question_ref: body
            .question_ref
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty()),
        question,
        upload_permitted: body.upload_permitted.unwrap_or(false),
    };
    Ok((id, input))
}

fn question_references(input: &QuestionInput) -> References {
    References {
        course_id: Some(input.course_id),
        unit_id: Some(input.unit_id),
        ..Default::default()
    }
}

async fn create_question(
    State(state): State<AppState>,
    Payload(body): Payload<QuestionBody>,
) -> Result<Response, AppError> {
    let (_, input) = question_input(body, false)?;
    check_references(&state, question_references(&input)).await?;

    let id = state
        .db
        .create_question(&input)
        .await
        .reject("could not create question")?;

    Ok(envelope::created("Question created", id))
}

async fn update_question(
    State(state): State<AppState>,
    Payload(body): Payload<QuestionBody>,
) -> Result<Response, AppError> {
    let (id, input) = question_input(body, true)?;
    check_references(&state, question_references(&input)).await?;

    let updated = state
        .db
        .update_question(id, &input)
        .await
        .reject("could not update question")?;

    if !updated {
        return Err(AppError::NotFound("Question not found"));
    }
    Ok(envelope::message("Question updated"))
}

async fn delete_question(
    State(state): State<AppState>,
    Payload(body): Payload<IdBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let deleted = state
        .db
        .delete_question(id)
        .await
        .reject("could not delete question")?;

    if !deleted {
        return Err(AppError::NotFound("Question not found"));
    }
    Ok(envelope::message("Question deleted"))
}

async fn get_questions(
    State(state): State<AppState>,
    Payload(query): Payload<QuestionQuery>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let unit_id = required.id("unitId", query.unit_id);
    required.check()?;

    let questions = state
        .db
        .list_questions(Some(unit_id), query.course_id)
        .await
        .reject("could not load questions")?;

    Ok(envelope::list(questions))
}
