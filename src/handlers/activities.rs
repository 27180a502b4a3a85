use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::{check_references, parse_status, refused, Endpoints};
use crate::{
    db::models::{
        ActivityFilter, ActivityUpdate, Assignment, NewActivity, References, Transition,
    },
    envelope,
    extractors::Payload,
    models::{ActivityQuery, AssignUnitBody, CreateActivityBody, IdBody, UpdateActivityBody},
    names,
    rejections::{AppError, Required, ResultExt},
    workflow::Status,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::CREATE_ACTIVITY, post(create_activity))
        .endpoint(names::UPDATE_ACTIVITY, post(update_activity).put(update_activity))
        .endpoint(names::DELETE_ACTIVITY, post(delete_activity).delete(delete_activity))
        .endpoint(names::GET_ACTIVITIES, get(get_activities).post(get_activities))
        .endpoint(names::GET_ASSESSMENTS, get(get_assessments).post(get_assessments))
        .endpoint(names::ASSIGN_UNIT, post(assign_unit_to_class))
}

async fn create_activity(
    State(state): State<AppState>,
    Payload(body): Payload<CreateActivityBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let student_id = required.id("studentId", body.student_id);
    let course_id = required.id("courseId", body.course_id);
    let unit_id = required.id("unitId", body.unit_id);
    required.check()?;

    let status = match body.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => parse_status(s)?,
        None => Status::NotSet,
    };
    if !status.is_initial() {
        return Err(AppError::Invalid(format!(
            "A new activity cannot start as {status}"
        )));
    }

    check_references(
        &state,
        References {
            student_id: Some(student_id),
            course_id: Some(course_id),
            unit_id: Some(unit_id),
            assessor_id: body.assessor_id,
        },
    )
    .await?;

    let activity = NewActivity {
        student_id,
        course_id,
        unit_id,
        assessor_id: body.assessor_id,
        status,
        date_set: body.date_set,
        date_submitted: body.date_submitted,
        date_marked: body.date_marked,
        date_resubmitted: body.date_resubmitted,
        date_complete: body.date_complete,
    };

    let id = state
        .db
        .create_activity(&activity)
        .await
        .reject("could not create activity")?;

    Ok(envelope::created("Activity created", id))
}

async fn update_activity(
    State(state): State<AppState>,
    Payload(body): Payload<UpdateActivityBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    let status = required.text("status", body.status);
    required.check()?;

    check_references(
        &state,
        References {
            student_id: body.student_id,
            course_id: body.course_id,
            unit_id: body.unit_id,
            assessor_id: body.assessor_id,
        },
    )
    .await?;

    let update = ActivityUpdate {
        id,
        status: Some(parse_status(&status)?),
        student_id: body.student_id,
        course_id: body.course_id,
        unit_id: body.unit_id,
        assessor_id: body.assessor_id,
        assessor_comment: body.assessor_comment,
        date_set: body.date_set,
        date_submitted: body.date_submitted,
        date_marked: body.date_marked,
        date_resubmitted: body.date_resubmitted,
        date_complete: body.date_complete,
    };

    match state
        .db
        .update_activity(&update)
        .await
        .reject("could not update activity")?
    {
        Transition::Applied(()) => Ok(envelope::message("Activity updated")),
        Transition::NotFound => Err(AppError::NotFound("Activity not found")),
        Transition::Refused { from, to } => Err(refused(from, to)),
    }
}

async fn delete_activity(
    State(state): State<AppState>,
    Payload(body): Payload<IdBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let files = state
        .db
        .delete_activity(id)
        .await
        .reject("could not delete activity")?
        .ok_or(AppError::NotFound("Activity not found"))?;

    for file in &files {
        state.store.remove(&file.path).await;
    }

    Ok(envelope::message("Activity deleted"))
}

async fn get_activities(
    State(state): State<AppState>,
    Payload(query): Payload<ActivityQuery>,
) -> Result<Response, AppError> {
    let status = match query.status.as_deref().filter(|s| !s.trim().is_empty()) {
        Some(s) => Some(parse_status(s)?),
        None => None,
    };
    let filter = ActivityFilter {
        id: query.id,
        student_id: query.student_id,
        course_id: query.course_id,
        unit_id: query.unit_id,
        status,
    };

    let activities = state
        .db
        .list_activities(&filter)
        .await
        .reject("could not load activities")?;

    Ok(envelope::list(activities))
}

async fn get_assessments(
    State(state): State<AppState>,
    Payload(query): Payload<ActivityQuery>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let student_id = required.id("studentId", query.student_id);
    required.check()?;

    let assessments = state
        .db
        .assessments_for(student_id)
        .await
        .reject("could not load assessments")?;

    Ok(envelope::list(assessments))
}

#[derive(Serialize)]
struct Assigned {
    message: &'static str,
    inserted: usize,
    skipped: usize,
}

async fn assign_unit_to_class(
    State(state): State<AppState>,
    Payload(body): Payload<AssignUnitBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let assignment = Assignment {
        class_code: required.text("classCode", body.class_code),
        course_id: required.id("courseId", body.course_id),
        unit_id: required.id("unitId", body.unit_id),
        assessor_id: required.id("assessorId", body.assessor_id),
    };
    required.check()?;

    check_references(
        &state,
        References {
            student_id: None,
            course_id: Some(assignment.course_id),
            unit_id: Some(assignment.unit_id),
            assessor_id: Some(assignment.assessor_id),
        },
    )
    .await?;

    let report = state
        .db
        .assign_unit_to_class(&assignment)
        .await
        .reject("could not assign unit")?;

    let message = if report.inserted == 0 && report.skipped == 0 {
        "No students found for this class"
    } else {
        "Assignment complete"
    };

    Ok(envelope::ok(Assigned {
        message,
        inserted: report.inserted,
        skipped: report.skipped,
    }))
}
