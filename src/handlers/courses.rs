use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};

use super::Endpoints;
use crate::{
    envelope,
    extractors::Payload,
    models::{CourseBody, IdBody},
    names,
    rejections::{AppError, Required, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::CREATE_COURSE, post(create_course))
        .endpoint(names::UPDATE_COURSE, post(update_course).put(update_course))
        .endpoint(names::DELETE_COURSE, post(delete_course).delete(delete_course))
        .endpoint(names::GET_COURSES, get(get_courses).post(get_courses))
}

fn code(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn create_course(
    State(state): State<AppState>,
    Payload(body): Payload<CourseBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let name = required.text("courseName", body.course_name);
    required.check()?;

    let id = state
        .db
        .create_course(&name, code(body.course_code).as_deref())
        .await
        .reject("could not create course")?;

    Ok(envelope::created("Course created", id))
}

async fn update_course(
    State(state): State<AppState>,
    Payload(body): Payload<CourseBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    let name = required.text("courseName", body.course_name);
    required.check()?;

    let updated = state
        .db
        .update_course(id, &name, code(body.course_code).as_deref())
        .await
        .reject("could not update course")?;

    if !updated {
        return Err(AppError::NotFound("Course not found"));
    }
    Ok(envelope::message("Course updated"))
}

async fn delete_course(
    State(state): State<AppState>,
    Payload(body): Payload<IdBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let deleted = state
        .db
        .delete_course(id)
        .await
        .reject("could not delete course")?;

    if !deleted {
        return Err(AppError::NotFound("Course not found"));
    }
    Ok(envelope::message("Course deleted"))
}

async fn get_courses(
    State(state): State<AppState>,
    Payload(query): Payload<IdBody>,
) -> Result<Response, AppError> {
    let courses = state
        .db
        .list_courses(query.id)
        .await
        .reject("could not load courses")?;

    Ok(envelope::list(courses))
}
