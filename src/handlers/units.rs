use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};

use super::{check_references, Endpoints};
use crate::{
    db::models::References,
    envelope,
    extractors::Payload,
    models::{IdBody, UnitBody},
    names,
    rejections::{AppError, Required, ResultExt},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::CREATE_UNIT, post(create_unit))
        .endpoint(names::UPDATE_UNIT, post(update_unit).put(update_unit))
        .endpoint(names::DELETE_UNIT, post(delete_unit).delete(delete_unit))
        .endpoint(names::GET_UNITS, get(get_units).post(get_units))
}

fn code(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

async fn create_unit(
    State(state): State<AppState>,
    Payload(body): Payload<UnitBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let course_id = required.id("courseid", body.course_id);
    let name = required.text("unitName", body.unit_name);
    required.check()?;

    check_references(
        &state,
        References {
            course_id: Some(course_id),
            ..Default::default()
        },
    )
    .await?;

    let id = state
        .db
        .create_unit(course_id, &name, code(body.unit_code).as_deref())
        .await
        .reject("could not create unit")?;

    Ok(envelope::created("Unit created", id))
}

async fn update_unit(
    State(state): State<AppState>,
    Payload(body): Payload<UnitBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    let course_id = required.id("courseid", body.course_id);
    let name = required.text("unitName", body.unit_name);
    required.check()?;

    check_references(
        &state,
        References {
            course_id: Some(course_id),
            ..Default::default()
        },
    )
    .await?;

    let updated = state
        .db
        .update_unit(id, course_id, &name, code(body.unit_code).as_deref())
        .await
        .reject("could not update unit")?;

    if !updated {
        return Err(AppError::NotFound("Unit not found"));
    }
    Ok(envelope::message("Unit updated"))
}

async fn delete_unit(
    State(state): State<AppState>,
    Payload(body): Payload<IdBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let deleted = state
        .db
        .delete_unit(id)
        .await
        .reject("could not delete unit")?;

    if !deleted {
        return Err(AppError::NotFound("Unit not found"));
    }
    Ok(envelope::message("Unit deleted"))
}

async fn get_units(
    State(state): State<AppState>,
    Payload(query): Payload<UnitBody>,
) -> Result<Response, AppError> {
    let units = state
        .db
        .list_units(query.id, query.course_id)
        .await
        .reject("could not load units")?;

    Ok(envelope::list(units))
}
