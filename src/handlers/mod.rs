pub mod account;
pub mod activities;
pub mod answers;
pub mod courses;
pub mod files;
pub mod questions;
pub mod units;
pub mod users;

use axum::{routing::MethodRouter, Router};

use crate::db::models::References;
use crate::names::Endpoint;
use crate::rejections::{AppError, ResultExt};
use crate::workflow::{Status, TransitionError};
use crate::AppState;

pub(crate) trait Endpoints {
    /// Mounts `handler` at both paths of `endpoint`.
    fn endpoint(self, endpoint: Endpoint, handler: MethodRouter<AppState>) -> Self;
}

impl Endpoints for Router<AppState> {
    fn endpoint(self, endpoint: Endpoint, handler: MethodRouter<AppState>) -> Self {
        endpoint
            .paths()
            .into_iter()
            .fold(self, |router, path| router.route(path, handler.clone()))
    }
}

fn parse_status(value: &str) -> Result<Status, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::Invalid(format!("Invalid status '{}'", value.trim())))
}

fn refused(from: Status, to: Status) -> AppError {
    AppError::Conflict(TransitionError { from, to }.to_string())
}

/// 404s when a referenced student, course, unit or assessor does not exist.
async fn check_references(state: &AppState, refs: References) -> Result<(), AppError> {
    match state
        .db
        .missing_reference(&refs)
        .await
        .reject("could not check references")?
    {
        Some(missing) => Err(AppError::NotFound(missing.message())),
        None => Ok(()),
    }
}
