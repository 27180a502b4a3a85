use axum::{extract::State, response::Response, routing::post, Router};
use serde::Serialize;

use super::Endpoints;
use crate::{
    db::models::UserRecord,
    envelope,
    extractors::Payload,
    models::{ChangePasswordBody, EmailBody, LoginBody},
    names,
    rejections::{AppError, Required, ResultExt},
    services::auth::{ChangePasswordOutcome, LoginOutcome},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::LOGIN, post(login))
        .endpoint(names::CHANGE_PASSWORD, post(change_password))
        .endpoint(names::REQUEST_PASSWORD_RESET, post(request_password_reset))
}

#[derive(Serialize)]
struct LoggedIn {
    message: &'static str,
    user: UserRecord,
}

async fn login(
    State(state): State<AppState>,
    Payload(body): Payload<LoginBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let email = required.text("email", body.email).to_lowercase();
    let password = required.value("password", body.password.filter(|p| !p.is_empty()));
    required.check()?;

    let outcome = state
        .auth
        .login(&email, &password)
        .await
        .reject("could not log in")?;

    match outcome {
        LoginOutcome::Success(user) => Ok(envelope::ok(LoggedIn {
            message: "Login successful",
            user,
        })),
        LoginOutcome::InvalidCredentials => Err(AppError::Unauthorized),
        LoginOutcome::EmptyFields => Err(AppError::MissingFields(vec!["email", "password"])),
    }
}

async fn change_password(
    State(state): State<AppState>,
    Payload(body): Payload<ChangePasswordBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    let current = required.value(
        "currentPassword",
        body.current_password.filter(|p| !p.is_empty()),
    );
    let new = required.value("newPassword", body.new_password.filter(|p| !p.is_empty()));
    required.check()?;

    let outcome = state
        .auth
        .change_password(id, &current, &new)
        .await
        .reject("could not change password")?;

    match outcome {
        ChangePasswordOutcome::Success => Ok(envelope::message("Password changed")),
        ChangePasswordOutcome::EmptyFields => {
            Err(AppError::MissingFields(vec!["currentPassword", "newPassword"]))
        }
        ChangePasswordOutcome::WeakPassword => Err(AppError::Invalid(format!(
            "Password must be at least {} characters",
            names::MIN_PASSWORD_LENGTH
        ))),
        ChangePasswordOutcome::IncorrectPassword => Err(AppError::Unauthorized),
        ChangePasswordOutcome::UnknownUser => Err(AppError::NotFound("User not found")),
    }
}

/// Always answers the same way so the response does not reveal whether the
/// email is registered.
async fn request_password_reset(
    State(state): State<AppState>,
    Payload(body): Payload<EmailBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let email = required.text("email", body.email).to_lowercase();
    required.check()?;

    state.notifier.password_reset_requested(&email).await;

    Ok(envelope::message(names::PASSWORD_RESET_MESSAGE))
}
