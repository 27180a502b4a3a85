use axum::{
    extract::State,
    response::Response,
    routing::{get, post},
    Router,
};
use serde::Serialize;

use super::Endpoints;
use crate::{
    db::models::{NewUser, Role, SelfUpdate, UserFilter, UserRecord, UserUpdate, Write},
    envelope,
    extractors::Payload,
    models::{BulkUploadBody, CreateUserBody, IdBody, UpdateSelfBody, UpdateUserBody, UserQuery},
    names,
    rejections::{AppError, Required, ResultExt},
    roster, AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .endpoint(names::CREATE_USER, post(create_user))
        .endpoint(names::UPDATE_USER, post(update_user).put(update_user))
        .endpoint(names::UPDATE_SELF, post(update_self).put(update_self))
        .endpoint(names::DELETE_USER, post(delete_user).delete(delete_user))
        .endpoint(names::GET_USERS, get(get_users).post(get_users))
        .endpoint(names::GET_CLASS_CODES, get(get_class_codes).post(get_class_codes))
        .endpoint(names::BULK_UPLOAD_USERS, post(bulk_upload_users))
}

fn normalise_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Blank optional text reads as absent.
fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn role(status: Option<i64>) -> Result<Option<Role>, AppError> {
    status
        .map(Role::try_from)
        .transpose()
        .map_err(|e| AppError::Invalid(format!("Invalid status: {}", e.0)))
}

async fn create_user(
    State(state): State<AppState>,
    Payload(body): Payload<CreateUserBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let email = normalise_email(&required.text("email", body.email));
    let password = required.value("password", body.password.filter(|p| !p.is_empty()));
    let user_name = required.text("userName", body.user_name);
    required.check()?;

    let user = NewUser {
        email,
        password,
        user_name,
        class_code: optional(body.class_code),
        role: role(body.status)?.unwrap_or(Role::Student),
        avatar: optional(body.avatar),
    };

    let id = state
        .db
        .create_user(&user)
        .await
        .reject("could not create user")?
        .ok_or_else(|| AppError::Conflict("Email already exists".to_string()))?;

    state.notifier.welcome(&user.email, &user.user_name).await;

    Ok(envelope::created("User created", id))
}

async fn update_user(
    State(state): State<AppState>,
    Payload(body): Payload<UpdateUserBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    let email = normalise_email(&required.text("email", body.email));
    let user_name = required.text("userName", body.user_name);
    required.check()?;

    let current = state
        .db
        .find_user(id)
        .await
        .reject("could not load user")?
        .ok_or(AppError::NotFound("User not found"))?;

    let update = UserUpdate {
        id,
        email,
        user_name,
        password: body.password.filter(|p| !p.is_empty()),
        class_code: match body.class_code {
            Some(code) => optional(Some(code)),
            None => current.class_code,
        },
        role: role(body.status)?.unwrap_or(current.status),
        avatar: match body.avatar {
            Some(avatar) => optional(Some(avatar)),
            None => current.avatar,
        },
    };

    match state
        .db
        .update_user(&update)
        .await
        .reject("could not update user")?
    {
        Write::Done => Ok(envelope::message("User updated")),
        Write::NotFound => Err(AppError::NotFound("User not found")),
        Write::Duplicate => Err(AppError::Conflict("Email already exists".to_string())),
    }
}

#[derive(Serialize)]
struct SelfUpdated {
    message: &'static str,
    user: UserRecord,
}

async fn update_self(
    State(state): State<AppState>,
    Payload(body): Payload<UpdateSelfBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let update = SelfUpdate {
        id,
        email: optional(body.email).map(|e| normalise_email(&e)),
        password: body.password.filter(|p| !p.is_empty()),
        avatar: optional(body.avatar),
    };
    if update.is_empty() {
        return Err(AppError::Input("Nothing to update"));
    }

    match state
        .db
        .update_self(&update)
        .await
        .reject("could not update user")?
    {
        Write::Done => {}
        Write::NotFound => return Err(AppError::NotFound("User not found")),
        Write::Duplicate => return Err(AppError::Conflict("Email already exists".to_string())),
    }

    let user = state
        .db
        .find_user(id)
        .await
        .reject("could not load user")?
        .ok_or(AppError::NotFound("User not found"))?;

    Ok(envelope::ok(SelfUpdated {
        message: "Profile updated",
        user,
    }))
}

async fn delete_user(
    State(state): State<AppState>,
    Payload(body): Payload<IdBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let id = required.id("id", body.id);
    required.check()?;

    let deleted = state
        .db
        .delete_user(id)
        .await
        .reject("could not delete user")?;
    if !deleted {
        return Err(AppError::NotFound("User not found"));
    }

    state.store.remove_student(id).await;

    Ok(envelope::message("User deleted"))
}

async fn get_users(
    State(state): State<AppState>,
    Payload(query): Payload<UserQuery>,
) -> Result<Response, AppError> {
    let filter = UserFilter {
        id: query.id,
        class_code: optional(query.class_code),
        role: query.status,
    };

    let users = state
        .db
        .list_users(&filter)
        .await
        .reject("could not load users")?;

    Ok(envelope::list(users))
}

async fn get_class_codes(State(state): State<AppState>) -> Result<Response, AppError> {
    let codes = state
        .db
        .class_codes()
        .await
        .reject("could not load class codes")?;

    Ok(envelope::list(codes))
}

#[derive(Serialize)]
struct BulkUploaded {
    message: &'static str,
    inserted: usize,
    skipped: usize,
    errors: Vec<String>,
}

async fn bulk_upload_users(
    State(state): State<AppState>,
    Payload(body): Payload<BulkUploadBody>,
) -> Result<Response, AppError> {
    let mut required = Required::new();
    let class_code = required.text("classCode", body.class_code);
    let password = required.text("defaultPassword", body.default_password);
    let csv = required.value("csvContent", body.csv_content.filter(|c| !c.trim().is_empty()));
    required.check()?;

    let parsed =
        roster::parse(&csv, &class_code).map_err(|e| AppError::Invalid(e.to_string()))?;

    let report = state
        .db
        .import_students(&parsed.entries, &password)
        .await
        .reject("Bulk upload failed")?;

    let skipped = parsed.rejected.len() + report.skipped;
    let mut errors = parsed.rejected;
    errors.extend(report.errors);

    Ok(envelope::ok(BulkUploaded {
        message: "Bulk upload complete",
        inserted: report.inserted,
        skipped,
        errors,
    }))
}
