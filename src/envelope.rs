//! The JSON envelope every endpoint answers with: the payload's fields plus
//! the HTTP status repeated as `status_code`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

#[derive(Serialize)]
pub struct Envelope<T> {
    #[serde(flatten)]
    pub body: T,
    pub status_code: u16,
}

#[derive(Serialize)]
pub struct Message {
    pub message: String,
}

#[derive(Serialize)]
pub struct Listing<T> {
    pub data: Vec<T>,
}

pub fn reply<T: Serialize>(status: StatusCode, body: T) -> Response {
    (
        status,
        Json(Envelope {
            body,
            status_code: status.as_u16(),
        }),
    )
        .into_response()
}

pub fn ok<T: Serialize>(body: T) -> Response {
    reply(StatusCode::OK, body)
}

pub fn message(text: impl Into<String>) -> Response {
    ok(Message {
        message: text.into(),
    })
}

pub fn list<T: Serialize>(data: Vec<T>) -> Response {
    ok(Listing { data })
}

#[derive(Serialize)]
pub struct Created {
    pub message: &'static str,
    pub id: i64,
}

pub fn created(message: &'static str, id: i64) -> Response {
    reply(StatusCode::CREATED, Created { message, id })
}
