pub mod config;
pub mod dates;
pub mod db;
pub mod email;
pub mod envelope;
pub mod extractors;
pub mod handlers;
pub mod models;
pub mod names;
pub mod rejections;
pub mod roster;
pub mod services;
pub mod storage;
pub mod workflow;

use std::sync::Arc;

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Config;
use crate::email::ResendEmailSender;
use crate::services::{auth::AuthService, notify::Notifier};
use crate::storage::AttachmentStore;

#[derive(Clone)]
pub struct AppState {
    pub db: db::Db,
    pub config: Arc<Config>,
    pub store: AttachmentStore,
    pub auth: AuthService,
    pub notifier: Notifier,
}

impl AppState {
    pub fn new(db: db::Db, config: Config) -> Self {
        let sender = ResendEmailSender::new(config.email.clone());
        let notifier = Notifier::new(db.clone(), sender, config.api_base().to_string());
        Self {
            auth: AuthService::new(db.clone()),
            store: AttachmentStore::new(config.file_storage_path.clone()),
            config: Arc::new(config),
            notifier,
            db,
        }
    }
}

pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION]);

    Router::new()
        .route(names::HEALTH_URL, get(health))
        .merge(handlers::users::routes())
        .merge(handlers::account::routes())
        .merge(handlers::courses::routes())
        .merge(handlers::units::routes())
        .merge(handlers::questions::routes())
        .merge(handlers::activities::routes())
        .merge(handlers::answers::routes())
        .merge(handlers::files::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> axum::response::Response {
    envelope::message("ok")
}
