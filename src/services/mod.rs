pub mod auth;
pub mod notify;
