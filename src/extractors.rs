use axum::{
    body::Bytes,
    extract::{FromRequest, Query, Request},
    http::Method,
};
use serde::de::DeserializeOwned;

use crate::rejections::AppError;

/// Request parameters from the query string on `GET` and from a JSON body
/// otherwise. An empty body reads as `{}` so that missing fields are reported
/// by name rather than as a parse failure.
pub struct Payload<T>(pub T);

impl<S, T> FromRequest<S> for Payload<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if req.method() == Method::GET {
            let Query(value) = Query::<T>::try_from_uri(req.uri()).map_err(|e| {
                tracing::debug!("rejected query string: {e}");
                AppError::Input("Invalid query parameters")
            })?;
            return Ok(Payload(value));
        }

        let bytes = Bytes::from_request(req, state).await.map_err(|e| {
            tracing::debug!("could not read request body: {e}");
            AppError::Input("Invalid JSON payload")
        })?;

        let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &bytes
        };

        serde_json::from_slice(body).map(Payload).map_err(|e| {
            tracing::debug!("rejected JSON payload: {e}");
            AppError::Input("Invalid JSON payload")
        })
    }
}
