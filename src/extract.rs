use axum::{extract::FromRequest, response::IntoResponse};
use serde::Serialize;

use crate::error::Error;

/// JSON body extractor whose rejections go through the crate error type,
/// so malformed payloads and unknown enum values answer 400.
#[derive(Debug, Clone, Copy, Default, FromRequest)]
#[from_request(via(axum::Json), rejection(Error))]
pub struct ApiJson<T>(pub T);

impl<T: Serialize> IntoResponse for ApiJson<T> {
    fn into_response(self) -> axum::response::Response {
        axum::Json(self.0).into_response()
    }
}
