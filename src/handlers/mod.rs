pub mod alerts;
pub mod investments;
pub mod market;

use crate::error::ApiError;
use axum::extract::rejection::JsonRejection;
use axum::Json;

/// Unwraps a JSON body, turning malformed or incomplete payloads into a 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))
}
