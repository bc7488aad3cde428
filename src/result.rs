use std::fmt::Display;

use anyhow;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Catch-all handler error. Anything that bubbles up to here becomes a
/// 500; expected failures (bad login, missing game) are rendered by the
/// handlers themselves and never reach this type.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

pub type Result<T = (), E = AppError> = anyhow::Result<T, E>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(err = %self.0, "request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Something went wrong: {}", self.0),
        )
            .into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
