use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::error::Error;

/// API 错误类型，把错误分类映射到 HTTP 状态码
pub struct AppError(pub Error);

pub type Result<T, E = AppError> = std::result::Result<T, E>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::InputValidation(_) => StatusCode::BAD_REQUEST,
            Error::IngestBusy => StatusCode::CONFLICT,
            // 不可用类错误可由调用方退避重试
            Error::BackendUnavailable(_) | Error::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Error::DimensionMismatch { .. } | Error::ModelMismatch { .. } | Error::Other(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
