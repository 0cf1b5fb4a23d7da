use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use latex_common::ErrorCategory;
use latex_common::ServiceError;
use serde::Serialize;

/// Wraps `ServiceError` so it can be returned directly from axum handlers;
/// maps each `ErrorCategory` (§7) to its documented HTTP status.
pub struct ApiError(pub ServiceError);

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0.category() {
            ErrorCategory::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCategory::InvalidState => StatusCode::FORBIDDEN,
            ErrorCategory::NotFound => StatusCode::NOT_FOUND,
            // CompileFailure never escapes a job boundary as an HTTP error
            // (it is reflected as `status = error` on the session); seeing
            // one here means the facade used it incorrectly.
            ErrorCategory::CompileFailure | ErrorCategory::Fatal => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}
