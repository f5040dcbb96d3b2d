use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use linewatch_core::CoreError;
use linewatch_poller::PollerError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce the
/// `{ "success": false, "error": ..., "code": ..., "timestamp": ... }` envelope.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `linewatch_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A scheduler error from `linewatch_poller`.
    #[error(transparent)]
    Poller(#[from] PollerError),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

fn classify_core(err: &CoreError) -> (StatusCode, &'static str, String) {
    match err {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Io(_) | CoreError::Json(_) => {
            tracing::error!(error = %err, "Configuration error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core(core),

            AppError::Poller(poller) => match poller {
                PollerError::Config(core) => classify_core(core),
                PollerError::NoData => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "NO_DATA",
                    "No data available yet; polling has not produced a snapshot".to_string(),
                ),
                PollerError::Discarded(tick) => (
                    StatusCode::CONFLICT,
                    "TICK_DISCARDED",
                    format!("Tick {tick} was superseded or polling stopped"),
                ),
            },
        };

        let body = json!({
            "success": false,
            "error": message,
            "code": code,
            "timestamp": chrono::Utc::now(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn maps_variants_to_statuses() {
        let not_found = CoreError::NotFound {
            entity: "process",
            id: "paint".into(),
        };
        assert_eq!(status_of(AppError::Core(not_found)), StatusCode::NOT_FOUND);
        assert_eq!(
            status_of(AppError::Poller(PollerError::NoData)),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            status_of(AppError::Poller(PollerError::Discarded(4))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(AppError::Core(CoreError::Validation("bad".into()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(AppError::Core(CoreError::Io(std::io::Error::other("disk")))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
