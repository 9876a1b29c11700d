use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    InvalidArgument(String),
    #[error("tokenizer error: {0}")]
    Tokenizer(String),
    #[error("model execution failed: {0}")]
    Inference(String),
    #[error("failed to load generator: {0}")]
    Load(String),
    #[error("{message}")]
    MalformedBody { status: StatusCode, message: String },
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            ServiceError::MalformedBody { status, .. } => *status,
            ServiceError::Tokenizer(_) | ServiceError::Inference(_) | ServiceError::Load(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<JsonRejection> for ServiceError {
    fn from(rejection: JsonRejection) -> Self {
        ServiceError::MalformedBody {
            status: rejection.status(),
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "generation request failed");
        }

        let body = serde_json::json!({
            "detail": self.to_string(),
        });

        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_and_backend_errors_map_to_distinct_statuses() {
        assert_eq!(
            ServiceError::InvalidArgument("Prompt must not be empty".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ServiceError::Inference("out of memory".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            ServiceError::Tokenizer("bad vocab".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn malformed_body_keeps_its_status() {
        let err = ServiceError::MalformedBody {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: "missing field `prompt`".into(),
        };
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.to_string(), "missing field `prompt`");
    }

    #[test]
    fn invalid_argument_message_is_unprefixed() {
        let err = ServiceError::InvalidArgument("Prompt must not be empty".into());
        assert_eq!(err.to_string(), "Prompt must not be empty");
    }
}
