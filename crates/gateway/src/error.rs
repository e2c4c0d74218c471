use {
    axum::{
        http::StatusCode,
        response::{IntoResponse, Json, Response},
    },
    serde_json::json,
    tracing::error,
};

/// Error returned by API handlers, rendered as `{"error": "..."}`.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<courier_triggers::Error> for ApiError {
    fn from(err: courier_triggers::Error) -> Self {
        use courier_triggers::Error;
        match err {
            Error::UnknownKind { .. } | Error::Message(_) => Self::BadRequest(err.to_string()),
            Error::NotFound { .. } => Self::NotFound(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<courier_queue::Error> for ApiError {
    fn from(err: courier_queue::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<courier_inbound::Error> for ApiError {
    fn from(err: courier_inbound::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
