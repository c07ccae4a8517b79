//! JSON error responses.

use axum::{
    Json,
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use docqa_rag::{ErrorKind, PipelineError, Stage};
use serde::Serialize;

use crate::storage::StorageError;

/// An error returned to HTTP clients as `{status: false, message, error?}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub kind: Option<ErrorKind>,
    pub stage: Option<Stage>,
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    status: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorDetail>,
}

#[derive(Serialize)]
struct ErrorDetail {
    kind: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    stage: Option<Stage>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self { status, message: message.into(), kind: None, stage: None }
    }

    /// A request rejected before the pipeline runs. Carries the validation kind with no stage.
    pub fn rejected(status: StatusCode, message: impl Into<String>) -> Self {
        Self { kind: Some(ErrorKind::Validation), ..Self::new(status, message) }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::rejected(StatusCode::BAD_REQUEST, message)
    }

    /// A validation failure attributed to a pipeline stage.
    pub fn validation_at(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
            kind: Some(ErrorKind::Validation),
            stage: Some(stage),
        }
    }
}

/// HTTP status for a component error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::UnsupportedFormat => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Embedding | ErrorKind::Completion => StatusCode::BAD_GATEWAY,
        ErrorKind::Config | ErrorKind::Io => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            message: err.source.to_string(),
            kind: Some(kind),
            stage: Some(err.stage),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::AlreadyExists(_) => {
                Self::new(StatusCode::CONFLICT, "file already exists")
            }
            StorageError::InvalidName(message) => Self::bad_request(message),
            StorageError::Io(e) => {
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, format!("failed to store file: {e}"))
            }
        }
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        Self::new(err.status(), err.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            status: false,
            message: &self.message,
            error: self.kind.map(|kind| ErrorDetail { kind, stage: self.stage }),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use docqa_rag::RagError;

    use super::*;

    #[test]
    fn pipeline_errors_map_to_documented_statuses() {
        let not_found = ApiError::from(PipelineError::new(
            Stage::Loading,
            RagError::NotFound("never-uploaded.pdf".into()),
        ));
        assert_eq!(not_found.status, StatusCode::NOT_FOUND);
        assert_eq!(not_found.kind, Some(ErrorKind::NotFound));

        assert_eq!(status_for(ErrorKind::UnsupportedFormat), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(status_for(ErrorKind::Embedding), StatusCode::BAD_GATEWAY);
        assert_eq!(status_for(ErrorKind::Io), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn upload_rejections_carry_the_validation_kind_without_a_stage() {
        let err = ApiError::rejected(StatusCode::UNSUPPORTED_MEDIA_TYPE, "pdf only");
        assert_eq!(err.kind, Some(ErrorKind::Validation));
        assert_eq!(err.stage, None);
        assert_eq!(ApiError::bad_request("No file uploaded").status, StatusCode::BAD_REQUEST);

        let storage = ApiError::from(StorageError::InvalidName("bad name".into()));
        assert_eq!(storage.kind, Some(ErrorKind::Validation));
    }

    #[test]
    fn error_body_includes_kind_and_stage() {
        let err = ApiError::validation_at(Stage::Idle, "File is not uploaded!!!");
        let body = ErrorBody {
            status: false,
            message: &err.message,
            error: err.kind.map(|kind| ErrorDetail { kind, stage: err.stage }),
        };
        assert_eq!(
            serde_json::to_value(body).unwrap(),
            serde_json::json!({
                "status": false,
                "message": "File is not uploaded!!!",
                "error": {"kind": "ValidationError", "stage": "idle"}
            })
        );
    }
}
