use crate::api::ApiResponse;
use axum::{http::StatusCode, response::Json};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Failures of the gamification engine.
#[derive(Debug, thiserror::Error)]
pub enum ProgressError {
    #[error("Progress for user '{0}' not found")]
    NotFound(String),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

impl From<serde_json::Error> for ProgressError {
    fn from(err: serde_json::Error) -> Self {
        ProgressError::Storage(anyhow::Error::from(err))
    }
}

/// Failures of the quiz session engine.
#[derive(Debug, thiserror::Error)]
pub enum QuizError {
    #[error("Quiz session '{0}' not found")]
    SessionNotFound(Uuid),

    #[error("Quiz session '{0}' is already completed")]
    SessionCompleted(Uuid),

    #[error("Quiz session '{0}' is not completed yet")]
    SessionNotCompleted(Uuid),

    #[error("Question '{question_id}' is not part of session '{session_id}'")]
    QuestionNotFound { session_id: Uuid, question_id: Uuid },

    #[error("Question '{0}' was already answered correctly")]
    AlreadyAnswered(Uuid),

    #[error("Maximum attempts ({max_attempts}) exceeded for question '{question_id}'")]
    AttemptsExceeded { question_id: Uuid, max_attempts: u32 },

    #[error("Time limit of {limit_secs} seconds exceeded for session '{session_id}'")]
    TimeLimitExceeded { session_id: Uuid, limit_secs: u64 },

    #[error("No words available for level {0}")]
    NoWordsAvailable(u32),

    #[error("Storage failure: {0}")]
    Storage(#[from] anyhow::Error),
}

/// Centralized error types for consistent API error handling
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Storage error: {0}")]
    StorageError(#[from] anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource already exists: {0}")]
    DuplicateResource(String),

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<ProgressError> for ApiError {
    fn from(err: ProgressError) -> Self {
        match err {
            ProgressError::NotFound(_) => ApiError::NotFound(err.to_string()),
            ProgressError::Storage(e) => ApiError::StorageError(e),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        match err {
            QuizError::SessionNotFound(_) | QuizError::QuestionNotFound { .. } => {
                ApiError::NotFound(err.to_string())
            }
            QuizError::NoWordsAvailable(_) => ApiError::ValidationError(err.to_string()),
            QuizError::SessionCompleted(_)
            | QuizError::SessionNotCompleted(_)
            | QuizError::AlreadyAnswered(_)
            | QuizError::AttemptsExceeded { .. }
            | QuizError::TimeLimitExceeded { .. } => ApiError::Conflict(err.to_string()),
            QuizError::Storage(e) => ApiError::StorageError(e),
        }
    }
}

/// Error context for structured logging
#[derive(Debug)]
pub struct ErrorContext {
    pub operation: String,
    pub resource_id: Option<String>,
    pub resource_type: String,
    pub user_friendly_message: Option<String>,
}

impl ErrorContext {
    pub fn new(operation: &str, resource_type: &str) -> Self {
        Self {
            operation: operation.to_string(),
            resource_id: None,
            resource_type: resource_type.to_string(),
            user_friendly_message: None,
        }
    }

    pub fn with_id(mut self, id: &str) -> Self {
        self.resource_id = Some(id.to_string());
        self
    }

    pub fn with_user_message(mut self, message: &str) -> Self {
        self.user_friendly_message = Some(message.to_string());
        self
    }
}

impl ApiError {
    /// Convert API error to HTTP response with consistent structure and logging
    pub fn to_response_with_context(
        self,
        context: ErrorContext,
    ) -> (StatusCode, Json<ApiResponse<()>>) {
        match &self {
            ApiError::NotFound(_) => {
                info!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Resource not found"
                );
                (
                    StatusCode::NOT_FOUND,
                    Json(ApiResponse::error(
                        context
                            .user_friendly_message
                            .unwrap_or_else(|| format!("{} not found", context.resource_type)),
                    )),
                )
            }
            ApiError::ValidationError(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Validation error"
                );
                (
                    StatusCode::BAD_REQUEST,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::Conflict(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Request conflicts with current state"
                );
                (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::DuplicateResource(_) => {
                warn!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Duplicate resource"
                );
                (
                    StatusCode::CONFLICT,
                    Json(ApiResponse::error(self.to_string())),
                )
            }
            ApiError::StorageError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Storage error"
                );
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    Json(ApiResponse::error(
                        "Saving your progress failed. Please try again.".to_string(),
                    )),
                )
            }
            ApiError::InternalError(_) => {
                error!(
                    operation = %context.operation,
                    resource_type = %context.resource_type,
                    resource_id = ?context.resource_id,
                    error = %self,
                    "Internal server error"
                );
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::error(
                        "An internal error occurred. Please try again.".to_string(),
                    )),
                )
            }
        }
    }
}

/// Helper function to detect error types from anyhow error messages
pub fn classify_database_error(error: &anyhow::Error) -> ApiError {
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("already exists") || error_str.contains("unique constraint") {
        if let Some(start) = error_str.find('\'') {
            if let Some(end) = error_str[start + 1..].find('\'') {
                let identifier = &error_str[start + 1..start + 1 + end];
                return ApiError::DuplicateResource(format!(
                    "Resource '{}' already exists",
                    identifier
                ));
            }
        }
        ApiError::DuplicateResource("Resource already exists".to_string())
    } else if error_str.contains("not found") || error_str.contains("no rows") {
        ApiError::NotFound("Resource not found".to_string())
    } else if error_str.contains("required") || error_str.contains("cannot be null") {
        ApiError::ValidationError("Required field is missing or invalid".to_string())
    } else {
        ApiError::StorageError(anyhow::anyhow!("{}", error))
    }
}
