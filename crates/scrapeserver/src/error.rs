use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use scraperuntime::{ScrapeError, SetupError, TriggerError};
use scrapestore::StoreError;
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("missing or empty X-User-Id header")]
    MissingUser,

    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} belongs to another user")]
    Forbidden(String),

    #[error("{0}")]
    BadRequest(String),

    #[error(transparent)]
    Runtime(#[from] ScrapeError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Runtime(ScrapeError::Store(e))
    }
}

impl From<TriggerError> for ApiError {
    fn from(e: TriggerError) -> Self {
        ApiError::Runtime(ScrapeError::Trigger(e))
    }
}

fn store_status(e: &StoreError) -> StatusCode {
    match e {
        StoreError::NotFound(_) => StatusCode::NOT_FOUND,
        StoreError::Terminal(_) | StoreError::Conflict(_) => StatusCode::CONFLICT,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MissingUser => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Runtime(e) => match e {
                ScrapeError::Trigger(TriggerError::WorkflowNotFound(_)) => StatusCode::NOT_FOUND,
                ScrapeError::Trigger(TriggerError::Unauthorized { .. }) => StatusCode::FORBIDDEN,
                ScrapeError::Trigger(TriggerError::InvalidDefinition(_))
                | ScrapeError::Trigger(TriggerError::Planning(_)) => {
                    StatusCode::UNPROCESSABLE_ENTITY
                }
                ScrapeError::Trigger(TriggerError::Store(e)) | ScrapeError::Store(e) => {
                    store_status(e)
                }
                ScrapeError::Setup(SetupError::ExecutionNotFound(_)) => StatusCode::NOT_FOUND,
                ScrapeError::Setup(SetupError::AlreadyFinished(_)) => StatusCode::CONFLICT,
                ScrapeError::Setup(_) => StatusCode::INTERNAL_SERVER_ERROR,
                ScrapeError::InvalidDefinition(_) => StatusCode::BAD_REQUEST,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }
        HttpResponse::build(status).json(ErrorResponse {
            error: self.to_string(),
        })
    }
}
