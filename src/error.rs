use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

use crate::schemas::MemberId;

pub type Result<T> = std::result::Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Couldn't find group {0}")]
    GroupNotFound(String),

    #[error("Couldn't find expense {0}")]
    ExpenseNotFound(String),

    #[error("Couldn't find member {0}")]
    MemberNotFound(MemberId),

    #[error("Member {0} has no share in this expense")]
    ShareNotFound(MemberId),

    #[error("Couldn't find category {0}")]
    CategoryNotFound(i64),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bson::ser::Error),
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::GroupNotFound(_)
            | ApiError::ExpenseNotFound(_)
            | ApiError::MemberNotFound(_)
            | ApiError::ShareNotFound(_)
            | ApiError::CategoryNotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Database(_) | ApiError::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("You need to add {0} to the env")]
    Missing(&'static str),

    #[error("Invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}
