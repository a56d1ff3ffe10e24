// src/error.rs
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Serialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub error: String,
    pub code: u16,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Data unavailable: {0}")]
    DataUnavailable(String),

    #[error("Alignment error: {0}")]
    Alignment(String),

    #[error("Upstream source error: {0}")]
    Upstream(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal server error")]
    Internal,
}

impl AppError {
    pub fn status_code(&self) -> u16 {
        match self {
            AppError::InvalidParameter(_) => 400,
            AppError::DataUnavailable(_) => 404,
            AppError::Alignment(_) => 500,
            AppError::Upstream(_) => 502,
            AppError::Serialization(_) => 500,
            AppError::Config(_) => 500,
            AppError::NotFound(_) => 404,
            AppError::Internal => 500,
        }
    }
}

impl ResponseError for AppError {
    fn error_response(&self) -> HttpResponse {
        let status_code = self.status_code();
        let error_response = ApiErrorResponse {
            success: false,
            error: self.to_string(),
            code: status_code,
        };

        HttpResponse::build(
            actix_web::http::StatusCode::from_u16(status_code)
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
        )
        .json(error_response)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(_err: anyhow::Error) -> Self {
        AppError::Internal
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Upstream(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

// Convenience type alias for Result
pub type Result<T> = std::result::Result<T, AppError>;
