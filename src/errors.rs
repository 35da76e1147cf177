// ABOUTME: Unified application error handling with stable error codes
// ABOUTME: Maps internal failures to HTTP statuses for the embedding web layer
//
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application-level error handling for the grant server.
//!
//! Protocol-level OAuth 2.0 errors (`invalid_grant`, `invalid_scope`, ...)
//! live in [`crate::oauth2_server::models::OAuth2Error`]; this module covers
//! everything beneath the protocol surface: storage failures, configuration
//! problems, and registry bookkeeping errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the crate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication & Authorization
    /// Authentication is required but was not supplied
    #[serde(rename = "AUTH_REQUIRED")]
    AuthRequired,
    /// Supplied credentials are invalid
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid,
    /// Supplied credentials have expired
    #[serde(rename = "AUTH_EXPIRED")]
    AuthExpired,

    // Validation
    /// Caller-supplied input failed validation
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput,
    /// A required field was absent
    #[serde(rename = "MISSING_REQUIRED_FIELD")]
    MissingRequiredField,

    // Resource management
    /// Resource lookup failed
    #[serde(rename = "RESOURCE_NOT_FOUND")]
    ResourceNotFound,
    /// Resource already exists
    #[serde(rename = "RESOURCE_ALREADY_EXISTS")]
    ResourceAlreadyExists,

    // Configuration
    /// Configuration value is missing or malformed
    #[serde(rename = "CONFIG_INVALID")]
    ConfigInvalid,

    // Internal
    /// Backend storage failure
    #[serde(rename = "STORAGE_ERROR")]
    StorageError,
    /// Unexpected internal failure
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

impl ErrorCode {
    /// Get the HTTP status code suggested for this error
    #[must_use]
    pub fn http_status(self) -> u16 {
        match self {
            Self::InvalidInput | Self::MissingRequiredField => 400,
            Self::AuthRequired | Self::AuthInvalid => 401,
            Self::AuthExpired => 403,
            Self::ResourceNotFound => 404,
            Self::ResourceAlreadyExists => 409,
            Self::ConfigInvalid | Self::StorageError | Self::InternalError => 500,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::AuthInvalid => "AUTH_INVALID",
            Self::AuthExpired => "AUTH_EXPIRED",
            Self::InvalidInput => "INVALID_INPUT",
            Self::MissingRequiredField => "MISSING_REQUIRED_FIELD",
            Self::ResourceNotFound => "RESOURCE_NOT_FOUND",
            Self::ResourceAlreadyExists => "RESOURCE_ALREADY_EXISTS",
            Self::ConfigInvalid => "CONFIG_INVALID",
            Self::StorageError => "STORAGE_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        };
        f.write_str(name)
    }
}

/// Application error with a stable code and human-readable message
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct AppError {
    /// Stable error code
    pub code: ErrorCode,
    /// Human-readable message; never carries secret material
    pub message: String,
}

impl AppError {
    /// Create a new error with the given code and message
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Invalid input supplied by the caller
    #[must_use]
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// A required field was absent
    #[must_use]
    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingRequiredField,
            format!("Missing required field: {field}"),
        )
    }

    /// Resource lookup failed
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceNotFound, message)
    }

    /// Resource already exists
    #[must_use]
    pub fn already_exists(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ResourceAlreadyExists, message)
    }

    /// Configuration value is missing or malformed
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigInvalid, message)
    }

    /// Backend storage failure
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StorageError, message)
    }

    /// Unexpected internal failure
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Get the HTTP status suggested for this error
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

/// Convenience alias used by registry and store signatures
pub type AppResult<T> = Result<T, AppError>;
