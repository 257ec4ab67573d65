// src/core/errors.rs

//! Defines the primary error type for the entire application.

use std::sync::Arc;
use thiserror::Error;

/// The main error enum, representing all possible failures within the server.
/// Using `thiserror` allows for clean error definitions and automatic `From` trait implementations.
///
/// Variants map 1:1 onto the error taxonomy: not-enabled, permission-denied,
/// not-found, validation, conflict, version-skew, transient, internal.
#[derive(Error, Debug)]
pub enum OrchError {
    #[error("{0} is not enabled")]
    NotEnabled(String),

    #[error("Permission denied")]
    PermissionDenied,

    #[error("{0} not found")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Cluster not uniformly upgraded for this feature: requires >= {0}")]
    VersionSkew(String),

    #[error("Transient failure: {0}")]
    Transient(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(Arc<std::io::Error>),
}

impl Clone for OrchError {
    fn clone(&self) -> Self {
        match self {
            OrchError::NotEnabled(s) => OrchError::NotEnabled(s.clone()),
            OrchError::PermissionDenied => OrchError::PermissionDenied,
            OrchError::NotFound(s) => OrchError::NotFound(s.clone()),
            OrchError::Validation(s) => OrchError::Validation(s.clone()),
            OrchError::Conflict(s) => OrchError::Conflict(s.clone()),
            OrchError::VersionSkew(s) => OrchError::VersionSkew(s.clone()),
            OrchError::Transient(s) => OrchError::Transient(s.clone()),
            OrchError::Internal(s) => OrchError::Internal(s.clone()),
            OrchError::Io(e) => OrchError::Io(Arc::clone(e)),
        }
    }
}

impl PartialEq for OrchError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (OrchError::NotEnabled(a), OrchError::NotEnabled(b)) => a == b,
            (OrchError::PermissionDenied, OrchError::PermissionDenied) => true,
            (OrchError::NotFound(a), OrchError::NotFound(b)) => a == b,
            (OrchError::Validation(a), OrchError::Validation(b)) => a == b,
            (OrchError::Conflict(a), OrchError::Conflict(b)) => a == b,
            (OrchError::VersionSkew(a), OrchError::VersionSkew(b)) => a == b,
            (OrchError::Transient(a), OrchError::Transient(b)) => a == b,
            (OrchError::Internal(a), OrchError::Internal(b)) => a == b,
            (OrchError::Io(a), OrchError::Io(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}

impl OrchError {
    /// HTTP-compatible numeric code from the error wire format.
    pub fn wire_code(&self) -> u16 {
        match self {
            OrchError::NotEnabled(_) => 400,
            OrchError::Validation(_) => 400,
            OrchError::PermissionDenied => 403,
            OrchError::NotFound(_) => 404,
            OrchError::Conflict(_) => 409,
            OrchError::VersionSkew(_) => 400,
            OrchError::Transient(_) => 503,
            OrchError::Internal(_) => 500,
            OrchError::Io(_) => 500,
        }
    }

    /// Whether a caller may usefully retry this error.
    pub fn is_retryable(&self) -> bool {
        matches!(self, OrchError::Transient(_))
    }
}

impl From<std::io::Error> for OrchError {
    fn from(e: std::io::Error) -> Self {
        OrchError::Io(Arc::new(e))
    }
}

impl From<serde_json::Error> for OrchError {
    fn from(e: serde_json::Error) -> Self {
        OrchError::Internal(format!("serialization error: {e}"))
    }
}

impl From<toml::de::Error> for OrchError {
    fn from(e: toml::de::Error) -> Self {
        OrchError::Internal(format!("config decode error: {e}"))
    }
}

impl From<std::num::ParseIntError> for OrchError {
    fn from(e: std::num::ParseIntError) -> Self {
        OrchError::Validation(format!("not an integer: {e}"))
    }
}

pub type OrchResult<T> = Result<T, OrchError>;
