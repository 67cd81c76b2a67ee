//! Error types for the drive_mirror crate.

use thiserror::Error;

/// Errors that can occur when mirroring Google Drive folders.
#[derive(Error, Debug)]
pub enum DriveError {
    #[error("Authentication failed: {0}")]
    AuthenticationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid URL or ID: {0}")]
    InvalidUrlOrId(String),

    #[error("JWT encoding error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Token refresh failed: {0}")]
    TokenRefreshError(String),

    #[error("Authorization flow failed: {0}")]
    AuthorizationFlow(String),

    #[error("No valid folder IDs found")]
    NoFolderIds,

    #[error("Folder {folder_id} exceeds the maximum depth of {max_depth}")]
    DepthLimit { folder_id: String, max_depth: usize },

    #[error("Folder {0} was already visited in this tree")]
    CycleDetected(String),
}

/// Result type alias for DriveError.
pub type Result<T> = std::result::Result<T, DriveError>;
