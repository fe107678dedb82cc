//! Error types for Google Drive provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Google Drive provider errors
#[derive(Error, Debug)]
pub enum GoogleDriveError {
    /// API request returned an error
    #[error("Google Drive API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Rate limit still exceeded after retrying
    #[error("Rate limit exceeded after {attempts} attempts")]
    RateLimitExceeded { attempts: u32 },

    /// File not found
    #[error("File not found: {file_id}")]
    FileNotFound { file_id: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Google Drive operations
pub type Result<T> = std::result::Result<T, GoogleDriveError>;

impl From<GoogleDriveError> for BridgeError {
    fn from(error: GoogleDriveError) -> Self {
        match error {
            GoogleDriveError::ApiError {
                status_code,
                message,
            } => BridgeError::Status {
                status: status_code,
                message,
            },
            GoogleDriveError::RateLimitExceeded { attempts } => BridgeError::Status {
                status: 429,
                message: format!("Rate limit exceeded after {} attempts", attempts),
            },
            GoogleDriveError::FileNotFound { file_id } => BridgeError::NotFound(file_id),
            GoogleDriveError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            GoogleDriveError::BridgeError(e) => e,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let error = GoogleDriveError::ApiError {
            status_code: 403,
            message: "Insufficient permissions".to_string(),
        };

        assert_eq!(
            error.to_string(),
            "Google Drive API error (status 403): Insufficient permissions"
        );
    }

    #[test]
    fn test_error_conversion() {
        let bridge_error: BridgeError = GoogleDriveError::FileNotFound {
            file_id: "abc123".to_string(),
        }
        .into();
        assert!(matches!(bridge_error, BridgeError::NotFound(ref id) if id == "abc123"));

        let bridge_error: BridgeError = GoogleDriveError::ApiError {
            status_code: 500,
            message: "backend".to_string(),
        }
        .into();
        assert_eq!(bridge_error.status(), Some(500));

        let bridge_error: BridgeError = GoogleDriveError::RateLimitExceeded { attempts: 3 }.into();
        assert_eq!(bridge_error.status(), Some(429));
    }
}
