use std::path::PathBuf;
use thiserror::Error;

/// Failure to obtain an authorization handle.
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("Failed to read credentials from {path:?}: {source}")]
    Credentials {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to build authenticator: {0}")]
    Authenticator(#[source] std::io::Error),

    #[error("Failed to get token: {0}")]
    Token(String),

    #[error("Failed to locate token cache: {0}")]
    TokenCache(String),
}

/// Failure reported by the underlying Sheets API for a single call.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Unknown method '{method}' on collection '{collection}'")]
    UnknownMethod {
        collection: &'static str,
        method: String,
    },

    #[error("Missing required parameter '{0}'")]
    MissingParameter(String),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Sheets API request failed: {0}")]
    Client(#[source] google_sheets4::Error),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Request finished without a response")]
    Abandoned,
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("OAuth2 authentication error: {0}")]
    Auth(#[from] AuthorizationError),

    #[error("Google Sheets API error: {0}")]
    Sheets(#[from] RequestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<google_sheets4::Error> for RequestError {
    /// Surface Google's own error message and status where the API sent one.
    fn from(err: google_sheets4::Error) -> Self {
        match err {
            google_sheets4::Error::BadRequest(body) => {
                let error = &body["error"];
                let status = error["code"]
                    .as_u64()
                    .and_then(|code| u16::try_from(code).ok())
                    .unwrap_or(400);
                let message = match error["message"].as_str() {
                    Some(message) => message.to_string(),
                    None => body.to_string(),
                };
                RequestError::Api { status, message }
            }
            google_sheets4::Error::Failure(response) => {
                let status = response.status();
                RequestError::Api {
                    status: status.as_u16(),
                    message: status
                        .canonical_reason()
                        .unwrap_or("Request failed")
                        .to_string(),
                }
            }
            other => RequestError::Client(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
