//! Error types for redfish-collector
//!
//! Configuration errors live in [`crate::config::ConfigError`]; this module
//! covers resolution, connection, fetch and polling errors.

use thiserror::Error;

/// Name resolution error
#[derive(Error, Debug)]
pub enum ResolveError {
    /// A service lists a query name that is not defined
    #[error("Service \"{service}\" references unknown query \"{query}\"")]
    UnresolvedQuery { service: String, query: String },
}

/// Connection handle creation error
#[derive(Error, Debug)]
pub enum ConnectError {
    /// Host is not a usable URL
    #[error("Invalid host '{host}': {reason}")]
    InvalidHost { host: String, reason: String },

    /// HTTP client could not be built
    #[error("Failed to initialize HTTP client: {0}")]
    HttpClientInit(#[source] reqwest::Error),
}

/// Fetch error for a single query
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    HttpRequest(#[source] reqwest::Error),

    /// Failed reading the response body
    #[error("Failed to read HTTP response: {0}")]
    HttpResponse(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("HTTP error status: {0}")]
    HttpStatus(u16),

    /// Body is not valid JSON
    #[error("JSON parse error: {0}")]
    JsonParse(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Could not reach the host
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Handle was closed before the fetch was issued
    #[error("Connection closed")]
    Closed,
}

impl FetchError {
    /// HTTP status code, when the server answered
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FetchError::HttpStatus(code) => Some(*code),
            FetchError::HttpRequest(e) | FetchError::HttpResponse(e) => {
                e.status().map(|s| s.as_u16())
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_connect() {
            FetchError::ConnectionFailed(err.to_string())
        } else if err.is_request() {
            FetchError::HttpRequest(err)
        } else {
            FetchError::HttpResponse(err)
        }
    }
}

/// Initialization error
#[derive(Error, Debug)]
pub enum InitError {
    /// Query name resolution failed
    #[error("Resolution failed: {0}")]
    Resolve(#[from] ResolveError),

    /// Every configured service failed to connect
    #[error("None of the {0} configured services could be connected")]
    NoConnections(usize),
}

/// Polling cycle error
#[derive(Error, Debug)]
pub enum PollError {
    /// Called outside a Tokio runtime
    #[error("No async runtime available to issue fetches")]
    NoRuntime,
}

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] crate::config::ConfigError),

    /// Initialization error
    #[error("Initialization error: {0}")]
    Init(#[from] InitError),

    /// Polling error
    #[error("Poll error: {0}")]
    Poll(#[from] PollError),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;
