use thiserror::Error;

/// Failure talking to the schedule backend. These never escape the
/// [`crate::ScheduleApi`] boundary; they are logged and turned into empty
/// results there.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request still unauthorized after token refresh")]
    Unauthorized,
    #[error("server responded with status {status}: {message}")]
    Status { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token refresh failed: {0}")]
    TokenRefresh(String),
}
