use thiserror::Error;

/// Errors at the remote-chat boundary.
#[derive(Debug, Error)]
pub enum ChatError {
    /// The remote identity is rejected or blocked. Fatal to the current
    /// turn; the message is surfaced to the user verbatim, no retry.
    #[error("{0}")]
    AccessDenied(String),

    /// The remote endpoint answered with a non-2xx status.
    #[error("upstream API error (status {status}): {message}")]
    Api { status: u16, message: String },

    /// The upstream envelope could not be interpreted. Also covers
    /// malformed throttling counters: quota is throttling-relevant, so a
    /// reply whose quota fields cannot be parsed fails the whole turn.
    #[error("malformed upstream reply: {0}")]
    MalformedReply(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ChatError>;
