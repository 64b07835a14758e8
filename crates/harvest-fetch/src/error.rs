use thiserror::Error;

pub type Result<T> = std::result::Result<T, FetchError>;

/// A single page, detail or asset fetch failed.
///
/// Never fatal on its own: the pipeline logs it and the page contributes no
/// records. Only a failed fetch of page 1 escalates it into a discovery failure.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("failed to read body of {url}: {message}")]
    Body { url: String, message: String },

    #[error("invalid url '{0}'")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl FetchError {
    /// URL the failure refers to, when there is one.
    #[must_use]
    pub fn url(&self) -> Option<&str> {
        match self {
            Self::Transport { url, .. } | Self::Status { url, .. } | Self::Body { url, .. } => {
                Some(url)
            }
            Self::InvalidUrl(url) => Some(url),
            Self::Io(_) => None,
        }
    }
}
