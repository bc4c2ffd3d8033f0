use thiserror::Error;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("authentication rejected with status {0}")]
    AuthRejected(u16),

    #[error("status rejected with status {0}")]
    StatusRejected(u16),

    #[error("mastodon server is not configured")]
    NotConfigured,
}
