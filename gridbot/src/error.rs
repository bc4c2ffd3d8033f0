use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {reason}")]
    InvalidValue { key: &'static str, reason: String },

    #[error("failed to parse credentials: {0}")]
    Credentials(#[from] serde_json::Error),

    #[error("unknown region in configuration: {0}")]
    UnknownRegion(String),

    #[error("duplicate credentials for region {0}")]
    DuplicateRegion(String),

    #[error("MASTODON_SERVER must be set unless TEST_MODE is enabled")]
    MissingServer,
}
