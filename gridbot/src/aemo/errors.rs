use thiserror::Error;

#[derive(Error, Debug)]
pub enum AemoError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status code {0} from AEMO")]
    Status(u16),
}
