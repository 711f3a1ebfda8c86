use thiserror::Error;

pub type Result<T> = std::result::Result<T, NlqError>;

#[derive(Debug, Error)]
pub enum NlqError {
    #[error("invalid pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
    #[error("empty keyword list for {0}")]
    EmptyKeywords(String),
}
