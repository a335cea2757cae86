//! Error types for artifact retention

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RetentionError {
    /// A provider naming pattern failed to compile
    #[error("Invalid artifact name pattern: {0}")]
    Pattern(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, RetentionError>;
