//! Pagination error taxonomy / 分页错误类型
//!
//! An empty result set is not an error: it is returned as an empty `Page`.

use thiserror::Error;

/// Errors surfaced by the pagination engine / 分页引擎错误
#[derive(Debug, Error)]
pub enum PagerError {
    /// Bad caller input: limit, sort field, facet keys or values.
    #[error("validation error: {0}")]
    Validation(String),

    /// The cursor token could not be decoded or was minted for another query.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// The underlying store call failed. Propagated unchanged, never retried.
    #[error("upstream query error: {0}")]
    Upstream(#[from] sqlx::Error),
}

impl PagerError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_cursor(msg: impl Into<String>) -> Self {
        Self::InvalidCursor(msg.into())
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    pub fn is_invalid_cursor(&self) -> bool {
        matches!(self, Self::InvalidCursor(_))
    }
}

pub type Result<T> = std::result::Result<T, PagerError>;
