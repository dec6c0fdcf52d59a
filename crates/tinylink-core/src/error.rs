use crate::shortcode::ShortCode;
use thiserror::Error;

/// Result type for storage and engine operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors produced by repositories and the link engine.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// The original URL is already stored under `code`.
    #[error("url already shortened as {code}")]
    DuplicateUrl { code: ShortCode },
    #[error("short code not found: {0}")]
    NotFound(ShortCode),
    #[error("short code has been deleted: {0}")]
    AlreadyDeleted(ShortCode),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("no free short code after {attempts} attempts")]
    CodeExhausted { attempts: usize },
    #[error("storage operation failed: {0}")]
    Operation(String),
}

/// The kinds of failure a caller has to tell apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    DuplicateUrl,
    NotFound,
    AlreadyDeleted,
    InvalidInput,
    BackendUnavailable,
}

impl StorageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::DuplicateUrl { .. } => ErrorKind::DuplicateUrl,
            StorageError::NotFound(_) => ErrorKind::NotFound,
            StorageError::AlreadyDeleted(_) => ErrorKind::AlreadyDeleted,
            StorageError::InvalidInput(_) => ErrorKind::InvalidInput,
            StorageError::Unavailable(_)
            | StorageError::Timeout(_)
            | StorageError::Query(_)
            | StorageError::InvalidData(_)
            | StorageError::CodeExhausted { .. }
            | StorageError::Operation(_) => ErrorKind::BackendUnavailable,
        }
    }
}

impl From<CoreError> for StorageError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => StorageError::InvalidData(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_failures_collapse_to_one_kind() {
        let errors = [
            StorageError::Unavailable("down".into()),
            StorageError::Timeout("slow".into()),
            StorageError::Query("bad".into()),
            StorageError::InvalidData("junk".into()),
            StorageError::CodeExhausted { attempts: 3 },
            StorageError::Operation("panic".into()),
        ];

        for err in errors {
            assert_eq!(err.kind(), ErrorKind::BackendUnavailable, "{err}");
        }
    }

    #[test]
    fn duplicate_carries_existing_code() {
        let code = ShortCode::new_unchecked("AAAAAAAA");
        let err = StorageError::DuplicateUrl { code: code.clone() };

        assert_eq!(err.kind(), ErrorKind::DuplicateUrl);
        assert_eq!(err.to_string(), "url already shortened as AAAAAAAA");
    }
}
