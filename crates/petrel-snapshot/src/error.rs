use thiserror::Error;

pub type Result<T> = std::result::Result<T, SnapshotError>;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("unexpected end of state stream (wanted {wanted} more bytes, {remaining} left)")]
    UnexpectedEof { wanted: usize, remaining: usize },

    #[error("marker mismatch: expected {expected:?}, found {found:?}")]
    MarkerMismatch {
        expected: &'static str,
        found: String,
    },

    #[error("corrupt state stream: {0}")]
    Corrupt(&'static str),

    #[error("string field is not valid UTF-8")]
    InvalidUtf8,
}
