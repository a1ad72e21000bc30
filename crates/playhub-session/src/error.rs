//! Error types for the session layer.

use playhub_protocol::ErrorCode;
use playhub_store::StoreError;

/// Errors from account registration and authentication.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Unknown name or wrong password. Deliberately does not say which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The name is already taken in this account collection.
    #[error("name {0:?} is already registered")]
    UserExists(String),

    /// Password shorter than [`MIN_PASSWORD_LEN`](crate::MIN_PASSWORD_LEN).
    #[error("password too weak")]
    WeakPassword,

    /// Empty (after trimming) account name.
    #[error("invalid account name")]
    InvalidName,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// The boundary code reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::InvalidCredentials => ErrorCode::InvalidCredentials,
            Self::UserExists(_) => ErrorCode::UserExists,
            Self::WeakPassword => ErrorCode::WeakPassword,
            Self::InvalidName => ErrorCode::BadRequest,
            Self::Store(_) => ErrorCode::Internal,
        }
    }
}
