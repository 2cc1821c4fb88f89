use thiserror::Error;

// === StoreError ===

/// Errors raised by the bookmark store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("Bookmark database error: {0}")]
    DatabaseError(String),
    /// The connection mutex was poisoned by a panicking writer.
    #[error("Bookmark store lock poisoned")]
    LockPoisoned,
    /// A blocking store task was cancelled or panicked.
    #[error("Bookmark store task failed: {0}")]
    TaskFailed(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

// === AuthError ===

/// Errors related to sign-in, sessions and the identity provider.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The sign-in state is unknown, already used, or expired.
    #[error("Invalid or expired sign-in state")]
    InvalidState,
    /// No session matches the presented token.
    #[error("Session not found")]
    SessionNotFound,
    /// The requested provider is not supported.
    #[error("Unsupported identity provider: {0}")]
    UnsupportedProvider(String),
    /// The identity provider rejected the request or returned garbage.
    #[error("Identity provider error: {0}")]
    ProviderError(String),
    /// A network error occurred while talking to the identity provider.
    #[error("Identity provider network error: {0}")]
    NetworkError(String),
    /// Random generation or hashing failed.
    #[error("Auth crypto error: {0}")]
    CryptoError(String),
    /// Database operation failed.
    #[error("Auth database error: {0}")]
    DatabaseError(String),
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        AuthError::DatabaseError(e.to_string())
    }
}

// === ConfigError ===

/// Errors related to loading or saving configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading or writing the config file.
    #[error("Config I/O error: {0}")]
    IoError(String),
    /// Failed to serialize or deserialize the config file.
    #[error("Config serialization error: {0}")]
    SerializationError(String),
    /// A config value is present but unusable.
    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}
