use thiserror::Error;

pub type EnvsealResult<T> = Result<T, EnvsealError>;

#[derive(Debug, Error)]
pub enum EnvsealError {
    #[error("secure random generator unavailable: {0}")]
    RandomUnavailable(String),

    #[error("key '{label}' unavailable: {reason}")]
    KeyUnavailable { label: String, reason: String },

    #[error("key derivation failed: {0}")]
    KeyDerivationFailed(String),

    #[error("authentication failed: envelope tag mismatch")]
    AuthenticationFailed,

    #[error("unknown scheme version {0:03}")]
    UnknownSchemeVersion(u16),

    #[error("scheme version {found:03} is below the required minimum {minimum:03}")]
    VersionBelowMinimum { found: u16, minimum: u16 },

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl EnvsealError {
    pub fn key_unavailable(label: &str, reason: impl std::fmt::Display) -> Self {
        Self::KeyUnavailable {
            label: label.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn malformed(reason: impl std::fmt::Display) -> Self {
        Self::MalformedEnvelope(reason.to_string())
    }
}
