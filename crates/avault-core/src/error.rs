use thiserror::Error;

pub type UploadResult<T> = Result<T, UploadError>;

/// Failure reported by the remote file host.
///
/// `transient` errors (network, timeout, server unavailable) are eligible for
/// retry; anything else (auth, permission, request rejected) aborts the upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    pub transient: bool,
    pub message: String,
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = if self.transient { "transient" } else { "fatal" };
        write!(f, "{kind} transport error: {}", self.message)
    }
}

impl std::error::Error for TransportError {}

impl TransportError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self {
            transient: true,
            message: message.into(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            transient: false,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    /// Malformed input: empty avatar, wrong-size key, corrupt sealed framing
    #[error("validation error: {0}")]
    Validation(String),

    /// Cipher initialization or authentication failed because of key material
    #[error("key error: {0}")]
    Key(String),

    /// Stream operation called out of order (produce after finish, double finish)
    #[error("state error: {0}")]
    State(String),

    #[error(transparent)]
    Transport(TransportError),

    #[error("upload failed after {attempts} attempts: {last}")]
    ExhaustedRetries { attempts: u32, last: TransportError },

    /// Produced ciphertext length disagrees with the declared length
    #[error("internal encoding error: {0}")]
    InternalEncoding(String),

    #[error("upload cancelled before completion")]
    Cancelled,

    #[error("upload worker failed: {0}")]
    Worker(String),
}

impl UploadError {
    /// Only transient transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, UploadError::Transport(e) if e.transient)
    }
}

impl From<TransportError> for UploadError {
    fn from(e: TransportError) -> Self {
        UploadError::Transport(e)
    }
}
