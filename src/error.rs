/// Result alias used throughout the audio core.
pub type Result<T> = std::result::Result<T, AudioError>;

/// Failures the audio core can surface to the UI layer.
///
/// Decode and permission failures leave existing state untouched; the caller
/// decides whether to retry.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Malformed or unsupported audio bytes.
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// Capture access was denied by the host.
    #[error("input access denied: {0}")]
    Permission(String),
    /// No usable capture device, or the device rejected our stream config.
    #[error("capture device error: {0}")]
    Device(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AudioError {
    pub fn decode<T: Into<String>>(msg: T) -> Self {
        Self::Decode(msg.into())
    }
}
