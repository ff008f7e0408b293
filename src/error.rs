/// Error type returned while assembling or inspecting an [x-vector](crate::XVector) model.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum XVectorError {
    /// The model configuration or a layer lookup is invalid.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The logger could not be installed.
    #[error("logger error: {0}")]
    Logger(String),
}

impl XVectorError {
    pub(crate) fn configuration(msg: impl Into<String>) -> Self {
        let msg = msg.into();
        log::warn!("Rejected x-vector configuration: {msg}");
        Self::Configuration(msg)
    }
}

/// Result alias used across the crate.
pub type Result<T> = core::result::Result<T, XVectorError>;
