use engage_sdk::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("{0}")]
    InvalidConfiguration(String),
    #[error("Channel {0} is not supported by Bloomreach provider.")]
    UnsupportedChannel(String),
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl ProviderError {
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ProviderError::InvalidConfiguration(message.into())
    }
}
