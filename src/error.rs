use thiserror::Error;

use crate::config::ConfigError;
use crate::dom::DomError;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("environment is missing required member `{member}`")]
    Configuration { member: String },
    #[error("invalid base URL: {0}")]
    InvalidBaseUrl(#[from] url::ParseError),
    #[error("script {filename} failed: {message}")]
    Script { filename: String, message: String },
    #[error("QuickJS error: {0}")]
    Engine(String),
    #[error("DOM error: {0}")]
    Dom(#[from] DomError),
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl From<rquickjs::Error> for BridgeError {
    fn from(err: rquickjs::Error) -> Self {
        Self::Engine(err.to_string())
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
