use thiserror::Error;

pub type Result<T> = std::result::Result<T, NetworkError>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum NetworkError {
    #[error("Malformed message: {0}")]
    MalformedMessage(String),
    #[error("Unknown subject: {0}")]
    UnknownSubject(String),
    #[error("\"{0}\" is not an available sensor id")]
    NotFound(String),
    #[error("Sensor of type \"{0}\" is not supported")]
    UnsupportedSensorType(String),
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Observer error: {0}")]
    Observer(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl NetworkError {
    /// Errors that only ever cost a single dropped event.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedMessage(_) | Self::UnknownSubject(_))
    }
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::Transport(err.to_string())
    }
}

impl From<serde_json::Error> for NetworkError {
    fn from(err: serde_json::Error) -> Self {
        NetworkError::Serialization(err.to_string())
    }
}
