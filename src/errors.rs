use thiserror::Error;

#[derive(Error, Debug)]
pub enum QaError {
    #[error("{0} is a reserved keyword")]
    ReservedName(String),

    #[error("Unknown member: {0}")]
    UnknownMember(String),

    #[error("Action cannot be completed because hostname is not set")]
    HostnameNotSet,

    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Invalid selector: {0}")]
    InvalidSelector(String),

    #[error("Element not interactable: {0}")]
    ElementNotInteractable(String),

    #[error("Stale element: {0}")]
    StaleElement(String),

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, QaError>;
