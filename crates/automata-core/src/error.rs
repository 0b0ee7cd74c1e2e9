use thiserror::Error;

#[derive(Debug, Error)]
pub enum AutomataError {
    // Engine errors
    #[error("Node not found: {0}")]
    NotFound(String),

    #[error("Node {node} is missing required config: {field}")]
    MissingConfig { node: String, field: String },

    #[error("Classifier returned an invalid verdict: {0}")]
    ClassifierContractViolation(String),

    #[error("Classifier request failed: {0}")]
    ClassifierRequest(String),

    #[error("Relay failure: {0}")]
    RelayFailure(String),

    // Graph editing errors
    #[error("Invalid workflow: {0}")]
    InvalidWorkflow(String),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // Trigger source errors
    #[error("Trigger source error: {source_name}: {message}")]
    Trigger { source_name: String, message: String },

    // Runtime errors
    #[error("Background task failed: {0}")]
    Task(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AutomataError {
    pub fn missing_config(node: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingConfig {
            node: node.into(),
            field: field.into(),
        }
    }

    /// Whether this error only ends the current branch without marking a node failed.
    pub fn is_silent(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, AutomataError>;
