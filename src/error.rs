use std::fmt;

/// Result type for ship_dqn operations
pub type Result<T> = std::result::Result<T, ShipError>;

/// Main error type for the agent
#[derive(Debug, Clone, PartialEq)]
pub enum ShipError {
    /// Bad construction input: input shape, hyperparameter out of range
    Configuration {
        name: String,
        reason: String,
    },

    /// Sampling asked for more transitions than the buffer holds
    InsufficientData {
        requested: usize,
        available: usize,
    },

    /// Missing, corrupt or incompatible checkpoint file
    Checkpoint(String),

    /// Invalid dimensions for a per-call tensor
    DimensionMismatch {
        expected: String,
        actual: String,
    },

    /// Invalid action
    InvalidAction {
        action: usize,
        max_actions: usize,
    },

    /// Training error, e.g. a backward pass without a preceding forward pass
    Training(String),

    /// IO errors (file operations)
    Io(String),

    /// Serialization/deserialization errors
    Serialization(String),
}

impl fmt::Display for ShipError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipError::Configuration { name, reason } => {
                write!(f, "Configuration error in '{}': {}", name, reason)
            }
            ShipError::InsufficientData { requested, available } => {
                write!(
                    f,
                    "Insufficient data: requested {} transitions, buffer holds {}",
                    requested, available
                )
            }
            ShipError::Checkpoint(msg) => write!(f, "Checkpoint error: {}", msg),
            ShipError::DimensionMismatch { expected, actual } => {
                write!(f, "Dimension mismatch: expected {}, got {}", expected, actual)
            }
            ShipError::InvalidAction { action, max_actions } => {
                write!(f, "Invalid action {}: must be less than {}", action, max_actions)
            }
            ShipError::Training(msg) => write!(f, "Training error: {}", msg),
            ShipError::Io(msg) => write!(f, "IO error: {}", msg),
            ShipError::Serialization(msg) => write!(f, "Serialization error: {}", msg),
        }
    }
}

impl std::error::Error for ShipError {}

impl From<std::io::Error> for ShipError {
    fn from(err: std::io::Error) -> Self {
        ShipError::Io(err.to_string())
    }
}

impl From<bincode::Error> for ShipError {
    fn from(err: bincode::Error) -> Self {
        ShipError::Serialization(err.to_string())
    }
}

impl From<ndarray::ShapeError> for ShipError {
    fn from(err: ndarray::ShapeError) -> Self {
        ShipError::DimensionMismatch {
            expected: "compatible array shapes".to_string(),
            actual: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ShipError {
    fn from(err: serde_json::Error) -> Self {
        ShipError::Serialization(err.to_string())
    }
}

// Helper functions for common error patterns
impl ShipError {
    pub fn configuration<S: Into<String>>(name: S, reason: S) -> Self {
        ShipError::Configuration {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn dimension_mismatch<S: Into<String>>(expected: S, actual: S) -> Self {
        ShipError::DimensionMismatch {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    pub fn checkpoint<S: Into<String>>(msg: S) -> Self {
        ShipError::Checkpoint(msg.into())
    }
}
