//! Error types for chain connectivity

/// Errors that can occur during chain operations
#[derive(Debug)]
pub enum ChainError {
    RpcError(String),
    EventParseError { reason: String },
    InvalidConfig(String),
}

impl std::fmt::Display for ChainError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChainError::RpcError(msg) => write!(f, "RPC error: {}", msg),
            ChainError::EventParseError { reason } => write!(f, "Event parse error: {}", reason),
            ChainError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ChainError {}
