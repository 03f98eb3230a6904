//! Error types for commandbridge

use thiserror::Error;

/// Errors that can occur while dispatching or relaying commands
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Malformed command definition or bridge configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The command requires a connected actor but was triggered without one
    #[error("Command '{0}' can only be used by a player")]
    ActorRequired(String),

    /// The triggering actor lacks the command's permission node
    #[error("Actor '{actor}' lacks permission '{permission}'")]
    PermissionDenied {
        actor: String,
        permission: String,
    },

    /// The actor never came online within the poll bound
    #[error("Actor {actor} not online after {attempts} attempts")]
    PresenceTimeout {
        actor: String,
        attempts: u32,
    },

    /// Inbound relay message could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Outbound relay message could not be encoded
    #[error("Encode error: {0}")]
    Encode(String),

    /// The actor cannot be resolved on this process
    #[error("Actor unavailable: {0}")]
    ActorUnavailable(String),

    /// Transport refused or failed to hand off a message
    #[error("Transport error: {0}")]
    Transport(String),

    /// Local command execution failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// No tokio runtime to run step tasks on
    #[error("No async runtime available to schedule command steps")]
    NoRuntime,

    /// No live command with this name
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML configuration parse failure
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// YAML script parse failure
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;
