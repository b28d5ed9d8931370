//! Error types for voxlink.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoxlinkError {
    // Configuration errors
    #[error("Configuration file not found at {path}")]
    ConfigFileNotFound { path: String },

    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("Missing API credential: environment variable {var} is not set")]
    MissingCredential { var: String },

    // Audio capture errors
    #[error("Audio device not found: {device}")]
    AudioDeviceNotFound { device: String },

    #[error("Audio capture failed: {message}")]
    AudioCapture { message: String },

    // Audio playback errors
    #[error("Audio playback failed: {message}")]
    Playback { message: String },

    #[error("Playback source not found: {id}")]
    SourceNotFound { id: u64 },

    // Wire codec errors
    #[error("Audio payload decode failed: {message}")]
    Decode { message: String },

    // Remote session errors
    #[error("Failed to open live session: {message}")]
    SessionOpen { message: String },

    #[error("Live session transport error: {message}")]
    Transport { message: String },

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, VoxlinkError>;
