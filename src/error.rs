//! Error types for pendant.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PendantError {
    // Storage errors (peripheral side)
    #[error("Chunk storage error: {message}")]
    Storage { message: String },

    #[error("Corrupt chunk file {path}: {message}")]
    CorruptChunk { path: String, message: String },

    // Wire protocol errors
    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("Checksum mismatch for chunk ts={timestamp}: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        timestamp: u32,
        expected: u32,
        actual: u32,
    },

    // Transport errors
    #[error("Transport error: {message}")]
    Transport { message: String },

    // Codec errors
    #[error("Codec error: {message}")]
    Codec { message: String },

    // Audio file errors
    #[error("Audio file error: {message}")]
    Audio { message: String },

    // Stitching with no detected speech anywhere in the conversation
    #[error("Conversation has no speech-bearing chunks")]
    NoSpeech,

    // Configuration errors
    #[error("Invalid configuration value for {key}: {message}")]
    ConfigInvalidValue { key: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    // General I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Generic error for cases not covered above
    #[error("{0}")]
    Other(String),
}

// Type alias for convenience
pub type Result<T> = std::result::Result<T, PendantError>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_storage_display() {
        let error = PendantError::Storage {
            message: "disk full".to_string(),
        };
        assert_eq!(error.to_string(), "Chunk storage error: disk full");
    }

    #[test]
    fn test_checksum_mismatch_display() {
        let error = PendantError::ChecksumMismatch {
            timestamp: 1700000000,
            expected: 0xdeadbeef,
            actual: 0x0000beef,
        };
        let s = error.to_string();
        assert!(s.contains("ts=1700000000"));
        assert!(s.contains("0xdeadbeef"));
        assert!(s.contains("0x0000beef"));
    }

    #[test]
    fn test_protocol_display() {
        let error = PendantError::Protocol {
            message: "packet too short".to_string(),
        };
        assert_eq!(error.to_string(), "Protocol error: packet too short");
    }

    #[test]
    fn test_no_speech_display() {
        assert_eq!(
            PendantError::NoSpeech.to_string(),
            "Conversation has no speech-bearing chunks"
        );
    }

    #[test]
    fn test_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let error: PendantError = io_error.into();
        assert!(error.to_string().contains("file not found"));
    }

    #[test]
    fn test_from_toml_error() {
        let toml_error = toml::from_str::<toml::Value>("invalid = toml = syntax").unwrap_err();
        let error: PendantError = toml_error.into();
        assert!(error.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_error_source_chain_io() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let error: PendantError = io_error.into();
        let error_trait: &dyn std::error::Error = &error;
        assert!(error_trait.source().is_some());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<PendantError>();
        assert_sync::<PendantError>();
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_result() -> Result<i32> {
            Ok(42)
        }
        assert_eq!(returns_result().unwrap(), 42);
    }
}
