//! Error types for Clipcast

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClipcastError>;

#[derive(Error, Debug)]
pub enum ClipcastError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Clippings error: {0}")]
    Clippings(#[from] ClippingError),

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Platform error: {0}")]
    Platform(#[from] PlatformError),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("There is no unprocessed clipping!")]
    NoUnprocessed,
}

impl ClipcastError {
    /// Returns the appropriate exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            ClipcastError::InvalidInput(_) => 3,
            ClipcastError::NoUnprocessed => 3,
            ClipcastError::Clippings(_) => 3,
            ClipcastError::Platform(PlatformError::Authentication(_)) => 2,
            ClipcastError::Platform(_) => 1,
            ClipcastError::Config(_) => 1,
            ClipcastError::Ledger(_) => 1,
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid duration for {field}: {value}")]
    InvalidDuration { field: String, value: String },
}

#[derive(Error, Debug)]
pub enum ClippingError {
    #[error("Failed to read clippings file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Clipping has no blank line between header and quote: {0:?}")]
    MissingBody(String),

    #[error("Clipping header must have a title line and a metadata line: {0:?}")]
    MalformedHeader(String),

    #[error("Could not find title and author in {0:?}")]
    TitleLine(String),

    #[error("Could not find location and date in {0:?}")]
    MetadataLine(String),

    #[error("Could not parse highlight date {0:?}")]
    Date(String),
}

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Trying to add clipping to ledger but there's already an entry for it. Clipping id: {0}")]
    AlreadyProcessed(String),
}

#[derive(Error, Debug, Clone)]
pub enum PlatformError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Content validation failed: {0}")]
    Validation(String),

    #[error("Posting failed: {0}")]
    Posting(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimit(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_invalid_input() {
        let error = ClipcastError::InvalidInput("No handles given".to_string());
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_no_unprocessed() {
        assert_eq!(ClipcastError::NoUnprocessed.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_clipping_error() {
        let error = ClipcastError::Clippings(ClippingError::Date("Someday".to_string()));
        assert_eq!(error.exit_code(), 3);
    }

    #[test]
    fn test_exit_code_authentication_error() {
        let platform_error = PlatformError::Authentication("Bad token".to_string());
        let error = ClipcastError::Platform(platform_error);
        assert_eq!(error.exit_code(), 2);
    }

    #[test]
    fn test_exit_code_other_platform_errors() {
        for platform_error in [
            PlatformError::Validation("test".to_string()),
            PlatformError::Posting("test".to_string()),
            PlatformError::Network("test".to_string()),
            PlatformError::RateLimit("test".to_string()),
            PlatformError::NotFound("test".to_string()),
        ] {
            let error = ClipcastError::Platform(platform_error);
            assert_eq!(error.exit_code(), 1, "{} should exit with code 1", error);
        }
    }

    #[test]
    fn test_exit_code_ledger_error() {
        let error = ClipcastError::Ledger(LedgerError::AlreadyProcessed("x".to_string()));
        assert_eq!(error.exit_code(), 1);
    }

    #[test]
    fn test_no_unprocessed_message() {
        assert_eq!(
            ClipcastError::NoUnprocessed.to_string(),
            "There is no unprocessed clipping!"
        );
    }

    #[test]
    fn test_error_message_formatting_platform() {
        let error = ClipcastError::Platform(PlatformError::RateLimit(
            "Too many requests".to_string(),
        ));
        assert_eq!(
            error.to_string(),
            "Platform error: Rate limit exceeded: Too many requests"
        );
    }

    #[test]
    fn test_already_processed_includes_id() {
        let error = LedgerError::AlreadyProcessed("Dune - Frank Herbert - 1-2".to_string());
        let message = error.to_string();
        assert!(message.contains("already an entry"));
        assert!(message.contains("Dune - Frank Herbert - 1-2"));
    }

    #[test]
    fn test_config_error_invalid_duration() {
        let error = ConfigError::InvalidDuration {
            field: "pacing.action_delay".to_string(),
            value: "soon".to_string(),
        };
        assert_eq!(
            error.to_string(),
            "Invalid duration for pacing.action_delay: soon"
        );
    }

    #[test]
    fn test_error_conversion_from_platform_error() {
        let platform_error = PlatformError::Posting("test".to_string());
        let clipcast_error: ClipcastError = platform_error.into();

        match clipcast_error {
            ClipcastError::Platform(_) => {}
            _ => panic!("Expected ClipcastError::Platform"),
        }
    }

    #[test]
    fn test_platform_error_clone() {
        // Retry logic holds on to the last error between attempts
        let original = PlatformError::Network("Connection failed".to_string());
        let cloned = original.clone();

        assert_eq!(format!("{}", original), format!("{}", cloned));
    }
}
