//! LCD-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, PanelError>;

/// Top-level error type for the panel.
#[derive(Debug, Error)]
pub enum PanelError {
    #[error("[LCD-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LCD-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LCD-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LCD-1004] invalid menu item at {location}: {details}")]
    InvalidMenu { location: String, details: String },

    #[error("[LCD-2001] unknown stat method: {name:?}")]
    UnknownStatMethod { name: String },

    #[error("[LCD-2002] command failed ({command}): {details}")]
    CommandFailure { command: String, details: String },

    #[error("[LCD-2003] command timed out after {timeout_ms}ms: {command}")]
    CommandTimeout { command: String, timeout_ms: u64 },

    #[error("[LCD-2004] stat {stat} unavailable: {details}")]
    StatUnavailable {
        stat: &'static str,
        details: String,
    },

    #[error("[LCD-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LCD-3001] input device failure: {details}")]
    InputDevice { details: String },

    #[error("[LCD-3002] display failure: {details}")]
    Display { details: String },

    #[error("[LCD-3003] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LCD-3004] channel closed in component {component}")]
    ChannelClosed { component: &'static str },

    #[error("[LCD-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl PanelError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LCD-1001",
            Self::MissingConfig { .. } => "LCD-1002",
            Self::ConfigParse { .. } => "LCD-1003",
            Self::InvalidMenu { .. } => "LCD-1004",
            Self::UnknownStatMethod { .. } => "LCD-2001",
            Self::CommandFailure { .. } => "LCD-2002",
            Self::CommandTimeout { .. } => "LCD-2003",
            Self::StatUnavailable { .. } => "LCD-2004",
            Self::Serialization { .. } => "LCD-2101",
            Self::InputDevice { .. } => "LCD-3001",
            Self::Display { .. } => "LCD-3002",
            Self::Io { .. } => "LCD-3003",
            Self::ChannelClosed { .. } => "LCD-3004",
            Self::Runtime { .. } => "LCD-3900",
        }
    }

    /// Whether the failure must stop the process.
    ///
    /// Only configuration-time structural errors are fatal; everything raised
    /// while the panel is running is rendered or logged and the loop continues.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::MissingConfig { .. }
                | Self::ConfigParse { .. }
                | Self::InvalidMenu { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for PanelError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for PanelError {
    fn from(value: serde_yaml::Error) -> Self {
        Self::ConfigParse {
            context: "yaml",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for PanelError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_variant() -> Vec<PanelError> {
        vec![
            PanelError::InvalidConfig {
                details: String::new(),
            },
            PanelError::MissingConfig {
                path: PathBuf::new(),
            },
            PanelError::ConfigParse {
                context: "",
                details: String::new(),
            },
            PanelError::InvalidMenu {
                location: String::new(),
                details: String::new(),
            },
            PanelError::UnknownStatMethod {
                name: String::new(),
            },
            PanelError::CommandFailure {
                command: String::new(),
                details: String::new(),
            },
            PanelError::CommandTimeout {
                command: String::new(),
                timeout_ms: 0,
            },
            PanelError::StatUnavailable {
                stat: "",
                details: String::new(),
            },
            PanelError::Serialization {
                context: "",
                details: String::new(),
            },
            PanelError::InputDevice {
                details: String::new(),
            },
            PanelError::Display {
                details: String::new(),
            },
            PanelError::Io {
                path: PathBuf::new(),
                source: std::io::Error::other("test"),
            },
            PanelError::ChannelClosed { component: "" },
            PanelError::Runtime {
                details: String::new(),
            },
        ]
    }

    #[test]
    fn error_codes_are_unique() {
        let errors = every_variant();
        let codes: Vec<&str> = errors.iter().map(PanelError::code).collect();
        let unique: std::collections::HashSet<&&str> = codes.iter().collect();
        assert_eq!(
            codes.len(),
            unique.len(),
            "error codes must be unique: {codes:?}"
        );
    }

    #[test]
    fn error_codes_have_lcd_prefix() {
        for err in &every_variant() {
            assert!(
                err.code().starts_with("LCD-"),
                "code {} must start with LCD-",
                err.code()
            );
        }
    }

    #[test]
    fn error_display_includes_code() {
        let err = PanelError::UnknownStatMethod {
            name: "get_secrets".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("LCD-2001"), "display should contain code: {msg}");
        assert!(msg.contains("get_secrets"), "display should contain name: {msg}");
    }

    #[test]
    fn only_configuration_errors_are_fatal() {
        for err in every_variant() {
            let expected = err.code().starts_with("LCD-10");
            assert_eq!(err.is_fatal(), expected, "fatality mismatch for {}", err.code());
        }
    }

    #[test]
    fn io_convenience_constructor() {
        let err = PanelError::io(
            "/tmp/panel.yaml",
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert_eq!(err.code(), "LCD-3003");
        assert!(err.to_string().contains("/tmp/panel.yaml"));
    }

    #[test]
    fn from_yaml_error() {
        let yaml_err = serde_yaml::from_str::<serde_yaml::Value>("a: [unclosed").unwrap_err();
        let err: PanelError = yaml_err.into();
        assert_eq!(err.code(), "LCD-1003");
    }

    #[test]
    fn from_toml_error() {
        let toml_err = toml::from_str::<toml::Value>("= invalid").unwrap_err();
        let err: PanelError = toml_err.into();
        assert_eq!(err.code(), "LCD-1003");
    }

    #[test]
    fn from_serde_json_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PanelError = json_err.into();
        assert_eq!(err.code(), "LCD-2101");
    }
}
