//! Error types for portroute

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PortrouteError {
    #[error("Unsupported compose version: {0}")]
    UnsupportedVersion(String),

    #[error("Malformed compose document: {0}")]
    MalformedDocument(String),

    #[error("No more ports available: probing from {start} exceeded 65535")]
    PortExhaustion { start: u32 },

    #[error("Not implemented: {0}")]
    NotImplemented(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Container runtime error: {0}")]
    Runtime(String),

    #[error("Process error: {0}")]
    Process(String),

    #[error("Unresolved route: {0}")]
    UnresolvedRoute(String),

    #[error("Invalid route name: {0}")]
    InvalidRouteName(String),

    #[error("Duplicate route: {0}")]
    DuplicateRoute(String),

    #[error("Naming error: {0}")]
    Naming(String),
}

pub type Result<T> = std::result::Result<T, PortrouteError>;
