use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum SyncError {
    #[error("invalid package name: {0:?}")]
    InvalidPackageName(String),

    #[error("failed to read manifest at {0}")]
    ManifestRead(PathBuf),

    #[error("failed to parse manifest: {0}")]
    ManifestParse(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to decode metadata store at {key}: {message}")]
    StoreDecode { key: String, message: String },

    #[error("failed to encode metadata store: {0}")]
    StoreEncode(String),

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("object store request failed: {0}")]
    ObjectStoreHttp(String),

    #[error("object store returned status {status}: {message}")]
    ObjectStoreStatus { status: u16, message: String },

    #[error("registry request failed: {0}")]
    RegistryHttp(String),

    #[error("registry returned status {status}: {message}")]
    RegistryStatus { status: u16, message: String },

    #[error("GitHub request failed: {0}")]
    TopicsHttp(String),

    #[error("GitHub returned status {status}: {message}")]
    TopicsStatus { status: u16, message: String },

    #[error("unexpected GitHub response: {0}")]
    TopicsResponse(String),

    #[error("repository url does not name an org/repo pair: {0}")]
    UnrecognizedRepositoryUrl(String),
}
