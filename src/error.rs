use std::path::PathBuf;

use serde_json::Value;

/// Errors returned by the Darwin client.
///
/// The first group mirrors the failure conditions the Darwin API signals
/// through status codes and error bodies. The rest wraps the transport,
/// filesystem and decoding failures underneath.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The server answered 401 for the request.
    #[error("unauthorized: the API key is missing, invalid or lacks access to this team")]
    Unauthorized,

    /// A resource (URL or dataset identifier) does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The team has no storage left for the upload.
    #[error("insufficient remaining storage for this team")]
    InsufficientStorage,

    /// The token-info endpoint rejected the API key.
    #[error("invalid login: the API key was rejected by the server")]
    InvalidLogin,

    /// No configuration file exists at the given path.
    #[error("missing configuration file: {}", .0.display())]
    MissingConfig(PathBuf),

    /// A dataset with the requested name already exists.
    #[error("name already taken: {0}")]
    NameTaken(String),

    /// The server refused the payload; carries the raw error body.
    #[error("validation failed: {0}")]
    ValidationError(Value),

    #[error("invalid dataset identifier `{0}` (expected `team/slug:version`)")]
    InvalidIdentifier(String),

    #[error("API key cannot be sent as an HTTP header value")]
    InvalidApiKey,

    #[error("no team given and no default team configured")]
    NoTeam,

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("release {0} is not available for download yet")]
    ReleaseUnavailable(String),

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("failed to serialize configuration: {0}")]
    ConfigWrite(#[from] toml::ser::Error),

    #[error("invalid export timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
}

pub type Result<T> = std::result::Result<T, Error>;
