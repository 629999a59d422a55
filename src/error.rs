use std::io;

use camino::Utf8PathBuf;
use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstructionError {
    #[error("empty identifier")]
    Empty,

    #[error("invalid control character in identifier: {0:?}")]
    ControlCharacter(String),

    #[error("missing protocol scheme: {0}")]
    MissingScheme(String),

    #[error("first path segment in url cannot contain colon: {0}")]
    ColonInFirstSegment(String),

    #[error("invalid url escape {escape:?} in {identifier}")]
    InvalidEscape { identifier: String, escape: String },

    #[error("identifier does not decode to valid UTF-8: {0}")]
    InvalidEncoding(String),

    #[error("region information is missing from url: {0}")]
    MissingRegion(String),

    #[error("access_key_id information is missing from url: {0}")]
    MissingAccessKeyId(String),

    #[error("secret_access_key information is missing from url: {0}")]
    MissingSecretAccessKey(String),

    #[error("bucket is missing from url: {0}")]
    MissingBucket(String),

    #[error("object key is missing from url: {0}")]
    MissingObjectKey(String),
}

/// Terminal outcome of a failed open attempt. Stored on the handle and
/// returned unchanged by every later read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error("unsupported url scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("unable to open local file {path}: not found")]
    NotFound { path: String },

    #[error("unable to open local file {path}: permission denied")]
    PermissionDenied { path: String },

    #[error("unable to open local file {path}: is a directory")]
    IsDirectory { path: String },

    #[error("unable to open local file {path}: {message}")]
    Local { path: String, message: String },

    #[error("unable to download {url}: {message}")]
    Http { url: String, message: String },

    #[error("unable to download {url}: server returned status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("invalid location: {0}")]
    InvalidLocation(String),

    #[error("unable to download s3 object {bucket}/{key}: {message}")]
    S3 {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("unable to download s3 object {bucket}/{key}: status {status}: {message}")]
    S3Status {
        bucket: String,
        key: String,
        status: u16,
        message: String,
    },

    #[error("open deadline exceeded")]
    DeadlineExceeded,
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("{identifier}: file has to be opened first")]
    NotOpened { identifier: String },

    #[error("{identifier}: {source}")]
    Open {
        identifier: String,
        source: OpenError,
    },

    #[error("{identifier}: source has already been closed")]
    Closed { identifier: String },
}

impl ReadError {
    pub fn into_io(self) -> io::Error {
        io::Error::other(self)
    }
}

#[derive(Debug, Error)]
pub enum CloseError {
    #[error("there is nothing to close")]
    NothingToClose,

    #[error("{0}")]
    Transport(#[from] io::Error),
}

#[derive(Debug, Error)]
#[error("unable to close #{position} ({identifier}): {source}")]
pub struct SourceCloseFailure {
    pub position: usize,
    pub identifier: String,
    pub source: CloseError,
}

#[derive(Debug, Error)]
#[error("{}", join_failures(.failures))]
pub struct CompositeCloseError {
    pub failures: Vec<SourceCloseFailure>,
}

impl CompositeCloseError {
    pub fn positions(&self) -> Vec<usize> {
        self.failures.iter().map(|failure| failure.position).collect()
    }
}

fn join_failures(failures: &[SourceCloseFailure]) -> String {
    failures
        .iter()
        .map(|failure| failure.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error, Diagnostic)]
pub enum CatError {
    #[error(
        "at least one argument is required, and it should be a valid url in the form [scheme:][//[userinfo@]host][/]path[?query][#fragment]"
    )]
    NoIdentifiers,

    #[error("unable to handle arg #{position}: {source}")]
    UnprocessableIdentifier {
        position: usize,
        source: ConstructionError,
    },

    #[error("concurrency limit must be at least 1, got {0}")]
    InvalidConcurrency(usize),

    #[error("failed to read config file at {0}")]
    ConfigRead(Utf8PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unable to set up {scheme} transport: {message}")]
    TransportSetup { scheme: String, message: String },

    #[error("unable to copy: {0}")]
    Copy(io::Error),

    #[error(transparent)]
    Close(#[from] CompositeCloseError),
}
