use std::{io, path::PathBuf, time::Duration};

use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum Error {
    #[error("bind TCP listener: {0}")]
    BindTCPListener(io::Error),
    #[error("get TCP listener socket address: {0}")]
    GetTCPListenerAddress(io::Error),
    #[error("req_count did not reach {target_count} within {timeout:?} (current count: {current_count})")]
    AwaitReqCountTimeout {
        current_count: u64,
        target_count: u64,
        timeout: Duration,
    },
    #[error("concurrent_req_count did not reach {target_count} within {timeout:?} (current count: {current_count})")]
    AwaitConcurrentReqCountTimeout {
        current_count: u64,
        target_count: u64,
        timeout: Duration,
    },
    #[error("read config file {path:?}: {source}")]
    ReadConfig { path: PathBuf, source: io::Error },
    #[error("parse config file {path:?}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("invalid value {value:?} for query parameter {name:?}")]
    InvalidParameter { name: &'static str, value: String },
    #[error("invalid header {name:?}: {reason}")]
    InvalidHeader { name: String, reason: String },
    #[error("unsupported encoding {0:?}")]
    UnsupportedEncoding(String),
    #[error("content cannot be encoded as {0}")]
    Unencodable(&'static str),
    #[error("build authentication challenge: {0}")]
    InvalidChallenge(hyper::header::InvalidHeaderValue),
    #[error("malformed digest credentials: {0}")]
    MalformedDigest(String),
    #[error("read request body: {0}")]
    ReadBody(hyper::Error),
}

impl Error {
    /// Whether the error was caused by the request rather than the server. The
    /// fixture answers these with `400 Bad Request` instead of a 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidParameter { .. } | Error::InvalidHeader { .. } | Error::MalformedDigest(_)
        )
    }
}
