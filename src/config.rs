//! Fixture configuration, deserialized from a TOML file with [`serde`].
//!
//! ```toml
//! listen = "127.0.0.1:8000"
//! realm = "DEV"
//! username = "test"
//! password = "12345"
//! secret_key = "change me"
//! ```
//!
//! Every field is optional. The configuration is read once at startup and then
//! shared read-only between all handlers.

use std::{net::SocketAddr, path::Path};

use serde::Deserialize;

use crate::Error;

/// Username accepted by the authentication endpoints.
pub const DEFAULT_USERNAME: &str = "test";

/// Password accepted by the authentication endpoints.
pub const DEFAULT_PASSWORD: &str = "12345";

/// Realm announced in `WWW-Authenticate` challenges.
pub const DEFAULT_REALM: &str = "DEV";

/// Secret mixed into Digest nonces. Only suitable for local testing.
pub const DEFAULT_SECRET_KEY: &str = "-5nmwk1r0^)kwfvd0nz5i0hl6kf&l3i(&ffv7j$vi*%ir8+v88";

#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// TCP listener bind address used by the binary.
    pub listen: SocketAddr,

    pub realm: String,

    pub username: String,

    pub password: String,

    /// Key used to sign and verify Digest nonces.
    pub secret_key: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from(([127, 0, 0, 1], 8000)),
            realm: String::from(DEFAULT_REALM),
            username: String::from(DEFAULT_USERNAME),
            password: String::from(DEFAULT_PASSWORD),
            secret_key: String::from(DEFAULT_SECRET_KEY),
        }
    }
}

impl Config {
    /// Reads and parses the TOML file at `path`.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::ReadConfig {
            path: path.to_path_buf(),
            source,
        })?;

        toml::from_str(&content).map_err(|source| Error::ParseConfig {
            path: path.to_path_buf(),
            source,
        })
    }
}
