//! Basic authentication (RFC 7617).

use base64::{engine::general_purpose::STANDARD, Engine as _};
use hyper::header::{HeaderMap, HeaderValue};

use super::{authenticated, Authorization};
use crate::{
    response::{self, FixtureResponse},
    Config, Error,
};

/// Where a request ended up while checking its `Authorization: Basic` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicAuthState {
    NoAuthHeader,
    MalformedHeader,
    WrongScheme,
    BadBase64OrUtf8,
    MalformedCredentialPair,
    InvalidCredentials,
    Authenticated,
}

impl BasicAuthState {
    pub fn evaluate(headers: &HeaderMap, config: &Config) -> Self {
        let value = match Authorization::from_headers(headers) {
            Authorization::Missing => return BasicAuthState::NoAuthHeader,
            Authorization::Unreadable => return BasicAuthState::MalformedHeader,
            Authorization::Present(value) => value,
        };

        let mut parts = value.split_whitespace();
        let (Some(scheme), Some(data), None) = (parts.next(), parts.next(), parts.next()) else {
            return BasicAuthState::MalformedHeader;
        };

        if !scheme.eq_ignore_ascii_case("basic") {
            return BasicAuthState::WrongScheme;
        }

        let Some(decoded) = STANDARD
            .decode(data)
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        else {
            return BasicAuthState::BadBase64OrUtf8;
        };

        let Some((username, password)) = decoded.split_once(':') else {
            return BasicAuthState::MalformedCredentialPair;
        };

        if username == config.username && password == config.password {
            BasicAuthState::Authenticated
        } else {
            BasicAuthState::InvalidCredentials
        }
    }
}

/// `WWW-Authenticate` value sent with every Basic challenge.
pub fn challenge(realm: &str) -> Result<HeaderValue, Error> {
    HeaderValue::from_str(&format!("Basic Realm={}", super::quote(realm)))
        .map_err(Error::InvalidChallenge)
}

/// Answers `/hello_with_basic_auth`.
pub fn respond(headers: &HeaderMap, config: &Config) -> Result<FixtureResponse, Error> {
    let state = BasicAuthState::evaluate(headers, config);
    tracing::debug!(?state, "basic authentication");

    match state {
        BasicAuthState::Authenticated => Ok(authenticated()),
        _ => Ok(response::unauthorized(challenge(&config.realm)?)),
    }
}
