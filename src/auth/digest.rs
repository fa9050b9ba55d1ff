//! Digest access authentication (RFC 2617) with the `MD5` algorithm.
//!
//! Challenges are not stored. The nonce carries its own signature,
//! `timestamp:salt:MD5(timestamp:salt:secret)`, so a nonce echoed back by a
//! client is checked by recomputing that hash with the configured secret.
//! There is no expiry and no nonce-count tracking, which makes replays
//! possible: do not reuse this outside of tests.

use std::{
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use hmac::{Hmac, Mac};
use hyper::{
    header::{HeaderMap, HeaderValue},
    Method,
};
use md5::{Digest, Md5};
use sha1::Sha1;
use uuid::Uuid;

use super::{authenticated, quote, Authorization};
use crate::{
    response::{self, FixtureResponse},
    Config, Error,
};

/// Challenge sent in `WWW-Authenticate` to an unauthenticated client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DigestChallenge {
    pub realm: String,
    pub nonce: String,
    pub opaque: String,
    pub stale: bool,
}

impl DigestChallenge {
    /// Issues a challenge with a fresh nonce and opaque.
    pub fn fresh(config: &Config) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let salt = Uuid::new_v4().simple().to_string();

        Self::new(config, timestamp, &salt[..8], Uuid::new_v4())
    }

    pub fn new(config: &Config, timestamp: u64, salt: &str, token: Uuid) -> Self {
        Self {
            realm: config.realm.clone(),
            nonce: nonce(timestamp, salt, &config.secret_key),
            opaque: opaque(&token),
            stale: false,
        }
    }

    pub fn to_header(&self) -> Result<HeaderValue, Error> {
        let value = format!(
            "Digest realm={}, qop=\"auth\", nonce={}, opaque={}, algorithm=MD5, stale={}",
            quote(&self.realm),
            quote(&self.nonce),
            quote(&self.opaque),
            self.stale,
        );

        HeaderValue::from_str(&value).map_err(Error::InvalidChallenge)
    }
}

fn nonce(timestamp: u64, salt: &str, secret: &str) -> String {
    let signature = hex_md5(&[&timestamp.to_string(), salt, secret]);
    format!("{timestamp}:{salt}:{signature}")
}

/// Checks that `nonce` was signed with `secret`.
pub fn verify_nonce(nonce: &str, secret: &str) -> bool {
    let mut parts = nonce.splitn(3, ':');
    let (Some(timestamp), Some(salt), Some(signature)) = (parts.next(), parts.next(), parts.next())
    else {
        return false;
    };

    hex_md5(&[timestamp, salt, secret]).eq_ignore_ascii_case(signature)
}

/// Hex HMAC-SHA1 of an empty message keyed by the string form of `token`.
fn opaque(token: &Uuid) -> String {
    let mac = Hmac::<Sha1>::new_from_slice(token.to_string().as_bytes())
        .expect("HMAC accepts keys of any length");
    hex::encode(mac.finalize().into_bytes())
}

fn hex_md5(parts: &[&str]) -> String {
    let mut hasher = Md5::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update(b":");
        }
        hasher.update(part.as_bytes());
    }
    hex::encode(hasher.finalize())
}

/// Fields of an `Authorization: Digest` header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DigestCredentials {
    pub username: String,
    pub realm: String,
    pub nonce: String,
    pub uri: String,
    pub response: String,
    pub algorithm: Option<String>,
    pub opaque: Option<String>,
    pub qop: Option<String>,
    pub cnonce: Option<String>,
    pub nc: Option<String>,
}

impl FromStr for DigestCredentials {
    type Err = Error;

    /// Parses the parameter list that follows the `Digest` scheme token.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut username = None;
        let mut realm = None;
        let mut nonce = None;
        let mut uri = None;
        let mut response = None;
        let mut credentials = DigestCredentials::default();

        for (key, value) in parse_params(s)? {
            match key.as_str() {
                "username" => username = Some(value),
                "realm" => realm = Some(value),
                "nonce" => nonce = Some(value),
                "uri" => uri = Some(value),
                "response" => response = Some(value),
                "algorithm" => credentials.algorithm = Some(value),
                "opaque" => credentials.opaque = Some(value),
                "qop" => credentials.qop = Some(value),
                "cnonce" => credentials.cnonce = Some(value),
                "nc" => credentials.nc = Some(value),
                _ => {}
            }
        }

        let missing = |name: &str| Error::MalformedDigest(format!("missing {name}"));
        credentials.username = username.ok_or_else(|| missing("username"))?;
        credentials.realm = realm.ok_or_else(|| missing("realm"))?;
        credentials.nonce = nonce.ok_or_else(|| missing("nonce"))?;
        credentials.uri = uri.ok_or_else(|| missing("uri"))?;
        credentials.response = response.ok_or_else(|| missing("response"))?;

        if credentials.qop.is_some() {
            if credentials.nc.is_none() {
                return Err(missing("nc"));
            }
            if credentials.cnonce.is_none() {
                return Err(missing("cnonce"));
            }
        }

        Ok(credentials)
    }
}

impl DigestCredentials {
    /// Computes the `response` a client knowing `password` would send. `None`
    /// when the algorithm or qop is not supported.
    pub fn expected_response(
        &self,
        method: &Method,
        realm: &str,
        password: &str,
        body: &[u8],
    ) -> Option<String> {
        let cnonce = self.cnonce.as_deref().unwrap_or_default();

        let mut ha1 = hex_md5(&[&self.username, realm, password]);
        match self.algorithm.as_deref() {
            None => {}
            Some(algorithm) if algorithm.eq_ignore_ascii_case("md5") => {}
            Some(algorithm) if algorithm.eq_ignore_ascii_case("md5-sess") => {
                ha1 = hex_md5(&[&ha1, &self.nonce, cnonce]);
            }
            Some(_) => return None,
        }

        let ha2 = match self.qop.as_deref() {
            None | Some("auth") => hex_md5(&[method.as_str(), &self.uri]),
            Some("auth-int") => {
                let body_hash = hex::encode(Md5::digest(body));
                hex_md5(&[method.as_str(), &self.uri, &body_hash])
            }
            Some(_) => return None,
        };

        let response = match (&self.qop, &self.nc) {
            (Some(qop), Some(nc)) => hex_md5(&[&ha1, &self.nonce, nc, cnonce, qop, &ha2]),
            _ => hex_md5(&[&ha1, &self.nonce, &ha2]),
        };

        Some(response)
    }
}

/// Parses a comma separated `key=token` / `key="quoted string"` list. Keys
/// are lowercased.
fn parse_params(input: &str) -> Result<Vec<(String, String)>, Error> {
    let malformed = Error::MalformedDigest;

    let mut params = Vec::new();
    let mut chars = input.chars().peekable();

    loop {
        while chars.next_if(|c| c.is_whitespace() || *c == ',').is_some() {}
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        loop {
            match chars.next() {
                Some('=') => break,
                Some(',') | None => {
                    return Err(malformed(format!("parameter {:?} has no value", key.trim())))
                }
                Some(c) => key.push(c),
            }
        }

        let key = key.trim().to_ascii_lowercase();
        if key.is_empty() {
            return Err(malformed(String::from("empty parameter name")));
        }

        while chars.next_if(|c| c.is_whitespace()).is_some() {}

        let mut value = String::new();
        if chars.next_if_eq(&'"').is_some() {
            loop {
                match chars.next() {
                    Some('"') => break,
                    Some('\\') => match chars.next() {
                        Some(c) => value.push(c),
                        None => {
                            return Err(malformed(format!("unterminated value for {key:?}")))
                        }
                    },
                    Some(c) => value.push(c),
                    None => return Err(malformed(format!("unterminated value for {key:?}"))),
                }
            }

            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            if chars.peek().is_some_and(|c| *c != ',') {
                return Err(malformed(format!("unexpected text after {key:?}")));
            }
        } else {
            while let Some(c) = chars.next_if(|c| *c != ',') {
                value.push(c);
            }
            value.truncate(value.trim_end().len());
        }

        params.push((key, value));
    }

    Ok(params)
}

/// Outcome of checking a request against the configured credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAuthState {
    NoAuthHeader,
    MalformedHeader,
    WrongScheme,
    InvalidCredentials,
    Authenticated,
}

impl DigestAuthState {
    /// Malformed credential parameters are an error rather than a state so
    /// they can be answered with `400 Bad Request`.
    pub fn evaluate(
        method: &Method,
        headers: &HeaderMap,
        body: &[u8],
        config: &Config,
    ) -> Result<Self, Error> {
        let value = match Authorization::from_headers(headers) {
            Authorization::Missing => return Ok(DigestAuthState::NoAuthHeader),
            Authorization::Unreadable => return Ok(DigestAuthState::MalformedHeader),
            Authorization::Present(value) => value.trim_start(),
        };

        let (scheme, params) = value
            .split_once(char::is_whitespace)
            .unwrap_or((value, ""));
        if !scheme.eq_ignore_ascii_case("digest") {
            return Ok(DigestAuthState::WrongScheme);
        }

        let credentials: DigestCredentials = params.parse()?;

        if credentials.username != config.username
            || !verify_nonce(&credentials.nonce, &config.secret_key)
        {
            return Ok(DigestAuthState::InvalidCredentials);
        }

        let expected =
            credentials.expected_response(method, &config.realm, &config.password, body);
        match expected {
            Some(expected) if expected.eq_ignore_ascii_case(&credentials.response) => {
                Ok(DigestAuthState::Authenticated)
            }
            _ => Ok(DigestAuthState::InvalidCredentials),
        }
    }
}

/// Answers `/hello_with_digest_auth`.
pub fn respond(
    method: &Method,
    headers: &HeaderMap,
    body: &[u8],
    config: &Config,
) -> Result<FixtureResponse, Error> {
    let state = DigestAuthState::evaluate(method, headers, body, config)?;
    tracing::debug!(?state, "digest authentication");

    match state {
        DigestAuthState::Authenticated => Ok(authenticated()),
        _ => Ok(response::unauthorized(
            DigestChallenge::fresh(config).to_header()?,
        )),
    }
}
