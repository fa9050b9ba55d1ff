//! HTTP authentication challenges against the single configured credential
//! pair. Failures never surface as errors to the client: they always end in a
//! well-formed `401 Unauthorized` carrying a fresh challenge.

pub mod basic;
pub mod digest;

use hyper::header::{HeaderMap, AUTHORIZATION};

use crate::response::{self, FixtureResponse};

/// Body sent once a client has authenticated.
pub const AUTHENTICATED_BODY: &str = "Hello World";

/// State of an `Authorization` header before any scheme specific parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Authorization<'a> {
    Missing,
    /// Present but not valid UTF-8.
    Unreadable,
    Present(&'a str),
}

impl<'a> Authorization<'a> {
    fn from_headers(headers: &'a HeaderMap) -> Self {
        match headers.get(AUTHORIZATION) {
            None => Authorization::Missing,
            Some(value) => match std::str::from_utf8(value.as_bytes()) {
                Ok(value) => Authorization::Present(value),
                Err(_) => Authorization::Unreadable,
            },
        }
    }
}

fn authenticated() -> FixtureResponse {
    response::ok(AUTHENTICATED_BODY)
}

/// Quotes a value as an RFC 7230 quoted-string.
fn quote(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

#[cfg(test)]
mod test {
    use hyper::header::HeaderValue;

    use super::*;

    #[test]
    fn authorization_states() {
        let mut headers = HeaderMap::new();
        assert_eq!(Authorization::from_headers(&headers), Authorization::Missing);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(
            Authorization::from_headers(&headers),
            Authorization::Present("Basic abc")
        );

        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_bytes(b"Basic \xff").unwrap(),
        );
        assert_eq!(
            Authorization::from_headers(&headers),
            Authorization::Unreadable
        );
    }

    #[test]
    fn quoting() {
        assert_eq!(quote("DEV"), "\"DEV\"");
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
