//! The `/echo` endpoint: a response crafted entirely from query parameters.
//!
//! | Parameter  | Meaning                                                   |
//! |------------|-----------------------------------------------------------|
//! | `delay`    | Seconds (float) to wait before responding.                |
//! | `code`     | Status code 200..=999, passed through. Defaults to 200.   |
//! | `content`  | Response body text.                                       |
//! | `encoding` | Codec used to turn `content` into bytes (see [`Codec`]).  |
//! | `header`   | Repeatable, `key:value`. Split at the first colon.        |

use std::time::Duration;

use hyper::{
    header::{HeaderName, HeaderValue},
    StatusCode,
};
use url::form_urlencoded;

use crate::{
    codec::Codec,
    response::{self, FixtureResponse},
    Error,
};

/// Parsed `/echo` query. Built once per request and never modified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EchoInstruction {
    pub delay: Duration,
    pub status: StatusCode,
    pub content: String,
    pub encoding: Option<String>,
    /// Headers in the order they appeared in the query.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for EchoInstruction {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            status: StatusCode::OK,
            content: String::new(),
            encoding: None,
            headers: Vec::new(),
        }
    }
}

impl EchoInstruction {
    /// Parses the raw query string of an `/echo` request. Single valued
    /// parameters take their last occurrence. Unknown parameters are ignored,
    /// as are `header` values without a colon.
    ///
    /// `delay` and `code` are validated here, before any waiting: an invalid
    /// value fails the request immediately instead of after the delay.
    pub fn from_query(query: Option<&str>) -> Result<Self, Error> {
        let mut instruction = Self::default();
        let Some(query) = query else {
            return Ok(instruction);
        };

        let mut delay = None;
        let mut code = None;

        for (name, value) in form_urlencoded::parse(query.as_bytes()) {
            match name.as_ref() {
                "delay" => delay = Some(value.into_owned()),
                "code" => code = Some(value.into_owned()),
                "content" => instruction.content = value.into_owned(),
                "encoding" => instruction.encoding = Some(value.into_owned()),
                "header" => {
                    if let Some(header) = parse_header(&value)? {
                        instruction.headers.push(header);
                    }
                }
                _ => {}
            }
        }

        if let Some(delay) = delay {
            instruction.delay = parse_delay(&delay)?;
        }
        if let Some(code) = code {
            instruction.status = parse_status(&code)?;
        }

        Ok(instruction)
    }

    /// Waits for the requested delay and builds the response. Only the task
    /// serving this request is suspended.
    pub async fn respond(self) -> Result<FixtureResponse, Error> {
        if !self.delay.is_zero() {
            tracing::debug!(delay = ?self.delay, "delaying echo response");
            tokio::time::sleep(self.delay).await;
        }

        let body = match &self.encoding {
            Some(name) => Codec::resolve(name)?.encode(&self.content)?,
            None => self.content.into_bytes(),
        };

        let mut response = response::with_body(self.status, body);
        let headers = response.headers_mut();
        for (name, value) in self.headers {
            headers.insert(name, value);
        }

        Ok(response)
    }
}

fn parse_delay(value: &str) -> Result<Duration, Error> {
    let invalid = || Error::InvalidParameter {
        name: "delay",
        value: value.to_owned(),
    };

    let seconds: f64 = value.trim().parse().map_err(|_| invalid())?;
    if seconds.is_nan() || seconds <= 0.0 {
        return Ok(Duration::ZERO);
    }

    Duration::try_from_secs_f64(seconds).map_err(|_| invalid())
}

/// hyper's HTTP/1 encoder turns a 1xx final response into a bare 500, so
/// informational codes are refused here.
fn parse_status(value: &str) -> Result<StatusCode, Error> {
    value
        .trim()
        .parse::<u16>()
        .ok()
        .and_then(|code| StatusCode::from_u16(code).ok())
        .filter(|status| !status.is_informational())
        .ok_or_else(|| Error::InvalidParameter {
            name: "code",
            value: value.to_owned(),
        })
}

fn parse_header(raw: &str) -> Result<Option<(HeaderName, HeaderValue)>, Error> {
    let Some((name, value)) = raw.split_once(':') else {
        return Ok(None);
    };

    let invalid = |reason: String| Error::InvalidHeader {
        name: name.to_owned(),
        reason,
    };

    let name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| invalid(err.to_string()))?;
    let value = HeaderValue::from_str(value).map_err(|err| invalid(err.to_string()))?;

    Ok(Some((name, value)))
}
