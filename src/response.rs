//! Builders for the responses the fixture sends itself.

use http_body_util::Full;
use hyper::{
    body::Bytes,
    header::{self, HeaderValue},
    Response, StatusCode,
};

/// `Content-Type` set on every fixture response unless an instruction
/// overwrites it.
pub const DEFAULT_CONTENT_TYPE: &str = "text/html; charset=utf-8";

pub type FixtureResponse = Response<Full<Bytes>>;

/// Response with the given status and body and the default content type.
pub fn with_body(status: StatusCode, body: impl Into<Bytes>) -> FixtureResponse {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(DEFAULT_CONTENT_TYPE),
    );
    response
}

pub fn ok(body: impl Into<Bytes>) -> FixtureResponse {
    with_body(StatusCode::OK, body)
}

pub fn not_found() -> FixtureResponse {
    with_body(StatusCode::NOT_FOUND, Bytes::from_static(b"Not Found"))
}

pub fn bad_request(message: String) -> FixtureResponse {
    with_body(StatusCode::BAD_REQUEST, message)
}

pub fn internal_server_error() -> FixtureResponse {
    with_body(
        StatusCode::INTERNAL_SERVER_ERROR,
        Bytes::from_static(b"Internal Server Error"),
    )
}

/// Empty `401 Unauthorized` carrying the given challenge.
pub fn unauthorized(challenge: HeaderValue) -> FixtureResponse {
    let mut response = with_body(StatusCode::UNAUTHORIZED, Bytes::new());
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, challenge);
    response
}
