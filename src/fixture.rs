//! The [Fixture] handler: routes requests to the fixture endpoints.

use std::{fmt::Write as _, sync::Arc};

use async_trait::async_trait;
use http_body_util::{BodyExt, Full};
use hyper::{
    body::{Bytes, Incoming as IncomingBody},
    header::{self, HeaderMap},
    http::request::Parts,
    Request, Response,
};

use crate::{
    auth::{basic, digest},
    echo::EchoInstruction,
    response::{self, FixtureResponse},
    Config, ConnInfo, Error, GetRequestBody, Handler,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Hello,
    Echo,
    DumpMeta,
    DumpUpload,
    HelloWithBasicAuth,
    HelloWithDigestAuth,
}

impl Endpoint {
    pub const ALL: [Endpoint; 6] = [
        Endpoint::Hello,
        Endpoint::Echo,
        Endpoint::DumpMeta,
        Endpoint::DumpUpload,
        Endpoint::HelloWithBasicAuth,
        Endpoint::HelloWithDigestAuth,
    ];

    pub fn path(&self) -> &'static str {
        match self {
            Endpoint::Hello => "/hello",
            Endpoint::Echo => "/echo",
            Endpoint::DumpMeta => "/dumpmeta",
            Endpoint::DumpUpload => "/dumpupload",
            Endpoint::HelloWithBasicAuth => "/hello_with_basic_auth",
            Endpoint::HelloWithDigestAuth => "/hello_with_digest_auth",
        }
    }

    /// Matches a request path, with or without one trailing slash.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.strip_suffix('/').unwrap_or(path);
        Self::ALL
            .into_iter()
            .find(|endpoint| endpoint.path() == path)
    }
}

/// Serves the fixture endpoints. Cheap to clone: the configuration is shared.
///
/// Client mistakes (unparseable query values, invalid `header=` instructions,
/// malformed Digest credentials) are answered with `400 Bad Request`; any
/// other error is returned to the [Server](crate::Server), which logs it and
/// answers with a 500.
#[derive(Debug, Clone)]
pub struct Fixture {
    config: Arc<Config>,
}

impl Fixture {
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    async fn route(&self, req: Request<IncomingBody>) -> Result<FixtureResponse, Error> {
        let Some(endpoint) = Endpoint::from_path(req.uri().path()) else {
            return Ok(response::not_found());
        };

        match endpoint {
            Endpoint::Hello => Ok(response::ok(Bytes::from_static(b"Hello World"))),
            Endpoint::Echo => EchoInstruction::from_query(req.uri().query())?.respond().await,
            Endpoint::DumpMeta => {
                let (parts, _) = req.into_parts();
                Ok(response::ok(dump_meta(&parts)))
            }
            Endpoint::DumpUpload => {
                let body = req.body_bytes().await.map_err(Error::ReadBody)?;
                Ok(response::ok(body))
            }
            Endpoint::HelloWithBasicAuth => basic::respond(req.headers(), &self.config),
            Endpoint::HelloWithDigestAuth => {
                let (parts, body) = req.into_parts();
                let body = body.collect().await.map_err(Error::ReadBody)?.to_bytes();
                digest::respond(&parts.method, &parts.headers, &body, &self.config)
            }
        }
    }
}

#[async_trait]
impl Handler for Fixture {
    type Error = Error;

    async fn handle(
        self,
        req: Request<IncomingBody>,
    ) -> Result<Response<Full<Bytes>>, Self::Error> {
        match self.route(req).await {
            Err(err) if err.is_client_error() => {
                tracing::warn!("rejecting request: {}", err);
                Ok(response::bad_request(err.to_string()))
            }
            res => res,
        }
    }
}

/// Renders request metadata as `KEY=value\r\n` lines: CGI style request
/// variables first, then the headers in the order they were received.
fn dump_meta(parts: &Parts) -> String {
    let mut meta: Vec<(String, String)> = vec![
        ("REQUEST_METHOD".into(), parts.method.to_string()),
        ("PATH_INFO".into(), parts.uri.path().to_owned()),
        (
            "QUERY_STRING".into(),
            parts.uri.query().unwrap_or_default().to_owned(),
        ),
        ("SERVER_PROTOCOL".into(), format!("{:?}", parts.version)),
    ];

    if let Some(conn) = parts.extensions.get::<ConnInfo>() {
        meta.push(("REMOTE_ADDR".into(), conn.remote_addr.ip().to_string()));
        meta.push(("REMOTE_PORT".into(), conn.remote_addr.port().to_string()));
        meta.push(("SERVER_NAME".into(), conn.local_addr.ip().to_string()));
        meta.push(("SERVER_PORT".into(), conn.local_addr.port().to_string()));
    }

    meta.extend(header_meta(&parts.headers));

    meta.iter().fold(String::new(), |mut out, (key, value)| {
        let _ = write!(out, "{key}={value}\r\n");
        out
    })
}

fn header_meta(headers: &HeaderMap) -> Vec<(String, String)> {
    let mut special = Vec::new();
    let mut rest = Vec::new();

    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        if *name == header::CONTENT_TYPE || *name == header::CONTENT_LENGTH {
            special.push((cgi_name(name.as_str()), value));
        } else {
            rest.push((format!("HTTP_{}", cgi_name(name.as_str())), value));
        }
    }

    special.extend(rest);
    special
}

fn cgi_name(header: &str) -> String {
    header.to_ascii_uppercase().replace('-', "_")
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use hyper::{Method, Version};
    use reqwest::header::{AUTHORIZATION, WWW_AUTHENTICATE};

    use super::*;
    use crate::{
        auth::digest::test::{authorization_for, authorization_with_body},
        Server,
    };

    async fn fixture() -> Server {
        Server::new(Fixture::new(Config::default()))
            .await
            .expect("create server")
    }

    #[test]
    fn endpoint_paths() {
        assert_eq!(Endpoint::from_path("/hello"), Some(Endpoint::Hello));
        assert_eq!(Endpoint::from_path("/hello/"), Some(Endpoint::Hello));
        assert_eq!(Endpoint::from_path("/hello//"), None);
        assert_eq!(Endpoint::from_path("/hello/world"), None);
        assert_eq!(Endpoint::from_path("/"), None);
        for endpoint in Endpoint::ALL {
            assert_eq!(Endpoint::from_path(endpoint.path()), Some(endpoint));
        }
    }

    #[test]
    fn dump_meta_order() {
        let mut req = Request::builder()
            .method(Method::POST)
            .uri("/dumpmeta/?a=1")
            .version(Version::HTTP_11)
            .header("X-First", "1")
            .header("Content-Type", "text/plain")
            .header("Accept-Language", "en")
            .body(())
            .unwrap();
        req.extensions_mut().insert(ConnInfo {
            remote_addr: "10.0.0.1:5000".parse().unwrap(),
            local_addr: "10.0.0.2:8000".parse().unwrap(),
        });
        let (parts, _) = req.into_parts();

        assert_eq!(
            dump_meta(&parts),
            "REQUEST_METHOD=POST\r\n\
             PATH_INFO=/dumpmeta/\r\n\
             QUERY_STRING=a=1\r\n\
             SERVER_PROTOCOL=HTTP/1.1\r\n\
             REMOTE_ADDR=10.0.0.1\r\n\
             REMOTE_PORT=5000\r\n\
             SERVER_NAME=10.0.0.2\r\n\
             SERVER_PORT=8000\r\n\
             CONTENT_TYPE=text/plain\r\n\
             HTTP_X_FIRST=1\r\n\
             HTTP_ACCEPT_LANGUAGE=en\r\n"
        );
    }

    #[tokio::test]
    async fn hello() {
        let server = fixture().await;
        let res = reqwest::get(server.url("/hello").to_string())
            .await
            .expect("send request");

        assert_eq!(res.status(), 200);
        assert_eq!(
            res.headers()["content-type"],
            response::DEFAULT_CONTENT_TYPE
        );
        assert_eq!(res.text().await.expect("read response"), "Hello World");
    }

    #[tokio::test]
    async fn unknown_path() {
        let server = fixture().await;
        let res = reqwest::get(server.url("/nope").to_string())
            .await
            .expect("send request");

        assert_eq!(res.status(), 404);
    }

    #[tokio::test]
    async fn echo() {
        let server = fixture().await;
        let client = reqwest::Client::new();

        let res = client
            .get(server.url("/echo/").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), "");

        let res = client
            .get(server.url("/echo?code=500").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 500);
        assert_eq!(res.text().await.expect("read response"), "");

        for code in [204, 599, 999] {
            let res = client
                .get(server.url(&format!("/echo?code={code}")).to_string())
                .send()
                .await
                .expect("send request");
            assert_eq!(res.status().as_u16(), code);
        }

        let res = client
            .get(server.url("/echo?header=Content-Type:text/plain&header=MyKey:MyValue").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.headers()["content-type"], "text/plain");
        assert_eq!(res.headers()["mykey"], "MyValue");

        let res = client
            .get(
                server
                    .url("/echo?header=Content-Type%3Aapplication%2Fx-www-form-urlencoded%3B%20charset%3Dutf-8")
                    .to_string(),
            )
            .send()
            .await
            .expect("send request");
        assert_eq!(
            res.headers()["content-type"],
            "application/x-www-form-urlencoded; charset=utf-8"
        );

        let res = client
            .get(server.url("/echo?content=hello").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), "hello");
    }

    #[tokio::test]
    async fn echo_encodings() {
        let server = fixture().await;
        let client = reqwest::Client::new();

        for (encoding, expected) in [
            ("utf8", b"\xe4\xbd\xa0\xe5\xa5\xbd".as_slice()),
            ("gb2312", b"\xc4\xe3\xba\xc3".as_slice()),
        ] {
            let url = server.url(&format!(
                "/echo?content=%E4%BD%A0%E5%A5%BD&encoding={encoding}"
            ));
            let res = client
                .get(url.to_string())
                .send()
                .await
                .expect("send request");
            assert_eq!(res.status(), 200);
            assert_eq!(res.bytes().await.expect("read response").as_ref(), expected);
        }

        let res = client
            .get(server.url("/echo?content=hi&encoding=klingon").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 500);
        assert_eq!(
            res.text().await.expect("read response"),
            "Internal Server Error"
        );
    }

    #[tokio::test]
    async fn echo_bad_parameters() {
        let server = fixture().await;
        let client = reqwest::Client::new();

        for query in [
            "code=abc",
            "code=100",
            "code=103",
            "code=199",
            "delay=later",
            "header=Bad%20Name:1",
        ] {
            let res = client
                .get(server.url(&format!("/echo?{query}")).to_string())
                .send()
                .await
                .expect("send request");
            assert_eq!(res.status(), 400, "{query}");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn echo_delay_does_not_block_other_requests() {
        let server = fixture().await;
        let client = reqwest::Client::new();

        let slow = {
            let client = client.clone();
            let url = server.url("/echo?delay=2&content=slow").to_string();
            tokio::spawn(async move { client.get(url).send().await.expect("send request") })
        };

        server
            .await_concurrent_req_count(1, Duration::from_secs(1))
            .await
            .expect("slow request started");

        let start = tokio::time::Instant::now();
        let res = client
            .get(server.url("/hello").to_string())
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(server.concurrent_req_count(), 1);

        let res = slow.await.unwrap();
        assert_eq!(res.text().await.expect("read response"), "slow");
    }

    #[tokio::test]
    async fn dumpmeta() {
        let server = fixture().await;
        let res = reqwest::Client::new()
            .get(server.url("/dumpmeta?x=y").to_string())
            .header("X-Custom", "value")
            .send()
            .await
            .expect("send request");

        assert_eq!(res.status(), 200);
        let body = res.text().await.expect("read response");
        let lines: Vec<&str> = body.split_terminator("\r\n").collect();
        assert_eq!(lines[0], "REQUEST_METHOD=GET");
        assert_eq!(lines[1], "PATH_INFO=/dumpmeta");
        assert_eq!(lines[2], "QUERY_STRING=x=y");
        assert!(lines.contains(&"REMOTE_ADDR=127.0.0.1"));
        assert!(lines.contains(&format!("SERVER_PORT={}", server.addr().port()).as_str()));
        assert!(lines.contains(&"HTTP_X_CUSTOM=value"));
    }

    #[tokio::test]
    async fn dumpupload() {
        let server = fixture().await;
        let payload = b"\x00binary\xffpayload".to_vec();
        let res = reqwest::Client::new()
            .post(server.url("/dumpupload").to_string())
            .body(payload.clone())
            .send()
            .await
            .expect("send request");

        assert_eq!(res.status(), 200);
        assert_eq!(res.bytes().await.expect("read response").to_vec(), payload);
    }

    #[tokio::test]
    async fn basic_auth() {
        let server = fixture().await;
        let client = reqwest::Client::new();
        let url = server.url("/hello_with_basic_auth").to_string();

        let res = client.get(&url).send().await.expect("send request");
        assert_eq!(res.status(), 401);
        assert_eq!(res.headers()[WWW_AUTHENTICATE], "Basic Realm=\"DEV\"");
        assert_eq!(res.text().await.expect("read response"), "");

        let res = client
            .get(&url)
            .basic_auth("test", Some("12345"))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), "Hello World");

        let res = client
            .get(&url)
            .basic_auth("test", Some("wrong"))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);

        let res = client
            .get(&url)
            .header(AUTHORIZATION, format!("Basic {}", STANDARD.encode("test12345")))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn basic_auth_uses_configured_credentials() {
        let server = Server::new(Fixture::new(Config {
            username: String::from("alice"),
            password: String::from("s3cret"),
            realm: String::from("QA"),
            ..Config::default()
        }))
        .await
        .expect("create server");
        let client = reqwest::Client::new();
        let url = server.url("/hello_with_basic_auth").to_string();

        let res = client
            .get(&url)
            .basic_auth("test", Some("12345"))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);
        assert_eq!(res.headers()[WWW_AUTHENTICATE], "Basic Realm=\"QA\"");

        let res = client
            .get(&url)
            .basic_auth("alice", Some("s3cret"))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
    }

    #[tokio::test]
    async fn digest_auth() {
        let server = fixture().await;
        let client = reqwest::Client::new();
        let path = "/hello_with_digest_auth";
        let url = server.url(path).to_string();

        let res = client.get(&url).send().await.expect("send request");
        assert_eq!(res.status(), 401);
        let challenge = res.headers()[WWW_AUTHENTICATE]
            .to_str()
            .expect("ascii challenge")
            .to_owned();
        assert!(challenge.starts_with("Digest "));
        assert!(challenge.contains("realm=\"DEV\""));
        assert!(challenge.contains("nonce=\""));
        assert!(challenge.contains("opaque=\""));
        assert!(challenge.contains("stale=false"));

        let res = client
            .get(&url)
            .header(
                AUTHORIZATION,
                authorization_for(&challenge, "GET", path, "test", "12345"),
            )
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), "Hello World");

        let res = client
            .get(&url)
            .header(
                AUTHORIZATION,
                authorization_for(&challenge, "GET", path, "test", "wrong"),
            )
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);
        assert!(res.headers()[WWW_AUTHENTICATE]
            .to_str()
            .unwrap()
            .starts_with("Digest "));

        let res = client
            .get(&url)
            .header(AUTHORIZATION, "Digest username=\"test\"")
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 400);

        let res = client
            .get(&url)
            .basic_auth("test", Some("12345"))
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn digest_auth_int_covers_request_body() {
        let server = fixture().await;
        let client = reqwest::Client::new();
        let path = "/hello_with_digest_auth";
        let url = server.url(path).to_string();

        let res = client.post(&url).send().await.expect("send request");
        assert_eq!(res.status(), 401);
        let challenge = res.headers()[WWW_AUTHENTICATE]
            .to_str()
            .expect("ascii challenge")
            .to_owned();

        let authorization =
            authorization_with_body(&challenge, "POST", path, b"payload", "test", "12345");

        let res = client
            .post(&url)
            .header(AUTHORIZATION, authorization.as_str())
            .body("payload")
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 200);
        assert_eq!(res.text().await.expect("read response"), "Hello World");

        let res = client
            .post(&url)
            .header(AUTHORIZATION, authorization.as_str())
            .body("tampered")
            .send()
            .await
            .expect("send request");
        assert_eq!(res.status(), 401);
    }

    #[tokio::test]
    async fn repeated_requests_are_identical() {
        let server = fixture().await;
        let client = reqwest::Client::new();
        let url = server
            .url("/echo?code=202&content=same&header=X-A:1")
            .to_string();

        let mut seen = Vec::new();
        for _ in 0..3 {
            let res = client.get(&url).send().await.expect("send request");
            let status = res.status();
            let header = res.headers()["x-a"].clone();
            let body = res.text().await.expect("read response");
            seen.push((status, header, body));
        }

        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
        assert_eq!(server.req_count(), 3);
    }
}
