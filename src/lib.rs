//! A deterministic HTTP fixture server for exercising HTTP clients. Every
//! response is driven by the request itself, so a client under test can ask
//! for slow responses, arbitrary status codes, odd headers, foreign text
//! encodings or authentication challenges.
//!
//! | Path                      | Behavior                                        |
//! |---------------------------|-------------------------------------------------|
//! | `/hello`                  | `200 Hello World`                               |
//! | `/echo`                   | Response built from the query, see [echo]       |
//! | `/dumpmeta`               | Request metadata as `KEY=value` lines           |
//! | `/dumpupload`             | Echoes the request body                         |
//! | `/hello_with_basic_auth`  | Basic challenge, see [auth::basic]              |
//! | `/hello_with_digest_auth` | Digest challenge, see [auth::digest]            |
//!
//! Currently only supports HTTP/1.1 and does not support TLS. Only supports the
//! Tokio async runtime.
//!
//! ## Example
//!
//! ```
//! use mini_http_fixture::{Config, Fixture, Server};
//!
//! # tokio::runtime::Runtime::new().unwrap().block_on(async {
//! let server = Server::new(Fixture::new(Config::default()))
//!     .await
//!     .expect("create server");
//!
//! let res = reqwest::Client::new()
//!     .get(server.url("/echo?code=418&content=teapot").to_string())
//!     .send()
//!     .await
//!     .expect("send request");
//!
//! assert_eq!(res.status(), 418);
//! assert_eq!(res.text().await.expect("read response"), "teapot");
//!
//! assert_eq!(server.req_count(), 1);
//! # });
//! ```
//!
//! [Server] also accepts any async closure as its handler, which is handy for
//! one-off test servers.

pub mod auth;
pub mod codec;
mod config;
pub mod echo;
mod error;
mod fixture;
mod handler;
pub mod response;
mod server;

pub use config::*;
pub use error::Error;
pub use fixture::{Endpoint, Fixture};
pub use handler::*;
pub use server::*;

pub use hyper;
