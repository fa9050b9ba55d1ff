use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use http_body_util::BodyExt;
use hyper::{
    body::{self, Body, Bytes},
    server::conn::http1,
    service::service_fn,
    Request, Uri,
};
use hyper_util::rt::TokioIo;
use tokio::{net::TcpListener, select, sync::watch, time::Instant};

use crate::Error;

use crate::{run_handler, Handler};

/// Addresses of the connection a request arrived on. Attached to every
/// request as an extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnInfo {
    pub remote_addr: SocketAddr,
    pub local_addr: SocketAddr,
}

/// Listens on a TCP port, running the given handler for each request.
///
/// See the crate documentation for an example.
#[derive(Debug, Clone)]
pub struct Server {
    close_tx: Arc<watch::Sender<u8>>,
    addr: SocketAddr,
    req_count: Arc<Mutex<u64>>,
    concurrent_req_count: Arc<Mutex<u64>>,
}

impl Server {
    /// Creates a new HTTP server on a random port running the given handler.
    /// The handler will be called on every request, and the total request count
    /// can be retrieved with [server.req_count()](Server::req_count).
    ///
    /// The server can be safely cloned and used from multiple threads. When the
    /// final reference to the server is dropped, the server will be shut down
    /// and all pending requests will be aborted. Aborting the server will
    /// happen in the background and will not block.
    pub async fn new<H: Handler + Clone + Send + Sync + 'static>(
        handler: H,
    ) -> Result<Self, Error> {
        Self::bind(([127, 0, 0, 1], 0).into(), handler).await
    }

    /// Same as [Server::new](Server::new), listening on `addr` instead of a
    /// random local port.
    pub async fn bind<H: Handler + Clone + Send + Sync + 'static>(
        addr: SocketAddr,
        handler: H,
    ) -> Result<Self, Error> {
        let tcp_listener = TcpListener::bind(addr)
            .await
            .map_err(Error::BindTCPListener)?;
        let addr = tcp_listener
            .local_addr()
            .map_err(Error::GetTCPListenerAddress)?;
        tracing::info!(%addr, "listening");

        let (close_tx, close_rx) = watch::channel::<u8>(0);
        let req_count = Arc::new(Mutex::new(0));
        let concurrent_req_count = Arc::new(Mutex::new(0));

        {
            let handler = handler.clone();
            let req_count = req_count.clone();
            let concurrent_req_count = concurrent_req_count.clone();

            tokio::spawn(async move {
                let mut close_rx = close_rx.clone();

                loop {
                    let (tcp_stream, remote_addr) = select! {
                        _ = close_rx.changed() => {
                            return;
                        }
                        res = tcp_listener.accept() => {
                            match res {
                                Ok(res) => res,
                                Err(err) => {
                                    tracing::error!("error while accepting TCP connection: {}", err);
                                    return;
                                }
                            }
                        }
                    };

                    let handler = handler.clone();
                    let mut close_rx = close_rx.clone();
                    let req_count = req_count.clone();
                    let concurrent_req_count = concurrent_req_count.clone();
                    let conn_info = ConnInfo {
                        remote_addr,
                        local_addr: tcp_stream.local_addr().unwrap_or(addr),
                    };
                    tokio::spawn(async move {
                        let handler = &handler;
                        let req_count = &req_count;
                        let concurrent_req_count = &concurrent_req_count;

                        let service = service_fn(|mut req: Request<body::Incoming>| async move {
                            req.extensions_mut().insert(conn_info);
                            *concurrent_req_count.lock().expect("lock poisoned") += 1;
                            let res = run_handler(handler.clone(), req).await;
                            *concurrent_req_count.lock().expect("lock poisoned") -= 1;
                            *req_count.lock().expect("lock poisoned") += 1;
                            res
                        });

                        let res = select! {
                            _ = close_rx.changed() => {
                                return;
                            }
                            res = http1::Builder::new()
                                .keep_alive(true)
                                .serve_connection(TokioIo::new(tcp_stream), service) => res,
                        };

                        if let Err(http_err) = res {
                            tracing::warn!(%remote_addr, "error while serving HTTP connection: {}", http_err);
                        }
                    });
                }
            });
        };

        Ok(Self {
            close_tx: Arc::new(close_tx),
            addr,
            req_count,
            concurrent_req_count,
        })
    }

    /// Returns the socket address the server is listening on.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Returns a valid request URL for the given path and query string.
    pub fn url(&self, path_and_query: &str) -> Uri {
        Uri::builder()
            .scheme("http")
            .authority(self.addr.to_string().as_str())
            .path_and_query(path_and_query)
            .build()
            .expect("should be a valid URL")
    }

    /// Returns the number of requests handled by the server. This value is
    /// incremented after the request handler has finished, but before the
    /// response has been sent.
    ///
    /// At the end of tests, this should be asserted to be equal to the amount
    /// of requests sent.
    ///
    /// Any panics in the request handler may result in the counter becoming out
    /// of sync.
    pub fn req_count(&self) -> u64 {
        *self.req_count.lock().expect("lock poisoned")
    }

    /// Await req_count reaching a certain number. This polls every 10ms and
    /// times out after the given duration.
    pub async fn await_req_count(&self, target_count: u64, timeout: Duration) -> Result<(), Error> {
        let start = Instant::now();
        loop {
            let current_count = self.req_count();
            if current_count == target_count {
                return Ok(());
            }

            if start.elapsed() > timeout {
                return Err(Error::AwaitReqCountTimeout {
                    current_count,
                    target_count,
                    timeout,
                });
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// Returns the number of concurrent requests currently being handled by the
    /// server. A concurrent request is measured by incrementing the counter
    /// before the request handler is called, and decrementing it after the
    /// request handler has finished. The response may still be in the process
    /// of being sent when the counter is decremented.
    ///
    /// Any panics in the request handler may result in the counter becoming out
    /// of sync.
    pub fn concurrent_req_count(&self) -> u64 {
        *self.concurrent_req_count.lock().expect("lock poisoned")
    }

    /// Await concurrent_req_count reaching a certain number. This polls every
    /// 10ms and times out after the given duration.
    pub async fn await_concurrent_req_count(
        &self,
        target_count: u64,
        timeout: Duration,
    ) -> Result<(), Error> {
        let start = Instant::now();
        loop {
            let current_count = self.concurrent_req_count();
            if current_count == target_count {
                return Ok(());
            }

            if start.elapsed() > timeout {
                return Err(Error::AwaitConcurrentReqCountTimeout {
                    current_count,
                    target_count,
                    timeout,
                });
            }

            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    /// close kills the server and aborts all pending requests. This does not
    /// block for all requests to finish.
    pub fn close(&self) {
        self.close_tx.send_replace(1);
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if Arc::strong_count(&self.close_tx) == 1 {
            self.close();
        }
    }
}

/// A handy extension to [hyper::Request](hyper::Request) that allows for easily
/// reading the request body as a single `Bytes` object.
#[async_trait]
pub trait GetRequestBody {
    async fn body_bytes(self) -> Result<Bytes, hyper::Error>;
}

#[async_trait]
impl<B> GetRequestBody for Request<B>
where
    B: Body<Data = Bytes> + Send + 'static,
    <B as Body>::Error: Into<hyper::Error>,
{
    async fn body_bytes(self) -> Result<Bytes, hyper::Error> {
        self.into_body()
            .collect()
            .await
            .map(|full| full.to_bytes())
            .map_err(|err| err.into())
    }
}
