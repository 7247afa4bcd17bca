//! The accept loop: admission control, one `tokio` task per connection, and
//! graceful shutdown.
//!
//! Unlike the teacher codebase's pre-allocated worker pool (a fixed number of tasks
//! pulled from a shared `SegQueue` of accepted sockets, with a separate pool of
//! "alarmist" tasks dedicated to draining the overflow queue with `503`s), admission
//! here is a synchronous check made at `accept` time: the active-connection count is
//! compared against [`ServerLimits::max_connections`] before a connection task is
//! spawned at all. A queue-based design defers the 503 decision to whenever a worker
//! happens to be free; a synchronous check makes it immediate, matching "If the
//! active-connection counter is at or above the limit, write `503` and close" as a
//! per-accept decision rather than a backpressure policy.

use crate::errors::ErrorKind;
use crate::limits::{ConnLimits, ReqLimits, ServerLimits};
use crate::router::Router;
use crate::server::connection;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Notify;

/// An HTTP server: a bound listener, a router, and the limits that govern every
/// connection it accepts.
///
/// # Examples
///
/// ```no_run
/// use chirust_web::{Method, Request, Response, Router, Server};
///
/// #[tokio::main]
/// async fn main() {
///     let mut router = Router::new();
///     router.add_route(Method::Get, "/", |_req: Request| async {
///         let mut resp = Response::new();
///         resp.body("Hello world!");
///         resp
///     });
///
///     Server::builder()
///         .listener(Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap())
///         .router(router)
///         .build()
///         .launch()
///         .await;
/// }
/// ```
pub struct Server {
    listener: TcpListener,
    router: Arc<Router>,
    server_limits: ServerLimits,
    conn_limits: ConnLimits,
    req_limits: ReqLimits,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            router: None,
            server_limits: None,
            connection_limits: None,
            request_limits: None,
        }
    }

    /// Binds a listening socket with `SO_REUSEADDR` set and the listen backlog taken
    /// from `limits`, then hands it off to `tokio`. Using this instead of
    /// `TcpListener::bind` directly is what lets [`ServerLimits::listen_backlog`] take
    /// effect — the backlog is a property of the `listen(2)` call, which
    /// `tokio::net::TcpListener::bind` makes with a backlog `tokio` itself chooses.
    pub fn bind(addr: SocketAddr, limits: &ServerLimits) -> io::Result<TcpListener> {
        let domain = if addr.is_ipv4() { Domain::IPV4 } else { Domain::IPV6 };
        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))?;
        socket.set_reuse_address(true)?;
        socket.set_nonblocking(true)?;
        socket.bind(&addr.into())?;
        socket.listen(limits.listen_backlog as i32)?;
        TcpListener::from_std(socket.into())
    }

    /// Accepts connections until a shutdown signal arrives (`Ctrl+C`, on every
    /// platform `tokio::signal` supports), then waits for in-flight connections to
    /// finish on their own, up to 30 seconds, before returning.
    pub async fn launch(self) {
        let active = Arc::new(AtomicUsize::new(0));
        let shutdown = Arc::new(Notify::new());

        {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    log::info!("shutdown signal received, no longer accepting connections");
                    shutdown.notify_one();
                }
            });
        }

        loop {
            let (stream, _addr) = tokio::select! {
                biased;

                _ = shutdown.notified() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        log::warn!("accept failed: {e}");
                        continue;
                    }
                },
            };

            if active.load(Ordering::SeqCst) >= self.server_limits.max_connections {
                let conn_limits = self.conn_limits;
                tokio::spawn(async move {
                    let mut stream = stream;
                    let _ = conn_limits.write_bytes(&mut stream, ErrorKind::ServiceUnavailable.as_http()).await;
                });
                continue;
            }

            active.fetch_add(1, Ordering::SeqCst);
            let router = self.router.clone();
            let conn_limits = self.conn_limits;
            let req_limits = self.req_limits;
            let active = active.clone();
            tokio::spawn(async move {
                connection::run(stream, router, conn_limits, req_limits).await;
                active.fetch_sub(1, Ordering::SeqCst);
            });
        }

        for _ in 0..300 {
            if active.load(Ordering::SeqCst) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        log::info!("shutdown complete, {} connection(s) still open", active.load(Ordering::SeqCst));
    }
}

/// Builder for configuring and creating [`Server`] instances.
#[derive(Default)]
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    router: Option<Router>,
    server_limits: Option<ServerLimits>,
    connection_limits: Option<ConnLimits>,
    request_limits: Option<ReqLimits>,
}

impl ServerBuilder {
    /// Sets the TCP listener the server accepts connections from.
    ///
    /// **This is a required component.** Use [`Server::bind`] rather than
    /// `TcpListener::bind` directly to have [`ServerLimits::listen_backlog`] take
    /// effect.
    #[inline]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Sets the router that dispatches every accepted request.
    ///
    /// **This is a required component.**
    #[inline]
    pub fn router(mut self, router: Router) -> Self {
        self.router = Some(router);
        self
    }

    /// Configures connection admission limits.
    #[inline]
    pub fn server_limits(mut self, limits: ServerLimits) -> Self {
        self.server_limits = Some(limits);
        self
    }

    /// Configures per-connection timeouts.
    #[inline]
    pub fn connection_limits(mut self, limits: ConnLimits) -> Self {
        self.connection_limits = Some(limits);
        self
    }

    /// Configures wire-parser size guards.
    #[inline]
    pub fn request_limits(mut self, limits: ReqLimits) -> Self {
        self.request_limits = Some(limits);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Panics if [`ServerBuilder::listener`] or [`ServerBuilder::router`] was never
    /// called.
    #[track_caller]
    pub fn build(self) -> Server {
        Server {
            listener: self.listener.expect("the `listener` method must be called before `build`"),
            router: Arc::new(self.router.expect("the `router` method must be called before `build`")),
            server_limits: self.server_limits.unwrap_or_default(),
            conn_limits: self.connection_limits.unwrap_or_default(),
            req_limits: self.request_limits.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::{Method, StatusCode};
    use crate::{Request, Response};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn serves_a_request_end_to_end() {
        let mut router = Router::new();
        router.add_route(Method::Get, "/hi", |_req: Request| async {
            let mut resp = Response::new();
            resp.status(StatusCode::Ok).body("hello");
            resp
        });

        let listener = Server::bind("127.0.0.1:0".parse().unwrap(), &ServerLimits::default()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::builder().listener(listener).router(router).build();
        tokio::spawn(server.launch());

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET /hi HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.ends_with("hello"));
    }

    #[tokio::test]
    async fn rejects_with_503_past_max_connections() {
        let router = Router::new();
        let listener = Server::bind("127.0.0.1:0".parse().unwrap(), &ServerLimits::default()).unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Server::builder()
            .listener(listener)
            .router(router)
            .server_limits(ServerLimits { max_connections: 0, ..ServerLimits::default() })
            .build();
        tokio::spawn(server.launch());

        let mut client = tokio::net::TcpStream::connect(addr).await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let text = String::from_utf8(response).unwrap();
        assert!(text.starts_with("HTTP/1.1 503 Service Unavailable\r\n"));
    }
}
