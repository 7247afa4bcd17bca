//! Server configuration: connection admission, per-connection timeouts, and
//! wire-parser size guards.
//!
//! # Security-First Defaults
//!
//! Default limits are intentionally conservative to prevent:
//! - Resource exhaustion attacks
//! - Memory overflows
//! - Slowloris attacks
//! - Header flooding
//!
//! # Examples
//!
//! ```no_run
//! use chirust_web::{Router, Server};
//! use chirust_web::limits::{ConnLimits, ReqLimits, ServerLimits};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let server_limits = ServerLimits {
//!         max_connections: 5000, // Higher concurrency
//!         ..ServerLimits::default()
//!     };
//!     let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &server_limits).unwrap();
//!
//!     Server::builder()
//!         .listener(listener)
//!         .router(Router::new())
//!         .server_limits(server_limits)
//!         .connection_limits(ConnLimits {
//!             read_timeout: Duration::from_secs(5),
//!             ..ConnLimits::default()
//!         })
//!         .request_limits(ReqLimits {
//!             max_body_size: 16 * 1024, // 16KB for larger payloads
//!             ..ReqLimits::default()
//!         })
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```

use std::time::Duration;

/// Controls connection admission: how many connections may be in flight at once,
/// and what happens when that cap is reached.
///
/// Mirrors the "Configuration surface" of the server: everything here is read once
/// at startup and shared read-only across the accept loop and every connection task.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct ServerLimits {
    /// Maximum number of simultaneously active connections. Once reached, new
    /// connections are answered with `503 Service Unavailable` and closed
    /// immediately instead of being queued.
    ///
    /// Default: `1024`.
    pub max_connections: usize,
    /// Listen backlog passed to the OS socket (`SO_LISTEN` backlog), independent of
    /// `max_connections` — this bounds the kernel's not-yet-`accept`ed queue, not
    /// the server's own admitted-connection count.
    ///
    /// Default: `128`.
    pub listen_backlog: u32,
    _priv: (),
}

impl Default for ServerLimits {
    fn default() -> Self {
        ServerLimits { max_connections: 1024, listen_backlog: 128, _priv: () }
    }
}

/// Controls per-connection read/write timeouts and keep-alive behavior.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct ConnLimits {
    /// How long the connection task waits for the *first* request's bytes to start
    /// arriving before giving up. Exceeding this on a connection's first request
    /// yields `408 Request Timeout`; a fresh connection waiting longer than this
    /// with zero bytes read is considered abandoned.
    ///
    /// Default: `30s`.
    pub read_timeout: Duration,
    /// How long the connection task waits, between pipelined requests on an
    /// already-productive keep-alive connection, before closing silently.
    ///
    /// Default: `5s`.
    pub keep_alive_timeout: Duration,
    /// How long a single write of a serialized response may take before the
    /// connection is abandoned.
    ///
    /// Default: `5s`.
    pub write_timeout: Duration,
    _priv: (),
}

impl Default for ConnLimits {
    fn default() -> Self {
        ConnLimits {
            read_timeout: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(5),
            write_timeout: Duration::from_secs(5),
            _priv: (),
        }
    }
}

/// Controls the wire parser's size guards — the knobs named directly in the
/// external configuration surface (`max_header_size`, `max_body_size`) plus a
/// handful of finer-grained ambient limits the teacher codebase also exposed.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct ReqLimits {
    /// Maximum number of bytes the accumulated header block (request-line plus
    /// header lines, up to and including the terminating blank line) may occupy
    /// before the connection is closed without a response.
    ///
    /// Default: `8192`.
    pub max_header_size: usize,
    /// Maximum `Content-Length` the parser will accept. A request announcing a
    /// larger body is rejected with `413 Payload Too Large`.
    ///
    /// Default: `1_048_576` (1 MiB).
    pub max_body_size: usize,
    /// Maximum number of header lines accepted before the request is treated as a
    /// parse failure, independent of the raw byte budget above.
    ///
    /// Default: `64`.
    pub max_header_count: usize,
    _priv: (),
}

impl Default for ReqLimits {
    fn default() -> Self {
        ReqLimits {
            max_header_size: 8192,
            max_body_size: 1024 * 1024,
            max_header_count: 64,
            _priv: (),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_configuration_surface() {
        let server = ServerLimits::default();
        assert_eq!(server.max_connections, 1024);
        assert_eq!(server.listen_backlog, 128);

        let conn = ConnLimits::default();
        assert_eq!(conn.read_timeout, Duration::from_secs(30));
        assert_eq!(conn.keep_alive_timeout, Duration::from_secs(5));

        let req = ReqLimits::default();
        assert_eq!(req.max_header_size, 8192);
        assert_eq!(req.max_body_size, 1024 * 1024);
    }
}
