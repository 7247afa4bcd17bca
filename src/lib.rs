//! chirust_web - a security-first, chi-style HTTP/1.1 router and server for
//! microservices
//!
//! A trie-based router with literal, `{param}`, and catch-all `*` route segments,
//! composable middleware, and a connection server that enforces conservative size
//! and timeout limits by default. Designed for services that want Go's `chi` router
//! ergonomics without giving up Rust's compile-time guarantees.
//!
//! # Quick Start
//!
//! ```no_run
//! use chirust_web::{Method, Response, Router, Server, StatusCode};
//!
//! async fn hello(_req: chirust_web::Request) -> Response {
//!     let mut resp = Response::new();
//!     resp.status(StatusCode::Ok).body("Hello, world!");
//!     resp
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut router = Router::new();
//!     router.add_route(Method::Get, "/", hello);
//!
//!     Server::builder()
//!         .listener(Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap())
//!         .router(router)
//!         .build()
//!         .launch()
//!         .await;
//! }
//! ```
//!
//! # Middleware
//!
//! Register middleware on a [`Router`] before adding routes; the leftmost-registered
//! middleware runs first on the way in and last on the way out:
//!
//! ```no_run
//! use chirust_web::{middleware, Router};
//!
//! let mut router = Router::new();
//! router.middleware(middleware::logger());
//! router.middleware(middleware::recoverer());
//! ```

pub(crate) mod http {
    pub(crate) mod path;
    pub(crate) mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod server_impl;
}
pub(crate) mod errors;
pub(crate) mod handler;
pub mod limits;
pub mod middleware;
pub mod router;

pub use crate::{
    handler::Handler,
    http::{
        request::Request,
        response::{BodyWriter, CookieAttrs, Handled, Response, WriteBuffer},
        types::{Method, StatusCode},
    },
    middleware::{CorsConfig, Middleware, RateLimitConfig},
    router::Router,
    server::server_impl::{Server, ServerBuilder},
};
