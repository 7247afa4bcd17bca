//! The `Handler` trait: the seam where a dispatched request meets application code.
//!
//! Unlike the teacher codebase's `Handler<S>` (a synchronous `&Request -> &mut
//! Response` callback taking a connection-scoped state slot), a handler here is any
//! `Fn(Request) -> impl Future<Output = Response>` value — an ordinary `async fn` or
//! async closure satisfies this directly, with no connection-state parameter, since
//! state now travels through the request's own context map (see
//! [`crate::Request::with_ctx`]) rather than a side channel threaded through every
//! connection.

use crate::{Request, Response};
use std::future::Future;
use std::pin::Pin;

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Turns a [`Request`] into a [`Response`]. The router stores matched routes as
/// `Arc<dyn Handler>`; middleware wraps one handler to produce another.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request, producing a response.
    fn handle(&self, req: Request) -> BoxFuture<'static, Response>;
}

impl<F, Fut> Handler for F
where
    F: Fn(Request) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Response> + Send + 'static,
{
    fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
        Box::pin(self(req))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::types::{Method, StatusCode};

    async fn echo(req: Request) -> Response {
        let mut resp = Response::new();
        resp.status(StatusCode::Ok).body(req.path().to_string());
        resp
    }

    #[tokio::test]
    async fn plain_async_fn_is_a_handler() {
        let req = Request::new(Method::Get, "/ping".to_string(), vec![], vec![], Default::default());
        let resp = echo.handle(req).await;
        assert_eq!(resp.body_bytes(), b"/ping");
    }

    #[tokio::test]
    async fn closure_is_a_handler() {
        let greeting = "hi".to_string();
        let handler = move |_req: Request| {
            let greeting = greeting.clone();
            async move {
                let mut resp = Response::new();
                resp.body(greeting);
                resp
            }
        };
        let req = Request::new(Method::Get, "/".to_string(), vec![], vec![], Default::default());
        let resp = handler.handle(req).await;
        assert_eq!(resp.body_bytes(), b"hi");
    }
}
