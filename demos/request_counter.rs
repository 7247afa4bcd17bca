//! A request counter shared across every connection, rather than reset per
//! connection as the counter this demo is descended from was: a closure capturing
//! an `Arc<AtomicUsize>` is the idiomatic way to give a handler state here, since
//! handlers no longer receive a connection-scoped slot to keep it in (see
//! [`chirust_web::Handler`]).

use chirust_web::{Method, Response, Router, Server, StatusCode};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let counter = Arc::new(AtomicUsize::new(0));

    let mut router = Router::new();
    router.add_route(Method::Get, "/", move |_req: chirust_web::Request| {
        let counter = counter.clone();
        async move {
            let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
            let mut resp = Response::new();
            resp.status(StatusCode::Ok)
                .header("Content-Type", "application/json")
                .body(format!(r#"{{"count_request": {count}}}"#));
            resp
        }
    });

    let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap();
    Server::builder().listener(listener).router(router).build().launch().await;
}
