//! Integration tests that exercise the connection server end-to-end over a real
//! loopback `TcpListener`, the same way the teacher codebase's doctested examples
//! drive its server.

use chirust_web::limits::ServerLimits;
use chirust_web::{middleware, Method, Request, Response, Router, Server, StatusCode};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

async fn start(router: Router) -> std::net::SocketAddr {
    let _ = env_logger::builder().is_test(true).try_init();
    let listener = Server::bind("127.0.0.1:0".parse().unwrap(), &ServerLimits::default()).unwrap();
    let addr = listener.local_addr().unwrap();
    let server = Server::builder().listener(listener).router(router).build();
    tokio::spawn(server.launch());
    addr
}

async fn roundtrip(addr: std::net::SocketAddr, request: &[u8]) -> String {
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(request).await.unwrap();
    let mut response = Vec::new();
    client.read_to_end(&mut response).await.unwrap();
    String::from_utf8(response).unwrap()
}

#[tokio::test]
async fn routes_with_path_params_and_query_string() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/users/{id}", |req: Request| async move {
        let mut resp = Response::new();
        resp.status(StatusCode::Ok).body(format!(
            "id={} sort={}",
            req.param("id").unwrap_or(""),
            req.query("sort").unwrap_or("none"),
        ));
        resp
    });

    let addr = start(router).await;
    let text = roundtrip(
        addr,
        b"GET /users/42?sort=name HTTP/1.1\r\nConnection: close\r\n\r\n",
    )
    .await;

    assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(text.ends_with("id=42 sort=name"));
}

#[tokio::test]
async fn middleware_stack_runs_in_registration_order() {
    let mut router = Router::new();
    router.middleware(middleware::request_id());
    router.middleware(middleware::recoverer());
    router.add_route(Method::Get, "/boom", |_req: Request| async {
        panic!("deliberate handler panic");
    });

    let addr = start(router).await;
    let text = roundtrip(addr, b"GET /boom HTTP/1.1\r\nConnection: close\r\n\r\n").await;

    assert!(text.starts_with("HTTP/1.1 500 Internal Server Error\r\n"));
    assert!(text.contains("X-Request-Id: req-"));
}

#[tokio::test]
async fn unknown_route_is_404_and_wrong_method_is_405_with_allow() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/resource", |_req: Request| async {
        let mut resp = Response::new();
        resp.body("ok");
        resp
    });

    let addr = start(router).await;

    let not_found = roundtrip(addr, b"GET /nope HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(not_found.starts_with("HTTP/1.1 404 Not Found\r\n"));

    let method_miss = roundtrip(addr, b"DELETE /resource HTTP/1.1\r\nConnection: close\r\n\r\n").await;
    assert!(method_miss.starts_with("HTTP/1.1 405 Method Not Allowed\r\n"));
    assert!(method_miss.contains("Allow: GET"));
}

#[tokio::test]
async fn keep_alive_connection_serves_pipelined_requests() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/ping", |_req: Request| async {
        let mut resp = Response::new();
        resp.body("pong");
        resp
    });

    let addr = start(router).await;
    let mut client = TcpStream::connect(addr).await.unwrap();
    client.write_all(b"GET /ping HTTP/1.1\r\n\r\n").await.unwrap();

    let mut buf = [0u8; 256];
    let n = client.read(&mut buf).await.unwrap();
    let first = String::from_utf8_lossy(&buf[..n]);
    assert!(first.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(first.ends_with("pong"));

    client.write_all(b"GET /ping HTTP/1.1\r\nConnection: close\r\n\r\n").await.unwrap();
    let mut rest = Vec::new();
    client.read_to_end(&mut rest).await.unwrap();
    let second = String::from_utf8(rest).unwrap();
    assert!(second.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(second.ends_with("pong"));
}

#[tokio::test]
async fn path_traversal_is_rejected_with_400_and_closes() {
    let router = Router::new();
    let addr = start(router).await;
    let text = roundtrip(addr, b"GET /../etc/passwd HTTP/1.1\r\n\r\n").await;
    assert!(text.starts_with("HTTP/1.1 400 Bad Request\r\n"));
}
