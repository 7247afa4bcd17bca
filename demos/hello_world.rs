use chirust_web::{Method, Response, Router, Server, StatusCode};

async fn hello(_req: chirust_web::Request) -> Response {
    let mut resp = Response::new();
    resp.status(StatusCode::Ok).header("Content-Type", "text/plain").body("Hello, world!");
    resp
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/", hello);

    let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap();
    Server::builder().listener(listener).router(router).build().launch().await;
}
