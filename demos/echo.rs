use chirust_web::{Method, Response, Router, Server, StatusCode};

async fn echo(req: chirust_web::Request) -> Response {
    let result = format!(
        r#"{{"path": {:?}, "body": {:?}}}"#,
        req.path(),
        req.body_str().unwrap_or(""),
    );

    let mut resp = Response::new();
    resp.status(StatusCode::Ok).header("Content-Type", "application/json").body(result);
    resp
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/echo", echo);
    router.add_route(Method::Post, "/echo", echo);

    let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap();
    Server::builder().listener(listener).router(router).build().launch().await;
}
