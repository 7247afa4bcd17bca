use chirust_web::{Method, Response, Router, Server, StatusCode};

async fn inspect(req: chirust_web::Request) -> Response {
    let user_agent = match req.header("user-agent") {
        Some(value) => format!(r#", "user_agent": {value:?}"#),
        None => String::new(),
    };
    let content_type = match req.header("content-type") {
        Some(value) => format!(r#", "content_type": {value:?}"#),
        None => String::new(),
    };

    let result = format!(
        r#"{{"method": "{}", "path": {:?}{user_agent}{content_type}, "body": {:?}}}"#,
        req.method(),
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
    router.add_route(Method::Get, "/*", inspect);
    router.add_route(Method::Post, "/*", inspect);

    let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap();
    Server::builder().listener(listener).router(router).build().launch().await;
}
