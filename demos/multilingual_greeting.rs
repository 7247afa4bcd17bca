use chirust_web::{Method, Response, Router, Server, StatusCode};

async fn greet(req: chirust_web::Request) -> Response {
    let text = match req.param("lang") {
        Some("en") => r#"{"lang": "en", "text": "Hello, world!"}"#,
        Some("zh") => r#"{"lang": "zh", "text": "你好世界！"}"#,
        Some("es") => r#"{"lang": "es", "text": "¡Hola Mundo!"}"#,
        Some("ar") => r#"{"lang": "ar", "text": "مرحبا بالعالم!"}"#,
        Some("pt") => r#"{"lang": "pt", "text": "Olá, mundo!"}"#,
        Some("hi") => r#"{"lang": "hi", "text": "हैलो वर्ल्ड!"}"#,
        Some("ru") => r#"{"lang": "ru", "text": "Привет, мир!"}"#,
        Some(_) => {
            let mut resp = Response::new();
            resp.status(StatusCode::NotFound)
                .header("Content-Type", "application/json")
                .body(r#"{"error": "Language not supported", "status": "Not Found"}"#);
            return resp;
        }
        None => r#"{"supported_lang": ["en", "zh", "es", "ar", "pt", "hi", "ru"]}"#,
    };

    let mut resp = Response::new();
    resp.status(StatusCode::Ok).header("Content-Type", "application/json").body(text);
    resp
}

async fn supported_langs(_req: chirust_web::Request) -> Response {
    let mut resp = Response::new();
    resp.status(StatusCode::Ok)
        .header("Content-Type", "application/json")
        .body(r#"{"supported_lang": ["en", "zh", "es", "ar", "pt", "hi", "ru"]}"#);
    resp
}

#[tokio::main]
async fn main() {
    let mut router = Router::new();
    router.add_route(Method::Get, "/api", supported_langs);
    router.add_route(Method::Get, "/api/{lang}", greet);

    let listener = Server::bind("127.0.0.1:8080".parse().unwrap(), &Default::default()).unwrap();
    Server::builder().listener(listener).router(router).build().launch().await;
}
