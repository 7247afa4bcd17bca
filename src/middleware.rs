//! Built-in middleware: request/response wrapping functions composed around a
//! matched handler by [`crate::router::Router::dispatch`].
//!
//! A middleware is represented as `Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler>>`
//! — a plain function from "downstream handler" to "wrapped handler" — rather than a
//! trait of its own, matching the functional-wrapping contract described for this
//! layer. Stateful middleware (rate-limiting, in-flight counters) captures its state
//! in the outer closure so construction is a visible, explicit step rather than
//! something hidden behind a zero-argument constructor.

use crate::http::types::Method;
use crate::{Handler, Request, Response, StatusCode};
use log::{error, info};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A function from a downstream handler to a wrapped handler. Registered on a
/// [`crate::Router`] via `Router::middleware`; the leftmost-registered middleware
/// runs first on the way in (see `Router::compose`).
pub type Middleware = Arc<dyn Fn(Arc<dyn Handler>) -> Arc<dyn Handler> + Send + Sync>;

/// Logs method, path, status, and elapsed milliseconds for every request, via the
/// `log` facade (`info!`). Install this outermost so it sees the final status code
/// after every other middleware (including Recoverer) has run.
pub fn logger() -> Middleware {
    Arc::new(|next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct Logger(Arc<dyn Handler>);
        impl Handler for Logger {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.0.clone();
                Box::pin(async move {
                    let method = req.method();
                    let path = req.path().to_string();
                    let start = Instant::now();
                    let resp = next.handle(req).await;
                    let elapsed = start.elapsed();
                    info!(
                        "{method} {path} {} {}ms",
                        resp.status_code().code(),
                        elapsed.as_millis()
                    );
                    resp
                })
            }
        }
        Arc::new(Logger(next))
    })
}

/// Catches a handler panic and turns it into a `500` response instead of letting it
/// tear down the connection task. Implemented by running the downstream handler as
/// a separate `tokio` task: a panic there surfaces as a `JoinError`, which Rust's
/// lack of C++-style exceptions makes the natural "catch" boundary for async code
/// (a bare `std::panic::catch_unwind` cannot reliably straddle `.await` points).
pub fn recoverer() -> Middleware {
    Arc::new(|next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct Recoverer(Arc<dyn Handler>);
        impl Handler for Recoverer {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.0.clone();
                Box::pin(async move {
                    match tokio::spawn(async move { next.handle(req).await }).await {
                        Ok(resp) => resp,
                        Err(join_err) => {
                            error!("handler panicked: {join_err}");
                            let mut resp = Response::new();
                            resp.status(StatusCode::InternalServerError)
                                .body(format!("{{\"error\":\"internal error\",\"detail\":\"{join_err}\"}}"));
                            resp
                        }
                    }
                })
            }
        }
        Arc::new(Recoverer(next))
    })
}

/// Configuration for [`cors`].
#[derive(Debug, Clone)]
pub struct CorsConfig {
    /// Origins allowed to make cross-origin requests. `"*"` allows any origin.
    pub allowed_origins: Vec<String>,
    /// Methods advertised in `Access-Control-Allow-Methods` on preflight responses.
    pub allowed_methods: Vec<String>,
    /// Headers advertised in `Access-Control-Allow-Headers` on preflight responses.
    pub allowed_headers: Vec<String>,
    /// Whether to emit `Access-Control-Allow-Credentials: true`.
    pub allow_credentials: bool,
    /// Preflight cache duration, in seconds, for `Access-Control-Max-Age`.
    pub max_age: Option<u64>,
}

/// Cross-Origin Resource Sharing. `OPTIONS` requests short-circuit with a `204` and
/// the full preflight header set; every other request gets the downstream response
/// with the origin decision appended.
pub fn cors(config: CorsConfig) -> Middleware {
    let config = Arc::new(config);
    Arc::new(move |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct Cors {
            next: Arc<dyn Handler>,
            config: Arc<CorsConfig>,
        }
        impl Handler for Cors {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.next.clone();
                let config = self.config.clone();
                Box::pin(async move {
                    let decision = origin_decision(&config, req.header("origin"));

                    if req.method() == Method::Options {
                        let mut resp = Response::new();
                        resp.status(StatusCode::NoContent)
                            .header("Access-Control-Allow-Methods", config.allowed_methods.join(", "))
                            .header("Access-Control-Allow-Headers", config.allowed_headers.join(", "));
                        if let Some(max_age) = config.max_age {
                            resp.header("Access-Control-Max-Age", max_age);
                        }
                        apply_origin(&mut resp, &config, decision);
                        resp.body("");
                        return resp;
                    }

                    let mut resp = next.handle(req).await;
                    apply_origin(&mut resp, &config, decision);
                    resp
                })
            }
        }
        Arc::new(Cors { next, config: config.clone() })
    })
}

fn origin_decision(config: &CorsConfig, request_origin: Option<&str>) -> Option<String> {
    if config.allowed_origins.iter().any(|o| o == "*") {
        return Some("*".to_string());
    }
    let origin = request_origin?;
    config.allowed_origins.iter().any(|o| o == origin).then(|| origin.to_string())
}

fn apply_origin(resp: &mut Response, config: &CorsConfig, decision: Option<String>) {
    if let Some(origin) = decision {
        resp.header("Access-Control-Allow-Origin", origin);
    }
    if config.allow_credentials {
        resp.header("Access-Control-Allow-Credentials", "true");
    }
}

/// Echoes an incoming `X-Request-Id`, or synthesizes one (`req-<nanos>`, nanoseconds
/// since process start) when the client didn't supply one.
pub fn request_id() -> Middleware {
    Arc::new(|next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct RequestId(Arc<dyn Handler>);
        impl Handler for RequestId {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.0.clone();
                Box::pin(async move {
                    let incoming = req.header("x-request-id").map(str::to_string);
                    let mut resp = next.handle(req).await;
                    let id = incoming.unwrap_or_else(|| format!("req-{}", nanos_since_start()));
                    resp.header("X-Request-Id", id);
                    resp
                })
            }
        }
        Arc::new(RequestId(next))
    })
}

fn nanos_since_start() -> u128 {
    static START: OnceLock<Instant> = OnceLock::new();
    START.get_or_init(Instant::now).elapsed().as_nanos()
}

/// Configuration for [`rate_limit`].
#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    /// Requests permitted per window.
    pub max_requests: u64,
    /// Window length.
    pub window: Duration,
}

struct RateLimitState {
    count: u64,
    window_start: Instant,
}

/// Fixed-window rate limiting. The counter is global to this middleware instance
/// (shared across every connection that dispatches through it), not partitioned per
/// client — matching the core contract, which does not require per-client
/// partitioning.
pub fn rate_limit(config: RateLimitConfig) -> Middleware {
    let state = Arc::new(Mutex::new(RateLimitState { count: 0, window_start: Instant::now() }));
    Arc::new(move |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct RateLimit {
            next: Arc<dyn Handler>,
            config: RateLimitConfig,
            state: Arc<Mutex<RateLimitState>>,
        }
        impl Handler for RateLimit {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.next.clone();
                let config = self.config;
                let state = self.state.clone();
                Box::pin(async move {
                    let limited = {
                        let mut guard = state.lock().expect("rate limit mutex poisoned");
                        let now = Instant::now();
                        if now.duration_since(guard.window_start) >= config.window {
                            guard.count = 0;
                            guard.window_start = now;
                        }
                        if guard.count >= config.max_requests {
                            true
                        } else {
                            guard.count += 1;
                            false
                        }
                    };

                    if limited {
                        let mut resp = Response::new();
                        resp.status(StatusCode::TooManyRequests)
                            .header("Retry-After", config.window.as_secs())
                            .body("");
                        resp
                    } else {
                        next.handle(req).await
                    }
                })
            }
        }
        Arc::new(RateLimit { next, config, state: state.clone() })
    })
}

/// Bounds how long a handler may run before the client receives a `504`. The
/// downstream handler keeps running to completion in the background even after the
/// deadline fires — this implementation has no way to forcibly cancel an in-flight
/// handler, only to stop waiting on it.
pub fn timeout(duration: Duration) -> Middleware {
    Arc::new(move |next: Arc<dyn Handler>| -> Arc<dyn Handler> {
        struct Timeout {
            next: Arc<dyn Handler>,
            duration: Duration,
        }
        impl Handler for Timeout {
            fn handle(&self, req: Request) -> BoxFuture<'static, Response> {
                let next = self.next.clone();
                let duration = self.duration;
                Box::pin(async move {
                    let task = tokio::spawn(async move { next.handle(req).await });
                    tokio::select! {
                        result = task => match result {
                            Ok(resp) => resp,
                            Err(join_err) => {
                                error!("handler panicked before timeout: {join_err}");
                                let mut resp = Response::new();
                                resp.status(StatusCode::InternalServerError).body("");
                                resp
                            }
                        },
                        _ = tokio::time::sleep(duration) => {
                            let mut resp = Response::new();
                            resp.status(StatusCode::GatewayTimeout).body("");
                            resp
                        }
                    }
                })
            }
        }
        Arc::new(Timeout { next, duration })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::router::Router;

    async fn panics(_req: Request) -> Response {
        panic!("boom");
    }

    async fn slow(_req: Request) -> Response {
        tokio::time::sleep(Duration::from_millis(50)).await;
        let mut resp = Response::new();
        resp.body("done");
        resp
    }

    async fn echo_origin(req: Request) -> Response {
        let mut resp = Response::new();
        resp.body(req.header("origin").unwrap_or("").to_string());
        resp
    }

    fn get_request(path: &str) -> Request {
        Request::new(Method::Get, path.to_string(), vec![], vec![], Default::default())
    }

    #[tokio::test]
    async fn recoverer_turns_panic_into_500() {
        let mut router = Router::new();
        router.middleware(recoverer());
        router.add_route(Method::Get, "/boom", panics);
        let resp = router.dispatch(get_request("/boom")).await;
        assert_eq!(resp.status_code(), StatusCode::InternalServerError);
    }

    #[tokio::test]
    async fn timeout_returns_504_and_lets_handler_keep_running() {
        let mut router = Router::new();
        router.middleware(timeout(Duration::from_millis(5)));
        router.add_route(Method::Get, "/slow", slow);
        let resp = router.dispatch(get_request("/slow")).await;
        assert_eq!(resp.status_code(), StatusCode::GatewayTimeout);
    }

    #[tokio::test]
    async fn rate_limit_allows_up_to_max_then_429() {
        let mut router = Router::new();
        router.middleware(rate_limit(RateLimitConfig { max_requests: 3, window: Duration::from_secs(60) }));
        router.add_route(Method::Get, "/limited", |_req: Request| async {
            let mut resp = Response::new();
            resp.body("ok");
            resp
        });

        for _ in 0..3 {
            let resp = router.dispatch(get_request("/limited")).await;
            assert_eq!(resp.status_code(), StatusCode::Ok);
        }
        let resp = router.dispatch(get_request("/limited")).await;
        assert_eq!(resp.status_code(), StatusCode::TooManyRequests);
        assert_eq!(resp.get_header("retry-after"), Some("60"));
    }

    #[tokio::test]
    async fn request_id_synthesizes_when_absent() {
        let mut router = Router::new();
        router.middleware(request_id());
        router.add_route(Method::Get, "/", |_req: Request| async {
            let mut resp = Response::new();
            resp.body("");
            resp
        });
        let resp = router.dispatch(get_request("/")).await;
        assert!(resp.get_header("x-request-id").unwrap().starts_with("req-"));
    }

    #[tokio::test]
    async fn cors_preflight_short_circuits_with_204() {
        let mut router = Router::new();
        router.middleware(cors(CorsConfig {
            allowed_origins: vec!["*".to_string()],
            allowed_methods: vec!["GET".to_string()],
            allowed_headers: vec!["Content-Type".to_string()],
            allow_credentials: false,
            max_age: Some(600),
        }));
        router.add_route(Method::Get, "/", echo_origin);

        let options_req = Request::new(Method::Options, "/".to_string(), vec![], vec![], Default::default());
        let resp = router.dispatch(options_req).await;
        assert_eq!(resp.status_code(), StatusCode::NoContent);
        assert_eq!(resp.get_header("access-control-allow-origin"), Some("*"));
    }
}
