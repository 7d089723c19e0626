//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, health
//! route, asset lookup, and the 404 fallback. The handler is infallible;
//! every resolution failure degrades to the fallback page.

use crate::config::AppState;
use crate::handler::assets;
use crate::handler::health::HealthStatus;
use crate::http::{self, cache};
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Method, Request, Response, Version};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    remote_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let started = Instant::now();
    let method = req.method();
    let path = req.uri().path();
    let is_head = *method == Method::HEAD;

    // 1. Check HTTP method
    if let Some(resp) = check_http_method(method) {
        return Ok(resp);
    }

    // 2. Reject oversized declared bodies
    if let Some(resp) = check_body_size(&req, state.config.performance.max_body_size) {
        return Ok(resp);
    }

    // 3. Extract conditional request header
    let if_none_match = req
        .headers()
        .get("if-none-match")
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string);

    // 4. Dispatch
    let response = route_request(&state, path, is_head, if_none_match.as_deref());

    // 5. Access log
    if state.config.logging.access_log {
        let entry = build_access_entry(&req, remote_addr, &response, started);
        logger::log_access(&entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

/// Check HTTP method and return appropriate response for non-GET/HEAD methods
fn check_http_method(method: &Method) -> Option<Response<Full<Bytes>>> {
    match method {
        &Method::GET | &Method::HEAD => None,
        &Method::OPTIONS => Some(http::build_options_response()),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response())
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let content_length = req.headers().get("content-length")?;
    let size_str = content_length.to_str().ok()?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        _ => None,
    }
}

/// Route request based on path
fn route_request(
    state: &Arc<AppState>,
    path: &str,
    is_head: bool,
    if_none_match: Option<&str>,
) -> Response<Full<Bytes>> {
    // Health route first; it must not depend on the asset set
    if path == state.config.site.health_path {
        let json = HealthStatus::current(&state.started).to_json();
        return http::build_health_response(json, is_head);
    }

    let asset = if path == "/" {
        state.assets.index()
    } else {
        assets::sanitize_request_path(path).and_then(|key| state.assets.get(&key))
    };

    match asset {
        Some(asset) => {
            let etag = cache::generate_etag(&asset.content);
            if cache::check_etag_match(if_none_match, &etag) {
                return http::build_304_response(&etag);
            }
            http::build_asset_response(asset.content.clone(), asset.content_type, &etag, is_head)
        }
        None => http::build_not_found_response(state.assets.fallback(), is_head),
    }
}

/// Assemble the access log entry for a finished request
fn build_access_entry<B>(
    req: &Request<B>,
    remote_addr: SocketAddr,
    response: &Response<Full<Bytes>>,
    started: Instant,
) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        remote_addr.to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = match req.version() {
        Version::HTTP_10 => "1.0".to_string(),
        Version::HTTP_2 => "2".to_string(),
        _ => "1.1".to_string(),
    };
    entry.status = response.status().as_u16();
    entry.body_bytes = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    entry.referer = header_string(req, "referer");
    entry.user_agent = header_string(req, "user-agent");
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
    entry
}

fn header_string<B>(req: &Request<B>, name: &str) -> Option<String> {
    req.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LoggingConfig, PerformanceConfig, ServerConfig, SiteConfig};
    use http_body_util::BodyExt;
    use std::fs;

    const INDEX_BODY: &str = "<html><body>Welcome</body></html>";
    const NOT_FOUND_BODY: &str = "<html><body>Lost?</body></html>";
    const CSS_BODY: &str = "body { margin: 0; }";
    const JS_BODY: &str = "console.log('hi');";

    fn test_state() -> (tempfile::TempDir, Arc<AppState>) {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("index.html"), INDEX_BODY).unwrap();
        fs::write(dir.path().join("404.html"), NOT_FOUND_BODY).unwrap();
        fs::create_dir(dir.path().join("css")).unwrap();
        fs::write(dir.path().join("css/style.css"), CSS_BODY).unwrap();
        fs::create_dir(dir.path().join("js")).unwrap();
        fs::write(dir.path().join("js/main.js"), JS_BODY).unwrap();

        let config = Config {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                workers: None,
            },
            site: SiteConfig {
                root: dir.path().to_str().unwrap().to_string(),
                index_file: "index.html".to_string(),
                not_found_file: "404.html".to_string(),
                health_path: "/health".to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                access_log: false,
                access_log_format: "combined".to_string(),
                access_log_file: None,
                error_log_file: None,
            },
            performance: PerformanceConfig {
                keep_alive_timeout: 75,
                read_timeout: 30,
                write_timeout: 30,
                max_connections: None,
                max_body_size: 1024,
            },
        };

        (dir, Arc::new(AppState::new(config)))
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    fn get(path: &str) -> Request<()> {
        Request::builder()
            .method(Method::GET)
            .uri(path)
            .body(())
            .unwrap()
    }

    async fn body_bytes(response: Response<Full<Bytes>>) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    fn content_type(response: &Response<Full<Bytes>>) -> &str {
        response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
    }

    #[tokio::test]
    async fn test_root_serves_index_as_html() {
        let (_dir, state) = test_state();
        let resp = handle_request(get("/"), peer(), state).await.unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(content_type(&resp), "text/html; charset=utf-8");
        assert_eq!(body_bytes(resp).await, INDEX_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_assets_round_trip_with_mapped_types() {
        let (_dir, state) = test_state();

        let css = handle_request(get("/css/style.css"), peer(), Arc::clone(&state))
            .await
            .unwrap();
        assert_eq!(css.status(), 200);
        assert_eq!(content_type(&css), "text/css");
        assert_eq!(body_bytes(css).await, CSS_BODY.as_bytes());

        let js = handle_request(get("/js/main.js"), peer(), state).await.unwrap();
        assert_eq!(js.status(), 200);
        assert_eq!(content_type(&js), "application/javascript");
        assert_eq!(body_bytes(js).await, JS_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_unmatched_path_gets_html_fallback() {
        let (_dir, state) = test_state();
        let resp = handle_request(get("/missing/page.js"), peer(), state)
            .await
            .unwrap();

        assert_eq!(resp.status(), 404);
        // 404 stays text/html even when the requested path looks like JS
        assert_eq!(content_type(&resp), "text/html; charset=utf-8");
        assert_eq!(body_bytes(resp).await, NOT_FOUND_BODY.as_bytes());
    }

    #[tokio::test]
    async fn test_health_returns_parseable_json() {
        let (_dir, state) = test_state();
        let resp = handle_request(get("/health"), peer(), state).await.unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(content_type(&resp), "application/json");

        let body = body_bytes(resp).await;
        let parsed: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(parsed["status"], "OK");
        assert!(chrono::DateTime::parse_from_rfc3339(parsed["timestamp"].as_str().unwrap()).is_ok());
        assert!(parsed["uptime"].as_f64().unwrap() >= 0.0);
    }

    #[tokio::test]
    async fn test_health_uptime_is_non_decreasing() {
        let (_dir, state) = test_state();

        let first = body_bytes(
            handle_request(get("/health"), peer(), Arc::clone(&state))
                .await
                .unwrap(),
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        let second = body_bytes(handle_request(get("/health"), peer(), state).await.unwrap()).await;

        let first: serde_json::Value = serde_json::from_slice(&first).unwrap();
        let second: serde_json::Value = serde_json::from_slice(&second).unwrap();
        assert!(second["uptime"].as_f64().unwrap() >= first["uptime"].as_f64().unwrap());
    }

    #[tokio::test]
    async fn test_no_server_identifying_headers() {
        let (_dir, state) = test_state();

        for path in ["/", "/health", "/css/style.css", "/nope"] {
            let resp = handle_request(get(path), peer(), Arc::clone(&state))
                .await
                .unwrap();
            assert!(resp.headers().get("server").is_none(), "Server header on {path}");
            assert!(
                resp.headers().get("x-powered-by").is_none(),
                "X-Powered-By header on {path}"
            );
        }
    }

    #[tokio::test]
    async fn test_traversal_attempts_get_404() {
        let (_dir, state) = test_state();

        for path in ["/../server-config", "/%2e%2e%2fsecret", "/css/../../etc/passwd"] {
            let resp = handle_request(get(path), peer(), Arc::clone(&state))
                .await
                .unwrap();
            assert_eq!(resp.status(), 404, "expected 404 for {path}");
            assert_eq!(content_type(&resp), "text/html; charset=utf-8");
            assert_eq!(body_bytes(resp).await, NOT_FOUND_BODY.as_bytes());
        }
    }

    #[tokio::test]
    async fn test_repeated_gets_are_idempotent() {
        let (_dir, state) = test_state();

        let first = handle_request(get("/css/style.css"), peer(), Arc::clone(&state))
            .await
            .unwrap();
        let second = handle_request(get("/css/style.css"), peer(), state)
            .await
            .unwrap();

        assert_eq!(first.status(), second.status());
        assert_eq!(body_bytes(first).await, body_bytes(second).await);
    }

    #[tokio::test]
    async fn test_concurrent_mixed_requests() {
        let (_dir, state) = test_state();

        let paths = ["/health", "/", "/css/style.css", "/js/main.js", "/nope"];
        let mut handles = Vec::new();
        for path in paths {
            let state = Arc::clone(&state);
            handles.push(tokio::spawn(async move {
                let resp = handle_request(get(path), peer(), state).await.unwrap();
                (path, resp.status().as_u16())
            }));
        }

        for handle in handles {
            let (path, status) = handle.await.unwrap();
            let expected = if path == "/nope" { 404 } else { 200 };
            assert_eq!(status, expected, "unexpected status for {path}");
        }
    }

    #[tokio::test]
    async fn test_head_mirrors_get_headers_with_empty_body() {
        let (_dir, state) = test_state();

        let head = Request::builder()
            .method(Method::HEAD)
            .uri("/css/style.css")
            .body(())
            .unwrap();
        let resp = handle_request(head, peer(), state).await.unwrap();

        assert_eq!(resp.status(), 200);
        assert_eq!(content_type(&resp), "text/css");
        assert_eq!(
            resp.headers().get("content-length").unwrap(),
            &CSS_BODY.len().to_string()
        );
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_if_none_match_yields_304() {
        let (_dir, state) = test_state();

        let first = handle_request(get("/"), peer(), Arc::clone(&state))
            .await
            .unwrap();
        let etag = first.headers().get("etag").unwrap().to_str().unwrap().to_string();

        let conditional = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header("if-none-match", &etag)
            .body(())
            .unwrap();
        let resp = handle_request(conditional, peer(), state).await.unwrap();

        assert_eq!(resp.status(), 304);
        assert!(body_bytes(resp).await.is_empty());
    }

    #[tokio::test]
    async fn test_post_is_rejected() {
        let (_dir, state) = test_state();

        let post = Request::builder()
            .method(Method::POST)
            .uri("/")
            .body(())
            .unwrap();
        let resp = handle_request(post, peer(), state).await.unwrap();
        assert_eq!(resp.status(), 405);
    }

    #[tokio::test]
    async fn test_oversized_declared_body_is_rejected() {
        let (_dir, state) = test_state();

        let req = Request::builder()
            .method(Method::GET)
            .uri("/")
            .header("content-length", "1048577")
            .body(())
            .unwrap();
        let resp = handle_request(req, peer(), state).await.unwrap();
        assert_eq!(resp.status(), 413);
    }
}
