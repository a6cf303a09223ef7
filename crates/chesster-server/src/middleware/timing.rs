//! Request timing middleware.

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use std::time::{Duration, Instant};

/// Anything slower than this is logged as a warning. Move requests wait for
/// the engine, so the bar sits above a typical search.
const SLOW_REQUEST: Duration = Duration::from_secs(5);

/// Logs each request once it has been answered.
///
/// Engine failures (5xx) and slow requests are warnings; everything else is
/// logged at debug level.
pub async fn timing_layer(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let elapsed = start.elapsed();
    let status = response.status();
    let duration_ms = elapsed.as_millis() as u64;

    if status.is_server_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), duration_ms, "Request failed");
    } else if elapsed > SLOW_REQUEST {
        tracing::warn!(%method, %path, status = status.as_u16(), duration_ms, "Slow request");
    } else {
        tracing::debug!(%method, %path, status = status.as_u16(), duration_ms, "Request completed");
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
        middleware,
        routing::get,
        Router,
    };
    use tower::ServiceExt;

    async fn ok_handler() -> &'static str {
        "ok"
    }

    async fn failing_handler() -> StatusCode {
        StatusCode::SERVICE_UNAVAILABLE
    }

    #[tokio::test]
    async fn test_timing_middleware_preserves_response() {
        let app: Router = Router::new()
            .route("/test", get(ok_handler))
            .layer(middleware::from_fn(timing_layer));

        let response = app
            .oneshot(Request::builder().uri("/test").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn test_timing_middleware_passes_through_errors() {
        let app: Router = Router::new()
            .route("/fail", get(failing_handler))
            .layer(middleware::from_fn(timing_layer));

        let response = app
            .oneshot(Request::builder().uri("/fail").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
