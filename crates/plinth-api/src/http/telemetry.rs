//! Per-route request counting.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::extract::MatchedPath;
use axum::http::Request;
use axum::response::Response;
use plinth_telemetry::Metrics;
use tower::{Layer, Service};

type CountedFuture<E> = Pin<Box<dyn Future<Output = Result<Response, E>> + Send>>;

/// Records `http_requests_total{route, code}` once the inner service answers.
#[derive(Clone)]
pub(crate) struct RouteMetricsLayer {
    metrics: Metrics,
}

impl RouteMetricsLayer {
    pub(crate) const fn new(metrics: Metrics) -> Self {
        Self { metrics }
    }
}

impl<S> Layer<S> for RouteMetricsLayer {
    type Service = RouteMetrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RouteMetrics {
            inner,
            metrics: self.metrics.clone(),
        }
    }
}

#[derive(Clone)]
pub(crate) struct RouteMetrics<S> {
    inner: S,
    metrics: Metrics,
}

/// Matched route template; `unmatched` for fallbacks.
fn route_label<B>(req: &Request<B>) -> String {
    req.extensions()
        .get::<MatchedPath>()
        .map_or("unmatched", MatchedPath::as_str)
        .to_string()
}

impl<S, B> Service<Request<B>> for RouteMetrics<S>
where
    S: Service<Request<B>, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send,
    B: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = CountedFuture<S::Error>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<B>) -> Self::Future {
        let route = route_label(&req);
        let metrics = self.metrics.clone();
        let pending = self.inner.call(req);
        Box::pin(async move {
            let response = pending.await?;
            metrics.inc_http_request(&route, response.status().as_u16());
            Ok(response)
        })
    }
}
