//! Prometheus metrics for route table operations

use anyhow::Result;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, IntGauge, Opts, Registry, TextEncoder};
use route_core::CoreError;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Route operation metrics, cheap to clone
#[derive(Clone)]
pub struct RouteMetrics {
    /// Reconciler calls by operation and outcome (success, busy, error)
    pub route_operations_total: CounterVec,
    /// Reconciler call latency in seconds
    pub route_operation_duration_seconds: HistogramVec,
    /// Managed routes seen by the last listing
    pub managed_routes: IntGauge,
    pub registry: Arc<Registry>,
}

impl RouteMetrics {
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());

        let route_operations_total = CounterVec::new(
            Opts::new("route_operations_total", "Total route table operations"),
            &["operation", "outcome"],
        )?;

        let route_operation_duration_seconds = HistogramVec::new(
            HistogramOpts::new(
                "route_operation_duration_seconds",
                "Route table operation latency in seconds",
            ),
            &["operation"],
        )?;

        let managed_routes = IntGauge::new(
            "managed_routes",
            "Routes owned by this controller in the route table",
        )?;

        registry.register(Box::new(route_operations_total.clone()))?;
        registry.register(Box::new(route_operation_duration_seconds.clone()))?;
        registry.register(Box::new(managed_routes.clone()))?;

        Ok(Self {
            route_operations_total,
            route_operation_duration_seconds,
            managed_routes,
            registry,
        })
    }

    /// Count one reconciler call started at `started`
    pub fn record<T>(&self, operation: &str, started: Instant, result: &Result<T, CoreError>) {
        let outcome = match result {
            Ok(_) => "success",
            Err(err) if err.is_busy() => "busy",
            Err(_) => "error",
        };

        self.route_operations_total
            .with_label_values(&[operation, outcome])
            .inc();
        self.route_operation_duration_seconds
            .with_label_values(&[operation])
            .observe(started.elapsed().as_secs_f64());
    }

    /// Gather all metrics in Prometheus text format
    pub fn gather(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = vec![];
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

/// Serve `/metrics` and `/healthz` on `addr`
pub async fn serve(addr: SocketAddr, metrics: RouteMetrics) -> Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, peer) = listener.accept().await?;
        let metrics = metrics.clone();

        tokio::task::spawn(async move {
            let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                let response = respond(&req, &metrics);
                async move { Ok::<_, Infallible>(response) }
            });

            if let Err(e) = http1::Builder::new()
                .serve_connection(TokioIo::new(stream), service)
                .await
            {
                debug!("Metrics connection from {} failed: {}", peer, e);
            }
        });
    }
}

fn respond<B>(req: &Request<B>, metrics: &RouteMetrics) -> Response<Full<Bytes>> {
    match req.uri().path() {
        "/metrics" => match metrics.gather() {
            Ok(body) => {
                let mut response = Response::new(Full::new(Bytes::from(body)));
                response.headers_mut().insert(
                    CONTENT_TYPE,
                    HeaderValue::from_static("text/plain; version=0.0.4"),
                );
                response
            }
            Err(e) => {
                warn!("Failed to gather metrics: {}", e);
                text(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error\n")
            }
        },
        "/healthz" => text(StatusCode::OK, "OK\n"),
        _ => text(StatusCode::NOT_FOUND, "Not Found\n"),
    }
}

fn text(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from_static(body.as_bytes())));
    *response.status_mut() = status;
    response
}
