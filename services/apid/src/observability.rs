//! Tracing, trace-context propagation, and Prometheus metrics for apid.
//!
//! Span export over OTLP is enabled only when `OTEL_EXPORTER_OTLP_ENDPOINT`
//! is set; otherwise spans stay local to the fmt layer. Both the subscriber
//! and the metrics recorder are process-global, so setup runs once.
use anyhow::Context;
use axum::http::HeaderMap;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use opentelemetry::KeyValue;
use opentelemetry::global;
use opentelemetry::propagation::Extractor;
use opentelemetry::trace::TracerProvider;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::SdkTracerProvider;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::{Once, OnceLock};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const REQUESTS_TOTAL: &str = "apid_requests_total";
pub const RESOURCES_TOTAL: &str = "apid_resources_total";

const OTLP_ENDPOINT_VAR: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

static SUBSCRIBER: Once = Once::new();
static PROPAGATOR: Once = Once::new();
static RECORDER: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the tracing subscriber and the Prometheus recorder.
pub fn init_observability(service_name: &str) -> anyhow::Result<PrometheusHandle> {
    SUBSCRIBER.call_once(|| {
        install_propagator();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let registry = tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer());
        let (provider, export_error) = match otlp_provider(service_name) {
            Ok(provider) => (provider, None),
            Err(err) => (None, Some(err)),
        };
        let otel_layer = provider.map(|provider| {
            tracing_opentelemetry::layer().with_tracer(provider.tracer(service_name.to_string()))
        });
        let exporting = otel_layer.is_some();
        let _ = registry.with(otel_layer).try_init();
        if let Some(err) = export_error {
            tracing::warn!(error = %err, "OTLP span export disabled");
        }
        tracing::debug!(service = service_name, exporting, "tracing initialized");
    });
    metrics_handle()
}

fn install_propagator() {
    PROPAGATOR.call_once(|| global::set_text_map_propagator(TraceContextPropagator::new()));
}

fn otlp_provider(service_name: &str) -> anyhow::Result<Option<SdkTracerProvider>> {
    if std::env::var_os(OTLP_ENDPOINT_VAR).is_none() {
        return Ok(None);
    }
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .build()
        .context("build OTLP span exporter")?;
    let resource = opentelemetry_sdk::Resource::builder_empty()
        .with_attributes(service_attributes(service_name))
        .build();
    Ok(Some(
        SdkTracerProvider::builder()
            .with_batch_exporter(exporter)
            .with_resource(resource)
            .build(),
    ))
}

fn service_attributes(service_name: &str) -> Vec<KeyValue> {
    let mut attrs = vec![KeyValue::new("service.name", service_name.to_string())];
    let instance = std::env::var("APID_INSTANCE_ID").or_else(|_| std::env::var("HOSTNAME"));
    if let Ok(value) = instance {
        attrs.push(KeyValue::new("service.instance.id", value));
    }
    if let Ok(value) = std::env::var("DEPLOYMENT_ENVIRONMENT") {
        attrs.push(KeyValue::new("deployment.environment", value));
    }
    attrs
}

/// Count one resource request by resource kind, action and outcome.
pub fn record_request(resource: &'static str, action: &'static str, outcome: &'static str) {
    metrics::counter!(
        REQUESTS_TOTAL,
        "resource" => resource,
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}

/// Publish the current size of one resource collection.
pub fn record_resource_count(resource: &'static str, count: usize) {
    metrics::gauge!(RESOURCES_TOTAL, "resource" => resource).set(count as f64);
}

/// Parent context carried by W3C `traceparent`/`tracestate` headers, if any.
pub fn trace_context_from_headers(headers: &HeaderMap) -> opentelemetry::Context {
    install_propagator();
    global::get_text_map_propagator(|propagator| propagator.extract(&HeaderCarrier(headers)))
}

struct HeaderCarrier<'a>(&'a HeaderMap);

impl Extractor for HeaderCarrier<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key)?.to_str().ok()
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

pub fn metrics_router(handle: PrometheusHandle) -> axum::Router {
    axum::Router::new().route(
        "/metrics",
        axum::routing::get(move || async move { handle.render() }),
    )
}

/// Serve `/metrics` on `addr` until `shutdown` resolves.
pub async fn serve_metrics<F>(
    handle: PrometheusHandle,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, metrics_router(handle).into_make_service())
        .with_graceful_shutdown(shutdown)
        .await
}

fn metrics_handle() -> anyhow::Result<PrometheusHandle> {
    if let Some(handle) = RECORDER.get() {
        return Ok(handle.clone());
    }
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("install metrics recorder")?;
    Ok(RECORDER.get_or_init(|| handle).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_env::ScopedEnv;
    use opentelemetry::trace::{TraceContextExt, TraceId};
    use serial_test::serial;
    use tower::ServiceExt;

    #[test]
    #[serial]
    fn instance_id_prefers_apid_variable() {
        let mut env = ScopedEnv::new();
        env.set("APID_INSTANCE_ID", "apid-0").set("HOSTNAME", "node-7");
        let attrs = service_attributes("apid");
        let instance = attrs
            .iter()
            .find(|attr| attr.key.as_str() == "service.instance.id")
            .map(|attr| attr.value.to_string());
        assert_eq!(instance.as_deref(), Some("apid-0"));

        env.unset("APID_INSTANCE_ID");
        let attrs = service_attributes("apid");
        assert!(attrs.iter().any(|attr| attr.value.to_string() == "node-7"));
    }

    #[test]
    #[serial]
    fn otlp_export_requires_endpoint() {
        let mut env = ScopedEnv::new();
        env.unset(OTLP_ENDPOINT_VAR);
        assert!(otlp_provider("apid").expect("no exporter").is_none());
    }

    #[test]
    fn traceparent_becomes_parent_context() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
                .parse()
                .unwrap(),
        );
        let context = trace_context_from_headers(&headers);
        let span = context.span();
        let span_ctx = span.span_context();
        assert!(span_ctx.is_remote());
        assert_eq!(
            span_ctx.trace_id(),
            TraceId::from_hex("0af7651916cd43dd8448eb211c80319c").unwrap()
        );
    }

    #[test]
    fn missing_headers_give_empty_context() {
        let context = trace_context_from_headers(&HeaderMap::new());
        assert!(!context.span().span_context().is_valid());
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn metrics_router_renders_recorded_series() {
        let handle = init_observability("apid-test").expect("init");
        let again = init_observability("apid-test").expect("init twice");
        record_request("checks", "list", "ok");
        record_resource_count("handlers", 3);

        let response = metrics_router(again)
            .oneshot(
                axum::http::Request::get("/metrics")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .expect("metrics");
        assert_eq!(response.status(), axum::http::StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(REQUESTS_TOTAL));
        assert!(text.contains(RESOURCES_TOTAL));
        let _ = handle.render();
    }

    #[tokio::test(flavor = "multi_thread")]
    #[serial]
    async fn metrics_listener_answers_over_tcp() {
        let handle = init_observability("apid-test").expect("init");
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve port");
        let addr = listener.local_addr().expect("addr");
        drop(listener);

        let (stop_tx, stop_rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve_metrics(handle, addr, async move {
            let _ = stop_rx.await;
        }));

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(std::time::Duration::from_secs(1))
            .build()
            .expect("client");
        let mut status = None;
        for _ in 0..50 {
            if let Ok(response) = client.get(format!("http://{addr}/metrics")).send().await {
                status = Some(response.status());
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(status, Some(reqwest::StatusCode::OK));

        let _ = stop_tx.send(());
        server.await.expect("join").expect("serve");
    }
}
