//! Observability for the catalog engine.
//!
//! With the `metrics` feature the engine records query, operation and outcome
//! counters through an OpenTelemetry meter exported into a Prometheus
//! registry. With the `tracing` feature [`tracing_helpers`] supplies the spans
//! wrapped around queries, transactions and engine operations.

#[cfg(feature = "metrics")]
pub use self::prometheus_metrics::{CatalogMetrics, CATALOG_METRICS};

#[cfg(feature = "metrics")]
mod prometheus_metrics {
    use once_cell::sync::Lazy;
    use opentelemetry::metrics::{Counter, Histogram, MeterProvider};
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::metrics::SdkMeterProvider;
    use prometheus::{Registry, TextEncoder};
    use std::time::Duration;

    pub static CATALOG_METRICS: Lazy<CatalogMetrics> = Lazy::new(CatalogMetrics::init);

    pub struct CatalogMetrics {
        registry: Registry,
        _provider: SdkMeterProvider,
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub operations_total: Counter<u64>,
        pub outcomes_total: Counter<u64>,
    }

    impl CatalogMetrics {
        pub fn init() -> Self {
            let registry = Registry::new();
            let exporter = opentelemetry_prometheus::exporter()
                .with_registry(registry.clone())
                .build()
                .expect("failed to build prometheus exporter");
            let provider = SdkMeterProvider::builder().with_reader(exporter).build();
            let meter = provider.meter("scoped_catalog");

            let queries_total = meter
                .u64_counter("catalog_queries_total")
                .with_description("Total queries executed against the catalog store")
                .build();

            let query_errors_total = meter
                .u64_counter("catalog_query_errors_total")
                .with_description("Queries that failed")
                .build();

            let query_duration = meter
                .f64_histogram("catalog_query_duration_seconds")
                .with_description("Duration of catalog queries")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("catalog_connection_wait_seconds")
                .with_description("Time spent establishing database connections")
                .build();

            let operations_total = meter
                .u64_counter("catalog_operations_total")
                .with_description("Engine operations by name")
                .build();

            let outcomes_total = meter
                .u64_counter("catalog_item_outcomes_total")
                .with_description("Per-item outcomes of clone, bulk and import operations")
                .build();

            Self {
                registry,
                _provider: provider,
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                operations_total,
                outcomes_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, elapsed: Duration) {
            self.connection_wait_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_operation(&self, operation: &'static str) {
            self.operations_total
                .add(1, &[KeyValue::new("operation", operation)]);
        }

        pub fn record_outcome(&self, operation: &'static str, outcome: &'static str, count: usize) {
            if count == 0 {
                return;
            }
            self.outcomes_total.add(
                count as u64,
                &[
                    KeyValue::new("operation", operation),
                    KeyValue::new("outcome", outcome),
                ],
            );
        }

        /// Prometheus text exposition of everything recorded so far.
        pub fn render(&self) -> String {
            TextEncoder::new()
                .encode_to_string(&self.registry.gather())
                .unwrap_or_default()
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::Span;

    /// Longest statement prefix attached to a query span.
    const STATEMENT_PREVIEW_LEN: usize = 120;

    pub fn execute_query_span(query: &str) -> Span {
        let preview: String = query.chars().take(STATEMENT_PREVIEW_LEN).collect();
        tracing::debug_span!("catalog.query", db.system = "postgresql", db.statement = %preview)
    }

    pub fn acquire_connection_span() -> Span {
        tracing::debug_span!("catalog.connect")
    }

    pub fn begin_transaction_span() -> Span {
        tracing::debug_span!("catalog.transaction.begin")
    }

    pub fn commit_transaction_span() -> Span {
        tracing::debug_span!("catalog.transaction.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        tracing::debug_span!("catalog.transaction.rollback")
    }

    pub fn engine_operation_span(operation: &'static str) -> Span {
        tracing::info_span!("catalog.engine", operation)
    }
}

/// Count one engine operation and open its span. The returned guard keeps the
/// span entered until it is dropped.
pub(crate) fn operation(name: &'static str) -> OperationGuard {
    #[cfg(feature = "metrics")]
    CATALOG_METRICS.record_operation(name);
    #[cfg(not(feature = "metrics"))]
    let _ = name;

    OperationGuard {
        #[cfg(feature = "tracing")]
        _span: tracing_helpers::engine_operation_span(name).entered(),
    }
}

pub(crate) struct OperationGuard {
    #[cfg(feature = "tracing")]
    _span: tracing::span::EnteredSpan,
}

/// Record the outcome tally of a batch operation.
pub(crate) fn record_outcomes(operation: &'static str, counts: &crate::engine::OutcomeCounts) {
    #[cfg(feature = "metrics")]
    {
        CATALOG_METRICS.record_outcome(operation, "created", counts.created);
        CATALOG_METRICS.record_outcome(operation, "updated", counts.updated);
        CATALOG_METRICS.record_outcome(operation, "skipped", counts.skipped);
        CATALOG_METRICS.record_outcome(operation, "failed", counts.failed);
        CATALOG_METRICS.record_outcome(operation, "ignored", counts.ignored);
        CATALOG_METRICS.record_outcome(operation, "moved", counts.moved);
    }
    #[cfg(not(feature = "metrics"))]
    let _ = (operation, counts);
}
