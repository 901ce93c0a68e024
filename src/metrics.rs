//! Observability hooks.
//!
//! With the `metrics` feature, [`METRICS`] registers counters and histograms on
//! the global OpenTelemetry meter named `tideline`; exporting them is up to the
//! application. With the `tracing` feature, [`tracing_helpers`] builds the
//! spans placed around queries, pool acquisition and transaction boundaries.

#[cfg(feature = "metrics")]
pub use instruments::{TidelineMetrics, METRICS};

#[cfg(feature = "metrics")]
mod instruments {
    use std::time::Duration;

    use once_cell::sync::Lazy;
    use opentelemetry::{
        global,
        metrics::{Counter, Histogram},
    };

    pub static METRICS: Lazy<TidelineMetrics> = Lazy::new(TidelineMetrics::init);

    pub struct TidelineMetrics {
        pub queries_total: Counter<u64>,
        pub query_errors_total: Counter<u64>,
        pub query_duration: Histogram<f64>,
        pub connection_wait_duration: Histogram<f64>,
        pub commits_total: Counter<u64>,
        pub rollbacks_total: Counter<u64>,
    }

    impl TidelineMetrics {
        pub fn init() -> Self {
            let meter = global::meter("tideline");

            let queries_total = meter
                .u64_counter("tideline_queries_total")
                .with_description("Total statements executed")
                .build();

            let query_errors_total = meter
                .u64_counter("tideline_query_errors_total")
                .with_description("Statements that failed in the driver")
                .build();

            let query_duration = meter
                .f64_histogram("tideline_query_duration_seconds")
                .with_description("Duration of statements")
                .build();

            let connection_wait_duration = meter
                .f64_histogram("tideline_connection_wait_seconds")
                .with_description("Time spent acquiring a pooled connection")
                .build();

            let commits_total = meter
                .u64_counter("tideline_commits_total")
                .with_description("Committed transactions")
                .build();

            let rollbacks_total = meter
                .u64_counter("tideline_rollbacks_total")
                .with_description("Rolled back transactions")
                .build();

            Self {
                queries_total,
                query_errors_total,
                query_duration,
                connection_wait_duration,
                commits_total,
                rollbacks_total,
            }
        }

        pub fn record_query_duration(&self, elapsed: Duration) {
            self.queries_total.add(1, &[]);
            self.query_duration.record(elapsed.as_secs_f64(), &[]);
        }

        pub fn record_query_error(&self) {
            self.query_errors_total.add(1, &[]);
        }

        pub fn record_connection_wait(&self, waited: Duration) {
            self.connection_wait_duration.record(waited.as_secs_f64(), &[]);
        }

        pub fn record_commit(&self) {
            self.commits_total.add(1, &[]);
        }

        pub fn record_rollback(&self) {
            self.rollbacks_total.add(1, &[]);
        }
    }
}

#[cfg(feature = "tracing")]
pub mod tracing_helpers {
    use tracing::{info_span, Span};

    pub fn execute_query_span(sql: &str) -> Span {
        info_span!("tideline.query", db.statement = %sql)
    }

    pub fn acquire_connection_span() -> Span {
        info_span!("tideline.acquire_connection")
    }

    pub fn begin_transaction_span() -> Span {
        info_span!("tideline.transaction")
    }

    pub fn commit_transaction_span() -> Span {
        info_span!("tideline.commit")
    }

    pub fn rollback_transaction_span() -> Span {
        info_span!("tideline.rollback")
    }
}
