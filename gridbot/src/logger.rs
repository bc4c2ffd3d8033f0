use std::time::Duration;
use tracing::{Span, field};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

use corelib::models::RegionId;

/// Correlation ID that follows one poll cycle through routing and decisions.
#[derive(Clone, Debug)]
pub struct TraceId(String);

impl TraceId {
    pub fn new(v: impl Into<String>) -> Self {
        Self(v.into())
    }

    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

pub fn init_tracing(json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let base = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        // Includes timing when the span closes
        .with_span_events(fmt::format::FmtSpan::CLOSE);

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(base.pretty())
            .init();
    }
}

pub fn cycle_span(trace_id: &TraceId) -> Span {
    tracing::info_span!(
        "poll_cycle",
        trace_id = %trace_id.as_str(),
        intervals = field::Empty
    )
}

pub fn region_span(name: &'static str, region: RegionId) -> Span {
    tracing::info_span!("region", name = %name, region = %region)
}

pub fn annotate_intervals(count: usize) {
    Span::current().record("intervals", count);
}

pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = tokio::time::Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn slow_operation_is_flagged() {
        let out = warn_if_slow("publish", Duration::from_secs(1), async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            7
        })
        .await;

        assert_eq!(out, 7);
        assert!(logs_contain("slow operation detected"));
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn fast_operation_is_quiet() {
        warn_if_slow("publish", Duration::from_secs(1), async {}).await;
        assert!(!logs_contain("slow operation detected"));
    }

    #[test]
    fn generated_trace_ids_are_unique() {
        assert_ne!(TraceId::generate().as_str(), TraceId::generate().as_str());
        assert_eq!(TraceId::new("abc").as_str(), "abc");
    }
}
