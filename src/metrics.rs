//! Prometheus metrics for relayed calls.

use std::time::Duration;

use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder};

use crate::provider::ProviderKind;

/// Registry plus the relay's collectors.
pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    upstream_latency: HistogramVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("chat_relay_requests_total", "Relayed chat calls by provider and outcome"),
            &["provider", "outcome"],
        )?;
        let upstream_latency = HistogramVec::new(
            HistogramOpts::new(
                "chat_relay_upstream_latency_seconds",
                "Round-trip time of vendor calls",
            )
            .buckets(vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]),
            &["provider"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(upstream_latency.clone()))?;

        Ok(Self {
            registry,
            requests,
            upstream_latency,
        })
    }

    /// Record one finished call. `outcome` is `"ok"` or an error kind.
    pub fn observe(&self, provider: ProviderKind, outcome: &str, elapsed: Duration) {
        self.requests
            .with_label_values(&[provider.as_str(), outcome])
            .inc();
        self.upstream_latency
            .with_label_values(&[provider.as_str()])
            .observe(elapsed.as_secs_f64());
    }

    /// Number of calls recorded for a provider and outcome.
    pub fn request_count(&self, provider: ProviderKind, outcome: &str) -> u64 {
        self.requests
            .with_label_values(&[provider.as_str(), outcome])
            .get()
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_and_render() {
        let metrics = Metrics::new().unwrap();
        metrics.observe(ProviderKind::DeepSeek, "ok", Duration::from_millis(120));
        metrics.observe(ProviderKind::DeepSeek, "timeout", Duration::from_secs(60));

        assert_eq!(metrics.request_count(ProviderKind::DeepSeek, "ok"), 1);
        assert_eq!(metrics.request_count(ProviderKind::OpenAi, "ok"), 0);

        let text = metrics.render().unwrap();
        assert!(text.contains("chat_relay_requests_total"));
        assert!(text.contains("outcome=\"timeout\""));
        assert!(text.contains("chat_relay_upstream_latency_seconds_count{provider=\"deepseek\"} 2"));
    }
}
