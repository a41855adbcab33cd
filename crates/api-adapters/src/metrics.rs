//! Prometheus counters exposed on `/metrics`.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::registry::Registry;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RequestLabels {
    pub method: String,
    pub status: String,
}

pub struct Metrics {
    registry: Registry,
    pub requests: Family<RequestLabels, Counter>,
    pub rate_limited: Counter,
    pub conflicts: Counter,
    pub registrations: Counter,
    pub activations: Counter,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        let mut registry = Registry::with_prefix("rusty_social");
        let requests = Family::<RequestLabels, Counter>::default();
        let rate_limited = Counter::default();
        let conflicts = Counter::default();
        let registrations = Counter::default();
        let activations = Counter::default();

        registry.register(
            "http_requests",
            "HTTP requests by method and status",
            requests.clone(),
        );
        registry.register(
            "rate_limited",
            "Requests denied by the rate limiter",
            rate_limited.clone(),
        );
        registry.register(
            "conflicts",
            "Writes rejected as conflicting",
            conflicts.clone(),
        );
        registry.register(
            "registrations",
            "Accounts registered",
            registrations.clone(),
        );
        registry.register(
            "activations",
            "Accounts activated",
            activations.clone(),
        );

        Self {
            registry,
            requests,
            rate_limited,
            conflicts,
            registrations,
            activations,
        }
    }

    pub fn record_request(&self, method: &str, status: u16) {
        self.requests
            .get_or_create(&RequestLabels {
                method: method.to_string(),
                status: status.to_string(),
            })
            .inc();
    }

    /// OpenMetrics text exposition.
    pub fn render(&self) -> Result<String, std::fmt::Error> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }
}
