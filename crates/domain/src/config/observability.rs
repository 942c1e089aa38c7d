use serde::{Deserialize, Serialize};

/// `[observability]`: optional OTLP trace export next to the JSON log.
///
/// Every field is optional.  With no endpoint the gateway only logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otlp_endpoint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
    /// Fraction of traces kept, `0.0..=1.0`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<f64>,
}

impl ObservabilityConfig {
    pub const DEFAULT_SERVICE_NAME: &'static str = "threadkeeper";

    /// The collector to export to; a blank endpoint means export is off.
    pub fn export_endpoint(&self) -> Option<&str> {
        self.otlp_endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
    }

    pub fn service_name(&self) -> &str {
        self.service_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(Self::DEFAULT_SERVICE_NAME)
    }

    /// Sampling ratio for the tracer, clamped into `0.0..=1.0`.  Unset or
    /// non-finite rates sample everything.
    pub fn sampling_ratio(&self) -> f64 {
        match self.sample_rate {
            Some(r) if r.is_finite() => r.clamp(0.0, 1.0),
            _ => 1.0,
        }
    }

    /// Whether `sample_rate` was left unset or lies within `0.0..=1.0`.
    pub fn sample_rate_in_range(&self) -> bool {
        self.sample_rate
            .map_or(true, |r| r.is_finite() && (0.0..=1.0).contains(&r))
    }
}
