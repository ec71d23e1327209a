//! cro-metrics: gauge registry and alert rule objects for cloud resource providers.
//!
//! Providers report availability, info and maintenance gauges through the
//! [`MetricsSink`] trait. The process owns exactly one [`MetricsRegistry`],
//! constructed at start-up and reset on a timer so series for resources that
//! no longer exist age out.

pub mod error;
pub mod exposition;
pub mod registry;
pub mod rules;

pub use error::{MetricsError, Result};
pub use exposition::render_prometheus;
pub use registry::{DEFAULT_RESET_PERIOD, Labels, MetricsRegistry, MetricsSink};
pub use rules::{PrometheusRule, Rule, RuleGroup, RuleMetadata, create_prometheus_rule};
