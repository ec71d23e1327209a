//! Prometheus text exposition format.
//!
//! Renders every live gauge family for scraping by a Prometheus server.

use prometheus::{Encoder, TextEncoder};

use crate::error::{MetricsError, Result};
use crate::registry::MetricsRegistry;

/// Render all gauge families of `registry` into Prometheus text format.
pub fn render_prometheus(registry: &MetricsRegistry) -> Result<String> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| MetricsError::Encoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Labels, MetricsSink};

    #[test]
    fn test_render_empty_registry() {
        let registry = MetricsRegistry::new();
        assert_eq!(render_prometheus(&registry).unwrap(), "");
    }

    #[test]
    fn test_render_gauge_with_sorted_labels() {
        let registry = MetricsRegistry::new();
        let mut labels = Labels::new();
        labels.insert("namespace".to_string(), "ns".to_string());
        labels.insert("clusterID".to_string(), "c1".to_string());
        registry
            .set_metric("cro_aws_elasticache_available", &labels, 1.0)
            .unwrap();

        let out = render_prometheus(&registry).unwrap();
        assert!(out.contains("# TYPE cro_aws_elasticache_available gauge\n"));
        assert!(out.contains("cro_aws_elasticache_available{clusterID=\"c1\",namespace=\"ns\"} 1\n"));
    }

    #[test]
    fn test_render_escapes_label_values() {
        let registry = MetricsRegistry::new();
        let mut labels = Labels::new();
        labels.insert("desc".to_string(), "say \"hi\"\nnow".to_string());
        registry.set_metric("cro_test", &labels, 2.5).unwrap();

        let out = render_prometheus(&registry).unwrap();
        assert!(out.contains("cro_test{desc=\"say \\\"hi\\\"\\nnow\"} 2.5\n"));
    }

    #[test]
    fn test_render_skips_families_emptied_by_reset() {
        let registry = MetricsRegistry::new();
        registry.set_metric("cro_up", &Labels::new(), 1.0).unwrap();
        assert!(render_prometheus(&registry).unwrap().contains("cro_up 1\n"));

        registry.reset();
        assert_eq!(render_prometheus(&registry).unwrap(), "");
    }
}
