//! Gauge registry.
//!
//! A family is a prometheus `GaugeVec` created and registered on the first
//! `set_metric` call for a name. Its label key set is fixed by that first call
//! and later calls must use the same keys.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::Utc;
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts, Registry};
use tokio::task::JoinHandle;
use tokio::time::interval;
use tracing::{debug, info};

use crate::error::{MetricsError, Result};

/// Label set attached to a gauge sample. Ordered so series keys are stable.
pub type Labels = BTreeMap<String, String>;

/// How often the reset loop wipes all series unless configured otherwise.
pub const DEFAULT_RESET_PERIOD: Duration = Duration::from_secs(3600);

const MIN_RESET_PERIOD: Duration = Duration::from_millis(1);

/// Sink for labelled gauges.
pub trait MetricsSink: Send + Sync {
    /// Upsert the gauge `name` with the given labels to `value`.
    fn set_metric(&self, name: &str, labels: &Labels, value: f64) -> Result<()>;

    /// Set the gauge to the current time in seconds since the epoch.
    fn set_metric_current_time(&self, name: &str, labels: &Labels) -> Result<()> {
        let now = Utc::now();
        let seconds = now.timestamp() as f64 + f64::from(now.timestamp_subsec_nanos()) / 1e9;
        self.set_metric(name, labels, seconds)
    }
}

struct GaugeFamily {
    label_keys: Vec<String>,
    gauges: GaugeVec,
}

/// Process-wide gauge registry backed by a [`prometheus::Registry`].
pub struct MetricsRegistry {
    registry: Registry,
    families: RwLock<BTreeMap<String, GaugeFamily>>,
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            registry: Registry::new(),
            families: RwLock::new(BTreeMap::new()),
        }
    }

    /// Clear every series of every family. Families and their label keys stay registered.
    pub fn reset(&self) {
        let families = self.read();
        for family in families.values() {
            family.gauges.reset();
        }
        debug!("Reset {} gauge families", families.len());
    }

    /// Spawn a task that calls [`reset`](Self::reset) immediately and then every `period`.
    /// Periods below one millisecond are raised to one millisecond.
    pub fn spawn_reset_loop(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let period = period.max(MIN_RESET_PERIOD);
        let registry = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(period);
            loop {
                ticker.tick().await;
                info!("Calling reset on all gauge families");
                registry.reset();
            }
        })
    }

    /// Current value of a single series, if present.
    pub fn get(&self, name: &str, labels: &Labels) -> Option<f64> {
        let family = self.gather_family(name)?;
        family
            .get_metric()
            .iter()
            .find(|m| {
                m.get_label().len() == labels.len()
                    && m.get_label()
                        .iter()
                        .all(|p| labels.get(p.get_name()).map(String::as_str) == Some(p.get_value()))
            })
            .map(|m| m.get_gauge().get_value())
    }

    /// Number of live series in a family (0 if the family is unknown).
    pub fn series_count(&self, name: &str) -> usize {
        self.gather_family(name)
            .map(|f| f.get_metric().len())
            .unwrap_or(0)
    }

    /// Names of all registered families.
    pub fn family_names(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Render all families in Prometheus text format.
    pub fn render(&self) -> Result<String> {
        crate::exposition::render_prometheus(self)
    }

    /// Snapshot of every family with at least one live series.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }

    fn gather_family(&self, name: &str) -> Option<MetricFamily> {
        self.gather().into_iter().find(|f| f.get_name() == name)
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, GaugeFamily>> {
        self.families.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, GaugeFamily>> {
        self.families.write().unwrap_or_else(|e| e.into_inner())
    }
}

impl MetricsSink for MetricsRegistry {
    fn set_metric(&self, name: &str, labels: &Labels, value: f64) -> Result<()> {
        if !valid_metric_name(name) {
            return Err(MetricsError::InvalidMetricName(name.to_string()));
        }
        if let Some(label) = labels.keys().find(|k| !valid_label_name(k)) {
            return Err(MetricsError::InvalidLabelName {
                name: name.to_string(),
                label: label.clone(),
            });
        }

        let mut families = self.write();
        let family = match families.entry(name.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let keys: Vec<&str> = labels.keys().map(String::as_str).collect();
                let gauges = GaugeVec::new(Opts::new(name, name), &keys)?;
                self.registry.register(Box::new(gauges.clone()))?;
                debug!("Registered gauge family {}", name);
                entry.insert(GaugeFamily {
                    label_keys: labels.keys().cloned().collect(),
                    gauges,
                })
            }
        };

        if !family.label_keys.iter().eq(labels.keys()) {
            return Err(MetricsError::InconsistentLabels {
                name: name.to_string(),
                expected: family.label_keys.clone(),
                actual: labels.keys().cloned().collect(),
            });
        }

        let values: Vec<&str> = labels.values().map(String::as_str).collect();
        family.gauges.get_metric_with_label_values(&values)?.set(value);
        Ok(())
    }
}

fn valid_metric_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ':')
}

fn valid_label_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> Labels {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_set_metric_registers_family_and_upserts() {
        let registry = MetricsRegistry::new();
        let l = labels(&[("clusterID", "c1"), ("instanceID", "i1")]);

        registry.set_metric("cro_test_available", &l, 0.0).unwrap();
        registry.set_metric("cro_test_available", &l, 1.0).unwrap();

        assert_eq!(registry.get("cro_test_available", &l), Some(1.0));
        assert_eq!(registry.series_count("cro_test_available"), 1);
    }

    #[test]
    fn test_distinct_label_values_are_distinct_series() {
        let registry = MetricsRegistry::new();
        registry
            .set_metric("cro_test_info", &labels(&[("status", "creating")]), 1.0)
            .unwrap();
        registry
            .set_metric("cro_test_info", &labels(&[("status", "available")]), 2.0)
            .unwrap();

        assert_eq!(registry.series_count("cro_test_info"), 2);
    }

    #[test]
    fn test_inconsistent_label_keys_rejected() {
        let registry = MetricsRegistry::new();
        registry
            .set_metric("cro_test_gauge", &labels(&[("a", "1")]), 1.0)
            .unwrap();

        let err = registry
            .set_metric("cro_test_gauge", &labels(&[("b", "1")]), 1.0)
            .unwrap_err();
        assert!(matches!(err, MetricsError::InconsistentLabels { .. }));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let registry = MetricsRegistry::new();
        assert!(matches!(
            registry.set_metric("1bad", &Labels::new(), 1.0),
            Err(MetricsError::InvalidMetricName(_))
        ));
        assert!(matches!(
            registry.set_metric("good", &labels(&[("bad-label", "x")]), 1.0),
            Err(MetricsError::InvalidLabelName { .. })
        ));
    }

    #[test]
    fn test_reset_clears_series_but_keeps_families() {
        let registry = MetricsRegistry::new();
        let l = labels(&[("a", "1")]);
        registry.set_metric("cro_test_gauge", &l, 3.0).unwrap();

        registry.reset();

        assert_eq!(registry.series_count("cro_test_gauge"), 0);
        assert_eq!(registry.family_names(), vec!["cro_test_gauge".to_string()]);
        // Label keys are still enforced after a reset
        assert!(
            registry
                .set_metric("cro_test_gauge", &labels(&[("b", "1")]), 1.0)
                .is_err()
        );
    }

    #[test]
    fn test_set_metric_current_time_is_epoch_seconds() {
        let registry = MetricsRegistry::new();
        let l = labels(&[("a", "1")]);
        let before = Utc::now().timestamp() as f64;
        registry.set_metric_current_time("cro_test_info", &l).unwrap();
        let value = registry.get("cro_test_info", &l).unwrap();
        assert!(value >= before);
        assert!(value < before + 60.0);
    }

    #[tokio::test]
    async fn test_reset_loop_clears_series() {
        let registry = Arc::new(MetricsRegistry::new());
        let l = labels(&[("a", "1")]);

        let handle = registry.spawn_reset_loop(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(5)).await;
        registry.set_metric("cro_test_gauge", &l, 1.0).unwrap();
        tokio::time::sleep(Duration::from_millis(60)).await;

        assert_eq!(registry.series_count("cro_test_gauge"), 0);
        handle.abort();
    }

    #[tokio::test]
    async fn test_reset_loop_accepts_zero_period() {
        let registry = Arc::new(MetricsRegistry::new());
        let l = labels(&[("a", "1")]);

        let handle = registry.spawn_reset_loop(Duration::ZERO);
        registry.set_metric("cro_test_gauge", &l, 1.0).unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(!handle.is_finished());
        assert_eq!(registry.series_count("cro_test_gauge"), 0);
        handle.abort();
    }
}
