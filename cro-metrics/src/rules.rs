//! PrometheusRule objects.
//!
//! Providers create one rule object per managed instance. Each object holds a
//! single group `<name>Group` with a single alert `<name>Alert`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{MetricsError, Result};

pub const PROMETHEUS_RULE_API_VERSION: &str = "monitoring.coreos.com/v1";
pub const PROMETHEUS_RULE_KIND: &str = "PrometheusRule";

/// Label that makes the monitoring stack pick the rule up.
const MONITORING_KEY_LABEL: &str = "monitoring-key";
const MONITORING_KEY_VALUE: &str = "middleware";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrometheusRule {
    pub api_version: String,
    pub kind: String,
    pub metadata: RuleMetadata,
    pub spec: PrometheusRuleSpec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleMetadata {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrometheusRuleSpec {
    pub groups: Vec<RuleGroup>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleGroup {
    pub name: String,
    pub rules: Vec<Rule>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rule {
    pub alert: String,
    pub expr: String,
}

impl PrometheusRule {
    /// The single alert expression of this rule object, if any.
    pub fn expression(&self) -> Option<&str> {
        self.spec
            .groups
            .first()
            .and_then(|g| g.rules.first())
            .map(|r| r.expr.as_str())
    }
}

/// Build a PrometheusRule object with one group and one alert.
pub fn create_prometheus_rule(
    namespace: &str,
    rule_name: &str,
    expression: &str,
) -> Result<PrometheusRule> {
    if namespace.is_empty() {
        return Err(MetricsError::InvalidRule("namespace is empty".to_string()));
    }
    if rule_name.is_empty() {
        return Err(MetricsError::InvalidRule("rule name is empty".to_string()));
    }
    if expression.is_empty() {
        return Err(MetricsError::InvalidRule(format!(
            "expression for {} is empty",
            rule_name
        )));
    }

    let mut labels = BTreeMap::new();
    labels.insert(
        MONITORING_KEY_LABEL.to_string(),
        MONITORING_KEY_VALUE.to_string(),
    );

    Ok(PrometheusRule {
        api_version: PROMETHEUS_RULE_API_VERSION.to_string(),
        kind: PROMETHEUS_RULE_KIND.to_string(),
        metadata: RuleMetadata {
            name: rule_name.to_string(),
            namespace: namespace.to_string(),
            labels,
        },
        spec: PrometheusRuleSpec {
            groups: vec![RuleGroup {
                name: format!("{}Group", rule_name),
                rules: vec![Rule {
                    alert: format!("{}Alert", rule_name),
                    expr: expression.to_string(),
                }],
            }],
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_prometheus_rule_shape() {
        let rule = create_prometheus_rule("ns", "cro-aws-elasticache-abc", "absent(up == 1)")
            .unwrap();

        assert_eq!(rule.metadata.name, "cro-aws-elasticache-abc");
        assert_eq!(rule.metadata.namespace, "ns");
        assert_eq!(rule.metadata.labels["monitoring-key"], "middleware");
        assert_eq!(rule.spec.groups.len(), 1);
        assert_eq!(rule.spec.groups[0].name, "cro-aws-elasticache-abcGroup");
        assert_eq!(rule.spec.groups[0].rules.len(), 1);
        assert_eq!(rule.spec.groups[0].rules[0].alert, "cro-aws-elasticache-abcAlert");
        assert_eq!(rule.expression(), Some("absent(up == 1)"));
    }

    #[test]
    fn test_create_prometheus_rule_rejects_empty_fields() {
        assert!(create_prometheus_rule("", "name", "expr").is_err());
        assert!(create_prometheus_rule("ns", "", "expr").is_err());
        assert!(create_prometheus_rule("ns", "name", "").is_err());
    }

    #[test]
    fn test_rule_serializes_as_kubernetes_object() {
        let rule = create_prometheus_rule("ns", "r", "vector(1)").unwrap();
        let json = serde_json::to_value(&rule).unwrap();

        assert_eq!(json["apiVersion"], "monitoring.coreos.com/v1");
        assert_eq!(json["kind"], "PrometheusRule");
        assert_eq!(json["spec"]["groups"][0]["rules"][0]["expr"], "vector(1)");
    }
}
