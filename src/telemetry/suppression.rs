//! False-positive suppression, evaluated before findings are persisted and
//! before severity-based alerting, so suppressed findings never alert.

use super::models::Severity;
use serde_json::Value;

/// What a matched rule does to the finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuppressionEffect {
    /// The finding is dropped entirely.
    Discard,
    /// The finding is kept at a lower severity, annotated with the reason.
    Downgrade {
        severity: Severity,
        reason: &'static str,
    },
}

/// The closed set of suppression rules, evaluated in declaration order;
/// the first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionRule {
    /// headless_browser with only the no_plugins flag: Chrome reports no
    /// plugins by default.
    HeadlessSingleNoPlugins,
    /// parameter_tampering on admin routes: the admin UI sends custom fields.
    AdminParamTampering,
}

pub const SUPPRESSION_RULES: &[SuppressionRule] = &[
    SuppressionRule::HeadlessSingleNoPlugins,
    SuppressionRule::AdminParamTampering,
];

impl SuppressionRule {
    pub fn evaluate(&self, anomaly_type: &str, details: &Value) -> Option<SuppressionEffect> {
        match self {
            SuppressionRule::HeadlessSingleNoPlugins => {
                if anomaly_type != "headless_browser" {
                    return None;
                }
                let flags = details.get("flags")?.as_array()?;
                if flags.len() == 1 && flags[0].as_str() == Some("no_plugins") {
                    Some(SuppressionEffect::Downgrade {
                        severity: Severity::Low,
                        reason: "single_no_plugins_flag",
                    })
                } else {
                    None
                }
            }
            SuppressionRule::AdminParamTampering => {
                if anomaly_type != "parameter_tampering" {
                    return None;
                }
                let route = details.get("route")?.as_str()?;
                if route.starts_with("/api/admin") {
                    Some(SuppressionEffect::Discard)
                } else {
                    None
                }
            }
        }
    }
}

/// Runs the rules in order and returns the first effect, if any.
pub fn evaluate_suppression(anomaly_type: &str, details: &Value) -> Option<SuppressionEffect> {
    SUPPRESSION_RULES
        .iter()
        .find_map(|rule| rule.evaluate(anomaly_type, details))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lone_no_plugins_flag_is_downgraded() {
        let effect = evaluate_suppression("headless_browser", &json!({"flags": ["no_plugins"]}));
        assert_eq!(
            effect,
            Some(SuppressionEffect::Downgrade {
                severity: Severity::Low,
                reason: "single_no_plugins_flag",
            })
        );
    }

    #[test]
    fn multiple_headless_flags_are_not_suppressed() {
        let effect = evaluate_suppression(
            "headless_browser",
            &json!({"flags": ["no_plugins", "webdriver"]}),
        );
        assert_eq!(effect, None);
    }

    #[test]
    fn admin_route_tampering_is_discarded() {
        let effect = evaluate_suppression(
            "parameter_tampering",
            &json!({"route": "/api/admin/change-role", "extraFields": ["region"]}),
        );
        assert_eq!(effect, Some(SuppressionEffect::Discard));
    }

    #[test]
    fn non_admin_route_tampering_passes_through() {
        let effect = evaluate_suppression(
            "parameter_tampering",
            &json!({"route": "/api/fasting/log", "extraFields": ["isAdmin"]}),
        );
        assert_eq!(effect, None);
    }

    #[test]
    fn unrelated_types_are_untouched() {
        assert_eq!(evaluate_suppression("slow_request", &json!({})), None);
        assert_eq!(
            evaluate_suppression("jwt_brute_force", &json!({"count": 10})),
            None
        );
    }
}
