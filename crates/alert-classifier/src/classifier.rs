//! Normalizes fired rules into the public alert shape and ranks them.

use chrono::{DateTime, Utc};
use kpi_core::{keys, Alert, AlertKind, Category, EngineConfig, Severity, Snapshot};
use metric_formulas::deviation_percent;
use tracing::debug;

use crate::rules::{evaluate_rules, RawAlert, RuleContext};

pub struct AlertClassifier {
    config: EngineConfig,
}

impl AlertClassifier {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Evaluate the rule table plus the LTV/CAC composite, normalize, and
    /// rank. `now` stamps ids and `triggered_at`; it is injected so callers
    /// control the clock.
    pub fn classify(&self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<Alert> {
        let mut raw = evaluate_rules(snapshot, &self.config);
        if let Some(composite) = ltv_cac_alert(snapshot, &self.config) {
            raw.push(composite);
        }

        let mut alerts: Vec<Alert> = raw.into_iter().map(|r| normalize(r, now)).collect();

        // Stable sort: urgency first, then biggest money at stake. Missing
        // impact ranks as zero.
        alerts.sort_by(|a, b| {
            a.severity.rank().cmp(&b.severity.rank()).then_with(|| {
                b.financial_impact
                    .unwrap_or(0.0)
                    .total_cmp(&a.financial_impact.unwrap_or(0.0))
            })
        });

        debug!(count = alerts.len(), "alerts classified");
        alerts
    }
}

fn normalize(raw: RawAlert, now: DateTime<Utc>) -> Alert {
    let current_value = raw.context.value();
    let target_value = raw.context.target();
    Alert {
        // Unique within a batch: one alert per metric key per evaluation
        id: format!("{}-{}", raw.metric_key, now.timestamp_millis()),
        severity: raw.severity,
        kind: raw.kind,
        title: raw.title,
        message: raw.message,
        metric_key: raw.metric_key.to_string(),
        current_value,
        target_value,
        deviation_percent: deviation_percent(current_value, target_value),
        financial_impact: raw.context.financial_impact(),
        category: Category::from_metric_key(raw.metric_key),
        triggered_at: now,
        acknowledged: false,
        resolved: false,
        assigned_to: None,
    }
}

/// Cross-metric composite rule, kept outside the table because it reads two
/// snapshot fields at once. CAC of zero means "not configured" and disables
/// the check.
fn ltv_cac_alert(snapshot: &Snapshot, config: &EngineConfig) -> Option<RawAlert> {
    if snapshot.cac <= 0.0 {
        return None;
    }
    let ratio = snapshot.ltv / snapshot.cac;
    if ratio <= 0.0 || ratio >= 2.5 {
        return None;
    }
    let severity = if ratio < 2.0 { Severity::P1 } else { Severity::P2 };
    Some(RawAlert {
        metric_key: keys::LTV_CAC_RATIO,
        severity,
        kind: AlertKind::Snapshot,
        title: "LTV/CAC ratio unhealthy".to_string(),
        message: format!(
            "LTV/CAC at {:.1} is below the healthy ratio of {:.0}",
            ratio, config.ltv_cac_target
        ),
        context: RuleContext::LtvCac {
            ratio,
            target: config.ltv_cac_target,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn healthy_snapshot() -> Snapshot {
        Snapshot {
            net_margin: 35.0,
            no_show_rate: 8.0,
            financial_impact: 600.0,
            revpas_current: 95.0,
            revpas_prior: 100.0,
            revpas_drop_percent: 5.0,
            empty_slots: 2,
            avg_ticket: 300.0,
            total_entries: 42_000.0,
            net_revenue_retention: 104.0,
            ltv: 1800.0,
            cac: 0.0,
            avg_satisfaction: 88.0,
        }
    }

    fn classifier() -> AlertClassifier {
        AlertClassifier::new(EngineConfig::default())
    }

    #[test]
    fn ltv_cac_composite_fires_p1_below_two() {
        let snapshot = Snapshot { ltv: 150.0, cac: 100.0, ..healthy_snapshot() };
        let alerts = classifier().classify(&snapshot, Utc::now());
        let alert = alerts
            .iter()
            .find(|a| a.metric_key == keys::LTV_CAC_RATIO)
            .expect("composite alert");
        assert_eq!(alert.severity, Severity::P1);
        assert_eq!(alert.target_value, 3.0);
        assert_eq!(alert.category, Category::Growth);
        assert_eq!(alert.financial_impact, None);
    }

    #[test]
    fn ltv_cac_composite_p2_in_warning_band() {
        let snapshot = Snapshot { ltv: 220.0, cac: 100.0, ..healthy_snapshot() };
        let alerts = classifier().classify(&snapshot, Utc::now());
        let alert = alerts.iter().find(|a| a.metric_key == keys::LTV_CAC_RATIO).unwrap();
        assert_eq!(alert.severity, Severity::P2);
    }

    #[test]
    fn ltv_cac_composite_absent_when_healthy_or_unconfigured() {
        // Ratio 4: healthy
        let snapshot = Snapshot { ltv: 400.0, cac: 100.0, ..healthy_snapshot() };
        let alerts = classifier().classify(&snapshot, Utc::now());
        assert!(alerts.iter().all(|a| a.metric_key != keys::LTV_CAC_RATIO));

        // CAC unset: rule disabled even with a tiny LTV
        let snapshot = Snapshot { ltv: 10.0, cac: 0.0, ..healthy_snapshot() };
        let alerts = classifier().classify(&snapshot, Utc::now());
        assert!(alerts.iter().all(|a| a.metric_key != keys::LTV_CAC_RATIO));
    }

    #[test]
    fn alerts_ranked_by_severity_then_impact() {
        // Fires: no-show P1 (impact 4800), margin P2, revpas drop P1 (no
        // impact), satisfaction P2, nrr P3
        let snapshot = Snapshot {
            no_show_rate: 30.0,
            financial_impact: 4800.0,
            net_margin: 15.0,
            revpas_current: 60.0,
            revpas_prior: 100.0,
            revpas_drop_percent: 40.0,
            avg_satisfaction: 50.0,
            net_revenue_retention: 70.0,
            ..healthy_snapshot()
        };
        let alerts = classifier().classify(&snapshot, Utc::now());
        assert_eq!(alerts.len(), 5);

        for pair in alerts.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            let a_rank = a.severity.rank();
            let b_rank = b.severity.rank();
            assert!(
                a_rank < b_rank
                    || (a_rank == b_rank
                        && a.financial_impact.unwrap_or(0.0) >= b.financial_impact.unwrap_or(0.0)),
                "ranking invariant violated between {} and {}",
                a.metric_key,
                b.metric_key
            );
        }

        // The funded P1 outranks the unfunded one
        assert_eq!(alerts[0].metric_key, keys::NO_SHOW_RATE);
        assert_eq!(alerts[1].metric_key, keys::REVPAS_DROP);
    }

    #[test]
    fn ids_unique_within_batch() {
        let snapshot = Snapshot {
            no_show_rate: 30.0,
            net_margin: 5.0,
            ..healthy_snapshot()
        };
        let now = Utc::now();
        let alerts = classifier().classify(&snapshot, now);
        assert!(alerts.len() >= 2);
        let mut ids: Vec<&str> = alerts.iter().map(|a| a.id.as_str()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), alerts.len());
    }

    #[test]
    fn normalized_fields_initialized_unset() {
        let snapshot = Snapshot { no_show_rate: 30.0, ..healthy_snapshot() };
        let alerts = classifier().classify(&snapshot, Utc::now());
        let alert = &alerts[0];
        assert!(!alert.acknowledged);
        assert!(!alert.resolved);
        assert!(alert.assigned_to.is_none());
        // (30 - 25) / 25 * 100
        assert!((alert.deviation_percent - 20.0).abs() < 1e-9);
    }
}
