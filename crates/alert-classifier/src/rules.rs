//! The fixed rule table walked once per snapshot.
//!
//! Rules fire independently of each other, with one exception: threshold
//! bands on the same metric (low vs critical margin) are modeled as a single
//! rule whose severity function picks the band, so a metric can never
//! double-fire.

use kpi_core::{keys, AlertKind, EngineConfig, Severity, Snapshot};
use metric_formulas::detect_drop;
use tracing::debug;

/// Typed payload carried by a fired rule, one variant per rule family.
#[derive(Debug, Clone, PartialEq)]
pub enum RuleContext {
    NoShow { rate: f64, target: f64, impact: f64 },
    Margin { margin: f64, target: f64 },
    RevPasDrop { drop: f64, target: f64 },
    Satisfaction { score: f64, target: f64 },
    Retention { nrr: f64, target: f64 },
    LtvCac { ratio: f64, target: f64 },
}

impl RuleContext {
    /// The offending metric value
    pub fn value(&self) -> f64 {
        match self {
            RuleContext::NoShow { rate, .. } => *rate,
            RuleContext::Margin { margin, .. } => *margin,
            RuleContext::RevPasDrop { drop, .. } => *drop,
            RuleContext::Satisfaction { score, .. } => *score,
            RuleContext::Retention { nrr, .. } => *nrr,
            RuleContext::LtvCac { ratio, .. } => *ratio,
        }
    }

    /// The threshold the value is compared against
    pub fn target(&self) -> f64 {
        match self {
            RuleContext::NoShow { target, .. }
            | RuleContext::Margin { target, .. }
            | RuleContext::RevPasDrop { target, .. }
            | RuleContext::Satisfaction { target, .. }
            | RuleContext::Retention { target, .. }
            | RuleContext::LtvCac { target, .. } => *target,
        }
    }

    pub fn financial_impact(&self) -> Option<f64> {
        match self {
            RuleContext::NoShow { impact, .. } => Some(*impact),
            _ => None,
        }
    }
}

/// A rule that fired, before normalization into the public alert shape
#[derive(Debug, Clone)]
pub struct RawAlert {
    pub metric_key: &'static str,
    pub severity: Severity,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub context: RuleContext,
}

pub struct Rule {
    pub metric_key: &'static str,
    pub kind: AlertKind,
    pub title: &'static str,
    pub predicate: fn(&Snapshot, &EngineConfig) -> bool,
    pub severity: fn(&Snapshot, &EngineConfig) -> Severity,
    pub message: fn(&Snapshot, &EngineConfig) -> String,
    pub context: fn(&Snapshot, &EngineConfig) -> RuleContext,
}

fn always_p1(_: &Snapshot, _: &EngineConfig) -> Severity {
    Severity::P1
}

fn always_p2(_: &Snapshot, _: &EngineConfig) -> Severity {
    Severity::P2
}

fn always_p3(_: &Snapshot, _: &EngineConfig) -> Severity {
    Severity::P3
}

fn no_show_fires(s: &Snapshot, c: &EngineConfig) -> bool {
    s.no_show_rate > c.no_show_critical_percent
}

fn no_show_message(s: &Snapshot, c: &EngineConfig) -> String {
    format!(
        "No-show rate at {:.1}% exceeds the {:.0}% limit",
        s.no_show_rate, c.no_show_critical_percent
    )
}

fn no_show_context(s: &Snapshot, c: &EngineConfig) -> RuleContext {
    RuleContext::NoShow {
        rate: s.no_show_rate,
        target: c.no_show_critical_percent,
        impact: s.financial_impact,
    }
}

fn margin_fires(s: &Snapshot, c: &EngineConfig) -> bool {
    // Zero entries means an idle window, not a zero margin
    s.total_entries > 0.0 && s.net_margin < c.margin_min_percent
}

// One rule with banded severity: below the critical band wins P1, otherwise
// P2. Never emits two alerts for the same margin value.
fn margin_severity(s: &Snapshot, c: &EngineConfig) -> Severity {
    if s.net_margin < c.margin_critical_percent {
        Severity::P1
    } else {
        Severity::P2
    }
}

fn margin_message(s: &Snapshot, c: &EngineConfig) -> String {
    format!(
        "Net margin at {:.1}% is below the {:.0}% minimum",
        s.net_margin, c.margin_min_percent
    )
}

fn margin_context(s: &Snapshot, c: &EngineConfig) -> RuleContext {
    RuleContext::Margin {
        margin: s.net_margin,
        target: c.margin_min_percent,
    }
}

fn revpas_drop_fires(s: &Snapshot, c: &EngineConfig) -> bool {
    detect_drop(s.revpas_current, s.revpas_prior, c.drop_threshold_percent)
}

fn revpas_drop_message(s: &Snapshot, c: &EngineConfig) -> String {
    format!(
        "RevPAS fell {:.1}% week over week (limit {:.0}%)",
        s.revpas_drop_percent, c.drop_threshold_percent
    )
}

fn revpas_drop_context(s: &Snapshot, c: &EngineConfig) -> RuleContext {
    RuleContext::RevPasDrop {
        drop: s.revpas_drop_percent,
        target: c.drop_threshold_percent,
    }
}

fn satisfaction_fires(s: &Snapshot, c: &EngineConfig) -> bool {
    // Zero means nobody was surveyed, not a zero score
    s.avg_satisfaction > 0.0 && s.avg_satisfaction < c.nps_min_score
}

fn satisfaction_message(s: &Snapshot, c: &EngineConfig) -> String {
    format!(
        "Average satisfaction at {:.0} is below the target of {:.0}",
        s.avg_satisfaction, c.nps_min_score
    )
}

fn satisfaction_context(s: &Snapshot, c: &EngineConfig) -> RuleContext {
    RuleContext::Satisfaction {
        score: s.avg_satisfaction,
        target: c.nps_min_score,
    }
}

fn nrr_fires(s: &Snapshot, c: &EngineConfig) -> bool {
    s.net_revenue_retention > 0.0 && s.net_revenue_retention < c.nrr_min_percent
}

fn nrr_message(s: &Snapshot, c: &EngineConfig) -> String {
    format!(
        "Net revenue retention at {:.1}% is below the {:.0}% floor",
        s.net_revenue_retention, c.nrr_min_percent
    )
}

fn nrr_context(s: &Snapshot, c: &EngineConfig) -> RuleContext {
    RuleContext::Retention {
        nrr: s.net_revenue_retention,
        target: c.nrr_min_percent,
    }
}

/// The rule table. Order is the walk order; it does not affect the final
/// ranking, which re-sorts by severity and impact.
pub static RULES: &[Rule] = &[
    Rule {
        metric_key: keys::NO_SHOW_RATE,
        kind: AlertKind::Snapshot,
        title: "No-show rate critical",
        predicate: no_show_fires,
        severity: always_p1,
        message: no_show_message,
        context: no_show_context,
    },
    Rule {
        metric_key: keys::NET_MARGIN,
        kind: AlertKind::Snapshot,
        title: "Net margin below minimum",
        predicate: margin_fires,
        severity: margin_severity,
        message: margin_message,
        context: margin_context,
    },
    Rule {
        metric_key: keys::REVPAS_DROP,
        kind: AlertKind::Snapshot,
        title: "Revenue per slot dropping",
        predicate: revpas_drop_fires,
        severity: always_p1,
        message: revpas_drop_message,
        context: revpas_drop_context,
    },
    Rule {
        metric_key: keys::AVG_SATISFACTION,
        kind: AlertKind::Snapshot,
        title: "Satisfaction below target",
        predicate: satisfaction_fires,
        severity: always_p2,
        message: satisfaction_message,
        context: satisfaction_context,
    },
    Rule {
        metric_key: keys::NRR,
        kind: AlertKind::Info,
        title: "Revenue retention below floor",
        predicate: nrr_fires,
        severity: always_p3,
        message: nrr_message,
        context: nrr_context,
    },
];

/// Walk the rule table once and collect everything that fired.
pub fn evaluate_rules(snapshot: &Snapshot, config: &EngineConfig) -> Vec<RawAlert> {
    let mut fired = Vec::new();
    for rule in RULES {
        if !(rule.predicate)(snapshot, config) {
            continue;
        }
        let severity = (rule.severity)(snapshot, config);
        debug!(metric = rule.metric_key, severity = severity.as_str(), "rule fired");
        fired.push(RawAlert {
            metric_key: rule.metric_key,
            severity,
            kind: rule.kind,
            title: rule.title.to_string(),
            message: (rule.message)(snapshot, config),
            context: (rule.context)(snapshot, config),
        });
    }
    fired
}
