//! Facade over the full pipeline: facts -> snapshot -> ranked alerts.
//!
//! The engine is stateless; every call is a pure function of its inputs plus
//! the injected clock. Batch evaluation across tenants is the caller's loop,
//! one evaluation per tenant.

use alert_classifier::AlertClassifier;
use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use kpi_core::{Alert, EngineConfig, Fact, KpiError, Snapshot};
use serde::{Deserialize, Serialize};
use snapshot_builder::SnapshotBuilder;
use tracing::debug;

/// Result of one evaluation: the snapshot plus the ranked alert list,
/// ready for direct display or storage by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    pub snapshot: Snapshot,
    pub alerts: Vec<Alert>,
    pub evaluated_at: DateTime<Utc>,
}

pub struct Engine {
    config: EngineConfig,
    builder: SnapshotBuilder,
    classifier: AlertClassifier,
}

impl Engine {
    /// Build an engine from an explicit configuration. Fails fast on a
    /// configuration that violates the contract.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            builder: SnapshotBuilder::new(config.clone()),
            classifier: AlertClassifier::new(config.clone()),
            config,
        })
    }

    /// Evaluate a fact batch against the wall clock.
    pub fn evaluate(&self, facts: &[Fact]) -> Result<Evaluation> {
        self.evaluate_at(facts, Utc::now())
    }

    /// Evaluate a fact batch at an injected instant. `now` anchors the
    /// trailing current/prior windows and stamps alert ids and timestamps.
    pub fn evaluate_at(&self, facts: &[Fact], now: DateTime<Utc>) -> Result<Evaluation> {
        validate_facts(facts)?;

        let (current, prior) = self.split_windows(facts, now);
        debug!(
            total = facts.len(),
            current = current.len(),
            prior = prior.len(),
            "evaluating fact batch"
        );

        let snapshot = self.builder.build(&current, &prior);
        let alerts = self.classifier.classify(&snapshot, now);

        Ok(Evaluation {
            snapshot,
            alerts,
            evaluated_at: now,
        })
    }

    /// Trailing windows anchored at `now`: the last `window_days` are the
    /// current window, the `window_days` before that are the prior one.
    /// Anything older is out of scope for this evaluation.
    fn split_windows(&self, facts: &[Fact], now: DateTime<Utc>) -> (Vec<Fact>, Vec<Fact>) {
        let window = Duration::days(self.config.window_days);
        let current_start = now - window;
        let prior_start = now - window - window;

        let mut current = Vec::new();
        let mut prior = Vec::new();
        for fact in facts {
            if fact.timestamp > current_start {
                current.push(fact.clone());
            } else if fact.timestamp > prior_start {
                prior.push(fact.clone());
            }
        }
        (current, prior)
    }
}

/// Ingestion-contract check. Business-data edge cases degrade to safe
/// defaults downstream; a slot count that cannot exist is a parser bug and
/// fails the whole batch instead.
fn validate_facts(facts: &[Fact]) -> Result<(), KpiError> {
    for fact in facts {
        if fact.slots_empty > fact.slots_available {
            return Err(KpiError::InvalidInput(format!(
                "fact {}: slots_empty ({}) exceeds slots_available ({})",
                fact.id, fact.slots_empty, fact.slots_available
            )));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use kpi_core::{keys, Channel, FactStatus, Severity};

    fn fact(
        id: &str,
        timestamp: DateTime<Utc>,
        status: FactStatus,
        revenue: f64,
        slots_empty: u32,
    ) -> Fact {
        Fact {
            id: id.to_string(),
            timestamp,
            channel: Channel::PaidMedia,
            professional: "dr-lima".to_string(),
            procedure: "consultation".to_string(),
            status,
            entries: revenue,
            exits: revenue * 0.3,
            slots_available: 10,
            slots_empty,
            ticket_avg: 300.0,
            variable_cost: revenue * 0.1,
            duration_minutes: 30.0,
            wait_time_minutes: 10.0,
            satisfaction: None,
            revenue_current_base: revenue,
            revenue_previous_base: revenue,
            revenue,
        }
    }

    /// 8 healthy facts in the prior week, 7 degraded ones in the current
    /// week: a business falling off a cliff.
    fn regression_batch(now: DateTime<Utc>) -> Vec<Fact> {
        let mut facts = Vec::new();
        for i in 0..8 {
            facts.push(fact(
                &format!("prior-{i}"),
                now - Duration::days(10),
                FactStatus::Completed,
                1200.0,
                0,
            ));
        }
        for i in 0..7 {
            let status = if i < 4 {
                FactStatus::NoShow
            } else {
                FactStatus::Completed
            };
            let revenue = if status == FactStatus::Completed { 200.0 } else { 0.0 };
            facts.push(fact(&format!("recent-{i}"), now - Duration::days(2), status, revenue, 6));
        }
        facts
    }

    #[test]
    fn degraded_batch_trips_every_major_rule() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let now = Utc::now();
        let evaluation = engine.evaluate_at(&regression_batch(now), now).unwrap();

        let snapshot = &evaluation.snapshot;
        assert!(snapshot.no_show_rate > 25.0, "no-show rate {}", snapshot.no_show_rate);
        assert!(snapshot.financial_impact > 5000.0, "impact {}", snapshot.financial_impact);
        assert!(snapshot.revpas_drop_percent > 15.0, "drop {}", snapshot.revpas_drop_percent);
        assert!(evaluation.alerts.iter().any(|a| a.severity == Severity::P1));
    }

    #[test]
    fn permutation_does_not_change_outcome() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let now = Utc::now();
        let mut facts = regression_batch(now);

        let forward = engine.evaluate_at(&facts, now).unwrap();
        facts.reverse();
        let reversed = engine.evaluate_at(&facts, now).unwrap();

        assert_eq!(forward.snapshot, reversed.snapshot);
        assert_eq!(forward.alerts.len(), reversed.alerts.len());
        for (a, b) in forward.alerts.iter().zip(&reversed.alerts) {
            assert_eq!(a.metric_key, b.metric_key);
            assert_eq!(a.severity, b.severity);
            assert_eq!(a.current_value, b.current_value);
        }
    }

    #[test]
    fn facts_older_than_both_windows_are_ignored() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let now = Utc::now();
        let stale = vec![fact("old", now - Duration::days(30), FactStatus::Completed, 900.0, 0)];

        let evaluation = engine.evaluate_at(&stale, now).unwrap();
        assert_eq!(evaluation.snapshot.revpas_current, 0.0);
        assert_eq!(evaluation.snapshot.revpas_prior, 0.0);
        assert!(evaluation.alerts.is_empty());
    }

    #[test]
    fn impossible_slot_count_fails_the_batch() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let now = Utc::now();
        let mut bad = fact("bad", now, FactStatus::Completed, 500.0, 0);
        bad.slots_empty = 99;

        let err = engine.evaluate_at(&[bad], now).unwrap_err();
        assert!(err.to_string().contains("slots_empty"));
    }

    #[test]
    fn invalid_config_rejected_at_construction() {
        let config = EngineConfig { window_days: 0, ..Default::default() };
        assert!(Engine::new(config).is_err());
    }

    #[test]
    fn snapshot_metrics_exposed_for_reporting() {
        let engine = Engine::new(EngineConfig::default()).unwrap();
        let now = Utc::now();
        let evaluation = engine.evaluate_at(&regression_batch(now), now).unwrap();

        let metrics = evaluation.snapshot.metrics();
        assert!(metrics[keys::NO_SHOW_RATE] > 25.0);
        assert!(metrics.contains_key(keys::REVPAS_DROP));
        assert!(metrics.contains_key(keys::AVG_TICKET));
    }
}
