//! Aggregates fact collections into a [`Snapshot`].
//!
//! The builder is stateless and order-independent: permuting the input facts
//! never changes the resulting snapshot. Window splitting (which facts count
//! as "current" vs "prior") is the caller's concern.

use kpi_core::{EngineConfig, Fact, FactStatus, Snapshot};
use metric_formulas as formulas;
use tracing::debug;

pub struct SnapshotBuilder {
    config: EngineConfig,
}

/// Intermediate sums over one window. Skips non-finite fields so one
/// malformed fact cannot poison a whole aggregate.
#[derive(Debug, Default)]
struct WindowTotals {
    completed: u32,
    no_shows: u32,
    entries: f64,
    exits: f64,
    variable_cost: f64,
    revenue: f64,
    ticket_sum: f64,
    ticket_count: u32,
    slots_available: u32,
    slots_empty: u32,
    revenue_current_base: f64,
    revenue_previous_base: f64,
    satisfaction_sum: f64,
    satisfaction_count: u32,
}

fn add_finite(total: &mut f64, value: f64) {
    if value.is_finite() {
        *total += value;
    }
}

impl WindowTotals {
    fn from_facts(facts: &[Fact]) -> Self {
        let mut totals = Self::default();
        for fact in facts {
            match fact.status {
                FactStatus::Completed => totals.completed += 1,
                FactStatus::NoShow => totals.no_shows += 1,
                _ => {}
            }
            add_finite(&mut totals.entries, fact.entries);
            add_finite(&mut totals.exits, fact.exits);
            add_finite(&mut totals.variable_cost, fact.variable_cost);
            add_finite(&mut totals.revenue, fact.revenue);
            add_finite(&mut totals.revenue_current_base, fact.revenue_current_base);
            add_finite(&mut totals.revenue_previous_base, fact.revenue_previous_base);
            if fact.ticket_avg.is_finite() {
                totals.ticket_sum += fact.ticket_avg;
                totals.ticket_count += 1;
            }
            if let Some(score) = fact.satisfaction {
                if score.is_finite() {
                    totals.satisfaction_sum += score;
                    totals.satisfaction_count += 1;
                }
            }
            totals.slots_available += fact.slots_available;
            totals.slots_empty += fact.slots_empty;
        }
        totals
    }

    fn no_show_rate(&self) -> f64 {
        let decided = self.completed + self.no_shows;
        if decided == 0 {
            return 0.0;
        }
        self.no_shows as f64 / decided as f64 * 100.0
    }

    fn net_margin_percent(&self) -> f64 {
        if self.entries == 0.0 {
            return 0.0;
        }
        let net = self.entries - self.exits - self.variable_cost;
        net / self.entries * 100.0
    }

    fn avg_ticket(&self) -> f64 {
        if self.ticket_count == 0 {
            return 0.0;
        }
        self.ticket_sum / self.ticket_count as f64
    }

    fn avg_satisfaction(&self) -> f64 {
        if self.satisfaction_count == 0 {
            return 0.0;
        }
        self.satisfaction_sum / self.satisfaction_count as f64
    }
}

impl SnapshotBuilder {
    pub fn new(config: EngineConfig) -> Self {
        Self { config }
    }

    /// Build a snapshot from already-split current and prior windows.
    pub fn build(&self, current: &[Fact], prior: &[Fact]) -> Snapshot {
        let totals = WindowTotals::from_facts(current);
        let prior_totals = WindowTotals::from_facts(prior);

        let avg_ticket = totals.avg_ticket();
        let revpas_current = formulas::revpas(totals.revenue, totals.slots_available);
        let revpas_prior = formulas::revpas(prior_totals.revenue, prior_totals.slots_available);

        let snapshot = Snapshot {
            net_margin: totals.net_margin_percent(),
            no_show_rate: totals.no_show_rate(),
            financial_impact: formulas::financial_impact(totals.slots_empty as f64, avg_ticket),
            revpas_current,
            revpas_prior,
            revpas_drop_percent: formulas::revpas_drop_percent(revpas_current, revpas_prior),
            empty_slots: totals.slots_empty,
            avg_ticket,
            total_entries: totals.entries,
            net_revenue_retention: formulas::net_revenue_retention(
                totals.revenue_current_base,
                totals.revenue_previous_base,
            ),
            ltv: formulas::net_ltv(
                avg_ticket,
                self.config.visit_frequency_per_year,
                self.config.retention_rate,
                if totals.ticket_count == 0 {
                    0.0
                } else {
                    totals.variable_cost / totals.ticket_count as f64
                },
                self.config.cac,
            ),
            cac: self.config.cac,
            avg_satisfaction: totals.avg_satisfaction(),
        };

        debug!(
            facts = current.len(),
            prior_facts = prior.len(),
            no_show_rate = snapshot.no_show_rate,
            revpas_drop = snapshot.revpas_drop_percent,
            "snapshot built"
        );

        snapshot
    }

    /// Build from a single window; prior-window metrics come out as 0.
    pub fn build_unwindowed(&self, facts: &[Fact]) -> Snapshot {
        self.build(facts, &[])
    }
}
