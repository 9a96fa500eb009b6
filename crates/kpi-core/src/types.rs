use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Acquisition channel for a booked slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    PaidMedia,
    Organic,
    Referral,
    Direct,
}

/// Outcome of a booked slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    Completed,
    NoShow,
    Cancelled,
    Rescheduled,
    Scheduled,
}

/// One normalized business operation record, as produced by the ingestion
/// layer. The engine never mutates facts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fact {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub channel: Channel,
    pub professional: String,
    pub procedure: String,
    pub status: FactStatus,
    /// Money in for this record
    pub entries: f64,
    /// Money out for this record
    pub exits: f64,
    pub slots_available: u32,
    pub slots_empty: u32,
    pub ticket_avg: f64,
    pub variable_cost: f64,
    pub duration_minutes: f64,
    pub wait_time_minutes: f64,
    /// Satisfaction score 0-100, when surveyed
    #[serde(default)]
    pub satisfaction: Option<f64>,
    /// Current-period cohort revenue (NRR numerator)
    pub revenue_current_base: f64,
    /// Previous-period cohort revenue (NRR denominator)
    pub revenue_previous_base: f64,
    pub revenue: f64,
}

/// Point-in-time aggregation of all tracked metrics. A plain value with no
/// identity; rebuilt from scratch on every evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Net margin as a percentage of entries
    pub net_margin: f64,
    /// No-shows as a percentage of decided slots (completed + no-show)
    pub no_show_rate: f64,
    /// Money left on the table by empty capacity
    pub financial_impact: f64,
    pub revpas_current: f64,
    pub revpas_prior: f64,
    /// Positive value means a decline vs the prior window
    pub revpas_drop_percent: f64,
    pub empty_slots: u32,
    pub avg_ticket: f64,
    /// Money in over the current window; zero means an idle window, not a
    /// zero-margin one
    pub total_entries: f64,
    pub net_revenue_retention: f64,
    pub ltv: f64,
    pub cac: f64,
    pub avg_satisfaction: f64,
}

impl Snapshot {
    /// Flat metric-name -> value view for dashboard/reporting consumers.
    pub fn metrics(&self) -> BTreeMap<&'static str, f64> {
        BTreeMap::from([
            (keys::NET_MARGIN, self.net_margin),
            (keys::NO_SHOW_RATE, self.no_show_rate),
            (keys::FINANCIAL_IMPACT, self.financial_impact),
            (keys::REVPAS_CURRENT, self.revpas_current),
            (keys::REVPAS_PRIOR, self.revpas_prior),
            (keys::REVPAS_DROP, self.revpas_drop_percent),
            (keys::EMPTY_SLOTS, self.empty_slots as f64),
            (keys::AVG_TICKET, self.avg_ticket),
            (keys::TOTAL_ENTRIES, self.total_entries),
            (keys::NRR, self.net_revenue_retention),
            (keys::LTV, self.ltv),
            (keys::CAC, self.cac),
            (keys::AVG_SATISFACTION, self.avg_satisfaction),
        ])
    }
}

/// Stable metric keys shared by the snapshot view and alert records
pub mod keys {
    pub const NET_MARGIN: &str = "net_margin";
    pub const NO_SHOW_RATE: &str = "no_show_rate";
    pub const FINANCIAL_IMPACT: &str = "financial_impact";
    pub const REVPAS_CURRENT: &str = "revpas_current";
    pub const REVPAS_PRIOR: &str = "revpas_prior";
    pub const REVPAS_DROP: &str = "revpas_drop_percent";
    pub const EMPTY_SLOTS: &str = "empty_slots";
    pub const AVG_TICKET: &str = "avg_ticket";
    pub const TOTAL_ENTRIES: &str = "total_entries";
    pub const NRR: &str = "nrr";
    pub const LTV: &str = "ltv";
    pub const CAC: &str = "cac";
    pub const AVG_SATISFACTION: &str = "avg_satisfaction";
    pub const LTV_CAC_RATIO: &str = "ltv_cac_ratio";
}

/// Alert severity, P1 most urgent. Declaration order gives the derived `Ord`
/// the same total order as `rank()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    P1,
    P2,
    P3,
}

impl Severity {
    /// Urgency rank used for sorting (P1 = 0)
    pub fn rank(&self) -> u8 {
        match self {
            Severity::P1 => 0,
            Severity::P2 => 1,
            Severity::P3 => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::P1 => "P1",
            Severity::P2 => "P2",
            Severity::P3 => "P3",
        }
    }
}

/// How the alert was derived
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    RealTime,
    Snapshot,
    Info,
}

/// Business area an alert belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Financial,
    Operational,
    Quality,
    Growth,
}

impl Category {
    /// Infer a category from a metric key. Rules are ordered and the first
    /// match wins; the Portuguese patterns cover keys passed through from
    /// legacy upstream data sources.
    pub fn from_metric_key(key: &str) -> Self {
        const FINANCIAL: &[&str] = &["revpas", "faturamento", "margem", "margin", "revenue"];
        const QUALITY: &[&str] = &["nps", "satisfaction"];
        const GROWTH: &[&str] = &["cac", "nrr", "ltv"];

        if FINANCIAL.iter().any(|p| key.contains(p)) {
            Category::Financial
        } else if QUALITY.iter().any(|p| key.contains(p)) {
            Category::Quality
        } else if GROWTH.iter().any(|p| key.contains(p)) {
            Category::Growth
        } else {
            Category::Operational
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Financial => "financial",
            Category::Operational => "operational",
            Category::Quality => "quality",
            Category::Growth => "growth",
        }
    }
}

/// A classified metric deviation, ready for display or storage by the caller.
///
/// `acknowledged`/`resolved`/`assigned_to` are initialized to the unset state
/// and owned by the caller from then on; the engine never transitions them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    /// Unique within one evaluation batch (metric key + evaluation timestamp)
    pub id: String,
    pub severity: Severity,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    pub metric_key: String,
    pub current_value: f64,
    pub target_value: f64,
    /// (current - target) / target * 100, 0 when target is 0
    pub deviation_percent: f64,
    pub financial_impact: Option<f64>,
    pub category: Category,
    pub triggered_at: DateTime<Utc>,
    #[serde(default)]
    pub acknowledged: bool,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub assigned_to: Option<String>,
}
