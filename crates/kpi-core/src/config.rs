use serde::{Deserialize, Serialize};

use crate::error::KpiError;

/// Engine configuration, passed explicitly at construction time. Nothing in
/// the engine reads the process environment; callers that want env-driven
/// overrides resolve them before building this object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// No-show rate above this fires a P1 (percent)
    pub no_show_critical_percent: f64,
    /// Net margin below this fires a P2 (percent)
    pub margin_min_percent: f64,
    /// Net margin below this fires a P1 instead (percent)
    pub margin_critical_percent: f64,
    /// Week-over-week drop above this fires a P1 (percent)
    pub drop_threshold_percent: f64,
    /// Average satisfaction below this fires a quality alert (0-100 scale)
    pub nps_min_score: f64,
    /// Net revenue retention below this fires a growth alert (percent)
    pub nrr_min_percent: f64,
    /// Trailing window length for current/prior comparison
    pub window_days: i64,

    // LTV assumptions; the engine has no purchase history, so frequency and
    // retention come from the caller's own modeling.
    pub visit_frequency_per_year: f64,
    pub retention_rate: f64,
    /// Customer acquisition cost. Zero disables the LTV/CAC composite rule.
    pub cac: f64,
    /// Healthy LTV/CAC ratio reported as the alert target
    pub ltv_cac_target: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            no_show_critical_percent: 25.0,
            margin_min_percent: 20.0,
            margin_critical_percent: 10.0,
            drop_threshold_percent: 15.0,
            nps_min_score: 70.0,
            nrr_min_percent: 85.0,
            window_days: 7,
            visit_frequency_per_year: 12.0,
            retention_rate: 0.7,
            cac: 0.0,
            ltv_cac_target: 3.0,
        }
    }
}

impl EngineConfig {
    /// Fail fast on a configuration that would make evaluation meaningless.
    pub fn validate(&self) -> Result<(), KpiError> {
        let thresholds = [
            ("no_show_critical_percent", self.no_show_critical_percent),
            ("margin_min_percent", self.margin_min_percent),
            ("margin_critical_percent", self.margin_critical_percent),
            ("drop_threshold_percent", self.drop_threshold_percent),
            ("nps_min_score", self.nps_min_score),
            ("nrr_min_percent", self.nrr_min_percent),
            ("visit_frequency_per_year", self.visit_frequency_per_year),
            ("cac", self.cac),
            ("ltv_cac_target", self.ltv_cac_target),
        ];
        for (name, value) in thresholds {
            if !value.is_finite() || value < 0.0 {
                return Err(KpiError::InvalidConfig(format!(
                    "{name} must be a finite non-negative number, got {value}"
                )));
            }
        }

        if self.margin_critical_percent > self.margin_min_percent {
            return Err(KpiError::InvalidConfig(format!(
                "margin_critical_percent ({}) must not exceed margin_min_percent ({})",
                self.margin_critical_percent, self.margin_min_percent
            )));
        }
        if !(0.0..=1.0).contains(&self.retention_rate) {
            return Err(KpiError::InvalidConfig(format!(
                "retention_rate must be within [0, 1], got {}",
                self.retention_rate
            )));
        }
        if self.window_days < 1 {
            return Err(KpiError::InvalidConfig(format!(
                "window_days must be at least 1, got {}",
                self.window_days
            )));
        }

        Ok(())
    }
}
