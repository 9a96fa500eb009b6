//! Business metric formulas.
//!
//! Every function here is total: a non-finite operand or zero denominator
//! yields 0.0 instead of propagating NaN/Infinity into downstream alerts.
//! A single malformed fact must never abort evaluation of a whole batch.

/// Default week-over-week drop threshold (percent)
pub const DEFAULT_DROP_THRESHOLD_PERCENT: f64 = 15.0;

fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        0.0
    }
}

/// Money left on the table by empty capacity.
pub fn financial_impact(empty_slots: f64, avg_ticket: f64) -> f64 {
    finite_or_zero(empty_slots * avg_ticket)
}

/// Revenue per available slot. The denominator is floored at 1; callers are
/// responsible for supplying a meaningful slot count.
pub fn revpas(total_revenue: f64, available_slots: u32) -> f64 {
    finite_or_zero(total_revenue / available_slots.max(1) as f64)
}

/// Percentage drop from `previous` to `current`. Positive means a decline.
pub fn revpas_drop_percent(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        return 0.0;
    }
    finite_or_zero((previous - current) / previous * 100.0)
}

/// Net customer lifetime value. May be negative, which signals an
/// unprofitable customer.
pub fn net_ltv(
    avg_ticket: f64,
    frequency: f64,
    retention: f64,
    variable_cost: f64,
    cac: f64,
) -> f64 {
    finite_or_zero(avg_ticket * frequency * retention - variable_cost - cac)
}

/// Current-period cohort revenue as a percentage of the prior period's.
pub fn net_revenue_retention(current_base: f64, previous_base: f64) -> f64 {
    if previous_base == 0.0 {
        return 0.0;
    }
    finite_or_zero(current_base / previous_base * 100.0)
}

/// Same arithmetic as [`financial_impact`]; kept distinct because callers
/// attach different semantics and labels to the two numbers.
pub fn opportunity_cost(empty_slots: f64, avg_ticket: f64) -> f64 {
    financial_impact(empty_slots, avg_ticket)
}

/// Deviation of a value from its target: (current - target) / target * 100.
/// Zero when the target is 0 or either operand is non-finite.
pub fn deviation_percent(current: f64, target: f64) -> f64 {
    if target == 0.0 || !current.is_finite() || !target.is_finite() {
        return 0.0;
    }
    finite_or_zero((current - target) / target * 100.0)
}

/// Generic paired-scalar drop comparison. The 7-day framing is a labeling
/// convention applied by callers; no clock is read here.
pub fn drop_percent(current: f64, previous: f64) -> f64 {
    revpas_drop_percent(current, previous)
}

/// True iff `current` fell more than `threshold_percent` below `previous`.
pub fn detect_drop(current: f64, previous: f64, threshold_percent: f64) -> bool {
    drop_percent(current, previous) > threshold_percent
}
