//! OEE metric chain
//!
//! VOT → QL → NOT → UDT → GOT → SLT → SL, then Availability, Performance,
//! Quality and OEE. Every function here is pure. Ratio metrics guard their
//! denominators and yield exactly 0 instead of NaN; OEE itself is rejected,
//! not zero-filled, when an upstream input is invalid.

use chrono::{DateTime, Utc};

use crate::types::{MetricSnapshot, SkipReason};

/// Everything the chain needs for one tick over `[job start, tick]`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricInputs {
    pub net_production: f64,
    pub lost_units: f64,
    /// Design speed, units per hour
    pub design_speed: f64,
    pub window_minutes: f64,
    /// Minutes in unplanned-down states
    pub udt_minutes: f64,
    pub tailback_minutes: f64,
    pub lack_minutes: f64,
}

/// Value Operating Time: output expressed as minutes at design speed.
pub fn value_operating_time(net_production: f64, design_speed: f64) -> f64 {
    net_production / (design_speed / 60.0)
}

/// Quality Loss as a percentage of net production; 0 when nothing was produced.
pub fn quality_loss(lost_units: f64, net_production: f64) -> f64 {
    if net_production == 0.0 {
        0.0
    } else {
        (lost_units / net_production) * 100.0
    }
}

pub fn net_operating_time(vot: f64, ql: f64) -> f64 {
    vot + ql
}

pub fn gross_operating_time(window_minutes: f64, udt_minutes: f64) -> f64 {
    window_minutes - udt_minutes
}

pub fn availability(got: f64, window_minutes: f64) -> f64 {
    ratio_percent(got, window_minutes)
}

pub fn performance(not: f64, got: f64) -> f64 {
    ratio_percent(not, got)
}

pub fn quality(vot: f64, not: f64) -> f64 {
    ratio_percent(vot, not)
}

pub fn oee(availability: f64, performance: f64, quality: f64) -> f64 {
    (availability * performance * quality) / 10_000.0
}

fn ratio_percent(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        0.0
    } else {
        (numerator / denominator) * 100.0
    }
}

fn is_valid_time(v: f64) -> bool {
    v.is_finite() && v >= 0.0
}

/// Evaluate the full chain for one tick.
///
/// Returns the reason the tick must be dropped when an input or result is
/// invalid.
pub fn evaluate(timestamp: DateTime<Utc>, inputs: &MetricInputs) -> Result<MetricSnapshot, SkipReason> {
    if inputs.design_speed.is_nan() || inputs.design_speed <= 0.0 {
        return Err(SkipReason::NonPositiveDesignSpeed);
    }
    if inputs.net_production < 0.0 {
        return Err(SkipReason::NegativeProduction);
    }
    if inputs.lost_units < 0.0 {
        return Err(SkipReason::NegativeLoss);
    }

    let vot = value_operating_time(inputs.net_production, inputs.design_speed);
    if !is_valid_time(vot) {
        return Err(SkipReason::InvalidVot);
    }

    let ql = quality_loss(inputs.lost_units, inputs.net_production);
    let not = net_operating_time(vot, ql);
    let udt = inputs.udt_minutes;
    let got = gross_operating_time(inputs.window_minutes, udt);
    let slt = got - not;
    let sl = slt - inputs.tailback_minutes - inputs.lack_minutes;

    let availability = availability(got, inputs.window_minutes);
    let performance = performance(not, got);
    let quality = quality(vot, not);
    let oee = oee(availability, performance, quality);

    if !is_valid_time(oee) || availability < 0.0 || performance < 0.0 || quality < 0.0 {
        return Err(SkipReason::InvalidOee);
    }

    Ok(MetricSnapshot {
        timestamp,
        net_production_units: inputs.net_production,
        lost_units: inputs.lost_units,
        design_speed: inputs.design_speed,
        vot,
        ql,
        not,
        udt,
        got,
        slt,
        sl,
        availability,
        performance,
        quality,
        oee,
    })
}
