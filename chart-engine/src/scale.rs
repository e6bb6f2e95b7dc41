//! Axis maximum and tick computation.
//!
//! The axis ceiling should read as a round number without clipping data and
//! without leaving more than `max_overage_ratio` headroom above the data.

use fleet_core::{ChartData, LineChartData, Scale, ScaleInputs};

pub const DEFAULT_OVERAGE_RATIO: f64 = 1.2;
pub const DEFAULT_TICK_COUNT: usize = 5;

fn decade(value: f64) -> f64 {
    10f64.powi(value.log10().floor() as i32)
}

/// Smallest `{1, 2, 5} x 10^k` that is `>= value`; 0.0 for non-positive or
/// non-finite input.
pub fn nice_ceil(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let base = decade(value);
    let f = value / base;
    let nf = if f <= 1.0 {
        1.0
    } else if f <= 2.0 {
        2.0
    } else if f <= 5.0 {
        5.0
    } else {
        10.0
    };
    nf * base
}

/// Round up to one significant digit (637 -> 700, 19 -> 20); 0.0 for
/// non-positive or non-finite input.
pub fn round_up_few_sig_digits(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let base = decade(value);
    (value / base).ceil() * base
}

/// Axis maximum for `data_max`.
///
/// Non-positive data gives 1. An explicit `inputs.max_value` wins next
/// (floored at 1). Otherwise the nice ceiling is used when it stays within
/// the overage cap, then the one-digit round-up, and finally `data_max`.
pub fn compute_max_value(data_max: f64, inputs: &ScaleInputs) -> f64 {
    if !data_max.is_finite() || data_max <= 0.0 {
        return 1.0;
    }
    if let Some(max) = inputs.max_value.filter(|m| m.is_finite()) {
        return max.max(1.0);
    }
    let ratio = inputs.max_overage_ratio.unwrap_or(DEFAULT_OVERAGE_RATIO);
    let cap = data_max * ratio;

    let nice = nice_ceil(data_max);
    if nice <= cap {
        return nice;
    }
    let round = round_up_few_sig_digits(data_max);
    if round <= cap {
        return round;
    }
    data_max
}

/// Tick positions from 0 up to at least `max_value`.
pub fn compute_ticks(max_value: f64, inputs: &ScaleInputs) -> Vec<f64> {
    if let Some(ticks) = inputs.ticks.as_ref().filter(|t| !t.is_empty()) {
        return ticks.clone();
    }
    let tick_count = inputs.tick_count.unwrap_or(DEFAULT_TICK_COUNT).max(2);
    let step = nice_ceil(max_value / (tick_count - 1) as f64);
    let mut ticks: Vec<f64> = (0..tick_count).map(|i| i as f64 * step).collect();
    if let Some(last) = ticks.last_mut() {
        if *last < max_value {
            *last = nice_ceil(max_value);
        }
    }
    ticks
}

/// Per-label sum across all series; non-finite values count as 0.
pub fn stacked_totals(data: &ChartData) -> Vec<f64> {
    let mut totals = vec![0.0; data.labels.len()];
    for ds in &data.datasets {
        for (total, v) in totals.iter_mut().zip(&ds.values) {
            if v.is_finite() {
                *total += v;
            }
        }
    }
    totals
}

/// Largest single finite value, 0.0 when there is none.
pub fn max_of_data(data: &ChartData) -> f64 {
    data.datasets
        .iter()
        .flat_map(|ds| ds.values.iter().copied())
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

/// Largest finite line y value, 0.0 when there is none.
pub fn max_of_lines(lines: &LineChartData) -> f64 {
    lines
        .datasets
        .iter()
        .flat_map(|ds| ds.points.iter().map(|p| p.y))
        .filter(|v| v.is_finite())
        .fold(0.0, f64::max)
}

/// Full scale for a data maximum.
pub fn compute_scale(data_max: f64, inputs: &ScaleInputs) -> Scale {
    let max_value = compute_max_value(data_max, inputs);
    let ticks = compute_ticks(max_value, inputs);
    Scale { max_value, ticks }
}
