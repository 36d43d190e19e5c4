//! Temperature-dependent formulas shared by the scheduler and the codelets.

/// Weighted mean of `(value, weight)` pairs; 0 when the weights sum to 0
pub fn weighted_average(values: &[(f64, f64)]) -> f64 {
    let (total, weights) = values
        .iter()
        .fold((0.0, 0.0), |(t, w), (value, weight)| (t + value * weight, w + weight));
    if weights == 0.0 {
        0.0
    } else {
        total / weights
    }
}

/// Sharpen a value by temperature: `value ^ ((100 - T) / 30 + 0.5)`.
///
/// Cold temperatures exaggerate differences between candidates, hot ones
/// flatten them.
pub fn temperature_adjusted_value(temperature: f64, value: f64) -> f64 {
    value.max(0.0).powf((100.0 - temperature) / 30.0 + 0.5)
}

/// Pull a probability toward 0.5 as temperature rises.
///
/// Symmetric around 0.5; 0, 0.5 and any value at temperature 0 pass through.
pub fn temperature_adjusted_probability(temperature: f64, value: f64) -> f64 {
    if value == 0.0 || value == 0.5 || temperature == 0.0 {
        return value;
    }
    if value < 0.5 {
        return 1.0 - temperature_adjusted_probability(temperature, 1.0 - value);
    }
    let coldness = (100.0 - temperature).max(0.0);
    let pull = (10.0 - coldness.sqrt()) / 100.0;
    (value * (1.0 - pull)).max(0.5)
}

/// Map a strength in [0, 100] onto urgency bins `1..=bins`
pub fn urgency_bin(value: f64, bins: u32) -> f64 {
    let bins = bins.max(1);
    let i = (value.max(0.0).floor() as u64 * bins as u64 / 100) as u32;
    if i >= bins {
        bins as f64
    } else {
        (i + 1) as f64
    }
}
