//! Sliding-window primitives shared by the indicator calculators.
//!
//! Every function takes chronological input (oldest first), never mutates
//! it, and returns one entry per input value. Entries before the window is
//! full are `None`.

use crate::model::Candle;

/// Simple moving average over the trailing `period` values.
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let mut sum: f64 = values[..period].iter().sum();
    out[period - 1] = Some(sum / period as f64);
    for i in period..values.len() {
        sum += values[i] - values[i - period];
        out[i] = Some(sum / period as f64);
    }
    out
}

/// Exponential moving average seeded with the SMA of the first `period` values.
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut prev = values[..period].iter().sum::<f64>() / period as f64;
    out[period - 1] = Some(prev);
    for i in period..values.len() {
        prev = (values[i] - prev) * k + prev;
        out[i] = Some(prev);
    }
    out
}

/// Weighted moving average with linear weights `1..=period`, newest heaviest.
pub fn wma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    for (i, window) in values.windows(period).enumerate() {
        let weighted: f64 = window
            .iter()
            .enumerate()
            .map(|(j, v)| v * (j + 1) as f64)
            .sum();
        out[i + period - 1] = Some(weighted / weight_sum);
    }
    out
}

/// Population standard deviation over the trailing window.
pub fn std_dev(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let means = sma(values, period);
    means
        .iter()
        .enumerate()
        .map(|(i, mean)| {
            let mean = (*mean)?;
            let window = &values[i + 1 - period..=i];
            let variance =
                window.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / period as f64;
            Some(variance.sqrt())
        })
        .collect()
}

/// Rolling maximum over the trailing window.
pub fn highest(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::max)
}

/// Rolling minimum over the trailing window.
pub fn lowest(values: &[f64], period: usize) -> Vec<Option<f64>> {
    rolling(values, period, f64::min)
}

fn rolling(values: &[f64], period: usize, pick: fn(f64, f64) -> f64) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }
    for (i, window) in values.windows(period).enumerate() {
        out[i + period - 1] = window.iter().copied().reduce(pick);
    }
    out
}

/// True range per candle; the first candle has no previous close and uses
/// `high - low` only.
pub fn true_range(candles: &[Candle]) -> Vec<f64> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let range = c.high - c.low;
            match i.checked_sub(1).map(|p| candles[p].close) {
                Some(prev_close) => range
                    .max((c.high - prev_close).abs())
                    .max((c.low - prev_close).abs()),
                None => range,
            }
        })
        .collect()
}

/// Index of the first `Some` entry together with the contiguous run of
/// values from there on. Calculators chain windows over these runs.
pub fn defined_tail(values: &[Option<f64>]) -> (usize, Vec<f64>) {
    let start = values
        .iter()
        .position(Option::is_some)
        .unwrap_or(values.len());
    let tail = values[start..].iter().map_while(|v| *v).collect();
    (start, tail)
}
