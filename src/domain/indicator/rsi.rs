//! RSI (Relative Strength Index) with Wilder smoothing.
//!
//! Follows the `ta` momentum RSI convention:
//! - diffs are taken bar to bar; the first bar has no predecessor and counts as a zero change
//! - average gain/loss: exponential smoothing with alpha = 1/n, seeded with the first value
//! - RSI = 100 - (100 / (1 + avg_gain / avg_loss)), and 100 whenever avg_loss == 0
//!
//! Warmup: indices below n-1 have fewer than n observations and are `None`.
//! A non-finite close is `None` and leaves the averages untouched; the next
//! finite close is diffed against the last finite one.

pub fn rsi(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if period == 0 {
        return vec![None; values.len()];
    }

    let alpha = 1.0 / period as f64;
    let mut out = Vec::with_capacity(values.len());
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;
    let mut prev_close: Option<f64> = None;

    for (i, &close) in values.iter().enumerate() {
        if !close.is_finite() {
            out.push(None);
            continue;
        }
        let change = prev_close.map_or(0.0, |prev| close - prev);
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        if prev_close.is_none() {
            avg_gain = gain;
            avg_loss = loss;
        } else {
            avg_gain = alpha * gain + (1.0 - alpha) * avg_gain;
            avg_loss = alpha * loss + (1.0 - alpha) * avg_loss;
        }
        prev_close = Some(close);

        if i + 1 < period {
            out.push(None);
            continue;
        }

        let value = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        out.push(value.is_finite().then_some(value));
    }

    out
}
