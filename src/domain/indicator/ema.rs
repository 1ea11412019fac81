//! Exponential Moving Average.
//!
//! k = 2/(span+1), seeded with the first value (not an SMA seed):
//! EMA[0] = x[0], EMA[i] = x[i]*k + EMA[i-1]*(1-k).
//! Every index is defined, so there is no warmup. A non-finite input carries
//! the previous EMA forward; before the first finite input the output is NaN.

pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    if span == 0 || values.is_empty() {
        return Vec::new();
    }

    let k = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;

    for &x in values {
        prev = match prev {
            _ if !x.is_finite() => prev,
            None => Some(x),
            Some(p) => Some(x * k + p * (1.0 - k)),
        };
        out.push(prev.unwrap_or(f64::NAN));
    }

    out
}
