//! Rolling window statistics over plain `f64` series.
//!
//! A window containing any NaN yields NaN. Outputs are aligned with the
//! input: value `i` covers `[i + 1 - window, i]`.

/// Rolling arithmetic mean. The first `window - 1` values are NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        out[i] = slice.iter().sum::<f64>() / window as f64;
    }
    out
}

/// Rolling standard deviation with `ddof` delta degrees of freedom
/// (0 = population, 1 = sample).
pub fn rolling_std(values: &[f64], window: usize, ddof: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window <= ddof || n < window {
        return out;
    }
    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (window - ddof) as f64;
        out[i] = var.sqrt();
    }
    out
}

/// `lookback`-bar percentage change: `x[i] / x[i - lookback] - 1`.
pub fn pct_change(values: &[f64], lookback: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if lookback == 0 {
        return out;
    }
    for i in lookback..n {
        let base = values[i - lookback];
        if base != 0.0 {
            out[i] = values[i] / base - 1.0;
        }
    }
    out
}

/// Linear-interpolated quantile of the finite values, `q` in `[0, 1]`.
/// Returns `None` when there are no finite values.
pub fn quantile(values: &[f64], q: f64) -> Option<f64> {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let q = q.clamp(0.0, 1.0);
    let pos = q * (finite.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(finite[lo] + (finite[hi] - finite[lo]) * frac)
}
