//! Column kernels shared by the processors.
//!
//! Every kernel takes whole series aligned to table rows and returns a series
//! of the same length. `f64::NAN` is the undefined sentinel for numeric
//! series; `None` is the undefined state for flags.
//!
//! Rolling kernels need a full window of defined values: the first
//! `window - 1` outputs are NaN, as is any output whose window contains NaN.

/// Value `periods` rows earlier, NaN where that row does not exist.
pub fn shift(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| if i >= periods { values[i - periods] } else { f64::NAN })
        .collect()
}

/// First difference: `x[t] - x[t-1]`.
pub fn diff(values: &[f64]) -> Vec<f64> {
    let prev = shift(values, 1);
    values.iter().zip(&prev).map(|(x, p)| x - p).collect()
}

/// Percent change over `periods` rows. NaN when the earlier value is
/// undefined or zero.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    let prev = shift(values, periods);
    values
        .iter()
        .zip(&prev)
        .map(|(&x, &p)| ratio_or_nan(x - p, p))
        .collect()
}

/// `num / den`, NaN when the denominator is zero or either side is undefined.
pub fn ratio_or_nan(num: f64, den: f64) -> f64 {
    if den == 0.0 || den.is_nan() || num.is_nan() {
        f64::NAN
    } else {
        num / den
    }
}

/// Replace NaN with `fill`.
pub fn fill_nan(values: &[f64], fill: f64) -> Vec<f64> {
    values
        .iter()
        .map(|&v| if v.is_nan() { fill } else { v })
        .collect()
}

/// Apply `f` to every full window of defined values.
pub fn rolling<F>(values: &[f64], window: usize, f: F) -> Vec<f64>
where
    F: Fn(&[f64]) -> f64,
{
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if window == 0 || n < window {
        return result;
    }

    for i in (window - 1)..n {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i] = f(slice);
    }

    result
}

pub fn rolling_sum(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum())
}

pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().sum::<f64>() / w.len() as f64)
}

pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::MIN, f64::max))
}

pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    rolling(values, window, |w| w.iter().copied().fold(f64::MAX, f64::min))
}

/// Rolling standard deviation with `ddof` degrees of freedom removed from the
/// divisor (0 = population, 1 = sample). Windows with `len <= ddof` are NaN.
pub fn rolling_std(values: &[f64], window: usize, ddof: usize) -> Vec<f64> {
    rolling(values, window, |w| {
        if w.len() <= ddof {
            return f64::NAN;
        }
        let mean = w.iter().sum::<f64>() / w.len() as f64;
        let ss: f64 = w.iter().map(|v| (v - mean) * (v - mean)).sum();
        (ss / (w.len() - ddof) as f64).sqrt()
    })
}

/// Least-squares slope of a degree-1 fit against `0..len`.
/// Fewer than two points have no slope; report 0.
pub fn linear_slope(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return 0.0;
    }
    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = values.iter().sum::<f64>() / n as f64;
    let mut num = 0.0;
    let mut den = 0.0;
    for (i, &y) in values.iter().enumerate() {
        let dx = i as f64 - x_mean;
        num += dx * (y - y_mean);
        den += dx * dx;
    }
    num / den
}

/// Whether any flag in the trailing window is true.
///
/// Needs a full window (undefined before it); undefined flags inside a full
/// window count as false.
pub fn rolling_any(flags: &[Option<bool>], window: usize) -> Vec<Option<bool>> {
    let n = flags.len();
    let mut result = vec![None; n];
    if window == 0 || n < window {
        return result;
    }
    for i in (window - 1)..n {
        let hit = flags[i + 1 - window..=i].iter().any(|f| *f == Some(true));
        result[i] = Some(hit);
    }
    result
}

/// Smoothing factor for a span-parameterised EWMA.
pub fn span_alpha(span: usize) -> f64 {
    2.0 / (span as f64 + 1.0)
}

/// Recursive EWMA: `ewm[t] = ewm[t-1] + alpha * (x[t] - ewm[t-1])`.
///
/// Seeded by the first defined value. Undefined inputs carry the prior value
/// forward, so the output is defined from the first defined input onwards.
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    ewm_min_periods(values, alpha, 1)
}

/// [`ewm`] that stays undefined until `min_periods` defined observations
/// have been folded in.
pub fn ewm_min_periods(values: &[f64], alpha: f64, min_periods: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    let mut observed = 0usize;

    for &x in values {
        if !x.is_nan() {
            observed += 1;
            state = Some(match state {
                Some(prev) => prev + alpha * (x - prev),
                None => x,
            });
        }
        match state {
            Some(v) if observed >= min_periods => result.push(v),
            _ => result.push(f64::NAN),
        }
    }

    result
}

/// Running maximum, ignoring undefined values.
pub fn running_max(values: &[f64]) -> Vec<f64> {
    let mut best = f64::NAN;
    values
        .iter()
        .map(|&v| {
            if !v.is_nan() && (best.is_nan() || v > best) {
                best = v;
            }
            best
        })
        .collect()
}

/// Finite min and max, or `None` if the series has no finite value.
fn finite_bounds(values: &[f64]) -> Option<(f64, f64)> {
    values
        .iter()
        .copied()
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

/// Min-max scale to [0, 1] over the whole series.
///
/// Infinite values are treated as undefined. A series with zero range or no
/// finite value normalizes to constant 0.
pub fn normalize(values: &[f64]) -> Vec<f64> {
    match finite_bounds(values) {
        Some((lo, hi)) if hi > lo => values
            .iter()
            .map(|&v| if v.is_finite() { (v - lo) / (hi - lo) } else { f64::NAN })
            .collect(),
        _ => vec![0.0; values.len()],
    }
}

/// Scale to [-1, 1] by the largest absolute value.
///
/// A series with zero spread or no finite value normalizes to constant 0.
pub fn normalize_signed(values: &[f64]) -> Vec<f64> {
    match finite_bounds(values) {
        Some((lo, hi)) if hi > lo => {
            let max_abs = lo.abs().max(hi.abs());
            values
                .iter()
                .map(|&v| if v.is_finite() { v / max_abs } else { f64::NAN })
                .collect()
        }
        _ => vec![0.0; values.len()],
    }
}

/// `a > b`, undefined if either side is.
pub fn gt(a: f64, b: f64) -> Option<bool> {
    if a.is_nan() || b.is_nan() {
        None
    } else {
        Some(a > b)
    }
}

/// `a < b`, undefined if either side is.
pub fn lt(a: f64, b: f64) -> Option<bool> {
    if a.is_nan() || b.is_nan() {
        None
    } else {
        Some(a < b)
    }
}

/// Kleene conjunction: false wins over undefined.
pub fn and(a: Option<bool>, b: Option<bool>) -> Option<bool> {
    match (a, b) {
        (Some(false), _) | (_, Some(false)) => Some(false),
        (Some(true), Some(true)) => Some(true),
        _ => None,
    }
}
