//! Column-level window primitives shared by the loader, feature and label builders.
//!
//! A window result is missing unless every value in the window is present.

pub(crate) fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample standard deviation; `None` below two observations.
pub(crate) fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

/// `col[t] / col[t - periods] - 1`.
pub(crate) fn pct_change(col: &[Option<f64>], periods: usize) -> Vec<Option<f64>> {
    (0..col.len())
        .map(|t| {
            if periods == 0 || t < periods {
                return None;
            }
            let (now, base) = (col[t]?, col[t - periods]?);
            (base != 0.0).then(|| now / base - 1.0)
        })
        .collect()
}

/// `col[t + horizon] / col[t] - 1`, attributed to `t`.
pub(crate) fn forward_pct_change(col: &[Option<f64>], horizon: usize) -> Vec<Option<f64>> {
    (0..col.len())
        .map(|t| {
            let now = col[t]?;
            let later = (*col.get(t + horizon)?)?;
            (now != 0.0).then(|| later / now - 1.0)
        })
        .collect()
}

/// `col[t] - col[t - 1]`.
pub(crate) fn diff(col: &[Option<f64>]) -> Vec<Option<f64>> {
    (0..col.len())
        .map(|t| if t == 0 { None } else { Some(col[t]? - col[t - 1]?) })
        .collect()
}

/// Applies `f` to each trailing window of `window` present values.
pub(crate) fn rolling<F>(col: &[Option<f64>], window: usize, f: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> Option<f64>,
{
    let mut buf = Vec::with_capacity(window);
    (0..col.len())
        .map(|t| {
            if window == 0 || t + 1 < window {
                return None;
            }
            buf.clear();
            for v in &col[t + 1 - window..=t] {
                buf.push((*v)?);
            }
            f(&buf)
        })
        .collect()
}

pub(crate) fn rolling_mean(col: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(col, window, |w| Some(mean(w)))
}

pub(crate) fn rolling_std(col: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(col, window, sample_std)
}

/// Carries the last present value forward over gaps.
pub(crate) fn forward_fill(col: &[Option<f64>]) -> Vec<Option<f64>> {
    let mut last = None;
    col.iter()
        .map(|v| {
            if v.is_some() {
                last = *v;
            }
            last
        })
        .collect()
}
