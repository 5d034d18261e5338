use std::fmt;
use std::str::FromStr;

/// Column normalization applied to each ranking component before weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NormalizationMode {
    #[default]
    ZScore,
    MinMax,
}

impl NormalizationMode {
    pub fn apply(self, column: &[Option<f64>]) -> Vec<Option<f64>> {
        match self {
            NormalizationMode::ZScore => zscore(column),
            NormalizationMode::MinMax => minmax(column),
        }
    }
}

impl fmt::Display for NormalizationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizationMode::ZScore => write!(f, "z-score"),
            NormalizationMode::MinMax => write!(f, "min-max"),
        }
    }
}

impl FromStr for NormalizationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "z-score" | "zscore" | "z" => Ok(NormalizationMode::ZScore),
            "min-max" | "minmax" => Ok(NormalizationMode::MinMax),
            other => Err(format!(
                "unknown normalization '{}' (expected 'z-score' or 'min-max')",
                other
            )),
        }
    }
}

fn present(column: &[Option<f64>]) -> impl Iterator<Item = f64> + '_ {
    column.iter().flatten().copied().filter(|v| v.is_finite())
}

/// Population z-score over the present values.
///
/// A column with no spread (or no present values) maps every row to 0, so a
/// constant column neither helps nor hurts any structure.
pub fn zscore(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let (count, sum) = present(column).fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
    if count == 0 {
        return vec![Some(0.0); column.len()];
    }
    let mean = sum / count as f64;
    let variance = present(column).map(|v| (v - mean).powi(2)).sum::<f64>() / count as f64;
    let std = variance.sqrt();
    if !(std > 0.0) || !std.is_finite() {
        return vec![Some(0.0); column.len()];
    }

    column
        .iter()
        .map(|v| v.filter(|x| x.is_finite()).map(|x| (x - mean) / std))
        .collect()
}

/// Min-max scaling into [0, 1] over the present values; degenerate columns map to 0.
pub fn minmax(column: &[Option<f64>]) -> Vec<Option<f64>> {
    let bounds = present(column).fold(None, |acc: Option<(f64, f64)>, v| match acc {
        None => Some((v, v)),
        Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
    });
    let Some((lo, hi)) = bounds else {
        return vec![Some(0.0); column.len()];
    };
    let span = hi - lo;
    if !(span > 0.0) {
        return vec![Some(0.0); column.len()];
    }

    column
        .iter()
        .map(|v| v.filter(|x| x.is_finite()).map(|x| (x - lo) / span))
        .collect()
}
