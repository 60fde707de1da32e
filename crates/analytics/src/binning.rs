//! Quantile binning of a numeric column.
//!
//! Edges are the linear-interpolation percentiles of the non-missing values
//! at `0, 1/k, …, 1`. Every bin is half-open `[lower, upper)` except the last,
//! which is closed so the maximum is included.

use serde::Serialize;
use sms_core::InsightsError;

/// One contiguous value range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinDefinition {
    pub lower: f64,
    pub upper: f64,
    /// `"{floor(lower)}–{ceil(upper) - 1}"`; the closed last bin ends at
    /// `floor(upper)`.
    pub label: String,
    pub count: usize,
}

/// Bin edges plus the bin index of every input value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binning {
    pub bins: Vec<BinDefinition>,
    /// Index into `bins` per input position; `None` for missing values.
    #[serde(skip)]
    pub assignments: Vec<Option<usize>>,
}

impl Binning {
    pub fn labels(&self) -> Vec<&str> {
        self.bins.iter().map(|b| b.label.as_str()).collect()
    }
}

/// Too few distinct values to form the requested number of bins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsufficientCardinality {
    pub distinct: usize,
    pub required: usize,
}

impl InsufficientCardinality {
    pub fn for_column(self, column: &str) -> InsightsError {
        InsightsError::InsufficientCardinality {
            column: column.to_string(),
            distinct: self.distinct,
            required: self.required,
        }
    }
}

/// Linear-interpolation percentile of sorted data, `p` in `[0, 1]`.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        let frac = idx - lo as f64;
        sorted[lo] * (1.0 - frac) + sorted[hi] * frac
    }
}

fn label(lower: f64, upper: f64, last: bool) -> String {
    let end = if last { upper.floor() } else { upper.ceil() - 1.0 };
    format!("{}–{}", lower.floor() as i64, end as i64)
}

fn labels(edges: &[f64]) -> Vec<String> {
    let bins = edges.len() - 1;
    (0..bins)
        .map(|i| label(edges[i], edges[i + 1], i + 1 == bins))
        .collect()
}

/// Split `values` into (up to) `k` quantile bins.
///
/// Two things can reduce the bin count below `k`: duplicate edges from
/// skewed data are dropped, and adjacent bins whose integer labels would
/// read the same are merged. The second applies even when every edge is
/// distinct (`[0.0, 0.1, 0.2, 0.3, 10.0]` gives two bins), so exactly `k`
/// bins are only guaranteed when the edges are also at least one unit
/// apart. Fails when the input has fewer than `k` distinct values.
pub fn quantile_bin(values: &[Option<f64>], k: usize) -> Result<Binning, InsufficientCardinality> {
    let k = k.max(1);
    let mut sorted: Vec<f64> = values
        .iter()
        .flatten()
        .copied()
        .filter(|v| v.is_finite())
        .collect();
    sorted.sort_by(f64::total_cmp);

    let mut distinct = sorted.clone();
    distinct.dedup();
    if distinct.len() < k {
        return Err(InsufficientCardinality {
            distinct: distinct.len(),
            required: k,
        });
    }

    let mut edges: Vec<f64> = (0..=k)
        .map(|i| percentile(&sorted, i as f64 / k as f64))
        .collect();
    edges.dedup();
    if edges.len() == 1 {
        edges.push(edges[0]);
    }

    // Merge neighbours until every label is distinct.
    loop {
        let current = labels(&edges);
        match current.windows(2).position(|w| w[0] == w[1]) {
            Some(i) if edges.len() > 2 => {
                edges.remove(i + 1);
            }
            _ => break,
        }
    }

    let n_bins = edges.len() - 1;
    let assignments: Vec<Option<usize>> = values
        .iter()
        .map(|v| {
            v.filter(|x| x.is_finite()).map(|x| {
                let at_or_below = edges.partition_point(|e| *e <= x);
                at_or_below.saturating_sub(1).min(n_bins - 1)
            })
        })
        .collect();

    let mut counts = vec![0usize; n_bins];
    for idx in assignments.iter().flatten() {
        counts[*idx] += 1;
    }

    let bins = labels(&edges)
        .into_iter()
        .enumerate()
        .map(|(i, label)| BinDefinition {
            lower: edges[i],
            upper: edges[i + 1],
            label,
            count: counts[i],
        })
        .collect();

    Ok(Binning { bins, assignments })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_even_spread_gives_four_quartile_bins() {
        let values = some(&[10.0, 20.0, 30.0, 40.0, 50.0, 60.0, 70.0, 80.0]);
        let binning = quantile_bin(&values, 4).unwrap();

        assert_eq!(binning.labels(), vec!["10–27", "27–44", "45–62", "62–80"]);
        assert_eq!(binning.bins[1].lower, 27.5);
        assert_eq!(binning.bins[3].upper, 80.0);
        assert!(binning.bins.iter().all(|b| b.count == 2));
        assert_eq!(
            binning.assignments,
            vec![Some(0), Some(0), Some(1), Some(1), Some(2), Some(2), Some(3), Some(3)]
        );
    }

    #[test]
    fn test_every_value_lands_in_exactly_one_bin() {
        let values: Vec<Option<f64>> = (0..97).map(|i| Some(((i * 37) % 101) as f64)).collect();
        let binning = quantile_bin(&values, 4).unwrap();
        assert_eq!(binning.bins.len(), 4);

        let total: usize = binning.bins.iter().map(|b| b.count).sum();
        assert_eq!(total, values.len());
        for (v, idx) in values.iter().zip(&binning.assignments) {
            let v = v.unwrap();
            let bin = &binning.bins[idx.unwrap()];
            let last = idx.unwrap() == binning.bins.len() - 1;
            assert!(v >= bin.lower);
            assert!(if last { v <= bin.upper } else { v < bin.upper });
        }
        let mut labels = binning.labels();
        labels.dedup();
        assert_eq!(labels.len(), 4);
    }

    #[test]
    fn test_too_few_distinct_values() {
        let values = some(&[5.0, 5.0, 7.0, 9.0, 9.0]);
        let err = quantile_bin(&values, 4).unwrap_err();
        assert_eq!(err, InsufficientCardinality { distinct: 3, required: 4 });
        let err = err.for_column("SMS_content_length");
        assert!(err.is_skip());
    }

    #[test]
    fn test_duplicate_edges_collapse() {
        let values = some(&[1.0, 1.0, 1.0, 1.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
        let binning = quantile_bin(&values, 4).unwrap();
        assert_eq!(binning.labels(), vec!["1–2", "2–5", "5–8"]);
        let counts: Vec<_> = binning.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![6, 3, 3]);
    }

    #[test]
    fn test_colliding_labels_are_merged() {
        let values = some(&[0.0, 0.1, 0.2, 0.3, 10.0]);
        let binning = quantile_bin(&values, 4).unwrap();
        assert_eq!(binning.labels(), vec!["0–0", "0–10"]);
        let counts: Vec<_> = binning.bins.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![3, 2]);
    }

    #[test]
    fn test_missing_values_are_unassigned_and_output_is_deterministic() {
        let values = vec![Some(3.0), None, Some(1.0), Some(f64::NAN), Some(2.0), Some(4.0)];
        let a = quantile_bin(&values, 4).unwrap();
        let b = quantile_bin(&values, 4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.assignments[1], None);
        assert_eq!(a.assignments[3], None);
        assert_eq!(a.bins.iter().map(|b| b.count).sum::<usize>(), 4);
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [10.0, 20.0, 30.0, 40.0];
        assert_eq!(percentile(&sorted, 0.0), 10.0);
        assert_eq!(percentile(&sorted, 0.5), 25.0);
        assert_eq!(percentile(&sorted, 1.0), 40.0);
        assert!(percentile(&[], 0.5).is_nan());
    }
}
