//! Significance tests over a [`Partition`]: one-way ANOVA, Kruskal-Wallis
//! and Tukey's HSD pairwise comparisons.

use crate::grouping::Partition;
use crate::studentized::{ptukey, qtukey};
use serde::Serialize;
use statrs::distribution::{ChiSquared, ContinuousCDF, FisherSnedecor};
use tracing::debug;

/// Result of a test, or why it could not be run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TestStatus<T> {
    Completed(T),
    NotApplicable { reason: String },
}

impl<T> TestStatus<T> {
    fn not_applicable(reason: impl Into<String>) -> Self {
        TestStatus::NotApplicable {
            reason: reason.into(),
        }
    }

    pub fn result(&self) -> Option<&T> {
        match self {
            TestStatus::Completed(r) => Some(r),
            TestStatus::NotApplicable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnovaResult {
    pub f_statistic: f64,
    pub p_value: f64,
    pub df_between: usize,
    pub df_within: usize,
    pub significant: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KruskalResult {
    pub h_statistic: f64,
    pub p_value: f64,
    pub df: usize,
    pub significant: bool,
}

/// One pair of Tukey's HSD. `mean_diff` is `mean(group2) - mean(group1)`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyComparison {
    pub group1: String,
    pub group2: String,
    pub mean_diff: f64,
    pub p_adj: f64,
    pub lower: f64,
    pub upper: f64,
    pub reject: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TukeyResult {
    pub alpha: f64,
    pub q_critical: f64,
    pub comparisons: Vec<TukeyComparison>,
}

/// All three tests for one grouping/outcome pair.
#[derive(Debug, Clone, Serialize)]
pub struct HypothesisTests {
    pub group_column: String,
    pub outcome_column: String,
    pub alpha: f64,
    pub groups_tested: Vec<String>,
    /// Groups with fewer than two observations.
    pub groups_excluded: Vec<String>,
    pub anova: TestStatus<AnovaResult>,
    pub kruskal_wallis: TestStatus<KruskalResult>,
    pub tukey_hsd: TestStatus<TukeyResult>,
}

/// Sums of squares shared by ANOVA and Tukey.
struct Variance {
    k: usize,
    n: usize,
    means: Vec<f64>,
    ss_between: f64,
    ss_within: f64,
    identical: bool,
    within_negligible: bool,
}

impl Variance {
    fn df_within(&self) -> usize {
        self.n - self.k
    }

    fn mse(&self) -> f64 {
        if self.within_negligible {
            0.0
        } else {
            self.ss_within / self.df_within() as f64
        }
    }
}

fn variance(groups: &[&[f64]]) -> Result<Variance, String> {
    let k = groups.len();
    if k < 2 {
        return Err(format!("needs at least 2 groups, found {k}"));
    }
    let n: usize = groups.iter().map(|g| g.len()).sum();
    if n <= k {
        return Err("no within-group degrees of freedom".to_string());
    }

    let grand = groups.iter().flat_map(|g| g.iter()).sum::<f64>() / n as f64;
    let scale: f64 = groups.iter().flat_map(|g| g.iter()).map(|x| x * x).sum();
    let means: Vec<f64> = groups
        .iter()
        .map(|g| g.iter().sum::<f64>() / g.len().max(1) as f64)
        .collect();

    let mut ss_between = 0.0;
    let mut ss_within = 0.0;
    for (g, mean) in groups.iter().zip(&means) {
        ss_between += g.len() as f64 * (mean - grand).powi(2);
        ss_within += g.iter().map(|x| (x - mean).powi(2)).sum::<f64>();
    }

    let tiny = 1e-12 * scale;
    Ok(Variance {
        k,
        n,
        means,
        ss_between,
        ss_within,
        identical: ss_between + ss_within <= tiny,
        within_negligible: ss_within <= tiny,
    })
}

/// One-way ANOVA F-test.
///
/// Zero within-group variance with distinct group means gives `F = ∞` and
/// `p = 0`; identical observations everywhere are not testable.
pub fn anova(groups: &[&[f64]], alpha: f64) -> TestStatus<AnovaResult> {
    let v = match variance(groups) {
        Ok(v) => v,
        Err(reason) => return TestStatus::not_applicable(reason),
    };
    if v.identical {
        return TestStatus::not_applicable("all observations are identical");
    }

    let df_between = v.k - 1;
    let df_within = v.df_within();
    let (f_statistic, p_value) = if v.within_negligible {
        (f64::INFINITY, 0.0)
    } else {
        let f = (v.ss_between / df_between as f64) / v.mse();
        match FisherSnedecor::new(df_between as f64, df_within as f64) {
            Ok(dist) => (f, dist.sf(f)),
            Err(e) => return TestStatus::not_applicable(e.to_string()),
        }
    };

    TestStatus::Completed(AnovaResult {
        f_statistic,
        p_value,
        df_between,
        df_within,
        significant: p_value < alpha,
    })
}

/// Average ranks (1-based) of all observations, in input order, plus the
/// sizes of tied runs.
fn rank(values: &[f64]) -> (Vec<f64>, Vec<usize>) {
    let mut order: Vec<usize> = (0..values.len()).collect();
    order.sort_by(|a, b| values[*a].total_cmp(&values[*b]));

    let mut ranks = vec![0.0; values.len()];
    let mut ties = Vec::new();
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && values[order[end]] == values[order[start]] {
            end += 1;
        }
        let avg = (start + end + 1) as f64 / 2.0;
        for idx in &order[start..end] {
            ranks[*idx] = avg;
        }
        if end - start > 1 {
            ties.push(end - start);
        }
        start = end;
    }
    (ranks, ties)
}

/// Kruskal-Wallis H-test with tie correction.
pub fn kruskal_wallis(groups: &[&[f64]], alpha: f64) -> TestStatus<KruskalResult> {
    let k = groups.len();
    if k < 2 {
        return TestStatus::not_applicable(format!("needs at least 2 groups, found {k}"));
    }
    if groups.iter().any(|g| g.is_empty()) {
        return TestStatus::not_applicable("a group has no observations");
    }

    let all: Vec<f64> = groups.iter().flat_map(|g| g.iter().copied()).collect();
    let n = all.len() as f64;
    let (ranks, ties) = rank(&all);

    let mut offset = 0;
    let mut sum = 0.0;
    for g in groups {
        let r: f64 = ranks[offset..offset + g.len()].iter().sum();
        sum += r * r / g.len() as f64;
        offset += g.len();
    }
    let h = 12.0 / (n * (n + 1.0)) * sum - 3.0 * (n + 1.0);

    let tie_sum: f64 = ties.iter().map(|t| (*t as f64).powi(3) - *t as f64).sum();
    let correction = 1.0 - tie_sum / (n.powi(3) - n);
    if correction <= 0.0 {
        return TestStatus::not_applicable("all observations are identical");
    }
    let h_statistic = h / correction;

    let df = k - 1;
    let p_value = match ChiSquared::new(df as f64) {
        Ok(dist) => dist.sf(h_statistic),
        Err(e) => return TestStatus::not_applicable(e.to_string()),
    };

    TestStatus::Completed(KruskalResult {
        h_statistic,
        p_value,
        df,
        significant: p_value < alpha,
    })
}

/// Tukey's HSD (Tukey-Kramer for unequal group sizes) over every pair of
/// groups, in group order.
pub fn tukey_hsd(groups: &[(&str, &[f64])], alpha: f64) -> TestStatus<TukeyResult> {
    let samples: Vec<&[f64]> = groups.iter().map(|(_, v)| *v).collect();
    let v = match variance(&samples) {
        Ok(v) => v,
        Err(reason) => return TestStatus::not_applicable(reason),
    };
    if v.identical {
        return TestStatus::not_applicable("all observations are identical");
    }

    let df = v.df_within() as f64;
    let mse = v.mse();
    let q_critical = qtukey(1.0 - alpha, v.k, df);

    let mut comparisons = Vec::with_capacity(v.k * (v.k - 1) / 2);
    for i in 0..v.k {
        for j in (i + 1)..v.k {
            let mean_diff = v.means[j] - v.means[i];
            let se = (mse / 2.0 * (1.0 / samples[i].len() as f64 + 1.0 / samples[j].len() as f64))
                .sqrt();
            let (p_adj, reject) = if se > 0.0 {
                let q = mean_diff.abs() / se;
                ((1.0 - ptukey(q, v.k, df)).clamp(0.0, 1.0), q > q_critical)
            } else if mean_diff != 0.0 {
                (0.0, true)
            } else {
                (1.0, false)
            };
            let half_width = q_critical * se;
            comparisons.push(TukeyComparison {
                group1: groups[i].0.to_string(),
                group2: groups[j].0.to_string(),
                mean_diff,
                p_adj,
                lower: mean_diff - half_width,
                upper: mean_diff + half_width,
                reject,
            });
        }
    }

    TestStatus::Completed(TukeyResult {
        alpha,
        q_critical,
        comparisons,
    })
}

/// Run all tests on the groups of `partition` holding at least two
/// observations. Fewer than two such groups makes every test not applicable.
pub fn run_tests(partition: &Partition, alpha: f64) -> HypothesisTests {
    let (tested, excluded): (Vec<_>, Vec<_>) =
        partition.groups.iter().partition(|g| g.values.len() >= 2);

    debug!(
        group_column = %partition.group_column,
        outcome = %partition.outcome_column,
        groups = tested.len(),
        excluded = excluded.len(),
        "running hypothesis tests"
    );

    let groups_tested: Vec<String> = tested.iter().map(|g| g.label.clone()).collect();
    let groups_excluded: Vec<String> = excluded.iter().map(|g| g.label.clone()).collect();

    let (anova, kruskal_wallis, tukey_hsd) = if tested.len() < 2 {
        let reason = format!(
            "needs at least 2 groups with 2 or more observations, found {}",
            tested.len()
        );
        (
            TestStatus::not_applicable(reason.clone()),
            TestStatus::not_applicable(reason.clone()),
            TestStatus::not_applicable(reason),
        )
    } else {
        let samples: Vec<&[f64]> = tested.iter().map(|g| g.values.as_slice()).collect();
        let labelled: Vec<(&str, &[f64])> = tested
            .iter()
            .map(|g| (g.label.as_str(), g.values.as_slice()))
            .collect();
        (
            anova(&samples, alpha),
            kruskal_wallis(&samples, alpha),
            tukey_hsd(&labelled, alpha),
        )
    };

    HypothesisTests {
        group_column: partition.group_column.clone(),
        outcome_column: partition.outcome_column.clone(),
        alpha,
        groups_tested,
        groups_excluded,
        anova,
        kruskal_wallis,
        tukey_hsd,
    }
}
