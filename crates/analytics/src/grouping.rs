//! Grouped comparison of a numeric outcome across categories or bins.
//!
//! A [`GroupingKey`] decides which group every row belongs to (identity on a
//! categorical column, quantile bins of a numeric column, resolved country
//! codes, …). [`partition`] applies a key and collects the outcome sample of
//! each group; [`aggregate`] reduces that to one `(group, mean, count)` row
//! per group. The hypothesis tests consume the same [`Partition`].

use crate::binning::{quantile_bin, BinDefinition};
use serde::Serialize;
use sms_core::{Column, Dataset, InsightsError, InsightsResult, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// How groups are ordered in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupOrder {
    /// Ranked by mean outcome, highest first.
    MeanDescending,
    /// The order the key produced its labels in.
    Natural,
}

/// Group membership produced by a [`GroupingKey`].
#[derive(Debug, Clone)]
pub struct KeyAssignment {
    pub labels: Vec<String>,
    /// Index into `labels` per dataset row; `None` excludes the row.
    pub rows: Vec<Option<usize>>,
    pub order: GroupOrder,
    /// Bin ranges when the key bins a numeric column.
    pub bins: Option<Vec<BinDefinition>>,
}

/// Strategy mapping dataset rows to groups.
pub trait GroupingKey {
    /// Column the key reads.
    fn column(&self) -> &str;

    /// Assign rows to groups. `eligible[row]` is false when the row's outcome
    /// is missing; keys that derive their groups from the data (bins) only
    /// look at eligible rows.
    fn assign(&self, dataset: &Dataset, eligible: &[bool]) -> InsightsResult<KeyAssignment>;
}

/// Natural ordering of category values within one typed column.
#[derive(Debug, Clone, PartialEq)]
enum Category<'a> {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(&'a str),
}

impl Eq for Category<'_> {}

impl Ord for Category<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Category::Bool(a), Category::Bool(b)) => a.cmp(b),
            (Category::Int(a), Category::Int(b)) => a.cmp(b),
            (Category::Float(a), Category::Float(b)) => a.total_cmp(b),
            (Category::Text(a), Category::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Category<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Category<'a> {
    fn from_value(value: Value<'a>) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Bool(b) => Some(Category::Bool(b)),
            Value::Int(i) => Some(Category::Int(i)),
            Value::Float(f) if f.is_nan() => None,
            Value::Float(f) => Some(Category::Float(f)),
            Value::Text(s) => Some(Category::Text(s)),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Category::Bool(_) => 0,
            Category::Int(_) => 1,
            Category::Float(_) => 2,
            Category::Text(_) => 3,
        }
    }

    fn label(&self) -> String {
        match *self {
            Category::Bool(b) => Value::Bool(b).to_string(),
            Category::Int(i) => i.to_string(),
            Category::Float(f) => f.to_string(),
            Category::Text(s) => s.to_string(),
        }
    }
}

/// Distinct non-missing values of `column` in natural order, plus the
/// index of each row's value.
fn distinct_categories(column: &Column) -> (Vec<String>, Vec<Option<usize>>) {
    let mut index: BTreeMap<Category<'_>, usize> = BTreeMap::new();
    for value in column.values() {
        if let Some(cat) = Category::from_value(value) {
            index.entry(cat).or_insert(0);
        }
    }
    for (i, slot) in index.values_mut().enumerate() {
        *slot = i;
    }
    let labels = index.keys().map(Category::label).collect();
    let rows = column
        .values()
        .map(|v| Category::from_value(v).and_then(|c| index.get(&c).copied()))
        .collect();
    (labels, rows)
}

/// Plain categorical comparison: at least two distinct values, groups
/// ranked by mean outcome.
#[derive(Debug, Clone)]
pub struct Categorical {
    column: String,
}

impl Categorical {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl GroupingKey for Categorical {
    fn column(&self) -> &str {
        &self.column
    }

    fn assign(&self, dataset: &Dataset, _eligible: &[bool]) -> InsightsResult<KeyAssignment> {
        let (labels, rows) = distinct_categories(dataset.column(&self.column)?);
        if labels.len() < 2 {
            return Err(InsightsError::PreconditionNotMet {
                column: self.column.clone(),
                reason: format!(
                    "needs at least 2 distinct values, found {}",
                    labels.len()
                ),
            });
        }
        Ok(KeyAssignment {
            labels,
            rows,
            order: GroupOrder::MeanDescending,
            bins: None,
        })
    }
}

/// Two-valued comparison: exactly two distinct values, kept in their
/// natural order (`False` before `True`).
#[derive(Debug, Clone)]
pub struct Dichotomous {
    column: String,
}

impl Dichotomous {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl GroupingKey for Dichotomous {
    fn column(&self) -> &str {
        &self.column
    }

    fn assign(&self, dataset: &Dataset, _eligible: &[bool]) -> InsightsResult<KeyAssignment> {
        let (labels, rows) = distinct_categories(dataset.column(&self.column)?);
        if labels.len() != 2 {
            return Err(InsightsError::PreconditionNotMet {
                column: self.column.clone(),
                reason: format!(
                    "not dichotomous (needs exactly 2 distinct values, found {})",
                    labels.len()
                ),
            });
        }
        Ok(KeyAssignment {
            labels,
            rows,
            order: GroupOrder::Natural,
            bins: None,
        })
    }
}

/// Quantile bins of a numeric column, in ascending range order.
#[derive(Debug, Clone)]
pub struct QuantileBins {
    column: String,
    bins: usize,
}

impl QuantileBins {
    pub fn new(column: impl Into<String>, bins: usize) -> Self {
        Self {
            column: column.into(),
            bins,
        }
    }

    pub fn quartiles(column: impl Into<String>) -> Self {
        Self::new(column, 4)
    }
}

impl GroupingKey for QuantileBins {
    fn column(&self) -> &str {
        &self.column
    }

    fn assign(&self, dataset: &Dataset, eligible: &[bool]) -> InsightsResult<KeyAssignment> {
        let column = dataset.column(&self.column)?;
        let values: Vec<Option<f64>> = column
            .values()
            .zip(eligible)
            .map(|(v, ok)| if *ok { v.as_f64() } else { None })
            .collect();

        let binning = quantile_bin(&values, self.bins).map_err(|e| e.for_column(&self.column))?;
        Ok(KeyAssignment {
            labels: binning.bins.iter().map(|b| b.label.clone()).collect(),
            rows: binning.assignments,
            order: GroupOrder::Natural,
            bins: Some(binning.bins),
        })
    }
}

/// One group's outcome sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub label: String,
    pub values: Vec<f64>,
}

impl Group {
    pub fn mean(&self) -> f64 {
        self.values.iter().sum::<f64>() / self.values.len() as f64
    }
}

/// One output row of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    pub group: String,
    pub mean: f64,
    pub count: usize,
}

/// Dataset rows split into non-empty outcome samples per group.
#[derive(Debug, Clone, Serialize)]
pub struct Partition {
    pub group_column: String,
    pub outcome_column: String,
    pub order: GroupOrder,
    pub groups: Vec<Group>,
    /// Rows left out because the group or the outcome was missing.
    pub excluded_rows: usize,
    /// Non-empty outcome cells that did not parse as numbers.
    pub coercion_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<BinDefinition>>,
}

impl Partition {
    pub fn summaries(&self) -> Vec<GroupSummary> {
        self.groups
            .iter()
            .map(|g| GroupSummary {
                group: g.label.clone(),
                mean: g.mean(),
                count: g.values.len(),
            })
            .collect()
    }
}

/// Apply `key` and collect the numeric `outcome` sample of every group.
/// Groups that end up empty are dropped.
pub fn partition(
    dataset: &Dataset,
    key: &dyn GroupingKey,
    outcome: &str,
) -> InsightsResult<Partition> {
    let outcome_col = dataset.column(outcome)?;
    let mut coercion_failures = 0;
    let numeric: Vec<Option<f64>> = outcome_col
        .values()
        .map(|v| {
            let n = v.as_f64();
            if n.is_none() && !v.is_null() {
                coercion_failures += 1;
            }
            n
        })
        .collect();
    let eligible: Vec<bool> = numeric.iter().map(Option::is_some).collect();

    let assignment = key.assign(dataset, &eligible)?;
    let mut samples: Vec<Vec<f64>> = vec![Vec::new(); assignment.labels.len()];
    let mut excluded_rows = 0;
    for (group, value) in assignment.rows.iter().zip(&numeric) {
        match (group, value) {
            (Some(g), Some(v)) => samples[*g].push(*v),
            _ => excluded_rows += 1,
        }
    }

    let mut groups: Vec<Group> = assignment
        .labels
        .into_iter()
        .zip(samples)
        .filter(|(_, values)| !values.is_empty())
        .map(|(label, values)| Group { label, values })
        .collect();

    if assignment.order == GroupOrder::MeanDescending {
        groups.sort_by(|a, b| b.mean().total_cmp(&a.mean()));
    }

    Ok(Partition {
        group_column: key.column().to_string(),
        outcome_column: outcome.to_string(),
        order: assignment.order,
        groups,
        excluded_rows,
        coercion_failures,
        bins: assignment.bins,
    })
}

/// Mean and count of `outcome` per group of `key`.
pub fn aggregate(
    dataset: &Dataset,
    key: &dyn GroupingKey,
    outcome: &str,
) -> InsightsResult<Vec<GroupSummary>> {
    Ok(partition(dataset, key, outcome)?.summaries())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::ColumnData;

    fn dataset(columns: Vec<Column>) -> Dataset {
        Dataset::new(columns).unwrap()
    }

    #[test]
    fn test_dichotomous_means_and_counts() {
        let ds = dataset(vec![
            Column::new(
                "Contains_link",
                ColumnData::Boolean(vec![Some(true), Some(false), Some(true), Some(false), None]),
            ),
            Column::new(
                "Delivery_rate",
                ColumnData::Float64(vec![Some(70.0), Some(50.0), Some(90.0), Some(70.0), Some(99.0)]),
            ),
        ]);

        let rows = aggregate(&ds, &Dichotomous::new("Contains_link"), "Delivery_rate").unwrap();
        assert_eq!(
            rows,
            vec![
                GroupSummary { group: "False".into(), mean: 60.0, count: 2 },
                GroupSummary { group: "True".into(), mean: 80.0, count: 2 },
            ]
        );
    }

    #[test]
    fn test_dichotomous_rejects_three_values() {
        let ds = dataset(vec![
            Column::new(
                "Day_of_Week_sent",
                ColumnData::Utf8(vec![Some("Mon".into()), Some("Tue".into()), Some("Wed".into())]),
            ),
            Column::new("Reply_rate", ColumnData::Float64(vec![Some(1.0), Some(2.0), Some(3.0)])),
        ]);
        let err = aggregate(&ds, &Dichotomous::new("Day_of_Week_sent"), "Reply_rate").unwrap_err();
        assert!(matches!(err, InsightsError::PreconditionNotMet { .. }));
        assert!(err.is_skip());
    }

    #[test]
    fn test_dichotomous_accepts_two_valued_text() {
        let ds = dataset(vec![
            Column::new(
                "Contains_link",
                ColumnData::Utf8(vec![
                    Some("No link".into()),
                    Some("Link".into()),
                    None,
                    Some("Link".into()),
                ]),
            ),
            Column::new(
                "Delivery_rate",
                ColumnData::Float64(vec![Some(60.0), Some(70.0), Some(10.0), Some(90.0)]),
            ),
        ]);

        let rows = aggregate(&ds, &Dichotomous::new("Contains_link"), "Delivery_rate").unwrap();
        assert_eq!(
            rows,
            vec![
                GroupSummary { group: "Link".into(), mean: 80.0, count: 2 },
                GroupSummary { group: "No link".into(), mean: 60.0, count: 1 },
            ]
        );
    }

    #[test]
    fn test_categorical_ranks_by_mean_and_coerces_outcome() {
        let ds = dataset(vec![
            Column::new(
                "Day_of_Week_sent",
                ColumnData::Utf8(vec![
                    Some("Monday".into()),
                    Some("Friday".into()),
                    Some("Monday".into()),
                    Some("Sunday".into()),
                    None,
                ]),
            ),
            Column::new(
                "Reply_rate",
                ColumnData::Utf8(vec![
                    Some("2".into()),
                    Some("5.5".into()),
                    Some("4".into()),
                    Some("oops".into()),
                    Some("9".into()),
                ]),
            ),
        ]);

        let p = partition(&ds, &Categorical::new("Day_of_Week_sent"), "Reply_rate").unwrap();
        let summary = p.summaries();
        assert_eq!(summary.len(), 2, "Sunday has no numeric outcome and is dropped");
        assert_eq!(summary[0].group, "Friday");
        assert_eq!(summary[1], GroupSummary { group: "Monday".into(), mean: 3.0, count: 2 });
        assert_eq!(p.coercion_failures, 1);
        assert_eq!(p.excluded_rows, 2);
    }

    #[test]
    fn test_categorical_needs_two_values() {
        let ds = dataset(vec![
            Column::new("c", ColumnData::Utf8(vec![Some("a".into()), None])),
            Column::new("y", ColumnData::Float64(vec![Some(1.0), Some(2.0)])),
        ]);
        let err = aggregate(&ds, &Categorical::new("c"), "y").unwrap_err();
        assert!(matches!(err, InsightsError::PreconditionNotMet { .. }));
    }

    #[test]
    fn test_quantile_bins_only_use_rows_with_outcome() {
        let ds = dataset(vec![
            Column::new(
                "SMS_content_length",
                ColumnData::Int64((1..=9).map(|i| Some(i * 10)).collect()),
            ),
            Column::new(
                "Reply_rate",
                ColumnData::Float64(vec![
                    Some(1.0),
                    Some(1.0),
                    Some(1.0),
                    Some(1.0),
                    Some(5.0),
                    Some(5.0),
                    Some(5.0),
                    Some(5.0),
                    None,
                ]),
            ),
        ]);

        let p = partition(&ds, &QuantileBins::quartiles("SMS_content_length"), "Reply_rate").unwrap();
        let labels: Vec<_> = p.groups.iter().map(|g| g.label.as_str()).collect();
        assert_eq!(labels, vec!["10–27", "27–44", "45–62", "62–80"]);
        assert_eq!(p.excluded_rows, 1);
        assert_eq!(p.bins.as_ref().map(Vec::len), Some(4));
        let means: Vec<_> = p.summaries().iter().map(|s| s.mean).collect();
        assert_eq!(means, vec![1.0, 1.0, 5.0, 5.0]);
    }

    #[test]
    fn test_no_group_is_ever_empty() {
        let ds = dataset(vec![
            Column::new(
                "g",
                ColumnData::Utf8(vec![Some("a".into()), Some("b".into()), Some("c".into())]),
            ),
            Column::new("y", ColumnData::Float64(vec![Some(1.0), None, Some(f64::NAN)])),
        ]);
        let summary = aggregate(&ds, &Categorical::new("g"), "y").unwrap();
        assert_eq!(summary.len(), 1);
        assert!(summary.iter().all(|s| s.count > 0));
    }

    #[test]
    fn test_missing_outcome_column_is_skip() {
        let ds = dataset(vec![Column::new("g", ColumnData::Boolean(vec![Some(true)]))]);
        let err = aggregate(&ds, &Dichotomous::new("g"), "Reply_rate").unwrap_err();
        assert!(matches!(err, InsightsError::MissingColumn { .. }));
    }
}
