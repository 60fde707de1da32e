//! The analysis view: every grouped comparison, the country diagnostics and
//! the significance tests, computed from one dataset snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sms_analytics::country::{country_profile, country_summary, CountryCodes};
use sms_analytics::grouping::{partition, Categorical, Dichotomous, GroupingKey, QuantileBins};
use sms_analytics::{BinDefinition, CountryProfile, CountrySummary, GroupSummary, HypothesisTests};
use sms_core::config::AnalysisConfig;
use sms_core::schema;
use sms_core::{Dataset, InsightsError, InsightsResult};
use tracing::{debug, warn};

/// A view section, or the reason it was skipped.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section<T> {
    Ready(T),
    Skipped { reason: String },
}

impl<T> Section<T> {
    pub fn ready(&self) -> Option<&T> {
        match self {
            Section::Ready(v) => Some(v),
            Section::Skipped { .. } => None,
        }
    }

    /// Turn analysis-level problems into a skipped section; anything else is
    /// a real failure and propagates.
    fn from_result(title: &str, result: InsightsResult<T>) -> InsightsResult<Self> {
        match result {
            Ok(v) => Ok(Section::Ready(v)),
            Err(e) if e.is_skip() => {
                warn!(analysis = title, reason = %e, "Analysis skipped");
                Ok(Section::Skipped {
                    reason: e.to_string(),
                })
            }
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonSummary {
    pub groups: Vec<GroupSummary>,
    pub excluded_rows: usize,
    pub coercion_failures: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bins: Option<Vec<BinDefinition>>,
}

/// One outcome compared across the groups of one column.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub title: String,
    pub group_column: String,
    pub outcome_column: String,
    #[serde(flatten)]
    pub section: Section<ComparisonSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisView {
    pub shape: String,
    pub comparisons: Vec<Comparison>,
    pub country_profile: Section<CountryProfile>,
    pub country_summaries: Vec<Section<CountrySummary>>,
    pub hypothesis_tests: Vec<Section<HypothesisTests>>,
    pub generated_at: DateTime<Utc>,
}

/// Axis label of an outcome column.
pub fn outcome_label(column: &str) -> String {
    match column {
        schema::DELIVERY_RATE => "Delivery rate (%)".to_string(),
        schema::REPLY_RATE => "Reply rate (%)".to_string(),
        other => other.replace('_', " "),
    }
}

fn boxed(key: impl GroupingKey + 'static) -> Box<dyn GroupingKey> {
    Box::new(key)
}

fn grouping_keys(config: &AnalysisConfig) -> Vec<(&'static str, Box<dyn GroupingKey>)> {
    vec![
        (
            "SMS content length",
            boxed(QuantileBins::new(schema::SMS_CONTENT_LENGTH, config.quantile_bins)),
        ),
        ("Contains link", boxed(Dichotomous::new(schema::CONTAINS_LINK))),
        ("Contains emojis", boxed(Dichotomous::new(schema::CONTAINS_EMOJIS))),
        (
            "Contains personalization",
            boxed(Dichotomous::new(schema::CONTAINS_PERSONALIZATION)),
        ),
        ("Day of week sent", boxed(Categorical::new(schema::DAY_OF_WEEK_SENT))),
        ("Country of recipients", boxed(CountryCodes::new(schema::COUNTRY_OF_RECIPIENTS))),
    ]
}

fn compare(
    dataset: &Dataset,
    key: &dyn GroupingKey,
    outcome: &str,
) -> InsightsResult<ComparisonSummary> {
    let p = partition(dataset, key, outcome)?;
    if p.groups.is_empty() {
        return Err(InsightsError::PreconditionNotMet {
            column: outcome.to_string(),
            reason: "no row has both a group and a numeric outcome".to_string(),
        });
    }
    Ok(ComparisonSummary {
        groups: p.summaries(),
        excluded_rows: p.excluded_rows,
        coercion_failures: p.coercion_failures,
        bins: p.bins,
    })
}

fn length_bin_tests(
    dataset: &Dataset,
    config: &AnalysisConfig,
    outcome: &str,
) -> InsightsResult<HypothesisTests> {
    let key = QuantileBins::new(schema::SMS_CONTENT_LENGTH, config.quantile_bins);
    let p = partition(dataset, &key, outcome)?;
    Ok(sms_analytics::run_tests(&p, config.alpha))
}

/// Build the full analysis view. Comparisons that cannot be computed for
/// this dataset are reported as skipped rather than failing the view.
pub fn build_analysis(dataset: &Dataset, config: &AnalysisConfig) -> InsightsResult<AnalysisView> {
    let (rows, cols) = dataset.shape();
    debug!(rows, cols, "Building analysis view");

    let mut comparisons = Vec::new();
    for (label, key) in grouping_keys(config) {
        for outcome in schema::OUTCOME_COLUMNS {
            let title = format!("{} by {}", outcome_label(outcome), label);
            let section = Section::from_result(&title, compare(dataset, key.as_ref(), outcome))?;
            comparisons.push(Comparison {
                title,
                group_column: key.column().to_string(),
                outcome_column: outcome.to_string(),
                section,
            });
        }
    }

    let country_profile = Section::from_result(
        "Country profile",
        country_profile(
            dataset,
            schema::COUNTRY_OF_RECIPIENTS,
            config.top_countries,
            config.longest_country_values,
        ),
    )?;

    let mut country_summaries = Vec::new();
    let mut hypothesis_tests = Vec::new();
    for outcome in schema::OUTCOME_COLUMNS {
        country_summaries.push(Section::from_result(
            &format!("{} by country", outcome_label(outcome)),
            country_summary(dataset, schema::COUNTRY_OF_RECIPIENTS, outcome),
        )?);
        hypothesis_tests.push(Section::from_result(
            &format!("{} tests across content length bins", outcome_label(outcome)),
            length_bin_tests(dataset, config, outcome),
        )?);
    }

    Ok(AnalysisView {
        shape: format!("{rows} rows × {cols} columns"),
        comparisons,
        country_profile,
        country_summaries,
        hypothesis_tests,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use sms_core::{Column, ColumnData};

    fn utf8(values: &[&str]) -> ColumnData {
        ColumnData::Utf8(values.iter().map(|v| Some(v.to_string())).collect())
    }

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new(
                schema::DELIVERY_RATE,
                ColumnData::Float64(
                    [90.0, 92.0, 94.0, 96.0, 80.0, 82.0, 84.0, 86.0].into_iter().map(Some).collect(),
                ),
            ),
            Column::new(
                schema::REPLY_RATE,
                ColumnData::Float64(
                    [1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0].into_iter().map(Some).collect(),
                ),
            ),
            Column::new(
                schema::SMS_CONTENT_LENGTH,
                ColumnData::Int64((1..=8).map(|i| Some(i * 10)).collect()),
            ),
            Column::new(
                schema::CONTAINS_LINK,
                ColumnData::Boolean([true, false].repeat(4).into_iter().map(Some).collect()),
            ),
            // Every row has emojis: not dichotomous.
            Column::new(schema::CONTAINS_EMOJIS, ColumnData::Boolean(vec![Some(true); 8])),
            Column::new(
                schema::CONTAINS_PERSONALIZATION,
                ColumnData::Boolean([false, true].repeat(4).into_iter().map(Some).collect()),
            ),
            Column::new(
                schema::DAY_OF_WEEK_SENT,
                utf8(&["Monday", "Tuesday", "Monday", "Tuesday", "Friday", "Friday", "Monday", "Sunday"]),
            ),
            Column::new(
                schema::COUNTRY_OF_RECIPIENTS,
                utf8(&["US", "US", "GB", "Germany", "de", "XX", "US", "GB"]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_analysis_has_every_comparison() {
        let view = build_analysis(&sample(), &AnalysisConfig::default()).unwrap();
        assert_eq!(view.comparisons.len(), 12);
        assert_eq!(view.shape, "8 rows × 8 columns");
        assert_eq!(view.comparisons[0].title, "Delivery rate (%) by SMS content length");
        assert_eq!(view.country_summaries.len(), 2);
        assert_eq!(view.hypothesis_tests.len(), 2);
    }

    #[test]
    fn test_non_dichotomous_flag_is_skipped_with_reason() {
        let view = build_analysis(&sample(), &AnalysisConfig::default()).unwrap();
        let emojis: Vec<_> = view
            .comparisons
            .iter()
            .filter(|c| c.group_column == schema::CONTAINS_EMOJIS)
            .collect();
        assert_eq!(emojis.len(), 2);
        for c in emojis {
            match &c.section {
                Section::Skipped { reason } => assert!(reason.contains("Contains_emojis")),
                Section::Ready(_) => panic!("expected skip for {}", c.title),
            }
        }

        let link = view
            .comparisons
            .iter()
            .find(|c| c.group_column == schema::CONTAINS_LINK && c.outcome_column == schema::REPLY_RATE)
            .unwrap();
        let summary = link.section.ready().unwrap();
        assert_eq!(summary.groups.len(), 2);
        assert_eq!(summary.groups[0].group, "False");
    }

    #[test]
    fn test_reply_rate_tests_are_significant() {
        let view = build_analysis(&sample(), &AnalysisConfig::default()).unwrap();
        let reply = view.hypothesis_tests[1].ready().unwrap();
        assert_eq!(reply.outcome_column, schema::REPLY_RATE);
        assert!(reply.anova.result().unwrap().significant);
    }

    #[test]
    fn test_missing_columns_skip_instead_of_failing() {
        let ds = Dataset::new(vec![Column::new(
            schema::REPLY_RATE,
            ColumnData::Float64(vec![Some(1.0), Some(2.0)]),
        )])
        .unwrap();
        let view = build_analysis(&ds, &AnalysisConfig::default()).unwrap();
        assert!(view
            .comparisons
            .iter()
            .all(|c| matches!(c.section, Section::Skipped { .. })));
        assert!(view.country_profile.ready().is_none());
    }

    #[test]
    fn test_view_serializes_status_tags() {
        let view = build_analysis(&sample(), &AnalysisConfig::default()).unwrap();
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["comparisons"][0]["status"], "ready");
        assert_eq!(json["comparisons"][0]["group_column"], schema::SMS_CONTENT_LENGTH);
        assert!(json["comparisons"][0]["groups"].is_array());
        assert_eq!(json["country_summaries"][0]["status"], "ready");
    }
}
