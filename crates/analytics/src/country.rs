//! Recipient country resolution and the country-level views built on it.

use crate::grouping::{partition, GroupOrder, GroupingKey, KeyAssignment};
use crate::iso3166::ALPHA2_TO_ALPHA3;
use serde::Serialize;
use sms_core::{DataType, Dataset, InsightsError, InsightsResult, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Map a two-letter country code to its ISO 3166-1 alpha-3 code.
///
/// Matching is case-insensitive on exactly two ASCII letters. Country names,
/// three-letter codes, non-text and missing values do not resolve.
pub fn resolve_alpha3(value: &Value<'_>) -> Option<&'static str> {
    lookup(value.as_str()?).map(|(_, alpha3)| alpha3)
}

fn lookup(text: &str) -> Option<(&'static str, &'static str)> {
    let bytes = text.as_bytes();
    if bytes.len() != 2 || !bytes.iter().all(u8::is_ascii_alphabetic) {
        return None;
    }
    let code = text.to_ascii_uppercase();
    ALPHA2_TO_ALPHA3
        .binary_search_by(|(alpha2, _)| (*alpha2).cmp(&code.as_str()))
        .ok()
        .map(|i| ALPHA2_TO_ALPHA3[i])
}

fn is_two_letters(text: &str) -> bool {
    text.len() == 2 && text.bytes().all(|b| b.is_ascii_alphabetic())
}

/// What a `Country_of_recipients` cell holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecipientCountry {
    Iso {
        alpha2: &'static str,
        alpha3: &'static str,
    },
    /// Text that is not a known two-letter code (names, typos, `"USA"`).
    Unresolved { text: String },
    NonText,
    Missing,
}

impl RecipientCountry {
    pub fn classify(value: &Value<'_>) -> Self {
        if value.is_null() {
            return RecipientCountry::Missing;
        }
        match value.as_str() {
            Some(text) => match lookup(text) {
                Some((alpha2, alpha3)) => RecipientCountry::Iso { alpha2, alpha3 },
                None => RecipientCountry::Unresolved {
                    text: text.to_string(),
                },
            },
            None => RecipientCountry::NonText,
        }
    }

    pub fn alpha3(&self) -> Option<&'static str> {
        match self {
            RecipientCountry::Iso { alpha3, .. } => Some(*alpha3),
            _ => None,
        }
    }
}

/// Groups rows by resolved alpha-3 code; unresolved rows are excluded.
#[derive(Debug, Clone)]
pub struct CountryCodes {
    column: String,
}

impl CountryCodes {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
        }
    }
}

impl GroupingKey for CountryCodes {
    fn column(&self) -> &str {
        &self.column
    }

    fn assign(&self, dataset: &Dataset, _eligible: &[bool]) -> InsightsResult<KeyAssignment> {
        let resolved: Vec<Option<&'static str>> = dataset
            .column(&self.column)?
            .values()
            .map(|v| RecipientCountry::classify(&v).alpha3())
            .collect();

        let codes: BTreeSet<&'static str> = resolved.iter().flatten().copied().collect();
        if codes.is_empty() {
            return Err(InsightsError::PreconditionNotMet {
                column: self.column.clone(),
                reason: "no value is a recognised two-letter country code".to_string(),
            });
        }
        let index: HashMap<&str, usize> = codes.iter().enumerate().map(|(i, c)| (*c, i)).collect();

        Ok(KeyAssignment {
            labels: codes.iter().map(|c| c.to_string()).collect(),
            rows: resolved
                .iter()
                .map(|c| c.and_then(|c| index.get(c).copied()))
                .collect(),
            order: GroupOrder::MeanDescending,
            bins: None,
        })
    }
}

/// A value and how often it occurs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValueCount {
    pub value: String,
    pub count: usize,
}

/// A distinct text value and its length in characters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextLength {
    pub value: String,
    pub length: usize,
}

/// Data-quality overview of the recipient country column.
#[derive(Debug, Clone, Serialize)]
pub struct CountryProfile {
    pub column: String,
    pub dtype: DataType,
    /// Cells that are not text, missing cells included.
    pub non_text_entries: usize,
    pub top_values: Vec<ValueCount>,
    pub longest_values: Vec<TextLength>,
    /// Distinct values of exactly two letters, known codes or not.
    pub two_letter_values: Vec<String>,
    pub resolved_rows: usize,
    pub unresolved_rows: usize,
}

/// Profile `column`: the `top_n` most frequent values, the `longest_n`
/// longest distinct text values, and the distinct two-letter values.
pub fn country_profile(
    dataset: &Dataset,
    column: &str,
    top_n: usize,
    longest_n: usize,
) -> InsightsResult<CountryProfile> {
    let col = dataset.column(column)?;

    let mut non_text_entries = 0;
    let mut resolved_rows = 0;
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut texts: BTreeSet<&str> = BTreeSet::new();
    for value in col.values() {
        match RecipientCountry::classify(&value) {
            RecipientCountry::Iso { .. } => resolved_rows += 1,
            RecipientCountry::Unresolved { .. } => {}
            RecipientCountry::NonText => non_text_entries += 1,
            RecipientCountry::Missing => {
                non_text_entries += 1;
                continue;
            }
        }
        *counts.entry(value.to_string()).or_insert(0) += 1;
        if let Some(text) = value.as_str() {
            texts.insert(text);
        }
    }

    let mut top_values: Vec<ValueCount> = counts
        .into_iter()
        .map(|(value, count)| ValueCount { value, count })
        .collect();
    top_values.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    top_values.truncate(top_n);

    let mut longest_values: Vec<TextLength> = texts
        .iter()
        .map(|t| TextLength {
            value: t.to_string(),
            length: t.chars().count(),
        })
        .collect();
    longest_values.sort_by(|a, b| b.length.cmp(&a.length).then_with(|| a.value.cmp(&b.value)));
    longest_values.truncate(longest_n);

    let two_letter_values = texts
        .iter()
        .filter(|t| is_two_letters(t))
        .map(|t| t.to_string())
        .collect();

    Ok(CountryProfile {
        column: column.to_string(),
        dtype: col.dtype(),
        non_text_entries,
        top_values,
        longest_values,
        two_letter_values,
        resolved_rows,
        unresolved_rows: col.len() - resolved_rows,
    })
}

/// Mean outcome of one country.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CountryRow {
    pub alpha3: String,
    pub alpha2: String,
    pub mean: f64,
    pub count: usize,
}

/// Per-country means of an outcome, ranked highest first.
#[derive(Debug, Clone, Serialize)]
pub struct CountrySummary {
    pub outcome: String,
    pub rows: Vec<CountryRow>,
    /// Rows left out because the country did not resolve or the outcome was
    /// missing.
    pub excluded_rows: usize,
}

fn alpha2_for(alpha3: &str) -> Option<&'static str> {
    ALPHA2_TO_ALPHA3
        .iter()
        .find(|(_, a3)| *a3 == alpha3)
        .map(|(a2, _)| *a2)
}

/// Per-country mean of `outcome` over rows whose `column` resolves to an
/// alpha-3 code.
pub fn country_summary(
    dataset: &Dataset,
    column: &str,
    outcome: &str,
) -> InsightsResult<CountrySummary> {
    let partition = partition(dataset, &CountryCodes::new(column), outcome)?;
    let rows = partition
        .groups
        .iter()
        .map(|g| CountryRow {
            alpha2: alpha2_for(&g.label).unwrap_or_default().to_string(),
            alpha3: g.label.clone(),
            mean: g.mean(),
            count: g.values.len(),
        })
        .collect();
    Ok(CountrySummary {
        outcome: outcome.to_string(),
        rows,
        excluded_rows: partition.excluded_rows,
    })
}
