//! Analyses over the consolidated SMS dataset: quantile binning, grouped
//! outcome comparisons, recipient country resolution and significance tests.

pub mod binning;
pub mod country;
pub mod grouping;
pub mod hypothesis;
mod iso3166;
pub mod studentized;

pub use binning::{quantile_bin, BinDefinition, Binning};
pub use country::{
    country_profile, country_summary, resolve_alpha3, CountryCodes, CountryProfile, CountryRow,
    CountrySummary, RecipientCountry,
};
pub use grouping::{
    aggregate, partition, Categorical, Dichotomous, GroupSummary, GroupingKey, Partition,
    QuantileBins,
};
pub use hypothesis::{run_tests, HypothesisTests, TestStatus};
