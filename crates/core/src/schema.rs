//! Canonical names and types of the observation-row columns.

use crate::dataset::DataType;

pub const DELIVERY_RATE: &str = "Delivery_rate";
pub const REPLY_RATE: &str = "Reply_rate";
pub const SMS_CONTENT_LENGTH: &str = "SMS_content_length";
pub const CONTAINS_LINK: &str = "Contains_link";
pub const CONTAINS_EMOJIS: &str = "Contains_emojis";
pub const CONTAINS_PERSONALIZATION: &str = "Contains_personalization";
pub const DAY_OF_WEEK_SENT: &str = "Day_of_Week_sent";
pub const COUNTRY_OF_RECIPIENTS: &str = "Country_of_recipients";
/// Batch tag stamped from the source file name.
pub const MONTH: &str = "month";

/// A column every source table must provide, with the type it is
/// validated into at ingestion. `Boolean` flag columns whose cells are not
/// all flag-like are kept as text instead.
#[derive(Debug, Clone, Copy)]
pub struct RequiredColumn {
    pub name: &'static str,
    pub dtype: DataType,
}

pub const REQUIRED_COLUMNS: [RequiredColumn; 8] = [
    RequiredColumn { name: DELIVERY_RATE, dtype: DataType::Float64 },
    RequiredColumn { name: REPLY_RATE, dtype: DataType::Float64 },
    RequiredColumn { name: SMS_CONTENT_LENGTH, dtype: DataType::Int64 },
    RequiredColumn { name: CONTAINS_LINK, dtype: DataType::Boolean },
    RequiredColumn { name: CONTAINS_EMOJIS, dtype: DataType::Boolean },
    RequiredColumn { name: CONTAINS_PERSONALIZATION, dtype: DataType::Boolean },
    RequiredColumn { name: DAY_OF_WEEK_SENT, dtype: DataType::Utf8 },
    RequiredColumn { name: COUNTRY_OF_RECIPIENTS, dtype: DataType::Utf8 },
];

/// Rate columns analysed as outcomes. Rates are percentages (0–100).
pub const OUTCOME_COLUMNS: [&str; 2] = [DELIVERY_RATE, REPLY_RATE];

/// Normalize a header: trim, then replace spaces with underscores.
pub fn normalize_column_name(raw: &str) -> String {
    raw.trim().replace(' ', "_")
}

/// Look up the required column a normalized header refers to, ignoring case.
pub fn required_column(normalized: &str) -> Option<&'static RequiredColumn> {
    REQUIRED_COLUMNS
        .iter()
        .find(|c| c.name.eq_ignore_ascii_case(normalized))
}
