//! Plain-text rendering of the views (`Display`), for the `report` command
//! and `/api/analysis.txt`.

use crate::analysis::{outcome_label, AnalysisView, Comparison, Section};
use crate::preview::DataPreview;
use sms_analytics::hypothesis::{HypothesisTests, TestStatus, TukeyResult};
use sms_analytics::{CountryProfile, CountrySummary};
use std::fmt;

const BAR_WIDTH: usize = 30;

fn bar(value: f64, max: f64) -> String {
    if max.is_nan() || max <= 0.0 || !value.is_finite() || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round() as usize;
    "█".repeat(len.min(BAR_WIDTH))
}

fn heading(f: &mut fmt::Formatter<'_>, title: &str) -> fmt::Result {
    writeln!(f)?;
    writeln!(f, "{title}")?;
    writeln!(f, "{}", "-".repeat(title.chars().count()))
}

/// Left-aligned text table; column widths fit the widest cell.
fn table(f: &mut fmt::Formatter<'_>, header: &[&str], rows: &[Vec<String>]) -> fmt::Result {
    let mut widths: Vec<usize> = header.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let line = |cells: Vec<&str>| {
        let mut out = String::new();
        for (i, (cell, w)) in cells.iter().zip(&widths).enumerate() {
            if i > 0 {
                out.push_str("  ");
            }
            let pad = w.saturating_sub(cell.chars().count());
            out.push_str(cell);
            out.push_str(&" ".repeat(pad));
        }
        out.trim_end().to_string()
    };
    writeln!(f, "{}", line(header.to_vec()))?;
    for row in rows {
        writeln!(f, "{}", line(row.iter().map(String::as_str).collect()))?;
    }
    Ok(())
}

impl fmt::Display for DataPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data preview ({})", self.shape)?;
        let header: Vec<&str> = self.columns.iter().map(String::as_str).collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|v| match v {
                        serde_json::Value::Null => String::new(),
                        serde_json::Value::String(s) => s.clone(),
                        serde_json::Value::Bool(true) => "True".to_string(),
                        serde_json::Value::Bool(false) => "False".to_string(),
                        other => other.to_string(),
                    })
                    .collect()
            })
            .collect();
        writeln!(f)?;
        table(f, &header, &rows)?;

        heading(f, "Column types")?;
        let rows: Vec<Vec<String>> = self
            .dtypes
            .iter()
            .map(|c| vec![c.name.clone(), c.dtype.to_string()])
            .collect();
        table(f, &["column", "dtype"], &rows)
    }
}

fn write_comparison(f: &mut fmt::Formatter<'_>, c: &Comparison) -> fmt::Result {
    heading(f, &c.title)?;
    let summary = match &c.section {
        Section::Ready(s) => s,
        Section::Skipped { reason } => return writeln!(f, "skipped: {reason}"),
    };
    let max = summary.groups.iter().map(|g| g.mean).fold(0.0, f64::max);
    let rows: Vec<Vec<String>> = summary
        .groups
        .iter()
        .map(|g| {
            vec![
                g.group.clone(),
                format!("{:.2}", g.mean),
                g.count.to_string(),
                bar(g.mean, max),
            ]
        })
        .collect();
    table(f, &["group", "mean", "count", ""], &rows)?;
    if summary.excluded_rows > 0 {
        writeln!(f, "({} rows excluded)", summary.excluded_rows)?;
    }
    Ok(())
}

fn write_country_profile(f: &mut fmt::Formatter<'_>, p: &CountryProfile) -> fmt::Result {
    heading(f, "Country of recipients: data quality")?;
    writeln!(f, "dtype: {}", p.dtype)?;
    writeln!(f, "non-text entries: {}", p.non_text_entries)?;
    writeln!(
        f,
        "rows with a recognised two-letter code: {} (unresolved: {})",
        p.resolved_rows, p.unresolved_rows
    )?;
    writeln!(f, "distinct two-letter values: {}", p.two_letter_values.len())?;
    writeln!(f)?;
    writeln!(f, "Most frequent values:")?;
    let rows: Vec<Vec<String>> = p
        .top_values
        .iter()
        .map(|v| vec![v.value.clone(), v.count.to_string()])
        .collect();
    table(f, &["value", "count"], &rows)?;
    writeln!(f)?;
    writeln!(f, "Longest values:")?;
    let rows: Vec<Vec<String>> = p
        .longest_values
        .iter()
        .map(|v| vec![v.value.clone(), v.length.to_string()])
        .collect();
    table(f, &["value", "length"], &rows)
}

fn write_country_summary(f: &mut fmt::Formatter<'_>, s: &CountrySummary) -> fmt::Result {
    heading(f, &format!("{} by country", outcome_label(&s.outcome)))?;
    let max = s.rows.iter().map(|r| r.mean).fold(0.0, f64::max);
    let rows: Vec<Vec<String>> = s
        .rows
        .iter()
        .map(|r| {
            vec![
                r.alpha3.clone(),
                r.alpha2.clone(),
                format!("{:.2}", r.mean),
                r.count.to_string(),
                bar(r.mean, max),
            ]
        })
        .collect();
    table(f, &["country", "code", "mean", "count", ""], &rows)?;
    writeln!(f, "({} rows without a recognised country code)", s.excluded_rows)
}

/// Tukey table in the usual "Multiple Comparison of Means" layout.
fn write_tukey(f: &mut fmt::Formatter<'_>, t: &TukeyResult) -> fmt::Result {
    let header = ["group1", "group2", "meandiff", "p-adj", "lower", "upper", "reject"];
    let rows: Vec<[String; 7]> = t
        .comparisons
        .iter()
        .map(|c| {
            [
                c.group1.clone(),
                c.group2.clone(),
                format!("{:.4}", c.mean_diff),
                format!("{:.4}", c.p_adj),
                format!("{:.4}", c.lower),
                format!("{:.4}", c.upper),
                if c.reject { "True" } else { "False" }.to_string(),
            ]
        })
        .collect();

    let mut widths: Vec<usize> = header.iter().map(|h| h.len()).collect();
    for row in &rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }
    let total = widths.iter().sum::<usize>() + widths.len() - 1;
    let pad = |s: &str, w: usize| format!("{}{}", " ".repeat(w.saturating_sub(s.chars().count())), s);

    let title = format!("Multiple Comparison of Means - Tukey HSD, FWER={:.2}", t.alpha);
    writeln!(f, "{title:^total$}")?;
    writeln!(f, "{}", "=".repeat(total))?;
    let cells: Vec<String> = header.iter().zip(&widths).map(|(h, w)| pad(h, *w)).collect();
    writeln!(f, "{}", cells.join(" "))?;
    writeln!(f, "{}", "-".repeat(total))?;
    for row in &rows {
        let cells: Vec<String> = row.iter().zip(&widths).map(|(c, w)| pad(c, *w)).collect();
        writeln!(f, "{}", cells.join(" "))?;
    }
    writeln!(f, "{}", "-".repeat(total))
}

fn verdict(significant: bool) -> &'static str {
    if significant {
        "significant"
    } else {
        "not significant"
    }
}

fn write_tests(f: &mut fmt::Formatter<'_>, t: &HypothesisTests) -> fmt::Result {
    heading(
        f,
        &format!("{} across content length bins", outcome_label(&t.outcome_column)),
    )?;
    if !t.groups_excluded.is_empty() {
        writeln!(
            f,
            "groups with fewer than 2 observations left out: {}",
            t.groups_excluded.join(", ")
        )?;
    }
    match &t.anova {
        TestStatus::Completed(a) => writeln!(
            f,
            "ANOVA: F({}, {}) = {:.4}, p = {:.4} ({} at α = {})",
            a.df_between,
            a.df_within,
            a.f_statistic,
            a.p_value,
            verdict(a.significant),
            t.alpha
        )?,
        TestStatus::NotApplicable { reason } => writeln!(f, "ANOVA: not applicable ({reason})")?,
    }
    match &t.kruskal_wallis {
        TestStatus::Completed(k) => writeln!(
            f,
            "Kruskal-Wallis: H({}) = {:.4}, p = {:.4} ({})",
            k.df,
            k.h_statistic,
            k.p_value,
            verdict(k.significant)
        )?,
        TestStatus::NotApplicable { reason } => {
            writeln!(f, "Kruskal-Wallis: not applicable ({reason})")?
        }
    }
    match &t.tukey_hsd {
        TestStatus::Completed(tukey) => {
            writeln!(f)?;
            write_tukey(f, tukey)
        }
        TestStatus::NotApplicable { reason } => writeln!(f, "Tukey HSD: not applicable ({reason})"),
    }
}

fn write_section<T>(
    f: &mut fmt::Formatter<'_>,
    title: &str,
    section: &Section<T>,
    write: impl Fn(&mut fmt::Formatter<'_>, &T) -> fmt::Result,
) -> fmt::Result {
    match section {
        Section::Ready(v) => write(f, v),
        Section::Skipped { reason } => {
            heading(f, title)?;
            writeln!(f, "skipped: {reason}")
        }
    }
}

impl fmt::Display for AnalysisView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "SMS campaign analysis ({})", self.shape)?;
        writeln!(f, "generated at {}", self.generated_at.format("%Y-%m-%d %H:%M:%S UTC"))?;

        for c in &self.comparisons {
            write_comparison(f, c)?;
        }
        write_section(f, "Country of recipients: data quality", &self.country_profile, write_country_profile)?;
        for s in &self.country_summaries {
            write_section(f, "Outcome by country", s, write_country_summary)?;
        }
        for t in &self.hypothesis_tests {
            write_section(f, "Hypothesis tests", t, write_tests)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::build_analysis;
    use crate::preview::build_preview;
    use sms_core::config::AnalysisConfig;
    use sms_core::{Column, ColumnData, Dataset};

    fn sample() -> Dataset {
        Dataset::new(vec![
            Column::new(
                "Reply_rate",
                ColumnData::Float64(
                    [1.0, 1.0, 1.0, 1.0, 5.0, 5.0, 5.0, 5.0].into_iter().map(Some).collect(),
                ),
            ),
            Column::new(
                "SMS_content_length",
                ColumnData::Int64((1..=8).map(|i| Some(i * 10)).collect()),
            ),
            Column::new(
                "Country_of_recipients",
                ColumnData::Utf8(
                    ["US", "US", "GB", "GB", "DE", "Spain", "US", "FR"]
                        .iter()
                        .map(|s| Some(s.to_string()))
                        .collect(),
                ),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_bar_scales_to_max() {
        assert_eq!(bar(10.0, 10.0).chars().count(), BAR_WIDTH);
        assert_eq!(bar(5.0, 10.0).chars().count(), BAR_WIDTH / 2);
        assert_eq!(bar(0.0, 10.0), "");
        assert_eq!(bar(1.0, 0.0), "");
    }

    #[test]
    fn test_render_analysis_text() {
        let view = build_analysis(&sample(), &AnalysisConfig::default()).unwrap();
        let text = view.to_string();
        assert!(text.starts_with("SMS campaign analysis (8 rows × 3 columns)"));
        assert!(text.contains("Reply rate (%) by SMS content length"));
        assert!(text.contains("Multiple Comparison of Means - Tukey HSD, FWER=0.05"));
        assert!(text.contains("group1"));
        assert!(text.contains("10–27"));
        assert!(text.contains("skipped: Column 'Delivery_rate' is not present in the dataset"));
        assert!(text.contains("Reply rate (%) by country"));
        assert!(text.contains("USA"));
        assert!(text.contains("ANOVA: F(3, 4)"));
    }

    #[test]
    fn test_render_preview_text() {
        let preview = build_preview(&sample(), 2);
        let text = preview.to_string();
        assert!(text.starts_with("Data preview (8 rows × 3 columns)"));
        assert!(text.contains("Reply_rate"));
        assert!(text.contains("int64"));
        assert!(text.lines().any(|l| l.starts_with("1") && l.contains("US")));
    }
}
