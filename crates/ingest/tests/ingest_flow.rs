//! End-to-end ingestion over a temporary source directory.

use sms_core::config::IngestConfig;
use sms_core::schema;
use sms_core::{ColumnData, InsightsError};
use rust_xlsxwriter::Workbook;
use sms_ingest::{load_dataset, Ingestor};
use std::fs;
use std::path::Path;

const HEADER: &str = "SMS content,Delivery rate,Reply rate,SMS content length,Contains link,\
Contains emojis,Contains personalization,Day of Week sent,Country of recipients";

fn write_sources(dir: &Path) {
    fs::write(
        dir.join("2024-01.csv"),
        format!(
            "{HEADER}\n\
             \"Hi {{name}}, 20% off\",97.5,2.5,48,TRUE,FALSE,TRUE,Monday,US\n\
             Flash sale,91,1.25,130,FALSE,TRUE,FALSE,Friday,Germany\n"
        ),
    )
    .unwrap();
    fs::write(
        dir.join("2024-02.csv"),
        format!(
            "{HEADER},Campaign tag\n\
             Last chance,88.0,4,72,true,false,false,Sunday,GB,spring\n"
        ),
    )
    .unwrap();
}

fn config(dir: &Path) -> IngestConfig {
    IngestConfig {
        source_dir: dir.join("SMS_data").display().to_string(),
        file_pattern: "2024-*.csv".to_string(),
        dropped_column: "SMS content".to_string(),
        output_path: dir.join("all_sms_data.parquet").display().to_string(),
    }
}

#[test]
fn test_ingest_then_load() {
    let root = tempfile::tempdir().unwrap();
    let sources = root.path().join("SMS_data");
    fs::create_dir(&sources).unwrap();
    write_sources(&sources);

    let report = Ingestor::new(config(root.path())).run().unwrap();
    assert_eq!(report.sources.len(), 2);
    assert_eq!(report.total_rows, 3);
    assert_eq!(report.coercion_failures, 0);
    assert_eq!(report.columns.last().map(String::as_str), Some(schema::MONTH));

    let ds = load_dataset(&report.output_path).unwrap();
    assert_eq!(ds.num_rows(), 3);
    assert!(ds.get("SMS_content").is_none());
    assert_eq!(
        ds.column(schema::DELIVERY_RATE).unwrap().data,
        ColumnData::Float64(vec![Some(97.5), Some(91.0), Some(88.0)])
    );
    assert_eq!(
        ds.column("Campaign_tag").unwrap().data,
        ColumnData::Utf8(vec![None, None, Some("spring".into())])
    );
    assert_eq!(
        ds.column(schema::MONTH).unwrap().data,
        ColumnData::Utf8(vec![
            Some("2024-01".into()),
            Some("2024-01".into()),
            Some("2024-02".into())
        ])
    );
}

#[test]
fn test_reingestion_is_byte_identical() {
    let root = tempfile::tempdir().unwrap();
    let sources = root.path().join("SMS_data");
    fs::create_dir(&sources).unwrap();
    write_sources(&sources);

    let ingestor = Ingestor::new(config(root.path()));
    let first = ingestor.run().unwrap();
    let first_bytes = fs::read(&first.output_path).unwrap();
    let second = ingestor.run().unwrap();
    let second_bytes = fs::read(&second.output_path).unwrap();
    assert_eq!(first_bytes, second_bytes);
}

#[test]
fn test_bad_source_aborts_and_names_file() {
    let root = tempfile::tempdir().unwrap();
    let sources = root.path().join("SMS_data");
    fs::create_dir(&sources).unwrap();
    write_sources(&sources);
    fs::write(sources.join("2024-03.csv"), "SMS content,Delivery rate\nhello,90\n").unwrap();

    let cfg = config(root.path());
    let output = cfg.output_path.clone();
    let err = Ingestor::new(cfg).run().unwrap_err();
    assert!(matches!(err, InsightsError::SourceRead { .. }));
    assert!(err.to_string().contains("2024-03.csv"));
    // Nothing is written on a failed run.
    assert!(!Path::new(&output).exists());
}

#[test]
fn test_ingests_workbooks_with_default_pattern() {
    let root = tempfile::tempdir().unwrap();
    let sources = root.path().join("SMS_data");
    fs::create_dir(&sources).unwrap();

    let rows: [(&str, f64, f64, i64, &str, &str, &str, &str, &str); 2] = [
        ("Hi", 97.5, 2.5, 48, "Link", "No", "Yes", "Monday", "US"),
        ("Sale", 91.0, 1.0, 130, "No link", "Yes", "No", "Friday", "FR"),
    ];
    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    for (col, header) in HEADER.split(',').enumerate() {
        sheet.write_string(0, col as u16, header).unwrap();
    }
    for (i, row) in rows.iter().enumerate() {
        let r = i as u32 + 1;
        sheet.write_string(r, 0, row.0).unwrap();
        sheet.write_number(r, 1, row.1).unwrap();
        sheet.write_number(r, 2, row.2).unwrap();
        sheet.write_number(r, 3, row.3 as f64).unwrap();
        sheet.write_string(r, 4, row.4).unwrap();
        sheet.write_string(r, 5, row.5).unwrap();
        sheet.write_string(r, 6, row.6).unwrap();
        sheet.write_string(r, 7, row.7).unwrap();
        sheet.write_string(r, 8, row.8).unwrap();
    }
    workbook.save(sources.join("2024-04.xlsx")).unwrap();
    // Not matched by the default pattern.
    write_sources(&sources);

    let cfg = IngestConfig {
        file_pattern: IngestConfig::default().file_pattern,
        ..config(root.path())
    };
    let report = Ingestor::new(cfg).run().unwrap();
    assert_eq!(report.sources.len(), 1);
    assert_eq!(report.total_rows, 2);
    assert_eq!(report.coercion_failures, 0);

    let ds = load_dataset(&report.output_path).unwrap();
    assert_eq!(
        ds.column(schema::SMS_CONTENT_LENGTH).unwrap().data,
        ColumnData::Int64(vec![Some(48), Some(130)])
    );
    assert_eq!(
        ds.column(schema::CONTAINS_LINK).unwrap().data,
        ColumnData::Utf8(vec![Some("Link".into()), Some("No link".into())])
    );
    assert_eq!(
        ds.column(schema::CONTAINS_EMOJIS).unwrap().data,
        ColumnData::Boolean(vec![Some(false), Some(true)])
    );
    assert_eq!(
        ds.column(schema::MONTH).unwrap().data,
        ColumnData::Utf8(vec![Some("2024-04".into()), Some("2024-04".into())])
    );
}
