mod common;

use common::{write_csv, write_ndjson, write_parquet};
use gridlist::{DataSource, FileFormat, Filter, Record, SortOrder};
use serde_json::json;
use std::fs::File;
use std::io::Write;
use tempfile::TempDir;

fn names(rows: &[serde_json::Value]) -> Vec<String> {
    rows.iter()
        .filter_map(|r| r.value("name"))
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_open_detects_formats_from_extension() {
    let dir = TempDir::new().unwrap();
    for (path, format) in [
        (write_csv(dir.path(), "orders.csv"), FileFormat::Csv),
        (write_parquet(dir.path(), "orders.parquet"), FileFormat::Parquet),
        (write_ndjson(dir.path(), "orders.jsonl"), FileFormat::Jsonl),
    ] {
        let source = DataSource::open(&path, None).unwrap();
        assert_eq!(source.format(), format);
        let page = source.fetch_page(&Filter::default(), 1, 5).unwrap();
        assert_eq!(page.total, 12, "{}", path.display());
        assert_eq!(page.rows.len(), 5);
        assert_eq!(page.rows[0].value("name"), Some(json!("order_01")));
    }
}

#[test]
fn test_explicit_format_overrides_extension() {
    let dir = TempDir::new().unwrap();
    let path = write_csv(dir.path(), "orders.data");
    assert!(DataSource::open(&path, None).is_err());
    let source = DataSource::open(&path, Some(FileFormat::Csv)).unwrap();
    assert_eq!(source.fetch_all(&Filter::default()).unwrap().len(), 12);
}

#[test]
fn test_json_array_with_nested_objects() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("people.json");
    std::fs::write(
        &path,
        r#"[
            {"name": "ann", "lender": {"name": "Acme", "city": "Oslo"}},
            {"name": "bob", "lender": {"name": "Birch", "city": "Rome"}}
        ]"#,
    )
    .unwrap();

    let source = DataSource::open(&path, None).unwrap();
    assert_eq!(
        source.schema().keys(),
        vec!["name", "lender.name", "lender.city"]
    );
    let rows = source.fetch_all(&Filter::default()).unwrap();
    assert_eq!(rows[1].value("lender.city"), Some(json!("Rome")));
}

#[test]
fn test_gzip_csv_is_read_in_memory() {
    let dir = TempDir::new().unwrap();
    let plain = write_csv(dir.path(), "orders.csv");
    let bytes = std::fs::read(&plain).unwrap();
    let path = dir.path().join("orders.csv.gz");
    let mut encoder = flate2::write::GzEncoder::new(
        File::create(&path).unwrap(),
        flate2::Compression::default(),
    );
    encoder.write_all(&bytes).unwrap();
    encoder.finish().unwrap();

    let source = DataSource::open(&path, None).unwrap();
    assert_eq!(source.format(), FileFormat::Csv);
    assert_eq!(source.fetch_all(&Filter::default()).unwrap().len(), 12);
}

#[test]
fn test_missing_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let err = DataSource::open(&dir.path().join("nope.csv"), None)
        .err()
        .unwrap();
    assert!(err.to_string().contains("not found"));
}

#[test]
fn test_search_sort_and_field_filters_combine() {
    let dir = TempDir::new().unwrap();
    let source = DataSource::open(&write_csv(dir.path(), "orders.csv"), None).unwrap();

    let mut filter = Filter::default().with_search("Rome");
    assert_eq!(source.fetch_all(&filter).unwrap().len(), 4);

    filter.extra.insert("status".into(), "open".into());
    filter.extra.insert("customer.tier".into(), "gold".into());
    filter.sort_by = "name".into();
    filter.sort_order = SortOrder::Desc;
    let rows = source.fetch_all(&filter).unwrap();
    assert_eq!(names(&rows), vec!["order_10", "order_04"]);
}

#[test]
fn test_paging_with_filter_reports_filtered_total() {
    let dir = TempDir::new().unwrap();
    let source = DataSource::open(&write_csv(dir.path(), "orders.csv"), None).unwrap();
    let mut filter = Filter::default();
    filter.extra.insert("status".into(), "closed".into());

    let page = source.fetch_page(&filter, 2, 3).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(names(&page.rows), vec!["order_12"]);
}
