//! Export: materialize the rows of the current view and write them to a file.
//!
//! The list only decides *which* rows and columns are exported. Fetching is
//! delegated to caller-supplied functions and errors from them are returned
//! unchanged (no retry). Writing goes through polars.

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

use crate::column::FlatColumn;
use crate::record::{display_value, Record};
use crate::sort::Filter;
use crate::CompressionFormat;

/// One page of rows plus the total row count across all pages.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub rows: Vec<T>,
    pub total: usize,
}

pub type FetchAll<T> = Arc<dyn Fn(&Filter) -> Result<Vec<T>> + Send + Sync>;
/// `(filter, page, limit)`, pages are 1-based.
pub type FetchPage<T> = Arc<dyn Fn(&Filter, usize, usize) -> Result<Page<T>> + Send + Sync>;

/// Where exported rows come from when exporting more than the current page.
pub enum ExportSource<T> {
    All(FetchAll<T>),
    Paginated {
        fetch_page: FetchPage<T>,
        page_size: usize,
    },
}

impl<T> Clone for ExportSource<T> {
    fn clone(&self) -> Self {
        match self {
            Self::All(f) => Self::All(Arc::clone(f)),
            Self::Paginated {
                fetch_page,
                page_size,
            } => Self::Paginated {
                fetch_page: Arc::clone(fetch_page),
                page_size: *page_size,
            },
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExportColumns {
    /// Columns currently shown, in display order.
    #[default]
    Visible,
    /// Every column of the schema, in schema order.
    All,
}

impl ExportColumns {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Visible => "Visible columns",
            Self::All => "All columns",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::Visible => Self::All,
            Self::All => Self::Visible,
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum RowScope {
    #[default]
    CurrentPage,
    AllRows,
}

impl RowScope {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CurrentPage => "Current page",
            Self::AllRows => "All rows",
        }
    }

    pub fn toggle(self) -> Self {
        match self {
            Self::CurrentPage => Self::AllRows,
            Self::AllRows => Self::CurrentPage,
        }
    }
}

/// Rows for the requested scope. `AllRows` without a source falls back to the
/// current page.
pub fn materialize_rows<T: Clone>(
    source: Option<&ExportSource<T>>,
    scope: RowScope,
    filter: &Filter,
    current_page: &[T],
) -> Result<Vec<T>> {
    let source = match (scope, source) {
        (RowScope::AllRows, Some(source)) => source,
        _ => return Ok(current_page.to_vec()),
    };
    match source {
        ExportSource::All(fetch_all) => fetch_all(filter),
        ExportSource::Paginated {
            fetch_page,
            page_size,
        } => {
            let limit = (*page_size).max(1);
            let mut rows = Vec::new();
            let mut page = 1;
            loop {
                let Page {
                    rows: batch,
                    total,
                } = fetch_page(filter, page, limit)?;
                debug!(page, fetched = batch.len(), total, "export page");
                let done = batch.is_empty() || rows.len() + batch.len() >= total;
                rows.extend(batch);
                if done {
                    break;
                }
                page += 1;
            }
            Ok(rows)
        }
    }
}

/// Column metadata plus stringified cells, ready for a writer.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub keys: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
}

impl ExportTable {
    /// Headers are column labels. A label used by more than one column gets
    /// its key appended so headers stay unique.
    pub fn build<T: Record>(rows: &[T], columns: &[&FlatColumn<T>]) -> Self {
        let mut label_counts: HashMap<&str, usize> = HashMap::new();
        for c in columns {
            *label_counts.entry(c.label.as_str()).or_default() += 1;
        }
        let headers = columns
            .iter()
            .map(|c| {
                if label_counts.get(c.label.as_str()).copied().unwrap_or(0) > 1 {
                    format!("{} ({})", c.label, c.key)
                } else {
                    c.label.clone()
                }
            })
            .collect();
        let keys = columns.iter().map(|c| c.key.clone()).collect();
        let rows = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .map(|c| row.value(&c.key).as_ref().and_then(display_value))
                    .collect()
            })
            .collect();
        Self {
            headers,
            keys,
            rows,
        }
    }

    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let columns: Vec<Column> = self
            .headers
            .iter()
            .enumerate()
            .map(|(i, header)| {
                let values: Vec<Option<String>> =
                    self.rows.iter().map(|row| row.get(i).cloned().flatten()).collect();
                Series::new(header.as_str().into(), values).into()
            })
            .collect();
        Ok(DataFrame::new_infer_height(columns)?)
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    #[default]
    Csv,
    Parquet,
    Json,
    Ndjson,
    Ipc,
}

impl ExportFormat {
    pub const ALL: [Self; 5] = [
        Self::Csv,
        Self::Parquet,
        Self::Json,
        Self::Ndjson,
        Self::Ipc,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv => "CSV",
            Self::Parquet => "Parquet",
            Self::Json => "JSON",
            Self::Ndjson => "NDJSON",
            Self::Ipc => "Arrow",
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Parquet => "parquet",
            Self::Json => "json",
            Self::Ndjson => "jsonl",
            Self::Ipc => "arrow",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "csv" => Some(Self::Csv),
            "parquet" => Some(Self::Parquet),
            "json" => Some(Self::Json),
            "ndjson" | "jsonl" => Some(Self::Ndjson),
            "arrow" | "ipc" | "feather" => Some(Self::Ipc),
            _ => None,
        }
    }

    pub fn supports_compression(self) -> bool {
        matches!(self, Self::Csv | Self::Json | Self::Ndjson)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportOptions {
    pub csv_delimiter: u8,
    pub csv_include_header: bool,
    pub compression: Option<CompressionFormat>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            csv_delimiter: b',',
            csv_include_header: true,
            compression: None,
        }
    }
}

/// Add the format extension when the path has none, and the compression
/// extension when compressing and it is missing.
pub fn output_path(path: &Path, format: ExportFormat, options: &ExportOptions) -> PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().is_none() {
        path.set_extension(format.extension());
    }
    if let Some(compression) = options.compression.filter(|_| format.supports_compression()) {
        if CompressionFormat::from_extension(&path) != Some(compression) {
            let mut name = path.into_os_string();
            name.push(".");
            name.push(compression.extension());
            path = PathBuf::from(name);
        }
    }
    path
}

/// Destination file, optionally compressed. Must be closed with
/// [`OutputWriter::finish`] so trailer and flush errors reach the caller.
enum OutputWriter {
    Plain(BufWriter<File>),
    Gzip(flate2::write::GzEncoder<BufWriter<File>>),
    Zstd(zstd::Encoder<'static, BufWriter<File>>),
    Bzip2(bzip2::write::BzEncoder<BufWriter<File>>),
    Xz(xz2::write::XzEncoder<BufWriter<File>>),
}

impl OutputWriter {
    fn create(path: &Path, compression: Option<CompressionFormat>) -> Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        Ok(match compression {
            None => Self::Plain(file),
            Some(CompressionFormat::Gzip) => Self::Gzip(flate2::write::GzEncoder::new(
                file,
                flate2::Compression::default(),
            )),
            Some(CompressionFormat::Zstd) => Self::Zstd(zstd::Encoder::new(file, 0)?),
            Some(CompressionFormat::Bzip2) => Self::Bzip2(bzip2::write::BzEncoder::new(
                file,
                bzip2::Compression::default(),
            )),
            Some(CompressionFormat::Xz) => Self::Xz(xz2::write::XzEncoder::new(file, 6)),
        })
    }

    fn finish(self) -> std::io::Result<()> {
        let mut file = match self {
            Self::Plain(file) => file,
            Self::Gzip(encoder) => encoder.finish()?,
            Self::Zstd(encoder) => encoder.finish()?,
            Self::Bzip2(encoder) => encoder.finish()?,
            Self::Xz(encoder) => encoder.finish()?,
        };
        file.flush()
    }
}

impl Write for OutputWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self {
            Self::Plain(w) => w.write(buf),
            Self::Gzip(w) => w.write(buf),
            Self::Zstd(w) => w.write(buf),
            Self::Bzip2(w) => w.write(buf),
            Self::Xz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match self {
            Self::Plain(w) => w.flush(),
            Self::Gzip(w) => w.flush(),
            Self::Zstd(w) => w.flush(),
            Self::Bzip2(w) => w.flush(),
            Self::Xz(w) => w.flush(),
        }
    }
}

/// Write the table to `path` (adjusted by [`output_path`]). Returns the path
/// actually written.
pub fn write_export(
    table: &ExportTable,
    path: &Path,
    format: ExportFormat,
    options: &ExportOptions,
) -> Result<PathBuf> {
    if table.headers.is_empty() {
        return Err(eyre!("Nothing to export: no columns selected"));
    }
    let path = output_path(path, format, options);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            return Err(eyre!("Directory does not exist: {}", parent.display()));
        }
    }
    let mut df = table.to_dataframe()?;
    let compression = options.compression.filter(|_| format.supports_compression());

    let mut writer = OutputWriter::create(&path, compression)?;
    match format {
        ExportFormat::Csv => {
            CsvWriter::new(&mut writer)
                .with_separator(options.csv_delimiter)
                .include_header(options.csv_include_header)
                .finish(&mut df)?;
        }
        ExportFormat::Json => {
            JsonWriter::new(&mut writer)
                .with_json_format(JsonFormat::Json)
                .finish(&mut df)?;
        }
        ExportFormat::Ndjson => {
            JsonWriter::new(&mut writer)
                .with_json_format(JsonFormat::JsonLines)
                .finish(&mut df)?;
        }
        ExportFormat::Parquet => {
            ParquetWriter::new(&mut writer).finish(&mut df)?;
        }
        ExportFormat::Ipc => {
            IpcWriter::new(&mut writer).finish(&mut df)?;
        }
    }
    writer.finish()?;
    info!(path = %path.display(), rows = table.rows.len(), format = format.as_str(), "exported");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::column::{flatten, ColumnNode};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn rows(n: usize) -> Vec<Value> {
        (0..n).map(|i| json!({"id": i, "name": format!("row{i}")})).collect()
    }

    #[test]
    fn test_current_page_scope_ignores_source() {
        let source: ExportSource<Value> =
            ExportSource::All(Arc::new(|_: &Filter| Err(eyre!("not called"))));
        let page = rows(2);
        let filter = Filter::default();
        let out = materialize_rows(Some(&source), RowScope::CurrentPage, &filter, &page).unwrap();
        assert_eq!(out, page);
    }

    #[test]
    fn test_fetch_all_receives_filter() {
        let source: ExportSource<Value> = ExportSource::All(Arc::new(|filter: &Filter| {
            assert_eq!(filter.search, "x");
            Ok(rows(5))
        }));
        let filter = Filter::default().with_search("x");
        let out = materialize_rows(Some(&source), RowScope::AllRows, &filter, &[]).unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_paginated_fetch_walks_all_pages() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let all = rows(7);
        let source: ExportSource<Value> = ExportSource::Paginated {
            fetch_page: Arc::new(move |_: &Filter, page: usize, limit: usize| {
                counter.fetch_add(1, Ordering::SeqCst);
                let start = (page - 1) * limit;
                let rows = all.iter().skip(start).take(limit).cloned().collect();
                Ok(Page { rows, total: 7 })
            }),
            page_size: 3,
        };
        let filter = Filter::default();
        let out = materialize_rows(Some(&source), RowScope::AllRows, &filter, &[]).unwrap();
        assert_eq!(out, rows(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_fetch_error_propagates() {
        let source: ExportSource<Value> = ExportSource::Paginated {
            fetch_page: Arc::new(|_: &Filter, _: usize, _: usize| Err(eyre!("backend down"))),
            page_size: 10,
        };
        let filter = Filter::default();
        let err = materialize_rows(Some(&source), RowScope::AllRows, &filter, &[]).unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }

    #[test]
    fn test_table_uses_labels_and_disambiguates_duplicates() {
        let schema = vec![
            ColumnNode::<Value>::leaf("id", "ID"),
            ColumnNode::group("a", "A", vec![ColumnNode::leaf("name", "Name")]),
            ColumnNode::group("b", "B", vec![ColumnNode::leaf("name", "Name")]),
        ];
        let flat = flatten(&schema);
        let cols: Vec<&FlatColumn<Value>> = flat.iter().collect();
        let data = vec![json!({"id": 1, "a": {"name": "x"}, "b": {"name": null}})];
        let table = ExportTable::build(&data, &cols);
        assert_eq!(table.headers, vec!["ID", "Name (a.name)", "Name (b.name)"]);
        assert_eq!(
            table.rows,
            vec![vec![Some("1".to_string()), Some("x".to_string()), None]]
        );
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_failed_final_write_is_reported() {
        for compression in [None, Some(CompressionFormat::Gzip), Some(CompressionFormat::Xz)] {
            let mut writer = OutputWriter::create(Path::new("/dev/full"), compression).unwrap();
            writer.write_all(b"id,name\n1,a\n").unwrap();
            assert!(writer.finish().is_err(), "{compression:?}");
        }
    }

    #[test]
    fn test_output_path_adds_extensions() {
        let gz = ExportOptions {
            compression: Some(CompressionFormat::Gzip),
            ..Default::default()
        };
        let csv_gz = PathBuf::from("out.csv.gz");
        assert_eq!(output_path(Path::new("out"), ExportFormat::Csv, &gz), csv_gz);
        assert_eq!(output_path(Path::new("out.csv.gz"), ExportFormat::Csv, &gz), csv_gz);
        assert_eq!(
            output_path(Path::new("out"), ExportFormat::Parquet, &gz),
            PathBuf::from("out.parquet")
        );
    }
}
