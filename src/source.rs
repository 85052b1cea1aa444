//! Data source for the bundled viewer: a polars `LazyFrame` over a file,
//! queried one page at a time with the list's [`Filter`].

use color_eyre::eyre::eyre;
use color_eyre::Result;
use polars::prelude::*;
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::column::{ColumnNode, ColumnSchema};
use crate::export::Page;
use crate::sort::{Filter, SortOrder};
use crate::{CompressionFormat, FileFormat};

/// Column names of the source with their nesting: struct columns (nested JSON
/// objects) list their fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceColumn {
    Plain(String),
    Struct(String, Vec<String>),
}

pub struct DataSource {
    path: PathBuf,
    format: FileFormat,
    lf: LazyFrame,
    columns: Vec<SourceColumn>,
}

impl DataSource {
    /// Open `path`, detecting the format from its extension unless given.
    /// Compressed CSV (`.csv.gz`, `.csv.zst`, ...) is decompressed in memory.
    pub fn open(path: &Path, format: Option<FileFormat>) -> Result<Self> {
        let compression = CompressionFormat::from_extension(path);
        let format = match format {
            Some(format) => format,
            None => {
                let inner = match compression {
                    Some(_) => path.file_stem().map(Path::new),
                    None => Some(path),
                };
                inner.and_then(FileFormat::from_path).ok_or_else(|| {
                    eyre!(
                        "Cannot detect the format of {}; use --format",
                        path.display()
                    )
                })?
            }
        };
        if !path.exists() {
            return Err(eyre!("File not found: {}", path.display()));
        }

        let lf = match (format, compression) {
            (FileFormat::Csv, Some(compression)) => {
                let bytes = decompress(path, compression)?;
                CsvReader::new(Cursor::new(bytes)).finish()?.lazy()
            }
            (_, Some(_)) => {
                return Err(eyre!(
                    "Compressed input is only supported for CSV: {}",
                    path.display()
                ))
            }
            (FileFormat::Csv, None) => {
                let pl_path = PlRefPath::try_from_path(path)?;
                LazyCsvReader::new(pl_path).finish()?
            }
            (FileFormat::Jsonl, None) => {
                let pl_path = PlRefPath::try_from_path(path)?;
                LazyJsonLineReader::new(pl_path).finish()?
            }
            (FileFormat::Json, None) => {
                let file = File::open(path)?;
                JsonReader::new(file)
                    .with_json_format(JsonFormat::Json)
                    .finish()?
                    .lazy()
            }
            (FileFormat::Parquet, None) => {
                let pl_path = PlRefPath::try_from_path(path)?;
                LazyFrame::scan_parquet(pl_path, Default::default())?
            }
            (FileFormat::Arrow, None) => {
                let pl_path = PlRefPath::try_from_path(path)?;
                LazyFrame::scan_ipc(pl_path, Default::default(), Default::default())?
            }
        };
        let source = Self::from_lazy(lf)?;
        info!(
            path = %path.display(),
            ?format,
            columns = source.columns.len(),
            "opened data source"
        );
        Ok(Self {
            path: path.to_path_buf(),
            format,
            ..source
        })
    }

    /// Wrap an in-memory frame.
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        Self::from_lazy(df.lazy())
    }

    fn from_lazy(mut lf: LazyFrame) -> Result<Self> {
        let schema = lf.collect_schema()?;
        let columns = schema
            .iter()
            .map(|(name, dtype)| match dtype {
                DataType::Struct(fields) => SourceColumn::Struct(
                    name.to_string(),
                    fields.iter().map(|f| f.name().to_string()).collect(),
                ),
                _ => SourceColumn::Plain(name.to_string()),
            })
            .collect();
        Ok(Self {
            path: PathBuf::new(),
            format: FileFormat::Csv,
            lf,
            columns,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FileFormat {
        self.format
    }

    pub fn columns(&self) -> &[SourceColumn] {
        &self.columns
    }

    /// Names of the top-level columns that can be compared as text.
    pub fn plain_columns(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter_map(|c| match c {
                SourceColumn::Plain(name) => Some(name.clone()),
                SourceColumn::Struct(..) => None,
            })
            .collect()
    }

    /// Column schema for the grid. Struct columns become groups; flat names
    /// sharing a dotted prefix (`customer.name`, `customer.city`) are grouped
    /// under that prefix.
    pub fn schema(&self) -> ColumnSchema<Value> {
        let mut nodes: Vec<ColumnNode<Value>> = Vec::new();
        let mut group_index: Vec<(String, usize)> = Vec::new();
        for column in &self.columns {
            match column {
                SourceColumn::Struct(name, fields) => {
                    let children = fields
                        .iter()
                        .map(|f| ColumnNode::leaf(f.clone(), f.clone()))
                        .collect();
                    nodes.push(ColumnNode::group(name.clone(), name.clone(), children));
                }
                SourceColumn::Plain(name) => match name.split_once('.') {
                    Some((prefix, rest)) if !prefix.is_empty() && !rest.is_empty() => {
                        let leaf = ColumnNode::leaf(rest, rest);
                        match group_index.iter().find(|(p, _)| p == prefix) {
                            Some((_, idx)) => {
                                if let ColumnNode::Group(group) = &mut nodes[*idx] {
                                    group.columns.push(leaf);
                                }
                            }
                            None => {
                                group_index.push((prefix.to_string(), nodes.len()));
                                nodes.push(ColumnNode::group(prefix, prefix, vec![leaf]));
                            }
                        }
                    }
                    _ => nodes.push(ColumnNode::leaf(name.clone(), name.clone())),
                },
            }
        }
        ColumnSchema::new(nodes)
    }

    /// Frame with search, extra filters and sort applied.
    fn filtered(&self, filter: &Filter) -> LazyFrame {
        let mut lf = self.lf.clone();
        let plain = self.plain_columns();

        let search = filter.search.trim();
        if !search.is_empty() && !plain.is_empty() {
            let needle = search.to_string();
            let any = plain
                .iter()
                .map(|name| {
                    col(name.as_str())
                        .cast(DataType::String)
                        .str()
                        .contains_literal(lit(needle.clone()))
                        .fill_null(lit(false))
                })
                .reduce(|acc, e| acc.or(e));
            if let Some(expr) = any {
                lf = lf.filter(expr);
            }
        }

        for (key, value) in &filter.extra {
            if plain.iter().any(|name| name == key) {
                lf = lf.filter(
                    col(key.as_str())
                        .cast(DataType::String)
                        .eq(lit(value.clone()))
                        .fill_null(lit(false)),
                );
            } else {
                debug!(key = %key, "ignoring filter on unknown column");
            }
        }

        if filter.sort_order != SortOrder::None && plain.iter().any(|n| n == &filter.sort_by) {
            let options = SortMultipleOptions {
                descending: vec![filter.sort_order == SortOrder::Desc],
                nulls_last: vec![true],
                ..Default::default()
            };
            lf = lf.sort_by_exprs(vec![col(filter.sort_by.as_str())], options);
        }
        lf
    }

    fn count(lf: LazyFrame) -> Result<usize> {
        let df = lf.select([len()]).collect()?;
        let total = df
            .columns()
            .first()
            .and_then(|c| c.get(0).ok())
            .and_then(|v| v.extract::<u64>())
            .unwrap_or(0);
        Ok(total as usize)
    }

    /// One page (1-based) of rows matching `filter`, plus the matching total.
    pub fn fetch_page(&self, filter: &Filter, page: usize, limit: usize) -> Result<Page<Value>> {
        let lf = self.filtered(filter);
        let total = Self::count(lf.clone())?;
        let offset = page.saturating_sub(1).saturating_mul(limit);
        let df = lf.slice(offset as i64, limit as u32).collect()?;
        let rows = frame_to_rows(df)?;
        debug!(page, limit, total, rows = rows.len(), "fetched page");
        Ok(Page { rows, total })
    }

    /// Every row matching `filter`.
    pub fn fetch_all(&self, filter: &Filter) -> Result<Vec<Value>> {
        let df = self.filtered(filter).collect()?;
        frame_to_rows(df)
    }
}

fn decompress(path: &Path, compression: CompressionFormat) -> Result<Vec<u8>> {
    let file = BufReader::new(File::open(path)?);
    let mut reader: Box<dyn Read> = match compression {
        CompressionFormat::Gzip => Box::new(flate2::read::GzDecoder::new(file)),
        CompressionFormat::Zstd => Box::new(zstd::Decoder::new(file)?),
        CompressionFormat::Bzip2 => Box::new(bzip2::read::BzDecoder::new(file)),
        CompressionFormat::Xz => Box::new(xz2::read::XzDecoder::new(file)),
    };
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// Rows as JSON objects keyed by column name; struct columns become nested
/// objects.
pub fn frame_to_rows(mut df: DataFrame) -> Result<Vec<Value>> {
    if df.height() == 0 {
        return Ok(Vec::new());
    }
    let mut buf = Vec::new();
    JsonWriter::new(&mut buf)
        .with_json_format(JsonFormat::Json)
        .finish(&mut df)?;
    let rows: Vec<Value> = serde_json::from_slice(&buf)?;
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Record;
    use serde_json::json;

    fn source() -> DataSource {
        let df = df!(
            "name" => ["ann", "bob", "cid", "dee", "eve"],
            "amount" => [5i64, 3, 9, 1, 7],
            "customer.city" => ["Oslo", "Rome", "Oslo", "Lima", "Rome"],
            "customer.tier" => ["a", "b", "a", "b", "a"],
        )
        .unwrap();
        DataSource::from_dataframe(df).unwrap()
    }

    #[test]
    fn test_schema_groups_dotted_names() {
        let keys = source().schema().keys();
        assert_eq!(keys, vec!["name", "amount", "customer.city", "customer.tier"]);
        let schema = source().schema();
        assert!(matches!(&schema.nodes()[2], ColumnNode::Group(g) if g.key == "customer"));
    }

    #[test]
    fn test_page_slices_and_counts() {
        let page = source().fetch_page(&Filter::default(), 2, 2).unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.rows.len(), 2);
        assert_eq!(page.rows[0].value("name"), Some(json!("cid")));
    }

    #[test]
    fn test_search_matches_any_column() {
        let filter = Filter::default().with_search("Rome");
        let page = source().fetch_page(&filter, 1, 10).unwrap();
        assert_eq!(page.total, 2);
        let filter = Filter::default().with_search("9");
        let rows = source().fetch_all(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value("name"), Some(json!("cid")));
    }

    #[test]
    fn test_sort_and_extra_filter() {
        let mut filter = Filter::default();
        filter.sort_by = "amount".into();
        filter.sort_order = SortOrder::Desc;
        filter.extra.insert("customer.tier".into(), "a".into());
        let rows = source().fetch_all(&filter).unwrap();
        let names: Vec<_> = rows.iter().filter_map(|r| r.value("name")).collect();
        assert_eq!(names, vec![json!("cid"), json!("eve"), json!("ann")]);
    }

    #[test]
    fn test_page_past_the_end_is_empty() {
        let page = source().fetch_page(&Filter::default(), 9, 2).unwrap();
        assert!(page.rows.is_empty());
        assert_eq!(page.total, 5);
    }
}
