//! A customizable tabular list for terminal applications.
//!
//! [`GenericList`] renders rows of any [`Record`] type against a nested
//! column schema and lets the user reorder, hide, show and resize columns,
//! sort, search, filter, page and export. Column preferences persist per view
//! through a [`PreferenceStore`]. The caller owns data fetching and reacts to
//! the [`ListEvent`]s the list returns.

pub mod app;
pub mod boundary;
pub mod cache;
pub mod column;
pub mod columns;
pub mod config;
pub mod export;
pub mod export_modal;
pub mod filter;
pub mod gesture;
pub mod layout;
pub mod list;
pub mod logging;
pub mod persistence;
pub mod record;
pub mod search;
pub mod sort;
pub mod source;
pub mod ui_mode;
pub mod widgets;

pub use app::{App, AppEvent};
pub use cache::CacheManager;
pub use column::{flatten, ColumnNode, ColumnSchema, FlatColumn};
pub use columns::ColumnManager;
pub use config::{AppConfig, ColorParser, ConfigManager, Theme};
pub use export::{ExportColumns, ExportFormat, ExportSource, Page, RowScope};
pub use filter::{FieldFilterPanel, FilterPanel};
pub use gridlist_cli::{Args, CompressionFormat, FileFormat};
pub use list::{GenericList, GridInput, ListEvent};
pub use persistence::{FileStore, MemoryStore, PreferenceStore, StorageKeys};
pub use record::Record;
pub use sort::{Filter, ListQuery, SortOrder};
pub use source::DataSource;

/// Application name used for the config and cache directories.
pub const APP_NAME: &str = "gridlist";
