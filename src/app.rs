//! The bundled viewer: one [`GenericList`] over a [`DataSource`].

use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, MouseEvent};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

use crate::config::{AppConfig, ConfigManager, Theme};
use crate::export::ExportSource;
use crate::filter::FieldFilterPanel;
use crate::list::{centered_rect, GenericList, GridInput, ListEvent};
use crate::persistence::{FileStore, StorageKeys};
use crate::record::display_value;
use crate::source::DataSource;
use crate::FileFormat;

/// Number of leading text columns offered in the filter panel.
const FILTER_FIELDS: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    Key(KeyEvent),
    Mouse(MouseEvent),
    Open(PathBuf, Option<FileFormat>),
    /// Fetch the page the list's query points at.
    Query,
    Tick,
    Resize(u16, u16),
    Exit,
    Crash(String),
}

#[derive(Default)]
struct DebugState {
    enabled: bool,
    num_events: usize,
    num_frames: usize,
}

pub struct App {
    config: AppConfig,
    config_manager: ConfigManager,
    theme: Theme,
    view: String,
    source: Option<Arc<DataSource>>,
    list: Option<GenericList<Value>>,
    status: Option<String>,
    error: Option<String>,
    debug: DebugState,
}

impl App {
    pub fn new(
        config: AppConfig,
        config_manager: ConfigManager,
        view: impl Into<String>,
    ) -> Self {
        let theme = Theme::from_config(&config.theme).unwrap_or_default();
        Self {
            config,
            config_manager,
            theme,
            view: view.into(),
            source: None,
            list: None,
            status: None,
            error: None,
            debug: DebugState::default(),
        }
    }

    pub fn enable_debug(&mut self) {
        self.debug.enabled = true;
    }

    pub fn list(&self) -> Option<&GenericList<Value>> {
        self.list.as_ref()
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.debug.num_events += 1;
        match event {
            AppEvent::Open(path, format) => match self.open(path, *format) {
                Ok(()) => Some(AppEvent::Query),
                Err(e) => {
                    error!(path = %path.display(), error = %e, "failed to open data source");
                    self.error = Some(format!("Failed to open {}: {}", path.display(), e));
                    None
                }
            },
            AppEvent::Query => {
                self.query();
                None
            }
            AppEvent::Tick => {
                let list_event = self.list.as_mut()?.tick(Instant::now())?;
                self.list_event(list_event)
            }
            AppEvent::Key(key) => self.key(key),
            AppEvent::Mouse(mouse) => {
                let list = self.list.as_mut()?;
                let list_event = list.handle_event(&GridInput::Mouse(*mouse), Instant::now())?;
                self.list_event(list_event)
            }
            AppEvent::Resize(..) => None,
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    fn open(&mut self, path: &std::path::Path, format: Option<FileFormat>) -> Result<()> {
        let source = Arc::new(DataSource::open(path, format)?);
        let store = FileStore::new(&self.config_manager);
        let keys = StorageKeys::for_view(&self.view);

        let fetch_source = Arc::clone(&source);
        let mut filter_fields = source.plain_columns();
        filter_fields.truncate(FILTER_FIELDS);
        let list = GenericList::new(source.schema(), Box::new(store), keys, &self.config)
            .with_theme(self.theme.clone())
            .with_filter_panel(FieldFilterPanel::new(filter_fields).with_theme(&self.theme))
            .with_expandable(expand_row)
            .with_row_modal(row_details)
            .with_row_class(|row: &Value| {
                if has_nulls(row) {
                    Style::default().add_modifier(Modifier::DIM)
                } else {
                    Style::default()
                }
            })
            .with_export_source(ExportSource::All(Arc::new(move |filter| {
                fetch_source.fetch_all(filter)
            })));

        self.list = Some(list);
        self.source = Some(source);
        self.error = None;
        Ok(())
    }

    fn query(&mut self) {
        let (Some(source), Some(list)) = (self.source.as_ref(), self.list.as_mut()) else {
            return;
        };
        let query = list.query().clone();
        match source.fetch_page(&query.filter, query.page, query.limit) {
            Ok(page) => {
                debug!(page = query.page, total = page.total, "page loaded");
                list.set_data(page.rows, page.total);
                self.error = None;
            }
            Err(e) => {
                error!(error = %e, "query failed");
                self.error = Some(format!("Query failed: {}", e));
            }
        }
    }

    fn key(&mut self, key: &KeyEvent) -> Option<AppEvent> {
        if key.kind == KeyEventKind::Release {
            return None;
        }
        if self.error.is_some() && matches!(key.code, KeyCode::Esc | KeyCode::Enter) {
            self.error = None;
            return None;
        }
        let capturing = self
            .list
            .as_ref()
            .map(|l| l.is_capturing_keys())
            .unwrap_or(false);
        if !capturing && matches!(key.code, KeyCode::Char('q')) {
            if let Some(list) = self.list.as_mut() {
                list.teardown();
            }
            return Some(AppEvent::Exit);
        }
        let list = self.list.as_mut()?;
        let list_event = list.handle_event(&GridInput::Key(*key), Instant::now())?;
        self.list_event(list_event)
    }

    fn list_event(&mut self, event: ListEvent) -> Option<AppEvent> {
        let list = self.list.as_mut()?;
        match event {
            ListEvent::FilterChange(filter) => {
                debug!(?filter, "filter changed");
                let mut query = list.query().clone();
                query.filter = filter;
                query.page = 1;
                list.set_query(query);
                Some(AppEvent::Query)
            }
            ListEvent::PageChange(page) => {
                let mut query = list.query().clone();
                query.page = page;
                list.set_query(query);
                Some(AppEvent::Query)
            }
            ListEvent::RowClick(row) => {
                let number = list.query().offset() + row + 1;
                info!(row = number, "row clicked");
                self.status = Some(format!("Row {} selected", number));
                None
            }
            ListEvent::Exported { path, rows } => {
                self.status = Some(format!("Exported {} rows to {}", rows, path.display()));
                None
            }
        }
    }
}

fn expand_row(row: &Value) -> Text<'static> {
    let Some(obj) = row.as_object() else {
        return Text::raw(row.to_string());
    };
    let lines: Vec<Line<'static>> = obj
        .iter()
        .filter(|(_, v)| v.is_object())
        .flat_map(|(k, v)| {
            let mut lines = vec![Line::from(Span::styled(
                format!("{k}:"),
                Style::default().add_modifier(Modifier::BOLD),
            ))];
            if let Some(inner) = v.as_object() {
                lines.extend(inner.iter().map(|(ik, iv)| {
                    Line::from(format!(
                        "  {ik}: {}",
                        display_value(iv).unwrap_or_else(|| "-".to_string())
                    ))
                }));
            }
            lines
        })
        .collect();
    if lines.is_empty() {
        Text::from(
            obj.iter()
                .map(|(k, v)| {
                    Line::from(format!(
                        "{k}: {}",
                        display_value(v).unwrap_or_else(|| "-".to_string())
                    ))
                })
                .collect::<Vec<_>>(),
        )
    } else {
        Text::from(lines)
    }
}

fn row_details(row: &Value) -> Text<'static> {
    let pretty = serde_json::to_string_pretty(row).unwrap_or_else(|_| row.to_string());
    Text::from(pretty)
}

fn has_nulls(row: &Value) -> bool {
    row.as_object()
        .map(|obj| obj.values().any(Value::is_null))
        .unwrap_or(false)
}

impl Widget for &mut App {
    fn render(self, area: Rect, buf: &mut Buffer) {
        self.debug.num_frames += 1;
        Block::default()
            .style(Style::default().bg(self.theme.get("background")))
            .render(area, buf);

        let mut constraints = vec![Constraint::Fill(1)];
        if self.status.is_some() {
            constraints.push(Constraint::Length(1));
        }
        if self.debug.enabled {
            constraints.push(Constraint::Length(1));
        }
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(constraints)
            .split(area);

        match self.list.as_mut() {
            Some(list) => list.render(layout[0], buf),
            None if self.error.is_none() => Paragraph::new("Loading...")
                .centered()
                .render(layout[0], buf),
            None => {}
        }

        let mut next = 1;
        if let Some(status) = &self.status {
            Paragraph::new(status.as_str())
                .style(Style::default().fg(self.theme.get("text_secondary")))
                .render(layout[next], buf);
            next += 1;
        }
        if self.debug.enabled {
            let rows = self.list.as_ref().map(|l| l.total()).unwrap_or(0);
            Paragraph::new(format!(
                "events: {} frames: {} rows: {}",
                self.debug.num_events, self.debug.num_frames, rows
            ))
            .style(Style::default().fg(self.theme.get("dimmed")))
            .render(layout[next], buf);
        }

        if let Some(message) = &self.error {
            let popup = centered_rect(area, 60, 30);
            Clear.render(popup, buf);
            Paragraph::new(message.as_str())
                .wrap(Wrap { trim: true })
                .style(Style::default().fg(self.theme.get("error")))
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_type(BorderType::Rounded)
                        .border_style(Style::default().fg(self.theme.get("modal_border_error")))
                        .title(" Error ")
                        .title_bottom(" Esc to dismiss, q to quit "),
                )
                .render(popup, buf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;
    use serde_json::json;
    use tempfile::TempDir;

    fn app_with_csv(dir: &TempDir) -> App {
        let path = dir.path().join("people.csv");
        std::fs::write(
            &path,
            "name,amount,customer.city\nann,5,Oslo\nbob,3,Rome\ncid,9,Oslo\n",
        )
        .unwrap();
        let manager = ConfigManager::with_dir(dir.path().join("config"));
        let mut app = App::new(AppConfig::default(), manager, "people.csv");
        let next = app.event(&AppEvent::Open(path, None));
        assert_eq!(next, Some(AppEvent::Query));
        app.event(&AppEvent::Query);
        app
    }

    fn key(code: KeyCode) -> AppEvent {
        AppEvent::Key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn test_open_loads_first_page() {
        let dir = TempDir::new().unwrap();
        let app = app_with_csv(&dir);
        let list = app.list().unwrap();
        assert_eq!(list.total(), 3);
        assert_eq!(list.rows().len(), 3);
        assert_eq!(
            list.columns().all_columns().iter().map(|c| c.key.as_str()).collect::<Vec<_>>(),
            vec!["name", "amount", "customer.city"]
        );
    }

    #[test]
    fn test_sort_key_requeries_from_page_one() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_csv(&dir);
        assert_eq!(app.event(&key(KeyCode::Char('s'))), Some(AppEvent::Query));
        app.event(&AppEvent::Query);
        let first = app.list().unwrap().rows()[0].clone();
        assert_eq!(first.get("name"), Some(&json!("ann")));
        assert_eq!(app.list().unwrap().query().filter.sort_by, "name");
    }

    #[test]
    fn test_q_exits_unless_typing() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_csv(&dir);
        app.event(&key(KeyCode::Char('/')));
        assert_eq!(app.event(&key(KeyCode::Char('q'))), None);
        app.event(&key(KeyCode::Esc));
        app.event(&key(KeyCode::Esc));
        assert_eq!(app.event(&key(KeyCode::Char('q'))), Some(AppEvent::Exit));
    }

    #[test]
    fn test_missing_file_shows_error() {
        let dir = TempDir::new().unwrap();
        let manager = ConfigManager::with_dir(dir.path().to_path_buf());
        let mut app = App::new(AppConfig::default(), manager, "missing");
        let next = app.event(&AppEvent::Open(dir.path().join("missing.csv"), None));
        assert_eq!(next, None);
        assert!(app.error().unwrap().contains("missing.csv"));
        app.event(&key(KeyCode::Esc));
        assert!(app.error().is_none());
    }

    #[test]
    fn test_row_click_sets_status() {
        let dir = TempDir::new().unwrap();
        let mut app = app_with_csv(&dir);
        app.event(&key(KeyCode::Down));
        app.event(&key(KeyCode::Enter));
        assert_eq!(app.status(), Some("Row 2 selected"));
    }
}
