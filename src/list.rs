//! `GenericList`: the tabular list widget.
//!
//! The list owns column management, gestures, search debounce and overlay
//! state. The caller owns the data and the query: it feeds rows in with
//! [`GenericList::set_data`] and the current query with
//! [`GenericList::set_query`], and reacts to the [`ListEvent`]s returned by
//! [`GenericList::handle_event`] and [`GenericList::tick`].

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::boundary::{catch_render, FallbackPanel, RenderFailure};
use crate::column::{ColumnSchema, FlatColumn};
use crate::columns::ColumnManager;
use crate::config::{AppConfig, Theme};
use crate::export::{materialize_rows, write_export, ExportColumns, ExportSource, ExportTable};
use crate::export_modal::{ExportModal, ExportModalEvent, ExportRequest};
use crate::filter::{FilterContext, FilterPanel};
use crate::gesture::{GestureController, GestureOutcome};
use crate::layout::{cell_spans, ColumnGeometry, HeaderCell};
use crate::persistence::{PreferenceStore, Preferences, StorageKeys};
use crate::record::{display_value, Record};
use crate::search::SearchController;
use crate::sort::{next_sort, Filter, ListQuery, UNSORTABLE_KEYS};
use crate::ui_mode::UiMode;
use crate::widgets::controls::{Controls, CUSTOMIZE_HINTS, NORMAL_HINTS};
use crate::widgets::export::render_export_modal;
use crate::widgets::text_input::{TextInput, TextInputEvent};

/// Expansion sub-row content for a row.
pub type ExpandFn<T> = Arc<dyn Fn(&T) -> Text<'static> + Send + Sync>;
/// Row modal body for a row.
pub type RowModalFn<T> = Arc<dyn Fn(&T) -> Text<'static> + Send + Sync>;
/// Extra style patched onto a whole row.
pub type RowClassFn<T> = Arc<dyn Fn(&T) -> Style + Send + Sync>;

const SEARCH_LABEL: &str = "Search: ";
const SEARCH_MAX_WIDTH: u16 = 48;

/// Terminal input routed to the list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridInput {
    Key(KeyEvent),
    Mouse(MouseEvent),
}

impl GridInput {
    pub fn from_event(event: &Event) -> Option<Self> {
        match event {
            Event::Key(key) => Some(Self::Key(*key)),
            Event::Mouse(mouse) => Some(Self::Mouse(*mouse)),
            _ => None,
        }
    }
}

/// Notifications for the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum ListEvent {
    /// Search, sort or filter panel produced a new filter.
    FilterChange(Filter),
    /// 1-based page requested.
    PageChange(usize),
    /// Row index on the current page.
    RowClick(usize),
    Exported { path: PathBuf, rows: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    Grid,
    Search,
    Filters,
}

/// One rendered column for the current frame.
struct ColumnSlot<T> {
    column: FlatColumn<T>,
    /// Offset from the grid's left edge, in cells.
    x: u16,
    width: u16,
    hidden: bool,
    position: usize,
}

pub struct GenericList<T> {
    columns: ColumnManager<T>,
    gestures: GestureController,
    search: SearchController,
    search_input: TextInput,
    ui: UiMode,
    focus: Focus,
    geometry: ColumnGeometry,
    theme: Theme,
    units_per_cell: u32,
    resize_step: u32,
    row_numbers: bool,
    query: ListQuery,
    rows: Vec<T>,
    total: usize,
    focused_column: usize,
    h_offset: usize,
    v_offset: usize,
    unsortable: BTreeSet<String>,
    filter_panel: Option<Box<dyn FilterPanel>>,
    expandable: Option<ExpandFn<T>>,
    row_modal: Option<RowModalFn<T>>,
    row_class: Option<RowClassFn<T>>,
    export_source: Option<ExportSource<T>>,
    export_modal: ExportModal,
    export_name: String,
    failure: Option<RenderFailure>,
}

impl<T: Record + Clone> GenericList<T> {
    pub fn new(
        schema: ColumnSchema<T>,
        store: Box<dyn PreferenceStore>,
        keys: StorageKeys,
        config: &AppConfig,
    ) -> Self {
        let theme = Theme::from_config(&config.theme).unwrap_or_else(|e| {
            warn!(error = %e, "invalid theme, using defaults");
            Theme::default()
        });
        let export_name = keys
            .order
            .split('.')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("export")
            .to_string();
        let grid = &config.grid;
        let columns = ColumnManager::with_widths(
            schema,
            Preferences::new(store, keys),
            grid.column_width,
            grid.min_column_width,
        );
        let gestures =
            GestureController::new(grid.drag_threshold, grid.units_per_cell, columns.min_width());
        Self {
            columns,
            gestures,
            search: SearchController::new(Duration::from_millis(config.search.debounce_ms)),
            search_input: TextInput::new().with_theme(&theme),
            ui: UiMode::new(),
            focus: Focus::Grid,
            geometry: ColumnGeometry::default(),
            units_per_cell: grid.units_per_cell.max(1),
            resize_step: grid.resize_step.max(1),
            row_numbers: config.display.row_numbers,
            query: ListQuery::new(config.display.page_size),
            rows: Vec::new(),
            total: 0,
            focused_column: 0,
            h_offset: 0,
            v_offset: 0,
            unsortable: UNSORTABLE_KEYS.iter().map(|k| k.to_string()).collect(),
            filter_panel: None,
            expandable: None,
            row_modal: None,
            row_class: None,
            export_source: None,
            export_modal: ExportModal::new(),
            export_name,
            failure: None,
            theme,
        }
    }

    pub fn with_theme(mut self, theme: Theme) -> Self {
        self.search_input = TextInput::new()
            .with_theme(&theme)
            .with_value(self.search.local_value());
        self.theme = theme;
        self
    }

    pub fn with_filter_panel(mut self, panel: impl FilterPanel + 'static) -> Self {
        self.filter_panel = Some(Box::new(panel));
        self
    }

    pub fn with_expandable<F>(mut self, render: F) -> Self
    where
        F: Fn(&T) -> Text<'static> + Send + Sync + 'static,
    {
        self.expandable = Some(Arc::new(render));
        self
    }

    pub fn with_row_modal<F>(mut self, render: F) -> Self
    where
        F: Fn(&T) -> Text<'static> + Send + Sync + 'static,
    {
        self.row_modal = Some(Arc::new(render));
        self
    }

    pub fn with_row_class<F>(mut self, class: F) -> Self
    where
        F: Fn(&T) -> Style + Send + Sync + 'static,
    {
        self.row_class = Some(Arc::new(class));
        self
    }

    pub fn with_export_source(mut self, source: ExportSource<T>) -> Self {
        self.export_source = Some(source);
        self
    }

    /// Replace the default deny-list of keys that never offer sorting.
    pub fn with_unsortable_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unsortable = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Replace the current page of rows.
    pub fn set_data(&mut self, rows: Vec<T>, total: usize) {
        self.rows = rows;
        self.total = total;
        self.ui.expanded_row = None;
        self.ui.modal_row = None;
        self.ui.selected_row = match self.ui.selected_row {
            _ if self.rows.is_empty() => None,
            Some(row) => Some(row.min(self.rows.len() - 1)),
            None => Some(0),
        };
        self.v_offset = 0;
    }

    /// Follow the caller's query. An out-of-band search change replaces the
    /// text in the search box.
    pub fn set_query(&mut self, query: ListQuery) {
        self.search.sync_external(&query.filter.search);
        if self.search_input.value() != self.search.local_value() {
            self.search_input.set_value(self.search.local_value());
        }
        self.query = query;
    }

    pub fn set_schema(&mut self, schema: ColumnSchema<T>) {
        self.columns.set_schema(schema);
    }

    pub fn query(&self) -> &ListQuery {
        &self.query
    }

    pub fn rows(&self) -> &[T] {
        &self.rows
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn columns(&self) -> &ColumnManager<T> {
        &self.columns
    }

    pub fn columns_mut(&mut self) -> &mut ColumnManager<T> {
        &mut self.columns
    }

    pub fn ui(&self) -> &UiMode {
        &self.ui
    }

    pub fn focus(&self) -> Focus {
        self.focus
    }

    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub fn gestures(&self) -> &GestureController {
        &self.gestures
    }

    pub fn geometry(&self) -> &ColumnGeometry {
        &self.geometry
    }

    pub fn failure(&self) -> Option<&RenderFailure> {
        self.failure.as_ref()
    }

    /// Key of the column under the keyboard cursor.
    pub fn focused_column(&self) -> Option<String> {
        self.display_keys().get(self.focused_column).cloned()
    }

    /// True when the list wants every keystroke, e.g. while typing a search.
    pub fn is_capturing_keys(&self) -> bool {
        self.focus != Focus::Grid || self.ui.show_export || self.ui.modal_row.is_some()
    }

    /// Cancel the pending search; nothing fires afterwards.
    pub fn teardown(&mut self) {
        self.search.teardown();
        self.gestures.cancel();
    }

    /// Emit the debounced search once its deadline passes.
    pub fn tick(&mut self, now: Instant) -> Option<ListEvent> {
        self.search
            .poll(now, &self.query.filter)
            .map(ListEvent::FilterChange)
    }

    pub fn handle_event(&mut self, input: &GridInput, now: Instant) -> Option<ListEvent> {
        match input {
            GridInput::Key(key) if key.kind != KeyEventKind::Release => self.handle_key(key, now),
            GridInput::Key(_) => None,
            GridInput::Mouse(mouse) => self.handle_mouse(mouse),
        }
    }

    fn is_sortable(&self, key: &str) -> bool {
        !self.unsortable.contains(key)
    }

    fn display_keys(&self) -> Vec<String> {
        self.columns
            .ordered_columns(self.ui.show_controls, self.ui.show_unselected)
            .into_iter()
            .map(|c| c.key.clone())
            .collect()
    }

    fn page_count(&self) -> usize {
        self.query.page_count(self.total)
    }

    fn sort_click(&self, key: &str) -> Option<ListEvent> {
        if !self.is_sortable(key) {
            return None;
        }
        let filter = next_sort(&self.query.filter, key);
        debug!(key, order = filter.sort_order.as_str(), "sort");
        Some(ListEvent::FilterChange(filter))
    }

    fn row_click(&mut self, row: usize) -> Option<ListEvent> {
        if row >= self.rows.len() || !self.ui.row_click(row) {
            return None;
        }
        if self.row_modal.is_some() {
            self.ui.open_row_modal(row);
        }
        Some(ListEvent::RowClick(row))
    }

    fn toggle_filters(&mut self) {
        if self.filter_panel.is_none() {
            return;
        }
        self.ui.toggle_filters();
        if self.ui.show_filters {
            if let Some(panel) = self.filter_panel.as_mut() {
                panel.open(&self.query.filter);
            }
            self.focus = Focus::Filters;
        } else if self.focus == Focus::Filters {
            self.focus = Focus::Grid;
        }
    }

    fn toggle_controls(&mut self) {
        self.gestures.cancel();
        self.ui.toggle_controls();
        if self.focus == Focus::Filters {
            self.focus = Focus::Grid;
        }
        self.clamp_focused_column();
    }

    fn open_export(&mut self) {
        let default_path = format!("{}.csv", self.export_name);
        self.export_modal.open(&self.theme, &default_path);
        self.ui.open_export();
    }

    fn close_export(&mut self) {
        self.export_modal.close();
        self.ui.close_export();
    }

    fn clamp_focused_column(&mut self) {
        let len = self.display_keys().len();
        self.focused_column = self.focused_column.min(len.saturating_sub(1));
    }

    fn move_selection(&mut self, delta: isize) {
        if self.rows.is_empty() {
            return;
        }
        let last = self.rows.len() - 1;
        let current = self.ui.selected_row.unwrap_or(0) as isize;
        let next = (current + delta).clamp(0, last as isize) as usize;
        self.ui.select_row(Some(next));
    }

    fn change_page(&self, page: usize) -> Option<ListEvent> {
        let page = page.clamp(1, self.page_count());
        (page != self.query.page).then_some(ListEvent::PageChange(page))
    }

    fn resize_focused(&mut self, grow: bool) {
        if let Some(key) = self.focused_column() {
            let width = self.columns.column_width(&key);
            let width = if grow {
                width.saturating_add(self.resize_step)
            } else {
                width.saturating_sub(self.resize_step)
            };
            self.columns.set_column_width(&key, width);
        }
    }

    /// Keyboard reorder: move the focused column one place in display order.
    fn shift_focused(&mut self, right: bool) {
        let keys = self.display_keys();
        let from = self.focused_column;
        let to = if right {
            from + 1
        } else {
            match from.checked_sub(1) {
                Some(to) => to,
                None => return,
            }
        };
        if let (Some(active), Some(over)) = (keys.get(from), keys.get(to)) {
            if self.columns.move_column(active, over) {
                self.focused_column = to;
            }
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, now: Instant) -> Option<ListEvent> {
        if self.failure.is_some() {
            if matches!(key.code, KeyCode::Char('r')) {
                info!("reloading grid after render failure");
                self.failure = None;
                self.gestures.cancel();
                self.geometry.clear();
            }
            return None;
        }
        if self.ui.show_export {
            return self.handle_export_key(key);
        }
        if self.ui.modal_row.is_some() {
            if matches!(
                key.code,
                KeyCode::Esc | KeyCode::Enter | KeyCode::Char('q')
            ) {
                self.ui.close_row_modal();
            }
            return None;
        }
        match self.focus {
            Focus::Search => return self.handle_search_key(key, now),
            Focus::Filters => return self.handle_filter_key(key),
            Focus::Grid => {}
        }

        if key.code == KeyCode::Esc && self.gestures.is_capturing() {
            self.gestures.cancel();
            return None;
        }

        // Shared by both modes
        match key.code {
            KeyCode::Char('/') => {
                self.focus = Focus::Search;
                return None;
            }
            KeyCode::Char('c') => {
                self.toggle_controls();
                return None;
            }
            KeyCode::Char('f') => {
                self.toggle_filters();
                return None;
            }
            KeyCode::Char('x') => {
                self.open_export();
                return None;
            }
            KeyCode::Left | KeyCode::Char('[') if !key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.focused_column = self.focused_column.saturating_sub(1);
                return None;
            }
            KeyCode::Right | KeyCode::Char(']') if !key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.focused_column += 1;
                self.clamp_focused_column();
                return None;
            }
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_selection(-1);
                return None;
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_selection(1);
                return None;
            }
            KeyCode::Char('n') | KeyCode::PageDown => {
                return self.change_page(self.query.page + 1);
            }
            KeyCode::Char('p') | KeyCode::PageUp => {
                return self.change_page(self.query.page.saturating_sub(1));
            }
            KeyCode::Home => return self.change_page(1),
            KeyCode::End => return self.change_page(self.page_count()),
            _ => {}
        }

        if self.ui.show_controls {
            self.handle_customize_key(key);
            return None;
        }

        match key.code {
            KeyCode::Esc if self.ui.show_filters => {
                self.toggle_filters();
                None
            }
            KeyCode::Enter => {
                let row = self.ui.selected_row?;
                self.row_click(row)
            }
            KeyCode::Char(' ') | KeyCode::Char('e') if self.expandable.is_some() => {
                if let Some(row) = self.ui.selected_row {
                    self.ui.toggle_expanded(row);
                }
                None
            }
            KeyCode::Char('s') => self.focused_column().and_then(|key| self.sort_click(&key)),
            KeyCode::Char('>') | KeyCode::Char('+') => {
                self.resize_focused(true);
                None
            }
            KeyCode::Char('<') | KeyCode::Char('-') => {
                self.resize_focused(false);
                None
            }
            _ => None,
        }
    }

    fn handle_customize_key(&mut self, key: &KeyEvent) {
        match key.code {
            KeyCode::Left if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.shift_focused(false)
            }
            KeyCode::Right if key.modifiers.contains(KeyModifiers::SHIFT) => {
                self.shift_focused(true)
            }
            KeyCode::Char(' ') => {
                if let Some(key) = self.focused_column() {
                    let visible = self.columns.is_visible(&key);
                    self.columns.toggle_column(&key, !visible);
                }
            }
            KeyCode::Char('a') => self.columns.show_all_columns(),
            KeyCode::Char('A') => self.columns.hide_all_columns(),
            KeyCode::Char('u') => self.ui.toggle_show_unselected(),
            KeyCode::Char('R') => self.columns.reset(),
            KeyCode::Esc => self.toggle_controls(),
            _ => {}
        }
        self.clamp_focused_column();
    }

    fn clear_search(&mut self) -> Option<ListEvent> {
        self.search_input.clear();
        Some(ListEvent::FilterChange(self.search.clear(&self.query.filter)))
    }

    fn handle_search_key(&mut self, key: &KeyEvent, now: Instant) -> Option<ListEvent> {
        self.search_input.set_focused(true);
        match self.search_input.handle_key(key) {
            TextInputEvent::Changed => {
                self.search.input(self.search_input.value(), now);
                None
            }
            TextInputEvent::Cancel if !self.search_input.is_empty() => self.clear_search(),
            TextInputEvent::Cancel | TextInputEvent::Submit => {
                self.focus = Focus::Grid;
                self.search_input.set_focused(false);
                None
            }
            TextInputEvent::None => None,
        }
    }

    fn handle_filter_key(&mut self, key: &KeyEvent) -> Option<ListEvent> {
        if key.code == KeyCode::Esc {
            self.toggle_filters();
            return None;
        }
        let panel = self.filter_panel.as_mut()?;
        panel
            .handle_key(key, &self.query.filter)
            .map(ListEvent::FilterChange)
    }

    fn handle_export_key(&mut self, key: &KeyEvent) -> Option<ListEvent> {
        match self.export_modal.handle_key(key) {
            ExportModalEvent::None => None,
            ExportModalEvent::Cancel => {
                self.close_export();
                None
            }
            ExportModalEvent::Submit(request) => match self.run_export(&request) {
                Ok((path, rows)) => {
                    self.close_export();
                    Some(ListEvent::Exported { path, rows })
                }
                Err(e) => {
                    warn!(error = %e, "export failed");
                    self.export_modal.set_error(e.to_string());
                    None
                }
            },
        }
    }

    /// Materialize the requested rows and write them out.
    pub fn run_export(&self, request: &ExportRequest) -> color_eyre::Result<(PathBuf, usize)> {
        let columns: Vec<&FlatColumn<T>> = match request.columns {
            ExportColumns::Visible => self.columns.ordered_columns(false, false),
            ExportColumns::All => self.columns.all_columns().iter().collect(),
        };
        let rows = materialize_rows(
            self.export_source.as_ref(),
            request.rows,
            &self.query.filter,
            &self.rows,
        )?;
        let table = ExportTable::build(&rows, &columns);
        let path = write_export(&table, &request.path, request.format, &request.options)?;
        Ok((path, rows.len()))
    }

    fn handle_mouse(&mut self, mouse: &MouseEvent) -> Option<ListEvent> {
        if self.failure.is_some() || self.ui.show_export {
            return None;
        }
        let (x, y) = (mouse.column, mouse.row);
        if self.ui.modal_row.is_some() {
            if matches!(mouse.kind, MouseEventKind::Down(MouseButton::Left)) {
                self.ui.close_row_modal();
            }
            return None;
        }
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => self.pointer_down(x, y),
            // Only routed while a gesture owns the pointer
            MouseEventKind::Drag(MouseButton::Left) if self.gestures.is_capturing() => {
                let over = self.geometry.header_at(x, y).map(|c| c.key.clone());
                if let Some(GestureOutcome::Resize { key, width }) =
                    self.gestures.pointer_move(x, over.as_deref())
                {
                    self.columns.set_column_width(&key, width);
                }
                None
            }
            MouseEventKind::Up(MouseButton::Left) if self.gestures.is_capturing() => {
                let over = self.geometry.header_at(x, y).map(|c| c.key.clone());
                let outcome = self.gestures.pointer_up(x, over.as_deref());
                self.apply_outcome(outcome)
            }
            MouseEventKind::ScrollDown if self.geometry.body.contains((x, y).into()) => {
                self.move_selection(1);
                None
            }
            MouseEventKind::ScrollUp if self.geometry.body.contains((x, y).into()) => {
                self.move_selection(-1);
                None
            }
            _ => None,
        }
    }

    fn pointer_down(&mut self, x: u16, y: u16) -> Option<ListEvent> {
        if self.geometry.in_search(x, y) {
            if x + 1 == self.geometry.search.right() && !self.search_input.is_empty() {
                return self.clear_search();
            }
            self.focus = Focus::Search;
            return None;
        }
        if self.focus == Focus::Search {
            self.focus = Focus::Grid;
            self.search_input.set_focused(false);
        }
        if !self.ui.show_controls {
            if let Some(cell) = self.geometry.resize_handle_at(x, y).cloned() {
                let width = self.columns.column_width(&cell.key);
                self.gestures.press_resize_handle(&cell.key, width, x);
                return None;
            }
        }
        if let Some(cell) = self.geometry.header_at(x, y).cloned() {
            self.focus_key(&cell.key);
            self.gestures.press_header(&cell.key, x);
            return None;
        }
        let row = self.geometry.row_at(x, y)?;
        if self.expandable.is_some() && x < self.geometry.body.x + self.gutter_width() {
            self.ui.toggle_expanded(row);
            return None;
        }
        self.row_click(row)
    }

    fn focus_key(&mut self, key: &str) {
        if let Some(pos) = self.display_keys().iter().position(|k| k == key) {
            self.focused_column = pos;
        }
    }

    fn apply_outcome(&mut self, outcome: Option<GestureOutcome>) -> Option<ListEvent> {
        match outcome? {
            GestureOutcome::Click(key) if self.ui.show_controls => {
                let visible = self.columns.is_visible(&key);
                self.columns.toggle_column(&key, !visible);
                self.clamp_focused_column();
                None
            }
            GestureOutcome::Click(key) => self.sort_click(&key),
            GestureOutcome::Reorder { active, over } if self.ui.show_controls => {
                if self.columns.move_column(&active, &over) {
                    self.focus_key(&active);
                }
                None
            }
            GestureOutcome::Reorder { .. } => None,
            GestureOutcome::Resize { key, width } => {
                self.columns.set_column_width(&key, width);
                None
            }
        }
    }

    fn gutter_width(&self) -> u16 {
        let mut width = 0;
        if self.expandable.is_some() {
            width += 2;
        }
        if self.row_numbers {
            let last = self.query.offset() + self.rows.len().max(1);
            width += last.to_string().len() as u16 + 1;
        }
        width
    }

    /// Widths, auto-fill and horizontal scroll for this frame.
    fn layout_columns(&mut self, width: u16) -> Vec<ColumnSlot<T>> {
        let gutter = self.gutter_width();
        let available = width.saturating_sub(gutter);
        let keys = self.display_keys();
        if keys.is_empty() || available == 0 {
            return Vec::new();
        }
        self.focused_column = self.focused_column.min(keys.len() - 1);

        let key_refs: Vec<&str> = keys.iter().map(String::as_str).collect();
        let widths = self
            .columns
            .auto_fill(&key_refs, available as u32 * self.units_per_cell);
        let spans = cell_spans(&widths, self.units_per_cell);

        let end = |i: usize| spans[i].0 + spans[i].1;
        self.h_offset = self.h_offset.min(self.focused_column);
        while self.h_offset < self.focused_column
            && end(self.focused_column) - spans[self.h_offset].0 > available
        {
            self.h_offset += 1;
        }
        let origin = spans[self.h_offset].0;

        let mut slots = Vec::new();
        for (position, key) in keys.iter().enumerate().skip(self.h_offset) {
            let start = spans[position].0 - origin;
            if start >= available {
                break;
            }
            let Some(column) = self.columns.all_columns().iter().find(|c| &c.key == key) else {
                continue;
            };
            slots.push(ColumnSlot {
                column: column.clone(),
                x: gutter + start,
                width: spans[position].1.min(available - start),
                hidden: !self.columns.is_visible(key),
                position,
            });
        }
        slots
    }

    fn render_grid(&mut self, area: Rect, buf: &mut Buffer) {
        self.geometry.clear();
        let panel_height = match (&self.filter_panel, self.ui.show_filters) {
            (Some(panel), true) => panel.height(),
            _ => 0,
        };
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),            // Toolbar
                Constraint::Length(panel_height), // Filter panel
                Constraint::Length(1),            // Header
                Constraint::Min(0),               // Body
                Constraint::Length(1),            // Footer
            ])
            .split(area);

        self.render_toolbar(chunks[0], buf);
        if let (Some(panel), true) = (&self.filter_panel, panel_height > 0) {
            let ctx = FilterContext {
                filter: &self.query.filter,
                theme: &self.theme,
            };
            panel.render(&ctx, chunks[1], buf);
        }
        let slots = self.layout_columns(chunks[2].width);
        self.render_header(chunks[2], &slots, buf);
        self.render_body(chunks[3], &slots, buf);
        self.render_footer(chunks[4], buf);

        if let Some(row) = self.ui.modal_row {
            self.render_row_modal(area, row, buf);
        }
        if self.ui.show_export {
            render_export_modal(centered_rect(area, 80, 70), buf, &self.export_modal, &self.theme);
        }
    }

    fn render_toolbar(&mut self, area: Rect, buf: &mut Buffer) {
        let search_width = SEARCH_MAX_WIDTH.min(area.width / 2).max(SEARCH_LABEL.len() as u16 + 4);
        let search_area = Rect {
            width: search_width.min(area.width),
            ..area
        };
        self.geometry.search = search_area;

        let focused = self.focus == Focus::Search;
        let label_style = if focused {
            Style::default()
                .fg(self.theme.get("modal_border_active"))
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(self.theme.get("text_secondary"))
        };
        Paragraph::new(SEARCH_LABEL)
            .style(label_style)
            .render(search_area, buf);
        let label_width = SEARCH_LABEL.len() as u16;
        let input_area = Rect {
            x: search_area.x + label_width,
            width: search_area.width.saturating_sub(label_width + 2),
            ..search_area
        };
        self.search_input.set_focused(focused);
        (&self.search_input).render(input_area, buf);
        if !self.search_input.is_empty() && search_area.width > 0 {
            buf[(search_area.right() - 1, search_area.y)]
                .set_symbol("✕")
                .set_style(Style::default().fg(self.theme.get("dimmed")));
        }

        let mut badges: Vec<Span> = Vec::new();
        if self.search.is_loading() {
            badges.push(Span::styled(
                " searching… ",
                Style::default().fg(self.theme.get("warning")),
            ));
        }
        let badge = |label: String| {
            Span::styled(
                format!(" {label} "),
                Style::default()
                    .fg(self.theme.get("text_inverse"))
                    .bg(self.theme.get("primary")),
            )
        };
        if self.ui.show_controls {
            badges.push(badge("CUSTOMIZE".to_string()));
            badges.push(Span::raw(" "));
        }
        if self.ui.show_filters {
            badges.push(badge("FILTERS".to_string()));
            badges.push(Span::raw(" "));
        }
        let filter = &self.query.filter;
        if !filter.extra.is_empty() {
            badges.push(badge(format!("{} filter(s)", filter.extra.len())));
            badges.push(Span::raw(" "));
        }
        if !filter.sort_by.is_empty() {
            let label = self
                .columns
                .all_columns()
                .iter()
                .find(|c| c.key == filter.sort_by)
                .map(|c| c.label.as_str())
                .unwrap_or(filter.sort_by.as_str());
            badges.push(Span::styled(
                format!("sorted by {}{}", label, filter.sort_order.indicator()),
                Style::default().fg(self.theme.get("secondary")),
            ));
        }
        let rest = Rect {
            x: search_area.right() + 1,
            width: area.width.saturating_sub(search_area.width + 1),
            ..area
        };
        Paragraph::new(Line::from(badges)).render(rest, buf);
    }

    fn render_header(&mut self, area: Rect, slots: &[ColumnSlot<T>], buf: &mut Buffer) {
        let header_style = Style::default()
            .fg(self.theme.get("table_header"))
            .add_modifier(Modifier::BOLD);
        buf.set_style(area, header_style);
        let customizing = self.ui.show_controls;
        let border = self.theme.get("table_border");

        for slot in slots {
            let key = slot.column.key.as_str();
            let cell = Rect {
                x: area.x + slot.x,
                width: slot.width,
                ..area
            };
            self.geometry.header.push(HeaderCell {
                key: key.to_string(),
                area: cell,
                hidden: slot.hidden,
            });

            let mut style = header_style;
            if slot.hidden {
                style = style
                    .fg(self.theme.get("dimmed"))
                    .remove_modifier(Modifier::BOLD);
            }
            if slot.position == self.focused_column {
                style = style.add_modifier(Modifier::UNDERLINED);
            }
            if customizing {
                if self.gestures.active_id() == Some(key) {
                    style = style.add_modifier(Modifier::REVERSED);
                } else if self.gestures.over_id() == Some(key) {
                    style = style.bg(self.theme.get("drag_target"));
                }
            }

            let mut spans = Vec::new();
            if customizing {
                spans.push(Span::raw(if slot.hidden { "☐ " } else { "☑ " }));
            }
            spans.push(Span::raw(slot.column.label.clone()));
            if !customizing && self.is_sortable(key) {
                spans.push(Span::raw(
                    self.query.filter.sort_order_for(key).indicator(),
                ));
            }
            Line::from(spans).style(style).render(
                Rect {
                    width: cell.width.saturating_sub(1),
                    ..cell
                },
                buf,
            );

            if !customizing && cell.width > 0 {
                let handle = if self.gestures.resizing_key() == Some(key) {
                    self.theme.get("primary")
                } else {
                    border
                };
                buf[(cell.right() - 1, cell.y)]
                    .set_symbol("│")
                    .set_style(Style::default().fg(handle));
            }
        }
    }

    fn render_body(&mut self, area: Rect, slots: &[ColumnSlot<T>], buf: &mut Buffer) {
        self.geometry.body = area;
        if self.rows.is_empty() {
            Paragraph::new("No records")
                .style(Style::default().fg(self.theme.get("dimmed")))
                .centered()
                .render(area, buf);
            return;
        }
        if slots.is_empty() {
            Paragraph::new("No columns selected. Press c to customize.")
                .style(Style::default().fg(self.theme.get("dimmed")))
                .centered()
                .render(area, buf);
            return;
        }

        if let Some(selected) = self.ui.selected_row {
            let height = area.height as usize;
            if selected < self.v_offset {
                self.v_offset = selected;
            } else if height > 0 && selected >= self.v_offset + height {
                self.v_offset = selected + 1 - height;
            }
        }

        let text_primary = self.theme.get("text_primary");
        let selected_bg = self.theme.get("table_selected");
        let dimmed = self.theme.get("dimmed");
        let mut y = area.y;
        for (index, row) in self.rows.iter().enumerate().skip(self.v_offset) {
            if y >= area.bottom() {
                break;
            }
            let line_area = Rect {
                y,
                height: 1,
                ..area
            };
            let mut style = Style::default().fg(text_primary);
            if let Some(class) = &self.row_class {
                style = style.patch(class(row));
            }
            if self.ui.selected_row == Some(index) {
                style = style.bg(selected_bg);
            }
            buf.set_style(line_area, style);

            let mut gutter_x = area.x;
            if self.expandable.is_some() {
                let marker = if self.ui.expanded_row == Some(index) {
                    "▾"
                } else {
                    "▸"
                };
                buf.set_string(gutter_x, y, marker, Style::default().fg(dimmed));
                gutter_x += 2;
            }
            if self.row_numbers {
                let number = (self.query.offset() + index + 1).to_string();
                buf.set_string(gutter_x, y, number, Style::default().fg(dimmed));
            }

            for slot in slots {
                let value = row.value(&slot.column.key);
                let mut line = match &slot.column.render {
                    Some(render) => render(value.as_ref(), row),
                    None => Line::raw(value.as_ref().and_then(display_value).unwrap_or_default()),
                };
                if slot.hidden {
                    line = line.style(Style::default().fg(dimmed));
                }
                line.render(
                    Rect {
                        x: area.x + slot.x,
                        y,
                        width: slot.width.saturating_sub(1),
                        height: 1,
                    },
                    buf,
                );
            }
            self.geometry.rows.push((y, index));
            y += 1;

            if self.ui.expanded_row == Some(index) {
                if let Some(expand) = &self.expandable {
                    let indent = self.gutter_width();
                    for line in expand(row).lines {
                        if y >= area.bottom() {
                            break;
                        }
                        line.render(
                            Rect {
                                x: area.x + indent,
                                y,
                                width: area.width.saturating_sub(indent),
                                height: 1,
                            },
                            buf,
                        );
                        self.geometry.rows.push((y, index));
                        y += 1;
                    }
                }
            }
        }
    }

    fn render_footer(&self, area: Rect, buf: &mut Buffer) {
        let status = format!(
            "Page {}/{} · {} rows",
            self.query.page,
            self.page_count(),
            self.total
        );
        let hints: &[(&str, &str)] = if self.ui.show_controls {
            &CUSTOMIZE_HINTS
        } else {
            &NORMAL_HINTS
        };
        let mut controls = Controls::new(hints)
            .with_status(status)
            .with_bar_color(self.theme.get("controls_bg"))
            .with_dimmed(self.is_capturing_keys());
        if !self.query.filter.search.is_empty() {
            controls = controls.with_highlight("Search", self.theme.get("primary"));
        }
        (&controls).render(area, buf);
    }

    fn render_row_modal(&self, area: Rect, row: usize, buf: &mut Buffer) {
        let (Some(render), Some(data)) = (&self.row_modal, self.rows.get(row)) else {
            return;
        };
        let modal_area = centered_rect(area, 70, 60);
        Clear.render(modal_area, buf);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(self.theme.get("modal_border_active")))
            .title(format!(" Row {} ", self.query.offset() + row + 1))
            .title_bottom(Line::from(" Esc to close ").right_aligned());
        Paragraph::new(render(data))
            .block(block)
            .wrap(Wrap { trim: false })
            .render(modal_area, buf);
    }
}

impl<T: Record + Clone> Widget for &mut GenericList<T> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if let Some(failure) = &self.failure {
            FallbackPanel::new(failure, &self.theme).render(area, buf);
            return;
        }
        // Caller callbacks run inside; a panic leaves the scratch buffer behind
        let mut scratch = Buffer::empty(area);
        match catch_render(|| self.render_grid(area, &mut scratch)) {
            Ok(()) => buf.merge(&scratch),
            Err(failure) => {
                self.gestures.cancel();
                self.geometry.clear();
                FallbackPanel::new(&failure, &self.theme).render(area, buf);
                self.failure = Some(failure);
            }
        }
    }
}

pub fn centered_rect(r: Rect, percent_x: u16, percent_y: u16) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
