//! Caller-defined filter panels.
//!
//! A list can host one [`FilterPanel`]. The panel draws its own controls and
//! turns key presses into a new [`Filter`]; the list forwards that filter to the
//! caller as a filter change, exactly like a search or sort change.

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Widget},
};

use crate::config::Theme;
use crate::sort::Filter;
use crate::widgets::text_input::{TextInput, TextInputEvent};

/// What a panel sees while rendering.
pub struct FilterContext<'a> {
    pub filter: &'a Filter,
    pub theme: &'a Theme,
}

pub trait FilterPanel {
    /// Rows the panel needs, borders included.
    fn height(&self) -> u16 {
        3
    }

    /// Called each time the panel is opened with the filter in effect.
    fn open(&mut self, _filter: &Filter) {}

    fn render(&self, ctx: &FilterContext<'_>, area: Rect, buf: &mut Buffer);

    /// `Some` when the key produced a new filter to apply.
    fn handle_key(&mut self, key: &KeyEvent, filter: &Filter) -> Option<Filter>;
}

/// One text input per caller-named field; each non-empty value becomes an
/// equality filter stored in [`Filter::extra`].
pub struct FieldFilterPanel {
    fields: Vec<(String, TextInput)>,
    focused: usize,
}

impl FieldFilterPanel {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<(String, TextInput)> = fields
            .into_iter()
            .map(|name| (name.into(), TextInput::new()))
            .collect();
        let mut panel = Self { fields, focused: 0 };
        panel.sync_focus();
        panel
    }

    pub fn with_theme(mut self, theme: &Theme) -> Self {
        self.fields = self
            .fields
            .into_iter()
            .map(|(name, input)| {
                let value = input.value().to_string();
                (name, TextInput::new().with_theme(theme).with_value(value))
            })
            .collect();
        self.sync_focus();
        self
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(name, _)| name.as_str())
    }

    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, input)| input.value())
    }

    fn sync_focus(&mut self) {
        let focused = self.focused;
        for (i, (_, input)) in self.fields.iter_mut().enumerate() {
            input.set_focused(i == focused);
        }
    }

    fn apply(&self, filter: &Filter) -> Filter {
        let mut next = filter.clone();
        for (name, input) in &self.fields {
            let value = input.value().trim();
            if value.is_empty() {
                next.extra.remove(name);
            } else {
                next.extra.insert(name.clone(), value.to_string());
            }
        }
        next
    }
}

impl FilterPanel for FieldFilterPanel {
    fn open(&mut self, filter: &Filter) {
        for (name, input) in &mut self.fields {
            input.set_value(filter.extra.get(name).cloned().unwrap_or_default());
        }
        self.focused = 0;
        self.sync_focus();
    }

    fn render(&self, ctx: &FilterContext<'_>, area: Rect, buf: &mut Buffer) {
        let border = ctx.theme.get("table_border");
        let active = ctx.theme.get("modal_border_active");
        let title = if ctx.filter.extra.is_empty() {
            " Filters ".to_string()
        } else {
            format!(" Filters ({} active) ", ctx.filter.extra.len())
        };
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border))
            .title(title);
        let inner = block.inner(area);
        block.render(area, buf);
        if self.fields.is_empty() {
            Paragraph::new("No filterable fields")
                .style(Style::default().fg(ctx.theme.get("dimmed")))
                .render(inner, buf);
            return;
        }

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(vec![
                Constraint::Ratio(1, self.fields.len() as u32);
                self.fields.len()
            ])
            .split(inner);
        for (i, (name, input)) in self.fields.iter().enumerate() {
            let label_style = if i == self.focused {
                Style::default().fg(active).add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(ctx.theme.get("text_secondary"))
            };
            let label = format!("{name}: ");
            let label_width = (label.chars().count() as u16).min(columns[i].width);
            Paragraph::new(Line::from(Span::styled(label, label_style)))
                .render(Rect { width: label_width, ..columns[i] }, buf);
            let input_area = Rect {
                x: columns[i].x + label_width,
                width: columns[i].width.saturating_sub(label_width + 1),
                ..columns[i]
            };
            input.render(input_area, buf);
        }
    }

    fn handle_key(&mut self, key: &KeyEvent, filter: &Filter) -> Option<Filter> {
        if self.fields.is_empty() {
            return None;
        }
        match key.code {
            KeyCode::Tab => {
                self.focused = (self.focused + 1) % self.fields.len();
                self.sync_focus();
                None
            }
            KeyCode::BackTab => {
                self.focused = (self.focused + self.fields.len() - 1) % self.fields.len();
                self.sync_focus();
                None
            }
            _ => {
                let (_, input) = &mut self.fields[self.focused];
                match input.handle_key(key) {
                    TextInputEvent::Submit => Some(self.apply(filter)),
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::KeyModifiers;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn type_str(panel: &mut FieldFilterPanel, s: &str, filter: &Filter) {
        for c in s.chars() {
            assert!(panel.handle_key(&key(KeyCode::Char(c)), filter).is_none());
        }
    }

    #[test]
    fn test_enter_applies_non_empty_fields() {
        let mut panel = FieldFilterPanel::new(["status", "region"]);
        let filter = Filter::default().with_search("abc");
        panel.open(&filter);
        type_str(&mut panel, "open", &filter);
        panel.handle_key(&key(KeyCode::Tab), &filter);
        let next = panel.handle_key(&key(KeyCode::Enter), &filter).unwrap();
        assert_eq!(next.search, "abc");
        assert_eq!(next.extra.get("status").map(String::as_str), Some("open"));
        assert!(!next.extra.contains_key("region"));
    }

    #[test]
    fn test_clearing_a_field_removes_it() {
        let mut panel = FieldFilterPanel::new(["status"]);
        let mut filter = Filter::default();
        filter.extra.insert("status".into(), "x".into());
        panel.open(&filter);
        assert_eq!(panel.value("status"), Some("x"));
        panel.handle_key(&key(KeyCode::Backspace), &filter);
        let next = panel.handle_key(&key(KeyCode::Enter), &filter).unwrap();
        assert!(next.extra.is_empty());
    }

    #[test]
    fn test_render_shows_labels() {
        let panel = FieldFilterPanel::new(["status"]);
        let theme = Theme::default();
        let filter = Filter::default();
        let area = Rect::new(0, 0, 40, 3);
        let mut buf = Buffer::empty(area);
        panel.render(&FilterContext { filter: &filter, theme: &theme }, area, &mut buf);
        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("status:"));
        assert!(text.contains("Filters"));
    }
}
