use ratatui::{
    buffer::Buffer,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style, Stylize},
    widgets::{Paragraph, Widget},
};

pub const NORMAL_HINTS: [(&str, &str); 8] = [
    ("/", "Search"),
    ("s", "Sort"),
    ("c", "Columns"),
    ("f", "Filters"),
    ("x", "Export"),
    ("n/p", "Page"),
    ("</>", "Width"),
    ("q", "Quit"),
];

pub const CUSTOMIZE_HINTS: [(&str, &str); 6] = [
    ("Space", "Toggle"),
    ("S-←/→", "Move"),
    ("a/A", "All/None"),
    ("u", "Hidden"),
    ("R", "Reset"),
    ("c", "Done"),
];

/// Key hint bar with a status text (page, row count) on the right.
pub struct Controls<'a> {
    pub hints: &'a [(&'a str, &'a str)],
    pub status: Option<String>,
    pub dimmed: bool,
    pub bar_color: Color,
    pub highlight: Option<(&'a str, Color)>,
}

impl<'a> Controls<'a> {
    pub fn new(hints: &'a [(&'a str, &'a str)]) -> Self {
        Self {
            hints,
            status: None,
            dimmed: false,
            bar_color: Color::DarkGray,
            highlight: None,
        }
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_dimmed(mut self, dimmed: bool) -> Self {
        self.dimmed = dimmed;
        self
    }

    pub fn with_bar_color(mut self, color: Color) -> Self {
        self.bar_color = color;
        self
    }

    /// Color one action label, e.g. "Search" while a search is applied.
    pub fn with_highlight(mut self, action: &'a str, color: Color) -> Self {
        self.highlight = Some((action, color));
        self
    }
}

impl Widget for &Controls<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut constraints = self.hints.iter().fold(vec![], |mut acc, (key, action)| {
            acc.push(Constraint::Length(key.chars().count() as u16 + 2));
            acc.push(Constraint::Length(action.chars().count() as u16 + 1));
            acc
        });

        let status_width = self
            .status
            .as_ref()
            .map(|s| s.chars().count() as u16 + 1)
            .unwrap_or(0);
        if self.status.is_some() {
            constraints.push(Constraint::Length(status_width));
        }
        constraints.push(Constraint::Fill(1));

        let layout = Layout::new(Direction::Horizontal, constraints).split(area);

        let base_style = if self.dimmed {
            Style::default().fg(Color::DarkGray)
        } else {
            Style::default()
        };

        for (i, (key, action)) in self.hints.iter().enumerate() {
            let j = i * 2;
            Paragraph::new(*key)
                .style(base_style.bold())
                .centered()
                .render(layout[j], buf);
            let action_style = match self.highlight {
                Some((label, color)) if label == *action => base_style.bg(self.bar_color).fg(color),
                _ => base_style.bg(self.bar_color),
            };
            Paragraph::new(*action)
                .style(action_style)
                .render(layout[j + 1], buf);
        }

        let mut fill_start_idx = self.hints.len() * 2;
        if let Some(status) = &self.status {
            Paragraph::new(status.as_str())
                .style(base_style.bg(self.bar_color).fg(if self.dimmed {
                    Color::DarkGray
                } else {
                    Color::White
                }))
                .right_aligned()
                .render(layout[fill_start_idx], buf);
            fill_start_idx += 1;
        }

        Paragraph::new("")
            .style(base_style.bg(self.bar_color))
            .render(layout[fill_start_idx], buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_hints_and_status() {
        let area = Rect::new(0, 0, 120, 1);
        let mut buf = Buffer::empty(area);
        (&Controls::new(&NORMAL_HINTS).with_status("Page 2/5 · 230 rows")).render(area, &mut buf);
        let text: String = buf.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Search"));
        assert!(text.contains("Page 2/5"));
    }
}
