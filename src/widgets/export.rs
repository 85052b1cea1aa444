//! Export modal rendering.

use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Borders, Clear, List, ListItem, Paragraph, Widget};

use crate::config::Theme;
use crate::export::{ExportColumns, ExportFormat, RowScope};
use crate::export_modal::{ExportFocus, ExportModal, COMPRESSION_OPTIONS};
use crate::CompressionFormat;

const LABEL_WIDTH: u16 = 15;

struct Palette {
    border: Color,
    active: Color,
    error: Color,
}

impl Palette {
    fn style(&self, focused: bool) -> Style {
        Style::default().fg(if focused { self.active } else { self.border })
    }
}

/// Format list on the left, path and options on the right.
pub fn render_export_modal(area: Rect, buf: &mut Buffer, modal: &ExportModal, theme: &Theme) {
    let palette = Palette {
        border: theme.get("modal_border"),
        active: theme.get("modal_border_active"),
        error: theme.get("modal_border_error"),
    };
    Clear.render(area, buf);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(palette.border))
        .title(" Export ");
    let inner = block.inner(area);
    block.render(area, buf);

    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(16), Constraint::Min(30)])
        .split(inner);

    render_format_list(chunks[0], buf, modal, &palette);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Path input
            Constraint::Min(6),    // Scope and format options
            Constraint::Length(1), // Error line
            Constraint::Length(3), // Buttons
        ])
        .split(chunks[1]);

    render_path_input(right[0], buf, modal, &palette);
    render_options(right[1], buf, modal, &palette);
    if let Some(error) = &modal.error {
        Paragraph::new(error.as_str())
            .style(Style::default().fg(palette.error))
            .render(right[2], buf);
    }
    render_footer(right[3], buf, modal, &palette);
}

fn render_format_list(area: Rect, buf: &mut Buffer, modal: &ExportModal, palette: &Palette) {
    let is_focused = modal.focus == ExportFocus::FormatSelector;
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.style(is_focused))
        .title("Format");
    let inner = block.inner(area);
    block.render(area, buf);

    let items: Vec<ListItem> = ExportFormat::ALL
        .iter()
        .map(|format| {
            let selected = modal.selected_format == *format;
            let marker = if selected { "●" } else { "○" };
            ListItem::new(Line::from(Span::styled(
                format!("{} {}", marker, format.as_str()),
                palette.style(selected),
            )))
        })
        .collect();
    List::new(items).render(inner, buf);
}

fn render_path_input(area: Rect, buf: &mut Buffer, modal: &ExportModal, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(palette.style(modal.focus == ExportFocus::PathInput))
        .title("File Path");
    let inner = block.inner(area);
    block.render(area, buf);
    (&modal.path_input).render(inner, buf);
}

fn labeled_row(area: Rect) -> (Rect, Rect) {
    let row = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(LABEL_WIDTH),
            Constraint::Length(2),
            Constraint::Min(1),
        ])
        .split(area);
    (row[0], row[2])
}

fn render_label(area: Rect, buf: &mut Buffer, label: &str, focused: bool, palette: &Palette) {
    Paragraph::new(label)
        .style(palette.style(focused))
        .render(area, buf);
}

fn render_radio_pair(
    area: Rect,
    buf: &mut Buffer,
    options: [(&str, bool); 2],
    palette: &Palette,
) {
    let spans: Vec<Span> = options
        .iter()
        .flat_map(|(label, selected)| {
            let marker = if *selected { "●" } else { "○" };
            [
                Span::styled(
                    format!("{} {}", marker, label),
                    palette.style(*selected),
                ),
                Span::raw("   "),
            ]
        })
        .collect();
    Paragraph::new(Line::from(spans)).render(area, buf);
}

fn render_options(area: Rect, buf: &mut Buffer, modal: &ExportModal, palette: &Palette) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(palette.border))
        .title("Options");
    let inner = block.inner(area);
    block.render(area, buf);

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Columns
            Constraint::Length(1), // Rows
            Constraint::Length(1), // Delimiter
            Constraint::Length(1), // Include header
            Constraint::Length(1), // Compression label
            Constraint::Min(1),    // Compression grid
        ])
        .split(inner);

    let focused = modal.focus == ExportFocus::Columns;
    let (label, value) = labeled_row(rows[0]);
    render_label(label, buf, "Columns:", focused, palette);
    render_radio_pair(
        value,
        buf,
        [
            (ExportColumns::Visible.as_str(), modal.columns == ExportColumns::Visible),
            (ExportColumns::All.as_str(), modal.columns == ExportColumns::All),
        ],
        palette,
    );

    let focused = modal.focus == ExportFocus::Rows;
    let (label, value) = labeled_row(rows[1]);
    render_label(label, buf, "Rows:", focused, palette);
    render_radio_pair(
        value,
        buf,
        [
            (RowScope::CurrentPage.as_str(), modal.rows == RowScope::CurrentPage),
            (RowScope::AllRows.as_str(), modal.rows == RowScope::AllRows),
        ],
        palette,
    );

    if modal.selected_format == ExportFormat::Csv {
        let focused = modal.focus == ExportFocus::CsvDelimiter;
        let (label, value) = labeled_row(rows[2]);
        render_label(label, buf, "Delimiter:", focused, palette);
        (&modal.csv_delimiter_input).render(value, buf);

        let focused = modal.focus == ExportFocus::CsvIncludeHeader;
        let (label, value) = labeled_row(rows[3]);
        render_label(label, buf, "Include Header:", focused, palette);
        let marker = if modal.csv_include_header { "☑" } else { "☐" };
        Paragraph::new(Line::from(Span::styled(marker, palette.style(focused))))
            .render(value, buf);
    }

    if modal.selected_format.supports_compression() {
        let focused = modal.focus == ExportFocus::Compression;
        render_label(rows[4], buf, "Compression:", focused, palette);
        render_compression_grid(rows[5], buf, modal.compression, palette);
    } else {
        Paragraph::new(format!(
            "No compression for {} format",
            modal.selected_format.as_str()
        ))
        .style(Style::default().fg(palette.border))
        .render(rows[4], buf);
    }
}

fn compression_label(compression: Option<CompressionFormat>) -> &'static str {
    match compression {
        None => "None",
        Some(CompressionFormat::Gzip) => "Gzip",
        Some(CompressionFormat::Zstd) => "Zstd",
        Some(CompressionFormat::Bzip2) => "Bzip2",
        Some(CompressionFormat::Xz) => "XZ",
    }
}

/// Compression options, three per row.
fn render_compression_grid(
    area: Rect,
    buf: &mut Buffer,
    compression: Option<CompressionFormat>,
    palette: &Palette,
) {
    const ITEMS_PER_ROW: usize = 3;
    let item_width = area.width / ITEMS_PER_ROW as u16;
    for (idx, option) in COMPRESSION_OPTIONS.iter().enumerate() {
        let y = area.y + (idx / ITEMS_PER_ROW) as u16;
        if y >= area.bottom() {
            break;
        }
        let item_area = Rect {
            x: area.x + (idx % ITEMS_PER_ROW) as u16 * item_width,
            y,
            width: item_width,
            height: 1,
        };
        let selected = *option == compression;
        let marker = if selected { "●" } else { "○" };
        let style = palette.style(selected);
        Paragraph::new(Line::from(Span::styled(
            format!("{} {}", marker, compression_label(*option)),
            style,
        )))
        .render(item_area, buf);
    }
}

fn render_footer(area: Rect, buf: &mut Buffer, modal: &ExportModal, palette: &Palette) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    for (chunk, label, focus) in [
        (chunks[0], "Export", ExportFocus::ExportButton),
        (chunks[1], "Cancel", ExportFocus::CancelButton),
    ] {
        let style = palette.style(modal.focus == focus);
        Paragraph::new(label)
            .style(style)
            .block(Block::default().borders(Borders::ALL).border_style(style))
            .centered()
            .render(chunk, buf);
    }
}
