//! Render error boundary.
//!
//! Caller-supplied render callbacks run inside the grid's draw pass. A panic
//! in one of them is caught here, the half-drawn frame is discarded, and a
//! fallback panel is shown until the user reloads.

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Widget, Wrap},
};
use std::backtrace::Backtrace;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};
use tracing::error;

use crate::config::Theme;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderFailure {
    pub message: String,
    pub location: Option<String>,
    pub backtrace: Option<String>,
}

type Captured = Arc<Mutex<Option<(Option<String>, String)>>>;

fn payload_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "render panicked".to_string()
    }
}

/// Run `f`, turning a panic into a [`RenderFailure`]. The process panic hook
/// is swapped out for the duration so nothing is printed over the TUI.
pub fn catch_render<F: FnOnce()>(f: F) -> Result<(), RenderFailure> {
    let captured: Captured = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&captured);

    let previous = panic::take_hook();
    panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|l| format!("{}:{}:{}", l.file(), l.line(), l.column()));
        let backtrace = Backtrace::force_capture().to_string();
        if let Ok(mut slot) = sink.lock() {
            *slot = Some((location, backtrace));
        }
    }));
    let result = panic::catch_unwind(AssertUnwindSafe(f));
    panic::set_hook(previous);

    let payload = match result {
        Ok(()) => return Ok(()),
        Err(payload) => payload,
    };
    let (location, backtrace) = captured
        .lock()
        .ok()
        .and_then(|mut slot| slot.take())
        .map(|(l, b)| (l, Some(b)))
        .unwrap_or((None, None));
    let failure = RenderFailure {
        message: payload_message(payload.as_ref()),
        location,
        backtrace,
    };
    error!(
        message = %failure.message,
        location = failure.location.as_deref().unwrap_or("unknown"),
        "grid render failed"
    );
    Err(failure)
}

/// Shown in place of the grid after a render failure.
pub struct FallbackPanel<'a> {
    failure: &'a RenderFailure,
    theme: &'a Theme,
    show_details: bool,
}

impl<'a> FallbackPanel<'a> {
    pub fn new(failure: &'a RenderFailure, theme: &'a Theme) -> Self {
        Self {
            failure,
            theme,
            show_details: cfg!(debug_assertions),
        }
    }

    pub fn with_details(mut self, show_details: bool) -> Self {
        self.show_details = show_details;
        self
    }
}

impl Widget for FallbackPanel<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        Clear.render(area, buf);
        let error_color = self.theme.get("modal_border_error");
        let block = Block::default()
            .borders(Borders::ALL)
            .border_type(BorderType::Rounded)
            .border_style(Style::default().fg(error_color))
            .title(" Something went wrong ");
        let inner = block.inner(area);
        block.render(area, buf);

        let mut lines = vec![
            Line::from("The table could not be displayed."),
            Line::from(vec![
                Span::raw("Press "),
                Span::styled("r", Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" to reload."),
            ]),
        ];
        if self.show_details {
            lines.push(Line::default());
            lines.push(Line::styled(
                self.failure.message.clone(),
                Style::default().fg(error_color),
            ));
            if let Some(location) = &self.failure.location {
                lines.push(Line::from(format!("at {location}")));
            }
            if let Some(backtrace) = &self.failure.backtrace {
                lines.push(Line::default());
                let dimmed = Style::default().fg(self.theme.get("dimmed"));
                lines.extend(
                    backtrace
                        .lines()
                        .map(|l| Line::styled(l.to_string(), dimmed)),
                );
            }
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .render(inner, buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_render_passes_through_success() {
        let mut ran = false;
        assert_eq!(catch_render(|| ran = true), Ok(()));
        assert!(ran);
    }

    #[test]
    fn test_catch_render_captures_panic_message() {
        let failure = catch_render(|| panic!("bad cell {}", 3)).unwrap_err();
        assert_eq!(failure.message, "bad cell 3");
        assert!(failure.location.as_deref().unwrap_or("").contains("boundary.rs"));
        assert!(failure.backtrace.is_some());
    }

    #[test]
    fn test_fallback_panel_hides_details_in_release_mode() {
        let failure = RenderFailure {
            message: "secret".to_string(),
            location: None,
            backtrace: None,
        };
        let theme = Theme::default();
        let area = Rect::new(0, 0, 40, 8);

        let mut buf = Buffer::empty(area);
        FallbackPanel::new(&failure, &theme)
            .with_details(false)
            .render(area, &mut buf);
        let text = buffer_text(&buf);
        assert!(text.contains("to reload"));
        assert!(!text.contains("secret"));

        let mut buf = Buffer::empty(area);
        FallbackPanel::new(&failure, &theme)
            .with_details(true)
            .render(area, &mut buf);
        assert!(buffer_text(&buf).contains("secret"));
    }

    fn buffer_text(buf: &Buffer) -> String {
        buf.content().iter().map(|c| c.symbol()).collect()
    }
}
