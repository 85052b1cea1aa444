//! Overlay and row-selection flags for one list.

use tracing::trace;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiMode {
    /// Customize-columns mode.
    pub show_controls: bool,
    /// List hidden columns (dimmed) while customizing.
    pub show_unselected: bool,
    pub show_filters: bool,
    pub show_export: bool,
    pub expanded_row: Option<usize>,
    pub selected_row: Option<usize>,
    pub modal_row: Option<usize>,
}

impl UiMode {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opening the controls closes the filter panel.
    pub fn toggle_controls(&mut self) {
        self.show_controls = !self.show_controls;
        if self.show_controls {
            self.show_filters = false;
        }
        trace!(controls = self.show_controls, "toggle controls");
    }

    /// Opening the filter panel closes the controls.
    pub fn toggle_filters(&mut self) {
        self.show_filters = !self.show_filters;
        if self.show_filters {
            self.show_controls = false;
        }
        trace!(filters = self.show_filters, "toggle filters");
    }

    pub fn toggle_show_unselected(&mut self) {
        self.show_unselected = !self.show_unselected;
    }

    pub fn open_export(&mut self) {
        self.show_export = true;
    }

    pub fn close_export(&mut self) {
        self.show_export = false;
    }

    pub fn toggle_expanded(&mut self, row: usize) {
        self.expanded_row = if self.expanded_row == Some(row) {
            None
        } else {
            Some(row)
        };
    }

    pub fn select_row(&mut self, row: Option<usize>) {
        self.selected_row = row;
    }

    pub fn open_row_modal(&mut self, row: usize) {
        self.modal_row = Some(row);
    }

    pub fn close_row_modal(&mut self) {
        self.modal_row = None;
    }

    /// Row click entry point. Suppressed while customizing; otherwise selects
    /// the row and reports that the click should be handled.
    pub fn row_click(&mut self, row: usize) -> bool {
        if self.show_controls {
            return false;
        }
        self.selected_row = Some(row);
        true
    }

    /// Row indices refer to the current page; drop them when the data changes.
    pub fn reset_rows(&mut self) {
        self.expanded_row = None;
        self.modal_row = None;
        self.selected_row = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controls_and_filters_are_mutually_exclusive() {
        let mut ui = UiMode::new();
        ui.toggle_filters();
        assert!(ui.show_filters);
        ui.toggle_controls();
        assert!(ui.show_controls);
        assert!(!ui.show_filters);
        ui.toggle_filters();
        assert!(ui.show_filters);
        assert!(!ui.show_controls);
    }

    #[test]
    fn test_closing_does_not_reopen_the_other() {
        let mut ui = UiMode::new();
        ui.toggle_controls();
        ui.toggle_controls();
        assert!(!ui.show_controls);
        assert!(!ui.show_filters);
    }

    #[test]
    fn test_row_click_suppressed_while_customizing() {
        let mut ui = UiMode::new();
        ui.toggle_controls();
        assert!(!ui.row_click(2));
        assert_eq!(ui.selected_row, None);
        ui.toggle_controls();
        assert!(ui.row_click(2));
        assert_eq!(ui.selected_row, Some(2));
    }

    #[test]
    fn test_expand_and_modal_are_independent() {
        let mut ui = UiMode::new();
        ui.toggle_expanded(1);
        ui.open_row_modal(3);
        ui.toggle_controls();
        assert_eq!(ui.expanded_row, Some(1));
        assert_eq!(ui.modal_row, Some(3));
        ui.toggle_expanded(1);
        assert_eq!(ui.expanded_row, None);
        ui.close_row_modal();
        assert_eq!(ui.modal_row, None);
    }
}
