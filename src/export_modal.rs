//! Export modal state and focus management.

use crossterm::event::{KeyCode, KeyEvent};
use std::path::PathBuf;

use crate::config::Theme;
use crate::export::{ExportColumns, ExportFormat, ExportOptions, RowScope};
use crate::widgets::text_input::{TextInput, TextInputEvent};
use crate::CompressionFormat;

pub const COMPRESSION_OPTIONS: [Option<CompressionFormat>; 5] = [
    None,
    Some(CompressionFormat::Gzip),
    Some(CompressionFormat::Zstd),
    Some(CompressionFormat::Bzip2),
    Some(CompressionFormat::Xz),
];

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ExportFocus {
    #[default]
    FormatSelector,
    PathInput,
    Columns,
    Rows,
    // CSV options
    CsvDelimiter,
    CsvIncludeHeader,
    Compression,
    // Footer buttons
    ExportButton,
    CancelButton,
}

/// Everything needed to run one export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub path: PathBuf,
    pub format: ExportFormat,
    pub options: ExportOptions,
    pub columns: ExportColumns,
    pub rows: RowScope,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportModalEvent {
    None,
    Cancel,
    Submit(ExportRequest),
}

pub struct ExportModal {
    pub active: bool,
    pub focus: ExportFocus,
    pub selected_format: ExportFormat,
    pub path_input: TextInput,
    pub columns: ExportColumns,
    pub rows: RowScope,
    // CSV options
    pub csv_delimiter_input: TextInput,
    pub csv_include_header: bool,
    pub compression: Option<CompressionFormat>,
    /// Set when the last submit failed; cleared on the next edit
    pub error: Option<String>,
}

impl ExportModal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, theme: &Theme, default_path: &str) {
        self.active = true;
        self.focus = ExportFocus::PathInput;
        self.path_input = TextInput::new().with_theme(theme).with_value(default_path);
        self.csv_delimiter_input = TextInput::new().with_theme(theme).with_value(",");
        self.csv_include_header = true;
        self.compression = None;
        self.error = None;
        self.sync_focus();
    }

    pub fn close(&mut self) {
        self.active = false;
        self.focus = ExportFocus::FormatSelector;
        self.path_input.clear();
        self.error = None;
    }

    fn sync_focus(&mut self) {
        self.path_input
            .set_focused(self.focus == ExportFocus::PathInput);
        self.csv_delimiter_input
            .set_focused(self.focus == ExportFocus::CsvDelimiter);
    }

    pub fn next_focus(&mut self) {
        self.focus = match self.focus {
            ExportFocus::FormatSelector => ExportFocus::PathInput,
            ExportFocus::PathInput => ExportFocus::Columns,
            ExportFocus::Columns => ExportFocus::Rows,
            ExportFocus::Rows => match self.selected_format {
                ExportFormat::Csv => ExportFocus::CsvDelimiter,
                f if f.supports_compression() => ExportFocus::Compression,
                _ => ExportFocus::ExportButton,
            },
            ExportFocus::CsvDelimiter => ExportFocus::CsvIncludeHeader,
            ExportFocus::CsvIncludeHeader => ExportFocus::Compression,
            ExportFocus::Compression => ExportFocus::ExportButton,
            ExportFocus::ExportButton => ExportFocus::CancelButton,
            ExportFocus::CancelButton => ExportFocus::FormatSelector,
        };
        self.sync_focus();
    }

    pub fn prev_focus(&mut self) {
        self.focus = match self.focus {
            ExportFocus::FormatSelector => ExportFocus::CancelButton,
            ExportFocus::PathInput => ExportFocus::FormatSelector,
            ExportFocus::Columns => ExportFocus::PathInput,
            ExportFocus::Rows => ExportFocus::Columns,
            ExportFocus::CsvDelimiter => ExportFocus::Rows,
            ExportFocus::CsvIncludeHeader => ExportFocus::CsvDelimiter,
            ExportFocus::Compression => match self.selected_format {
                ExportFormat::Csv => ExportFocus::CsvIncludeHeader,
                _ => ExportFocus::Rows,
            },
            ExportFocus::ExportButton => match self.selected_format {
                f if f.supports_compression() => ExportFocus::Compression,
                _ => ExportFocus::Rows,
            },
            ExportFocus::CancelButton => ExportFocus::ExportButton,
        };
        self.sync_focus();
    }

    fn compression_index(&self) -> usize {
        COMPRESSION_OPTIONS
            .iter()
            .position(|&opt| opt == self.compression)
            .unwrap_or(0)
    }

    pub fn cycle_compression(&mut self) {
        let idx = (self.compression_index() + 1) % COMPRESSION_OPTIONS.len();
        self.compression = COMPRESSION_OPTIONS[idx];
    }

    pub fn cycle_compression_backward(&mut self) {
        let idx = self.compression_index();
        let idx = if idx == 0 {
            COMPRESSION_OPTIONS.len() - 1
        } else {
            idx - 1
        };
        self.compression = COMPRESSION_OPTIONS[idx];
    }

    fn cycle_format(&mut self, forward: bool) {
        let all = ExportFormat::ALL;
        let idx = all
            .iter()
            .position(|&f| f == self.selected_format)
            .unwrap_or(0);
        let idx = if forward {
            (idx + 1) % all.len()
        } else {
            (idx + all.len() - 1) % all.len()
        };
        self.selected_format = all[idx];
        // Keep the typed extension in step with the format
        let path = PathBuf::from(self.path_input.value());
        if path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(ExportFormat::from_extension)
            .is_some()
        {
            let path = path.with_extension(self.selected_format.extension());
            self.path_input.set_value(path.display().to_string());
        }
    }

    /// Delimiter is the first byte of the input; empty means comma.
    fn delimiter(&self) -> Result<u8, String> {
        let value = self.csv_delimiter_input.value();
        match value.as_bytes() {
            [] => Ok(b','),
            [b] if b.is_ascii() => Ok(*b),
            _ => Err(format!("Delimiter must be a single ASCII character, got '{value}'")),
        }
    }

    fn request(&self) -> Result<ExportRequest, String> {
        let path = self.path_input.value().trim();
        if path.is_empty() {
            return Err("Enter a file path".to_string());
        }
        Ok(ExportRequest {
            path: PathBuf::from(path),
            format: self.selected_format,
            options: ExportOptions {
                csv_delimiter: self.delimiter()?,
                csv_include_header: self.csv_include_header,
                compression: self
                    .compression
                    .filter(|_| self.selected_format.supports_compression()),
            },
            columns: self.columns,
            rows: self.rows,
        })
    }

    fn submit(&mut self) -> ExportModalEvent {
        match self.request() {
            Ok(request) => ExportModalEvent::Submit(request),
            Err(message) => {
                self.error = Some(message);
                ExportModalEvent::None
            }
        }
    }

    pub fn set_error(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
    }

    pub fn handle_key(&mut self, event: &KeyEvent) -> ExportModalEvent {
        match event.code {
            KeyCode::Esc => return ExportModalEvent::Cancel,
            KeyCode::Tab => {
                self.next_focus();
                return ExportModalEvent::None;
            }
            KeyCode::BackTab => {
                self.prev_focus();
                return ExportModalEvent::None;
            }
            _ => {}
        }
        self.error = None;
        match self.focus {
            ExportFocus::PathInput => match self.path_input.handle_key(event) {
                TextInputEvent::Submit => self.submit(),
                _ => ExportModalEvent::None,
            },
            ExportFocus::CsvDelimiter => match self.csv_delimiter_input.handle_key(event) {
                TextInputEvent::Submit => self.submit(),
                _ => ExportModalEvent::None,
            },
            ExportFocus::FormatSelector => {
                match event.code {
                    KeyCode::Left | KeyCode::Up => self.cycle_format(false),
                    KeyCode::Right | KeyCode::Down | KeyCode::Char(' ') => self.cycle_format(true),
                    KeyCode::Enter => return self.submit(),
                    _ => {}
                }
                ExportModalEvent::None
            }
            ExportFocus::Columns => {
                match event.code {
                    KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                        self.columns = self.columns.toggle()
                    }
                    KeyCode::Enter => return self.submit(),
                    _ => {}
                }
                ExportModalEvent::None
            }
            ExportFocus::Rows => {
                match event.code {
                    KeyCode::Left | KeyCode::Right | KeyCode::Char(' ') => {
                        self.rows = self.rows.toggle()
                    }
                    KeyCode::Enter => return self.submit(),
                    _ => {}
                }
                ExportModalEvent::None
            }
            ExportFocus::CsvIncludeHeader => {
                match event.code {
                    KeyCode::Char(' ') | KeyCode::Left | KeyCode::Right => {
                        self.csv_include_header = !self.csv_include_header
                    }
                    KeyCode::Enter => return self.submit(),
                    _ => {}
                }
                ExportModalEvent::None
            }
            ExportFocus::Compression => {
                match event.code {
                    KeyCode::Right | KeyCode::Char(' ') => self.cycle_compression(),
                    KeyCode::Left => self.cycle_compression_backward(),
                    KeyCode::Enter => return self.submit(),
                    _ => {}
                }
                ExportModalEvent::None
            }
            ExportFocus::ExportButton => match event.code {
                KeyCode::Enter | KeyCode::Char(' ') => self.submit(),
                _ => ExportModalEvent::None,
            },
            ExportFocus::CancelButton => match event.code {
                KeyCode::Enter | KeyCode::Char(' ') => ExportModalEvent::Cancel,
                _ => ExportModalEvent::None,
            },
        }
    }
}

impl Default for ExportModal {
    fn default() -> Self {
        Self {
            active: false,
            focus: ExportFocus::FormatSelector,
            selected_format: ExportFormat::Csv,
            path_input: TextInput::new(),
            columns: ExportColumns::Visible,
            rows: RowScope::CurrentPage,
            csv_delimiter_input: TextInput::new(),
            csv_include_header: true,
            compression: None,
            error: None,
        }
    }
}
