//! Headless display implementation for testing and CI environments
//!
//! This implementation collects all output without displaying it and serves
//! input from a script queued up front, which is what the integration tests
//! and piped runs need.

use crate::display_trait::{DisplayError, KeyInput, LineInput, Window, ZMachineDisplay, ZMachineInput};
use log::debug;
use std::collections::VecDeque;

#[derive(Debug, Default)]
pub struct HeadlessDisplay {
    main: Vec<u8>,
    upper: Vec<u8>,
    status_line: Vec<u8>,
    cursor: (u16, u16),
    upper_window_lines: u16,
    current_window: Option<Window>,
    text_style: u16,
    lines: VecDeque<LineInput>,
    keys: VecDeque<KeyInput>,
    /// Characters typed into the current line before a timeout
    pending: Vec<u8>,
    clock: u64,
}

impl HeadlessDisplay {
    pub fn new() -> Self {
        HeadlessDisplay {
            cursor: (1, 1),
            ..Default::default()
        }
    }

    /// Headless host that answers line reads with `lines` in order
    pub fn with_input(lines: &[&str]) -> Self {
        let mut display = HeadlessDisplay::new();
        for line in lines {
            display.push_line(line);
        }
        display
    }

    pub fn push_line(&mut self, line: &str) {
        self.lines.push_back(LineInput::Line(line.as_bytes().to_vec()));
    }

    /// Make the next line read time out
    pub fn push_line_timeout(&mut self) {
        self.lines.push_back(LineInput::TimedOut);
    }

    /// Start the next line with `text`, as if typed before a timeout
    pub fn type_ahead(&mut self, text: &str) {
        self.pending.extend_from_slice(text.as_bytes());
    }

    pub fn push_key(&mut self, key: u8) {
        self.keys.push_back(KeyInput::Key(key));
    }

    pub fn push_key_timeout(&mut self) {
        self.keys.push_back(KeyInput::TimedOut);
    }

    pub fn advance_clock(&mut self, millis: u64) {
        self.clock += millis;
    }

    /// Everything written to the lower window
    pub fn get_output(&self) -> String {
        String::from_utf8_lossy(&self.main).into_owned()
    }

    /// Everything written to the upper window
    pub fn get_upper_output(&self) -> String {
        String::from_utf8_lossy(&self.upper).into_owned()
    }

    /// The last status line drawn
    pub fn get_status_line(&self) -> String {
        String::from_utf8_lossy(&self.status_line).into_owned()
    }

    pub fn text_style(&self) -> u16 {
        self.text_style
    }

    pub fn upper_window_lines(&self) -> u16 {
        self.upper_window_lines
    }
}

impl ZMachineDisplay for HeadlessDisplay {
    fn write_char(&mut self, window: Window, c: u8) -> Result<(), DisplayError> {
        match window {
            Window::Lower if c == b'\r' => self.main.push(b'\n'),
            Window::Lower => self.main.push(c),
            Window::Upper => {
                self.upper.push(c);
                self.cursor.1 += 1;
            }
        }
        Ok(())
    }

    fn split_window(&mut self, lines: u16) -> Result<(), DisplayError> {
        debug!("Headless: split_window({})", lines);
        self.upper_window_lines = lines;
        Ok(())
    }

    fn set_window(&mut self, window: Window) -> Result<(), DisplayError> {
        debug!("Headless: set_window({:?})", window);
        self.current_window = Some(window);
        Ok(())
    }

    fn erase_window(&mut self, window: i16) -> Result<(), DisplayError> {
        debug!("Headless: erase_window({})", window);
        match window {
            0 => self.main.clear(),
            1 => self.upper.clear(),
            _ => {
                self.main.clear();
                self.upper.clear();
            }
        }
        Ok(())
    }

    fn set_cursor(&mut self, line: u16, column: u16) -> Result<(), DisplayError> {
        debug!("Headless: set_cursor({}, {})", line, column);
        self.cursor = (line, column);
        Ok(())
    }

    fn get_cursor(&mut self) -> Result<(u16, u16), DisplayError> {
        Ok(self.cursor)
    }

    fn set_text_style(&mut self, style: u16) -> Result<(), DisplayError> {
        self.text_style = style;
        Ok(())
    }

    fn show_status(&mut self, line: &[u8]) -> Result<(), DisplayError> {
        debug!("Headless: status [{}]", String::from_utf8_lossy(line));
        self.status_line = line.to_vec();
        Ok(())
    }
}

impl ZMachineInput for HeadlessDisplay {
    fn read_char(&mut self, _timeout: u16) -> Result<KeyInput, DisplayError> {
        Ok(self.keys.pop_front().unwrap_or(KeyInput::Closed))
    }

    fn read_line(&mut self, max_len: usize, _timeout: u16) -> Result<LineInput, DisplayError> {
        let next = self.lines.pop_front().unwrap_or(LineInput::Closed);
        Ok(match next {
            LineInput::Line(typed) => {
                let mut line = std::mem::take(&mut self.pending);
                line.extend_from_slice(&typed);
                line.truncate(max_len);
                // Echo the command the way a terminal would
                self.main.extend_from_slice(&line);
                self.main.push(b'\n');
                LineInput::Line(line)
            }
            other => other,
        })
    }

    fn cancel_line(&mut self) {
        self.pending.clear();
    }

    fn millis(&self) -> u64 {
        self.clock
    }
}
