//! Host collaborator traits
//!
//! The core never formats output beyond translating ZSCII into bytes; it
//! hands each byte to the display along with the window it belongs to.
//! Window management calls have no-op defaults so a host only implements
//! what its screen can actually do. Input and the millisecond clock live in
//! a separate trait; a `Host` is anything providing both.

use std::fmt;

/// The two windows every version can address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    /// Main scrolling text window (window 0)
    Lower,
    /// Status line / upper window (window 1)
    Upper,
}

impl Window {
    pub fn from_number(window: u16) -> Window {
        if window == 1 {
            Window::Upper
        } else {
            Window::Lower
        }
    }
}

/// Core trait for Z-Machine display operations
pub trait ZMachineDisplay {
    /// Output one translated byte to the given window
    fn write_char(&mut self, window: Window, c: u8) -> Result<(), DisplayError>;

    /// Split the screen, giving the upper window `lines` rows
    fn split_window(&mut self, _lines: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_window(&mut self, _window: Window) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Erase a window (-1 = whole screen, 0 = lower, 1 = upper)
    fn erase_window(&mut self, _window: i16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Erase from the cursor to the end of the line
    fn erase_line(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Set cursor position (1-based coordinates)
    fn set_cursor(&mut self, _line: u16, _column: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Current cursor position as (line, column), 1-based
    fn get_cursor(&mut self) -> Result<(u16, u16), DisplayError> {
        Ok((1, 1))
    }

    /// Set text style (0 = normal, 1 = reverse, 2 = bold, 4 = italic, 8 = fixed)
    fn set_text_style(&mut self, _style: u16) -> Result<(), DisplayError> {
        Ok(())
    }

    fn set_buffer_mode(&mut self, _buffered: bool) -> Result<(), DisplayError> {
        Ok(())
    }

    /// Draw a complete, already padded status line
    fn show_status(&mut self, line: &[u8]) -> Result<(), DisplayError> {
        for &c in line {
            self.write_char(Window::Upper, c)?;
        }
        Ok(())
    }

    /// Whether a version 1-3 status line can be shown at all
    fn has_status_line(&self) -> bool {
        true
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        Ok(())
    }
}

/// Result of a line read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineInput {
    Line(Vec<u8>),
    TimedOut,
    /// Input source exhausted
    Closed,
}

/// Result of a single key read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Key(u8),
    TimedOut,
    Closed,
}

pub trait ZMachineInput {
    /// Read one key. `timeout` is in tenths of a second, 0 waits forever.
    fn read_char(&mut self, timeout: u16) -> Result<KeyInput, DisplayError>;

    /// Read a line of at most `max_len` bytes, without the terminator
    fn read_line(&mut self, max_len: usize, timeout: u16) -> Result<LineInput, DisplayError>;

    /// A timed out line read was given up. Characters typed before the
    /// timeout must not carry into the next read.
    fn cancel_line(&mut self) {}

    /// Monotonic millisecond clock
    fn millis(&self) -> u64;
}

/// Everything the virtual machine needs from its surroundings
pub trait Host: ZMachineDisplay + ZMachineInput {}

impl<T: ZMachineDisplay + ZMachineInput> Host for T {}

/// Display error type
#[derive(Debug, Clone)]
pub struct DisplayError {
    pub message: String,
}

impl DisplayError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for DisplayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Display error: {}", self.message)
    }
}

impl std::error::Error for DisplayError {}

impl From<std::io::Error> for DisplayError {
    fn from(error: std::io::Error) -> Self {
        Self::new(format!("I/O error: {}", error))
    }
}
