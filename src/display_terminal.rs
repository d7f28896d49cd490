//! Terminal host built on crossterm
//!
//! The lower window is plain scrolling output, wrapped at the configured
//! width. When both stdin and stdout are a terminal the upper window and
//! status line are drawn in place with cursor addressing and timed input
//! uses crossterm's event system. Piped runs fall back to line buffered
//! stdin and drop the upper window.

use crossterm::{
    cursor::{MoveTo, RestorePosition, SavePosition},
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{self, Clear, ClearType},
};
use log::{debug, info};
use std::io::{self, BufRead, Read, Stdout, Write};
use std::time::{Duration, Instant};

use crate::display_trait::{DisplayError, KeyInput, LineInput, Window, ZMachineDisplay, ZMachineInput};

lazy_static! {
    /// Reference point for the millisecond clock
    static ref START: Instant = Instant::now();
}

pub struct TerminalDisplay {
    stdout: Stdout,
    /// Both ends are a terminal, so cursor addressing and raw input work
    interactive: bool,
    width: u16,
    /// Column of the next lower window character, 0-based
    column: u16,
    upper_lines: u16,
    /// Upper window cursor, 0-based
    upper_cursor: (u16, u16),
    /// Partial line kept across a timed out read
    pending: Vec<u8>,
}

impl TerminalDisplay {
    pub fn new(width: u16) -> Self {
        let interactive = atty::is(atty::Stream::Stdin) && atty::is(atty::Stream::Stdout);
        debug!("TerminalDisplay: width {}, interactive {}", width, interactive);
        lazy_static::initialize(&START);
        TerminalDisplay {
            stdout: io::stdout(),
            interactive,
            width: width.max(1),
            column: 0,
            upper_lines: 0,
            upper_cursor: (0, 0),
            pending: Vec::new(),
        }
    }

    fn lower_char(&mut self, c: u8) -> Result<(), DisplayError> {
        if c == b'\r' || c == b'\n' {
            queue!(self.stdout, Print("\n"))?;
            self.column = 0;
            return Ok(());
        }
        if self.column >= self.width {
            queue!(self.stdout, Print("\n"))?;
            self.column = 0;
        }
        queue!(self.stdout, Print(c as char))?;
        self.column += 1;
        Ok(())
    }

    fn upper_char(&mut self, c: u8) -> Result<(), DisplayError> {
        if !self.interactive {
            return Ok(());
        }
        let (row, col) = self.upper_cursor;
        if c == b'\r' || c == b'\n' {
            self.upper_cursor = (row + 1, 0);
            return Ok(());
        }
        queue!(
            self.stdout,
            SavePosition,
            MoveTo(col, row),
            Print(c as char),
            RestorePosition
        )?;
        self.upper_cursor = (row, col + 1);
        Ok(())
    }

    /// Wait for one key press, or None when `deadline` passes
    fn next_key(&mut self, deadline: Option<Instant>) -> Result<Option<KeyEvent>, DisplayError> {
        loop {
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(None);
                    }
                    deadline - now
                }
                None => Duration::from_secs(3600),
            };
            if !event::poll(wait)? {
                continue;
            }
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    return Ok(Some(key));
                }
            }
        }
    }

    fn deadline(timeout: u16) -> Option<Instant> {
        if timeout == 0 {
            None
        } else {
            Some(Instant::now() + Duration::from_millis(timeout as u64 * 100))
        }
    }

    /// Line editing in raw mode with echo, so a timeout can interrupt it
    fn read_line_raw(&mut self, max_len: usize, timeout: u16) -> Result<LineInput, DisplayError> {
        let deadline = Self::deadline(timeout);
        terminal::enable_raw_mode()?;
        let result = loop {
            let key = match self.next_key(deadline) {
                Ok(Some(key)) => key,
                Ok(None) => break Ok(LineInput::TimedOut),
                Err(e) => break Err(e),
            };
            match key.code {
                KeyCode::Enter => {
                    let line = std::mem::take(&mut self.pending);
                    break Ok(LineInput::Line(line));
                }
                KeyCode::Char('d') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Ok(LineInput::Closed);
                }
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Ok(LineInput::Closed);
                }
                KeyCode::Backspace => {
                    if self.pending.pop().is_some() {
                        queue!(self.stdout, Print("\x08 \x08"))?;
                        self.column = self.column.saturating_sub(1);
                    }
                }
                KeyCode::Char(c) if c.is_ascii() && !c.is_ascii_control() => {
                    if self.pending.len() < max_len {
                        self.pending.push(c as u8);
                        queue!(self.stdout, Print(c))?;
                        self.column += 1;
                    }
                }
                _ => {}
            }
            self.stdout.flush()?;
        };
        terminal::disable_raw_mode()?;
        if let Ok(LineInput::Line(_)) = result {
            queue!(self.stdout, Print("\n"))?;
            self.column = 0;
            self.stdout.flush()?;
        }
        result
    }
}

impl ZMachineDisplay for TerminalDisplay {
    fn write_char(&mut self, window: Window, c: u8) -> Result<(), DisplayError> {
        match window {
            Window::Lower => self.lower_char(c),
            Window::Upper => self.upper_char(c),
        }
    }

    fn split_window(&mut self, lines: u16) -> Result<(), DisplayError> {
        debug!("split_window({})", lines);
        self.upper_lines = lines;
        Ok(())
    }

    fn set_window(&mut self, window: Window) -> Result<(), DisplayError> {
        if window == Window::Upper {
            self.upper_cursor = (0, 0);
        }
        Ok(())
    }

    fn erase_window(&mut self, window: i16) -> Result<(), DisplayError> {
        if !self.interactive {
            return Ok(());
        }
        match window {
            1 => {
                for row in 0..self.upper_lines {
                    queue!(
                        self.stdout,
                        SavePosition,
                        MoveTo(0, row),
                        Clear(ClearType::CurrentLine),
                        RestorePosition
                    )?;
                }
            }
            _ => {
                queue!(self.stdout, Clear(ClearType::All), MoveTo(0, self.upper_lines))?;
                self.column = 0;
            }
        }
        Ok(())
    }

    fn erase_line(&mut self) -> Result<(), DisplayError> {
        if self.interactive {
            queue!(self.stdout, Clear(ClearType::UntilNewLine))?;
        }
        Ok(())
    }

    fn set_cursor(&mut self, line: u16, column: u16) -> Result<(), DisplayError> {
        self.upper_cursor = (line.saturating_sub(1), column.saturating_sub(1));
        Ok(())
    }

    fn get_cursor(&mut self) -> Result<(u16, u16), DisplayError> {
        Ok((self.upper_cursor.0 + 1, self.upper_cursor.1 + 1))
    }

    fn set_text_style(&mut self, style: u16) -> Result<(), DisplayError> {
        if !self.interactive {
            return Ok(());
        }
        queue!(self.stdout, SetAttribute(Attribute::Reset))?;
        if style & 1 != 0 {
            queue!(self.stdout, SetAttribute(Attribute::Reverse))?;
        }
        if style & 2 != 0 {
            queue!(self.stdout, SetAttribute(Attribute::Bold))?;
        }
        if style & 4 != 0 {
            queue!(self.stdout, SetAttribute(Attribute::Italic))?;
        }
        Ok(())
    }

    fn show_status(&mut self, line: &[u8]) -> Result<(), DisplayError> {
        if !self.interactive {
            debug!("status: [{}]", String::from_utf8_lossy(line));
            return Ok(());
        }
        let text = String::from_utf8_lossy(line).into_owned();
        queue!(
            self.stdout,
            SavePosition,
            MoveTo(0, 0),
            SetAttribute(Attribute::Reverse),
            Print(text),
            SetAttribute(Attribute::Reset),
            RestorePosition
        )?;
        Ok(())
    }

    fn has_status_line(&self) -> bool {
        self.interactive
    }

    fn flush(&mut self) -> Result<(), DisplayError> {
        self.stdout.flush()?;
        Ok(())
    }
}

impl ZMachineInput for TerminalDisplay {
    fn read_char(&mut self, timeout: u16) -> Result<KeyInput, DisplayError> {
        if !self.interactive {
            let mut byte = [0u8];
            return Ok(match io::stdin().read(&mut byte)? {
                0 => KeyInput::Closed,
                _ => KeyInput::Key(byte[0]),
            });
        }

        let deadline = Self::deadline(timeout);
        terminal::enable_raw_mode()?;
        let key = loop {
            let key = match self.next_key(deadline) {
                Ok(Some(key)) => key,
                Ok(None) => break Ok(KeyInput::TimedOut),
                Err(e) => break Err(e),
            };
            match key.code {
                KeyCode::Enter => break Ok(KeyInput::Key(b'\n')),
                KeyCode::Backspace => break Ok(KeyInput::Key(8)),
                KeyCode::Esc => break Ok(KeyInput::Key(27)),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                    break Ok(KeyInput::Closed)
                }
                KeyCode::Char(c) if c.is_ascii() => break Ok(KeyInput::Key(c as u8)),
                _ => {}
            }
        };
        terminal::disable_raw_mode()?;
        key
    }

    fn read_line(&mut self, max_len: usize, timeout: u16) -> Result<LineInput, DisplayError> {
        self.stdout.flush()?;
        if self.interactive {
            return self.read_line_raw(max_len, timeout);
        }

        let mut input = String::new();
        if io::stdin().lock().read_line(&mut input)? == 0 {
            info!("End of input");
            return Ok(LineInput::Closed);
        }
        let line = input.trim_end_matches(['\n', '\r']).as_bytes();
        self.column = 0;
        Ok(LineInput::Line(line[..line.len().min(max_len)].to_vec()))
    }

    fn cancel_line(&mut self) {
        if !self.pending.is_empty() {
            debug!("Dropping {} typed characters", self.pending.len());
            self.pending.clear();
        }
    }

    fn millis(&self) -> u64 {
        START.elapsed().as_millis() as u64
    }
}
