//! Window and status line opcodes
//!
//! The screen model is the classic two window one: a scrolling lower window
//! and an upper window whose height is set by split_window. For version 1-3
//! stories the upper window is the status line, which the interpreter draws
//! itself from globals 0-2.

use crate::display_trait::{Host, Window};
use crate::error::ZError;
use crate::header::{
    CONFIG_NOSTATUSLINE, CONFIG_TIME, GRAPHICS_FLAG, H_CONFIG, H_FLAGS, H_INTERPRETER,
    H_INTERPRETER_VERSION, H_MAX_CHAR_HEIGHT, H_MAX_CHAR_WIDTH, H_SCREEN_BOTTOM,
    H_SCREEN_COLUMNS, H_SCREEN_LEFT, H_SCREEN_RIGHT, H_SCREEN_ROWS, H_SCREEN_TOP,
    H_STANDARD_HIGH, H_STANDARD_LOW, SCRIPTING_FLAG,
};
use crate::memory::AddressSpace;
use crate::text::{translate_zchar, ZSCII_NEWLINE};
use crate::vm::Vm;
use log::{debug, trace};

/// Width of the right hand status field for score/moves and time games
const SCORE_FIELD: usize = 31;
const TIME_FIELD: usize = 21;

/// Format a 24 hour time as "hh:mm am", hour right justified
pub fn format_time(hours: u16, minutes: u16) -> String {
    let suffix = if hours < 12 { "am" } else { "pm" };
    let hours = match hours % 12 {
        0 => 12,
        h => h,
    };
    format!("{:>2}:{:02} {}", hours, minutes, suffix)
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Clear the display and return to a single, unsplit lower window
    pub fn initialize_screen(&mut self) -> Result<(), ZError> {
        debug!(
            "Initializing {}x{} screen, interpreter {} version {}",
            self.config.screen_cols,
            self.config.screen_rows,
            self.config.interpreter_number,
            self.config.interpreter_version
        );
        self.status_size = 0;
        self.window = Window::Lower;
        self.host.split_window(0)?;
        self.host.set_window(Window::Lower)?;
        self.host.erase_window(-1)?;
        Ok(())
    }

    /// Advertise what this screen can do: standard 1.0, no graphics, and
    /// for early stories whether a status line is available
    pub fn restart_screen(&mut self) -> Result<(), ZError> {
        self.mem.set_byte(H_STANDARD_HIGH, 1)?;
        self.mem.set_byte(H_STANDARD_LOW, 0)?;

        if self.header.version < 4 && (!self.host.has_status_line() || !self.config.status_line) {
            let config = self.mem.get_byte(H_CONFIG)?;
            self.mem.set_byte(H_CONFIG, config | CONFIG_NOSTATUSLINE)?;
        }

        let flags = self.mem.get_word(H_FLAGS)?;
        self.mem.set_word(H_FLAGS, flags & !GRAPHICS_FLAG)
    }

    /// Fill in the interpreter and screen fields of the header. Runs after
    /// startup, restart and restore.
    pub fn restart_interp(&mut self, scripting: bool) -> Result<(), ZError> {
        if scripting {
            let flags = self.mem.get_word(H_FLAGS)?;
            self.mem.set_word(H_FLAGS, flags | SCRIPTING_FLAG)?;
        }

        let (rows, cols) = (self.config.screen_rows, self.config.screen_cols);
        self.mem.set_byte(H_INTERPRETER, self.config.interpreter_number)?;
        self.mem
            .set_byte(H_INTERPRETER_VERSION, self.config.interpreter_version as u8)?;
        self.mem.set_byte(H_SCREEN_ROWS, rows)?;
        self.mem.set_byte(H_SCREEN_COLUMNS, cols)?;
        self.mem.set_byte(H_SCREEN_LEFT, 0)?;
        self.mem.set_byte(H_SCREEN_RIGHT, cols)?;
        self.mem.set_byte(H_SCREEN_TOP, 0)?;
        self.mem.set_byte(H_SCREEN_BOTTOM, rows)?;
        self.mem.set_byte(H_MAX_CHAR_WIDTH, 1)?;
        self.mem.set_byte(H_MAX_CHAR_HEIGHT, 1)?;

        if self.header.version < 4 {
            self.write_zchar(ZSCII_NEWLINE)?;
        }
        Ok(())
    }

    /// VAR:0x2A - split_window. Early stories count the status line too.
    pub fn split_window(&mut self, lines: u16) -> Result<(), ZError> {
        let mut lines = lines & 0xff;
        if self.header.version < 4 {
            lines += 1;
        }

        if lines == 0 {
            self.status_size = 0;
            self.set_window(0)?;
        } else {
            let max = (self.config.screen_rows as u16).saturating_sub(1);
            self.status_size = lines.min(max);
        }
        debug!("split_window: upper window has {} lines", self.status_size);
        self.host.split_window(self.status_size)?;

        if lines != 0 && self.header.version < 4 {
            self.host.erase_window(1)?;
        }
        Ok(())
    }

    /// VAR:0x2B - set_window
    pub fn set_window(&mut self, window: u16) -> Result<(), ZError> {
        let window = Window::from_number(window);
        if window != self.window {
            trace!("set_window: {:?}", window);
            self.window = window;
        }
        self.host.set_window(window)?;
        Ok(())
    }

    /// VAR:0x2D - erase_window: -1 clears the whole screen
    pub fn erase_window(&mut self, window: u16) -> Result<(), ZError> {
        self.host.erase_window(window as i16)?;
        Ok(())
    }

    /// VAR:0x2E - erase_line: only 1 (erase to end of line) is defined
    pub fn erase_line(&mut self, value: u16) -> Result<(), ZError> {
        if value == 1 {
            self.host.erase_line()?;
        }
        Ok(())
    }

    /// VAR:0x2F - set_cursor. The lower window cursor is fixed to the
    /// input line, so only the upper window moves.
    pub fn set_cursor(&mut self, line: u16, column: u16) -> Result<(), ZError> {
        if self.window == Window::Upper {
            self.host.set_cursor(line, column)?;
        }
        Ok(())
    }

    /// VAR:0x30 - get_cursor: row and column into a two word table
    pub fn get_cursor(&mut self, table: u16) -> Result<(), ZError> {
        let (line, column) = self.host.get_cursor()?;
        self.mem.set_word(table as u32, line)?;
        self.mem.set_word(table as u32 + 2, column)
    }

    /// VAR:0x31 - set_text_style
    pub fn set_text_style(&mut self, style: u16) -> Result<(), ZError> {
        self.host.set_text_style(style)?;
        Ok(())
    }

    /// VAR:0x32 - buffer_mode
    pub fn buffer_mode(&mut self, flag: u16) -> Result<(), ZError> {
        self.host.set_buffer_mode(flag != 0)?;
        Ok(())
    }

    /// Build the status line: the location name on the left and either
    /// the score and moves or the time on the right, padded to the screen
    /// width
    pub fn status_line(&mut self) -> Result<Vec<u8>, ZError> {
        let location = self.load_variable(16)?;
        let (first, second) = (self.load_variable(17)?, self.load_variable(18)?);
        let cols = self.config.screen_cols as usize;

        let (field, right) = if self.mem.get_byte(H_CONFIG)? & CONFIG_TIME != 0 {
            (TIME_FIELD, format!(" Time: {}", format_time(first, second)))
        } else {
            (
                SCORE_FIELD,
                format!(" Score: {} Moves: {}", first as i16, second as i16),
            )
        };

        let mut line = vec![b' '];
        for c in self.object_name(location)? {
            let (bytes, len) = translate_zchar(c);
            line.extend_from_slice(&bytes[..len]);
        }
        let left_width = cols.saturating_sub(field);
        line.resize(left_width, b' ');
        line.extend_from_slice(right.as_bytes());
        line.resize(cols, b' ');
        Ok(line)
    }

    /// 0OP:0x0C - show_status
    pub fn show_status(&mut self) -> Result<(), ZError> {
        let line = self.status_line()?;
        trace!("show_status: [{}]", String::from_utf8_lossy(&line));
        self.host.show_status(&line)?;
        Ok(())
    }

    /// VAR:0x3E - print_table: `height` rows of `width` characters, each
    /// row followed by `skip` bytes that are not printed
    pub fn print_table(&mut self, addr: u16, width: u16, height: u16, skip: u16) -> Result<(), ZError> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        let mut row_start = addr as u32;
        for row in 0..height {
            if row > 0 {
                self.new_line()?;
            }
            for col in 0..width as u32 {
                let c = self.mem.get_byte(row_start + col)?;
                self.write_zchar(c)?;
            }
            row_start += width as u32 + skip as u32;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{StoryBuilder, SCRATCH_ADDR};
    use test_log::test;

    fn story_with_room(version: u8) -> StoryBuilder {
        let mut builder = StoryBuilder::new(version);
        builder.object((0, 0, 0), "West of House", &[]);
        builder.global(16, 1);
        builder.global(17, 5);
        builder.global(18, 12);
        builder
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0, 5), "12:05 am");
        assert_eq!(format_time(9, 30), " 9:30 am");
        assert_eq!(format_time(12, 0), "12:00 pm");
        assert_eq!(format_time(23, 59), "11:59 pm");
    }

    #[test]
    fn test_score_status_line() {
        let mut vm = story_with_room(3).build_vm();
        vm.show_status().unwrap();
        let status = vm.host.get_status_line();
        assert_eq!(status.len(), 80);
        assert!(status.starts_with(" West of House "));
        assert_eq!(status[49..].trim_end(), " Score: 5 Moves: 12");
    }

    #[test]
    fn test_time_status_line() {
        let mut builder = story_with_room(3);
        builder.poke(H_CONFIG, &[CONFIG_TIME]);
        builder.global(17, 14);
        builder.global(18, 7);
        let mut vm = builder.build_vm();
        vm.show_status().unwrap();
        let status = vm.host.get_status_line();
        assert_eq!(status.len(), 80);
        assert_eq!(&status[59..], " Time:  2:07 pm      ");
    }

    #[test]
    fn test_status_line_without_location() {
        let mut builder = StoryBuilder::new(3);
        builder.global(17, (-3i16) as u16);
        let mut vm = builder.build_vm();
        vm.show_status().unwrap();
        let status = vm.host.get_status_line();
        assert_eq!(status.len(), 80);
        assert!(status.contains("Score: -3 Moves: 0"));
        assert!(status[..49].trim().is_empty());
    }

    #[test]
    fn test_split_window_counts_status_line_in_v3() {
        let mut vm = StoryBuilder::new(3).build_vm();
        vm.split_window(2).unwrap();
        assert_eq!(vm.status_size, 3);
        assert_eq!(vm.host.upper_window_lines(), 3);

        let mut vm = StoryBuilder::new(5).build_vm();
        vm.split_window(2).unwrap();
        assert_eq!(vm.status_size, 2);
        vm.split_window(200).unwrap();
        assert_eq!(vm.status_size, 23);
        vm.set_window(1).unwrap();
        vm.split_window(0).unwrap();
        assert_eq!(vm.status_size, 0);
        assert_eq!(vm.window, Window::Lower);
    }

    #[test]
    fn test_cursor_moves_only_in_upper_window() {
        let mut vm = StoryBuilder::new(5).build_vm();
        let table = SCRATCH_ADDR as u16;
        vm.set_cursor(3, 10).unwrap();
        vm.get_cursor(table).unwrap();
        assert_eq!(vm.mem.get_word(table as u32).unwrap(), 1);

        vm.set_window(1).unwrap();
        vm.set_cursor(3, 10).unwrap();
        vm.get_cursor(table).unwrap();
        assert_eq!(vm.mem.get_word(table as u32).unwrap(), 3);
        assert_eq!(vm.mem.get_word(table as u32 + 2).unwrap(), 10);
    }

    #[test]
    fn test_print_table_rows_and_skip() {
        let mut builder = StoryBuilder::new(5);
        builder.poke(SCRATCH_ADDR, b"abcXdefX");
        let mut vm = builder.build_vm();
        vm.print_table(SCRATCH_ADDR as u16, 3, 2, 1).unwrap();
        assert_eq!(vm.host.get_output(), "abc\ndef");
        vm.print_table(SCRATCH_ADDR as u16, 0, 2, 0).unwrap();
        assert_eq!(vm.host.get_output(), "abc\ndef");
    }

    #[test]
    fn test_restart_fills_screen_header() {
        let mut builder = StoryBuilder::new(3);
        builder.poke_word(H_FLAGS, GRAPHICS_FLAG);
        let mut vm = builder.build_vm();
        vm.restart_screen().unwrap();
        vm.restart_interp(true).unwrap();

        assert_eq!(vm.mem.get_byte(H_STANDARD_HIGH).unwrap(), 1);
        assert_eq!(vm.mem.get_byte(H_STANDARD_LOW).unwrap(), 0);
        assert_eq!(vm.mem.get_word(H_FLAGS).unwrap(), SCRIPTING_FLAG);
        assert_eq!(vm.mem.get_byte(H_CONFIG).unwrap() & CONFIG_NOSTATUSLINE, 0);
        assert_eq!(vm.mem.get_byte(H_INTERPRETER).unwrap(), 6);
        assert_eq!(vm.mem.get_byte(H_INTERPRETER_VERSION).unwrap(), b'B');
        assert_eq!(vm.mem.get_byte(H_SCREEN_ROWS).unwrap(), 24);
        assert_eq!(vm.mem.get_byte(H_SCREEN_COLUMNS).unwrap(), 80);
        assert_eq!(vm.mem.get_byte(H_SCREEN_RIGHT).unwrap(), 80);
        assert_eq!(vm.mem.get_byte(H_MAX_CHAR_HEIGHT).unwrap(), 1);
        // Early stories open the status region with a newline
        assert_eq!(vm.host.get_output(), "\n");
    }

    #[test]
    fn test_no_status_line_when_disabled() {
        let mut builder = StoryBuilder::new(3);
        builder.config.status_line = false;
        let mut vm = builder.build_vm();
        vm.restart_screen().unwrap();
        assert_ne!(vm.mem.get_byte(H_CONFIG).unwrap() & CONFIG_NOSTATUSLINE, 0);
    }

    #[test]
    fn test_text_style_reaches_host() {
        let mut builder = StoryBuilder::new(5);
        // set_text_style #02
        let pc = builder.code(&[0xF1, 0b01_11_11_11, 0x02]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.step().unwrap();
        assert_eq!(vm.host.text_style(), 2);
    }
}
