//! Keyboard input opcodes
//!
//! Line and character reads go through the host. A read may time out, in
//! which case the story's interrupt routine runs to completion inside a
//! nested interpreter loop; a nonzero result from it abandons the read.

use crate::control::CallType;
use crate::display_trait::{Host, KeyInput, LineInput};
use crate::error::ZError;
use crate::instruction::Operands;
use crate::memory::AddressSpace;
use crate::text::ZSCII_NEWLINE;
use crate::vm::Vm;
use log::{debug, info};

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Run the timeout routine; true when it asks to abandon the read
    fn input_interrupt(&mut self, routine: u16) -> Result<bool, ZError> {
        let status = self.call(&[routine], CallType::Async)?;
        debug!("timeout routine {:#06x} returned {}", routine, status);
        Ok(status != 0 || self.halted)
    }

    /// Read a line into the text buffer at `address` and lowercase it.
    /// Returns the terminating character, or 0 when the read was abandoned.
    pub fn get_line(&mut self, address: u16, timeout: u16, routine: u16) -> Result<u8, ZError> {
        let addr = address as u32;
        let buflen = self.mem.get_byte(addr)? as usize;

        // Version 5 buffers carry a length byte and may hold earlier text
        let (start, preloaded, max_len) = if self.header.version > 4 {
            let preloaded = (self.mem.get_byte(addr + 1)? as usize).min(buflen);
            (addr + 2, preloaded, buflen - preloaded)
        } else {
            (addr + 1, 0, buflen.saturating_sub(1))
        };

        self.host.flush()?;
        let (line, terminator) = loop {
            match self.host.read_line(max_len, timeout)? {
                LineInput::Line(line) => break (Some(line), ZSCII_NEWLINE),
                LineInput::TimedOut => {
                    if self.input_interrupt(routine)? {
                        self.host.cancel_line();
                        break (None, 0);
                    }
                }
                LineInput::Closed => {
                    info!("Input closed, stopping");
                    self.halted = true;
                    break (None, 0);
                }
            }
        };

        let length = match line {
            Some(line) => {
                let line = &line[..line.len().min(max_len)];
                for (i, c) in line.iter().enumerate() {
                    self.mem
                        .set_byte(start + (preloaded + i) as u32, c.to_ascii_lowercase())?;
                }
                preloaded + line.len()
            }
            None => 0,
        };

        if self.header.version > 4 {
            self.mem.set_byte(addr + 1, length as u8)?;
        } else {
            self.mem.set_byte(start + length as u32, 0)?;
        }
        Ok(terminator)
    }

    /// VAR:0x24 - sread / aread
    pub fn op_read(&mut self, ops: &Operands) -> Result<(), ZError> {
        let (text, parse) = (ops.get(0), ops.get(1));
        if self.header.version < 4 {
            self.show_status()?;
        }

        let terminator = self.get_line(text, ops.get(2), ops.get(3))?;
        if self.halted {
            return Ok(());
        }

        if parse != 0 {
            self.tokenise_line(text, parse, self.header.words_offset, false)?;
        }
        if self.header.version > 4 {
            self.store_operand(terminator as u16)?;
        }
        Ok(())
    }

    /// VAR:0x36 - read_char. Only the keyboard (device 1, or 0) is
    /// supported; anything else answers 0.
    pub fn op_read_char(&mut self, ops: &Operands) -> Result<(), ZError> {
        let device = ops.get(0);
        let (timeout, routine) = (ops.get(1), ops.get(2));

        let c = if device > 1 {
            0
        } else {
            self.host.flush()?;
            loop {
                match self.host.read_char(timeout)? {
                    KeyInput::Key(b'\n') => break ZSCII_NEWLINE,
                    KeyInput::Key(key) => break key,
                    KeyInput::TimedOut => {
                        if self.input_interrupt(routine)? {
                            break 0;
                        }
                    }
                    KeyInput::Closed => {
                        info!("Input closed, stopping");
                        self.halted = true;
                        break 0;
                    }
                }
            }
        };
        self.store_operand(c as u16)
    }

    /// VAR:0x3B - tokenise. The dictionary defaults to the story's own.
    pub fn op_tokenise(&mut self, ops: &Operands) -> Result<(), ZError> {
        let dictionary = match ops.get(2) {
            0 => self.header.words_offset,
            table => table,
        };
        self.tokenise_line(ops.get(0), ops.get(1), dictionary, ops.get(3) != 0)
    }
}
