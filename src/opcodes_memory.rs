/// Memory table operations for the Z-Machine
///
/// This module handles direct access to story memory from game code:
/// - Word and byte arrays (loadw, storew, loadb, storeb)
/// - Table searching (scan_table)
/// - Block copies and zero fills (copy_table)
///
/// Array indices are signed and the resulting address wraps at 64K, so
/// every access stays within the 16 bit address range the opcodes can name.
use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::debug;

/// Address of element `index` of an array at `base` with `scale` byte
/// elements
fn element_address(base: u16, index: u16, scale: i32) -> u32 {
    (base as i32 + index as i16 as i32 * scale) as u16 as u32
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// 2OP:0x0F - loadw
    pub fn op_loadw(&mut self, array: u16, index: u16) -> Result<(), ZError> {
        let value = self.mem.get_word(element_address(array, index, 2))?;
        self.store_operand(value)
    }

    /// 2OP:0x10 - loadb
    pub fn op_loadb(&mut self, array: u16, index: u16) -> Result<(), ZError> {
        let value = self.mem.get_byte(element_address(array, index, 1))?;
        self.store_operand(value as u16)
    }

    /// VAR:0x21 - storew
    pub fn op_storew(&mut self, array: u16, index: u16, value: u16) -> Result<(), ZError> {
        self.mem.set_word(element_address(array, index, 2), value)
    }

    /// VAR:0x22 - storeb
    pub fn op_storeb(&mut self, array: u16, index: u16, value: u16) -> Result<(), ZError> {
        self.mem.set_byte(element_address(array, index, 1), value as u8)
    }

    /// VAR:0x37 - scan_table. `form` holds the entry size in its low seven
    /// bits and selects word comparison with its top bit. Stores the
    /// address of the first matching entry and branches, or stores 0.
    pub fn op_scan_table(&mut self, value: u16, table: u16, len: u16, form: u16) -> Result<(), ZError> {
        let entry_size = (form & 0x7f) as u32;
        let words = form & 0x80 != 0;
        let mut addr = table as u32;

        for _ in 0..len {
            let entry = if words {
                self.mem.get_word(addr)?
            } else {
                self.mem.get_byte(addr)? as u16
            };
            if entry == value {
                debug!("scan_table: {:#06x} found at {:#06x}", value, addr);
                self.store_operand(addr as u16)?;
                return self.conditional_jump(true);
            }
            addr += entry_size;
        }

        self.store_operand(0)?;
        self.conditional_jump(false)
    }

    /// VAR:0x3D - copy_table. A zero destination clears `size` bytes of the
    /// source. A negative size forces a forward copy even when the tables
    /// overlap; otherwise the copy behaves as if through a temporary.
    pub fn op_copy_table(&mut self, first: u16, second: u16, size: u16) -> Result<(), ZError> {
        let size = size as i16;
        let len = size.unsigned_abs() as u32;
        let (src, dst) = (first as u32, second as u32);

        if second == 0 {
            for i in 0..len {
                self.mem.set_byte(src + i, 0)?;
            }
            return Ok(());
        }

        if size < 0 || dst < src || dst >= src + len {
            for i in 0..len {
                let b = self.mem.get_byte(src + i)?;
                self.mem.set_byte(dst + i, b)?;
            }
        } else {
            for i in (0..len).rev() {
                let b = self.mem.get_byte(src + i)?;
                self.mem.set_byte(dst + i, b)?;
            }
        }
        Ok(())
    }
}
