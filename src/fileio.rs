//! Save, restore, undo and verify
//!
//! There is no save file support. Every save and restore reports failure in
//! the form the story version expects, so games print their own "Failed."
//! message and carry on. verify always succeeds; the checksum is still
//! computed and logged.

use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::{debug, warn};

/// The checksum covers everything after the 64 byte header
const CHECKSUM_START: u32 = 0x40;

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Report a failed save or restore: a false branch for version 1-3,
    /// a stored 0 afterwards
    fn file_op_failed(&mut self, operation: &str) -> Result<(), ZError> {
        warn!("{} is not supported", operation);
        if self.header.version < 4 {
            self.conditional_jump(false)
        } else {
            self.store_operand(0)
        }
    }

    /// 0OP:0x05 - save
    pub fn save(&mut self) -> Result<(), ZError> {
        self.file_op_failed("save")
    }

    /// 0OP:0x06 - restore
    pub fn restore(&mut self) -> Result<(), ZError> {
        self.file_op_failed("restore")
    }

    /// EXT:0x00 - save (table, bytes, name operands are ignored)
    pub fn save_ext(&mut self) -> Result<(), ZError> {
        warn!("save is not supported");
        self.store_operand(0)
    }

    /// EXT:0x01 - restore
    pub fn restore_ext(&mut self) -> Result<(), ZError> {
        warn!("restore is not supported");
        self.store_operand(0)
    }

    /// EXT:0x09 - save_undo: -1 tells the story undo is unavailable
    pub fn save_undo(&mut self) -> Result<(), ZError> {
        debug!("save_undo: unavailable");
        self.store_operand(0xFFFF)
    }

    /// EXT:0x0A - restore_undo
    pub fn restore_undo(&mut self) -> Result<(), ZError> {
        debug!("restore_undo: unavailable");
        self.store_operand(0xFFFF)
    }

    /// Sum of the story bytes after the header, as stored at 0x1C
    pub fn checksum(&mut self) -> Result<u16, ZError> {
        let end = self.header.story_size(self.mem.size()).min(self.mem.size());
        let mut sum = 0u16;
        for addr in CHECKSUM_START..end {
            sum = sum.wrapping_add(self.mem.get_byte(addr)? as u16);
        }
        Ok(sum)
    }

    /// 0OP:0x0D - verify. Dynamic memory may have changed since loading,
    /// so a mismatch is only logged.
    pub fn verify(&mut self) -> Result<(), ZError> {
        let sum = self.checksum()?;
        if sum != self.header.checksum {
            debug!(
                "verify: checksum {:#06x} differs from header {:#06x}",
                sum, self.header.checksum
            );
        }
        self.conditional_jump(true)
    }
}

#[cfg(test)]
mod tests {
    use crate::memory::AddressSpace;
    use crate::test_utils::{StoryBuilder, STORY_SIZE};
    use test_log::test;

    // Branch on true, short form, offset 5
    const BRANCH_TRUE: u8 = 0xC5;

    #[test]
    fn test_v3_save_and_restore_branch_false() {
        for opcode in [0xB5, 0xB6] {
            let mut builder = StoryBuilder::new(3);
            let pc = builder.code(&[opcode, BRANCH_TRUE]);
            let mut vm = builder.build_vm();
            vm.pc = pc;
            vm.step().unwrap();
            assert_eq!(vm.pc, pc + 2);
        }
    }

    #[test]
    fn test_v4_save_stores_zero() {
        let mut builder = StoryBuilder::new(4);
        builder.global(16, 9);
        let pc = builder.code(&[0xB5, 0x10]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.step().unwrap();
        assert_eq!(vm.load_variable(16).unwrap(), 0);
        assert_eq!(vm.pc, pc + 2);
    }

    #[test]
    fn test_ext_save_restore_and_undo() {
        let mut builder = StoryBuilder::new(5);
        // save -> G00 ; restore -> G01 ; save_undo -> G02 ; restore_undo -> G03
        let pc = builder.code(&[
            0xBE, 0x00, 0xFF, 0x10, 0xBE, 0x01, 0xFF, 0x11, 0xBE, 0x09, 0xFF, 0x12, 0xBE, 0x0A,
            0xFF, 0x13,
        ]);
        builder.global(16, 1);
        builder.global(17, 1);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        for _ in 0..4 {
            vm.step().unwrap();
        }
        assert_eq!(vm.load_variable(0x10).unwrap(), 0);
        assert_eq!(vm.load_variable(0x11).unwrap(), 0);
        assert_eq!(vm.load_variable(0x12).unwrap(), 0xFFFF);
        assert_eq!(vm.load_variable(0x13).unwrap(), 0xFFFF);
    }

    #[test]
    fn test_verify_branches_even_on_bad_checksum() {
        let mut builder = StoryBuilder::new(3);
        builder.poke_word(crate::header::H_CHECKSUM, 0x1234);
        let pc = builder.code(&[0xBD, BRANCH_TRUE]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.step().unwrap();
        assert_eq!(vm.pc, pc + 2 + 5 - 2);
    }

    #[test]
    fn test_checksum_sums_bytes_after_header() {
        let mut builder = StoryBuilder::new(3);
        builder.poke_word(crate::header::H_FILE_SIZE, (STORY_SIZE / 2) as u16);
        let mut vm = builder.build_vm();
        let base = vm.checksum().unwrap();
        // Header bytes are not summed
        vm.mem.set_byte(0x3F, 0xFF).unwrap();
        assert_eq!(vm.checksum().unwrap(), base);
        vm.mem.set_byte(STORY_SIZE as u32 - 1, 0x10).unwrap();
        assert_eq!(vm.checksum().unwrap(), base.wrapping_add(0x10));
    }
}
