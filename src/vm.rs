use crate::config::InterpreterConfig;
use crate::display_trait::{Host, Window};
use crate::error::ZError;
use crate::header::Header;
use crate::memory::AddressSpace;
use crate::zrand::ZRand;
use log::{debug, info};

/// Maximum size of the VM stack
pub const STACK_SIZE: usize = 1024;

/// Engine state. `Stop` ends the current `interpret` loop and carries the
/// session status back to whoever called it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Run,
    Stop,
}

/// Output stream selection: stream 1 (screen) can be switched off, and
/// stream 3 redirects into story memory, nesting as a stack of tables.
#[derive(Debug, Clone, Default)]
pub struct OutputStreams {
    pub screen_off: bool,
    /// (table address, characters written so far)
    pub memory: Vec<(u32, u16)>,
}

/// One running story. Owns its memory, header, stack and host, so separate
/// stories are independent values.
pub struct Vm<M: AddressSpace, H: Host> {
    pub mem: M,
    pub header: Header,
    pub host: H,
    pub config: InterpreterConfig,
    /// Program counter - address of the next code byte
    pub pc: u32,
    /// Evaluation and frame stack, growing downward from `STACK_SIZE`
    pub stack: Vec<u16>,
    /// Index of the top stack word; `STACK_SIZE` when empty
    pub sp: usize,
    /// Frame pointer: the current frame's saved words live just above it,
    /// its locals at and below it
    pub fp: usize,
    pub state: State,
    pub status: u16,
    pub halted: bool,
    pub window: Window,
    pub streams: OutputStreams,
    /// Rows given to the upper window
    pub status_size: u16,
    pub(crate) rng: ZRand,
    /// Dynamic memory as loaded, restored on restart
    pristine: Vec<u8>,
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Configure the header of `mem` and build a machine ready for
    /// `initialize_screen` and `restart`.
    pub fn new(mut mem: M, host: H, config: InterpreterConfig) -> Result<Self, ZError> {
        let header = Header::configure(&mut mem, config.min_version, config.max_version)?;
        info!(
            "Loaded version {} story, release {} serial {}",
            header.version, header.release, header.serial
        );

        let dynamic_end = (header.restart_size as u32).min(mem.size());
        let mut pristine = Vec::with_capacity(dynamic_end as usize);
        for addr in 0..dynamic_end {
            pristine.push(mem.get_byte(addr)?);
        }

        let rng = match config.random_seed {
            Some(seed) => ZRand::new_predictable(seed),
            None => ZRand::new_uniform(),
        };

        Ok(Vm {
            pc: header.start_pc as u32,
            mem,
            header,
            host,
            config,
            stack: vec![0; STACK_SIZE],
            sp: STACK_SIZE,
            fp: STACK_SIZE - 1,
            state: State::Run,
            status: 1,
            halted: false,
            window: Window::Lower,
            streams: OutputStreams::default(),
            status_size: 0,
            rng,
            pristine,
        })
    }

    /// Flush buffered memory writes and the display
    pub fn close(&mut self) -> Result<(), ZError> {
        debug!("Closing story");
        self.mem.flush()?;
        self.host.flush()?;
        Ok(())
    }

    pub(crate) fn restore_dynamic_memory(&mut self) -> Result<(), ZError> {
        let mut changed = 0;
        for addr in 0..self.pristine.len() {
            let original = self.pristine[addr];
            if self.mem.get_byte(addr as u32)? != original {
                self.mem.set_byte(addr as u32, original)?;
                changed += 1;
            }
        }
        debug!("Restored {} bytes of dynamic memory", changed);
        Ok(())
    }

    pub fn read_code_byte(&mut self) -> Result<u8, ZError> {
        let value = self.mem.get_byte(self.pc)?;
        self.pc += 1;
        Ok(value)
    }

    pub fn read_code_word(&mut self) -> Result<u16, ZError> {
        let value = self.mem.get_word(self.pc)?;
        self.pc += 2;
        Ok(value)
    }

    pub fn push(&mut self, value: u16) -> Result<(), ZError> {
        if self.sp == 0 {
            return Err(ZError::StackOverflow);
        }
        self.sp -= 1;
        self.stack[self.sp] = value;
        Ok(())
    }

    pub fn pop(&mut self) -> Result<u16, ZError> {
        if self.sp >= STACK_SIZE {
            return Err(ZError::StackUnderflow);
        }
        let value = self.stack[self.sp];
        self.sp += 1;
        Ok(value)
    }

    fn local_index(&self, number: u8) -> Result<usize, ZError> {
        self.fp
            .checked_sub(number as usize - 1)
            .ok_or(ZError::StackOverflow)
    }

    fn global_address(&self, number: u8) -> u32 {
        self.header.globals_offset as u32 + (number as u32 - 16) * 2
    }

    /// Read a variable without side effects: 0 peeks the top of stack,
    /// 1-15 are locals of the current frame, 16 and up are globals
    pub fn load_variable(&mut self, number: u8) -> Result<u16, ZError> {
        match number {
            0 => self
                .stack
                .get(self.sp)
                .copied()
                .ok_or(ZError::StackUnderflow),
            1..=15 => {
                let index = self.local_index(number)?;
                self.stack.get(index).copied().ok_or(ZError::StackUnderflow)
            }
            _ => {
                let addr = self.global_address(number);
                self.mem.get_word(addr)
            }
        }
    }

    /// Write a variable in place; 0 replaces the top of stack
    pub fn store_variable(&mut self, number: u8, value: u16) -> Result<(), ZError> {
        match number {
            0 => {
                if self.sp >= STACK_SIZE {
                    return Err(ZError::StackUnderflow);
                }
                self.stack[self.sp] = value;
                Ok(())
            }
            1..=15 => {
                let index = self.local_index(number)?;
                let slot = self.stack.get_mut(index).ok_or(ZError::StackUnderflow)?;
                *slot = value;
                Ok(())
            }
            _ => {
                let addr = self.global_address(number);
                self.mem.set_word(addr, value)
            }
        }
    }

    /// Store a result through the store byte that follows the instruction:
    /// 0 pushes, anything else names a variable
    pub fn store_operand(&mut self, value: u16) -> Result<(), ZError> {
        let specifier = self.read_code_byte()?;
        if specifier == 0 {
            self.push(value)
        } else {
            self.store_variable(specifier, value)
        }
    }

    /// Consume the branch specifier and act on it. Bit 7 set means branch
    /// when `flag` is true; bit 6 selects a 6 bit unsigned offset, otherwise
    /// the offset is 14 bits signed. Offsets 0 and 1 return that value from
    /// the current routine instead of jumping.
    pub fn conditional_jump(&mut self, flag: bool) -> Result<(), ZError> {
        let specifier = self.read_code_byte()?;
        let flag = if specifier & 0x80 != 0 { !flag } else { flag };

        let mut offset = (specifier & 0x3f) as u16;
        if specifier & 0x40 == 0 {
            offset = (offset << 8) | self.read_code_byte()? as u16;
            if offset & 0x2000 != 0 {
                offset |= 0xc000;
            }
        }

        if !flag {
            if offset == 0 || offset == 1 {
                self.ret(offset)?;
            } else {
                self.pc = (self.pc as i64 + offset as i16 as i64 - 2) as u32;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display_headless::HeadlessDisplay;
    use crate::memory::MemoryImage;
    use crate::test_utils::StoryBuilder;
    use test_log::test;

    fn create_test_vm() -> Vm<MemoryImage, HeadlessDisplay> {
        StoryBuilder::new(3).build_vm()
    }

    #[test]
    fn test_stack_operations() {
        let mut vm = create_test_vm();
        vm.push(42).unwrap();
        vm.push(100).unwrap();
        assert_eq!(vm.load_variable(0).unwrap(), 100);
        assert_eq!(vm.pop().unwrap(), 100);
        assert_eq!(vm.pop().unwrap(), 42);
        assert!(matches!(vm.pop(), Err(ZError::StackUnderflow)));
    }

    #[test]
    fn test_stack_overflow_is_fatal() {
        let mut vm = create_test_vm();
        for i in 0..STACK_SIZE {
            vm.push(i as u16).unwrap();
        }
        assert!(matches!(vm.push(0), Err(ZError::StackOverflow)));
    }

    #[test]
    fn test_variable_zero_peeks_and_replaces() {
        let mut vm = create_test_vm();
        vm.push(1).unwrap();
        vm.push(2).unwrap();
        vm.store_variable(0, 7).unwrap();
        assert_eq!(vm.load_variable(0).unwrap(), 7);
        assert_eq!(vm.sp, STACK_SIZE - 2);
    }

    #[test]
    fn test_locals_outside_the_stack_are_fatal() {
        let mut vm = create_test_vm();
        vm.fp = 0xFFFF;
        assert!(matches!(vm.load_variable(1), Err(ZError::StackUnderflow)));
        assert!(matches!(vm.store_variable(2, 5), Err(ZError::StackUnderflow)));

        vm.fp = 0;
        assert!(matches!(vm.load_variable(2), Err(ZError::StackOverflow)));
    }

    #[test]
    fn test_globals_live_in_memory() {
        let mut vm = create_test_vm();
        vm.store_variable(16, 0x1234).unwrap();
        vm.store_variable(255, 0xBEEF).unwrap();
        let globals = vm.header.globals_offset as u32;
        assert_eq!(vm.mem.get_word(globals).unwrap(), 0x1234);
        assert_eq!(vm.mem.get_word(globals + 239 * 2).unwrap(), 0xBEEF);
        assert_eq!(vm.load_variable(16).unwrap(), 0x1234);
    }

    #[test]
    fn test_store_operand_pushes_for_zero() {
        let mut builder = StoryBuilder::new(3);
        let pc = builder.code(&[0x00, 0x10]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.store_operand(5).unwrap();
        assert_eq!(vm.pop().unwrap(), 5);
        vm.store_operand(6).unwrap();
        assert_eq!(vm.load_variable(16).unwrap(), 6);
    }

    #[test]
    fn test_branch_long_offset_is_signed() {
        let mut builder = StoryBuilder::new(3);
        // Branch on true, 14 bit offset of -4
        let pc = builder.code(&[0xBF, 0xFC]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.conditional_jump(true).unwrap();
        assert_eq!(vm.pc, pc + 2 - 4 - 2);
    }

    #[test]
    fn test_branch_not_taken_skips_offset() {
        let mut builder = StoryBuilder::new(3);
        let pc = builder.code(&[0x80 | 0x40 | 0x10]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.conditional_jump(false).unwrap();
        assert_eq!(vm.pc, pc + 1);
    }
}
