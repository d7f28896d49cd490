/// Routine calls and other control transfer for the Z-Machine
///
/// A call frame is four stack words pushed below the caller's data:
/// the high and low halves of the return PC, the caller's frame pointer and
/// a packed word holding the argument count in the low byte and the call
/// type in the high byte. The new frame pointer sits just below that word,
/// so `stack[fp + 1]` is always the packed word of the current frame and the
/// locals grow downward from `stack[fp]`.
use crate::display_trait::{Host, Window};
use crate::error::ZError;
use crate::header::{H_FLAGS, SCRIPTING_FLAG};
use crate::memory::AddressSpace;
use crate::vm::{OutputStreams, State, Vm, STACK_SIZE};
use log::debug;

const TYPE_MASK: u16 = 0xff00;
const ARGS_MASK: u16 = 0x00ff;

/// What happens to a routine's return value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallType {
    /// Result stored through the caller's store byte
    Function,
    /// Result discarded
    Procedure,
    /// Run to completion inside a nested `interpret`, result returned to
    /// the Rust caller (timed input callbacks)
    Async,
}

impl CallType {
    pub fn bits(self) -> u16 {
        match self {
            CallType::Function => 0x0000,
            CallType::Procedure => 0x0100,
            CallType::Async => 0x0200,
        }
    }

    /// Unknown type bits behave like a procedure: the value is dropped
    pub fn from_frame(word: u16) -> CallType {
        match word & TYPE_MASK {
            0x0000 => CallType::Function,
            0x0200 => CallType::Async,
            _ => CallType::Procedure,
        }
    }
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Call the packed routine address in `argv[0]` with the remaining
    /// entries as arguments. Calling address 0 does nothing except store
    /// false for a function. An async call runs the routine to completion
    /// before returning its value; other calls return 0 immediately and the
    /// value arrives later through `ret`.
    pub fn call(&mut self, argv: &[u16], call_type: CallType) -> Result<u16, ZError> {
        let routine = argv.first().copied().unwrap_or(0);
        if routine == 0 {
            if call_type == CallType::Function {
                self.store_operand(0)?;
            }
            return Ok(0);
        }

        let argc = argv.len() as u16;
        self.push((self.pc >> 16) as u16)?;
        self.push((self.pc & 0xffff) as u16)?;
        self.push(self.fp as u16)?;
        self.push(((argc - 1) & ARGS_MASK) | call_type.bits())?;

        self.fp = self.sp - 1;
        self.pc = self.header.unpack(routine);
        debug!(
            "call {:#06x} with {} args ({:?}), fp={}",
            self.pc,
            argc - 1,
            call_type,
            self.fp
        );

        let locals = self.read_code_byte()?;
        for i in 0..locals as usize {
            let default = if self.header.version > 4 {
                0
            } else {
                self.read_code_word()?
            };
            let value = argv.get(i + 1).copied().unwrap_or(default);
            self.push(value)?;
        }

        if call_type == CallType::Async {
            let status = self.interpret()?;
            self.state = State::Run;
            self.status = 1;
            return Ok(status);
        }
        Ok(0)
    }

    /// Return `value` from the current routine, unwinding its frame
    pub fn ret(&mut self, value: u16) -> Result<(), ZError> {
        self.sp = self.fp + 1;
        let argc = self.pop()?;
        let fp = self.pop()?;
        let pc_low = self.pop()?;
        let pc_high = self.pop()?;
        if fp as usize >= STACK_SIZE {
            return Err(ZError::StackUnderflow);
        }
        self.fp = fp as usize;
        self.pc = ((pc_high as u32) << 16) | pc_low as u32;
        debug!("ret {} to {:#06x}", value, self.pc);

        match CallType::from_frame(argc) {
            CallType::Async => {
                self.state = State::Stop;
                self.status = value;
            }
            CallType::Function => self.store_operand(value)?,
            CallType::Procedure => {}
        }
        Ok(())
    }

    /// 0OP:0x09 - catch (V5+) / pop (V1-4)
    pub fn catch(&mut self) -> Result<(), ZError> {
        if self.header.version > 4 {
            self.store_operand(self.fp as u16)
        } else {
            self.pop().map(|_| ())
        }
    }

    /// Unwind to the frame recorded by `catch` and return `value` from it
    pub fn throw(&mut self, value: u16, target_fp: u16) -> Result<(), ZError> {
        if (target_fp as usize) < self.fp {
            return Err(ZError::IllegalThrow {
                target: target_fp,
                current: self.fp as u16,
            });
        }
        self.fp = target_fp as usize;
        self.ret(value)
    }

    /// 1OP:0x0C - jump
    pub fn jump(&mut self, offset: u16) {
        self.pc = (self.pc as i64 + offset as i16 as i64 - 2) as u32;
    }

    /// VAR:0x3F - check_arg_count
    pub fn check_arg_count(&mut self, number: u16) -> Result<(), ZError> {
        let supplied = self
            .stack
            .get(self.fp + 1)
            .map(|word| word & ARGS_MASK)
            .unwrap_or(0);
        self.conditional_jump(number <= supplied)
    }

    /// Reset the machine to the start of the story. Dynamic memory is
    /// reloaded, the scripting bit survives, and the PRNG is reseeded.
    pub fn restart(&mut self) -> Result<(), ZError> {
        match self.config.random_seed {
            Some(seed) => self.rng.seed(seed),
            None => {
                let millis = self.host.millis();
                self.rng.reseed_from_clock(millis);
            }
        }

        let scripting = self.mem.get_word(H_FLAGS)? & SCRIPTING_FLAG != 0;
        self.restore_dynamic_memory()?;
        self.restart_screen()?;
        self.restart_interp(scripting)?;

        self.pc = self.header.start_pc as u32;
        self.sp = STACK_SIZE;
        self.fp = STACK_SIZE - 1;
        self.state = State::Run;
        self.halted = false;
        self.streams = OutputStreams::default();
        self.window = Window::Lower;
        debug!("Restarted at {:#06x}", self.pc);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StoryBuilder;
    use test_log::test;

    #[test]
    fn test_call_type_round_trip() {
        for call_type in [CallType::Function, CallType::Procedure, CallType::Async] {
            assert_eq!(CallType::from_frame(call_type.bits() | 3), call_type);
        }
        assert_eq!(CallType::from_frame(0x0700), CallType::Procedure);
    }

    #[test]
    fn test_call_zero_stores_false() {
        let mut builder = StoryBuilder::new(3);
        let pc = builder.code(&[0x00]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        assert_eq!(vm.call(&[0, 5], CallType::Function).unwrap(), 0);
        assert_eq!(vm.pop().unwrap(), 0);
        assert_eq!(vm.pc, pc + 1);
    }

    #[test]
    fn test_call_builds_frame_and_locals() {
        let mut builder = StoryBuilder::new(3);
        // Three locals with defaults 10, 20, 30
        let routine = builder.routine(&[10, 20, 30], &[0xB0]);
        let caller = builder.code(&[0x00]);
        let mut vm = builder.build_vm();
        vm.pc = caller;

        vm.call(&[routine, 7], CallType::Function).unwrap();
        assert_eq!(vm.fp, STACK_SIZE - 5);
        assert_eq!(vm.stack[vm.fp + 1], 1);
        assert_eq!(vm.load_variable(1).unwrap(), 7);
        assert_eq!(vm.load_variable(2).unwrap(), 20);
        assert_eq!(vm.load_variable(3).unwrap(), 30);
        assert_eq!(vm.pc, builder_routine_body(routine, 3, 3));
    }

    fn builder_routine_body(packed: u16, version: u8, locals: u32) -> u32 {
        let scaler = if version < 4 { 2 } else { 4 };
        packed as u32 * scaler + 1 + if version < 5 { locals * 2 } else { 0 }
    }

    #[test]
    fn test_v5_locals_default_to_zero() {
        let mut builder = StoryBuilder::new(5);
        let routine = builder.routine(&[0, 0], &[0xB0]);
        let mut vm = builder.build_vm();
        vm.call(&[routine], CallType::Procedure).unwrap();
        assert_eq!(vm.load_variable(1).unwrap(), 0);
        assert_eq!(vm.load_variable(2).unwrap(), 0);
        assert_eq!(vm.pc, builder_routine_body(routine, 5, 2));
    }

    #[test]
    fn test_nested_calls_restore_stack_depth() {
        let mut builder = StoryBuilder::new(3);
        let routine = builder.routine(&[1, 2], &[0xB0]);
        let caller = builder.code(&[0x00, 0x00, 0x00, 0x00]);
        let mut vm = builder.build_vm();
        vm.pc = caller;
        vm.push(99).unwrap();
        let (sp, fp) = (vm.sp, vm.fp);

        for depth in 0..(STACK_SIZE / 4 - 2) / 2 {
            vm.call(&[routine, depth as u16], CallType::Procedure).unwrap();
        }
        while vm.fp != fp {
            vm.ret(0).unwrap();
        }
        assert_eq!(vm.sp, sp);
        assert_eq!(vm.pc, caller);
        assert_eq!(vm.pop().unwrap(), 99);
    }

    #[test]
    fn test_ret_stores_function_result() {
        let mut builder = StoryBuilder::new(3);
        let routine = builder.routine(&[], &[0xB0]);
        // Store byte after the call names global 0x10
        let caller = builder.code(&[0x10]);
        let mut vm = builder.build_vm();
        vm.pc = caller;
        vm.call(&[routine], CallType::Function).unwrap();
        vm.ret(0x4242).unwrap();
        assert_eq!(vm.load_variable(0x10).unwrap(), 0x4242);
        assert_eq!(vm.pc, caller + 1);
        assert_eq!(vm.fp, STACK_SIZE - 1);
    }

    #[test]
    fn test_ret_from_top_level_underflows() {
        let mut vm = StoryBuilder::new(3).build_vm();
        assert!(matches!(vm.ret(1), Err(ZError::StackUnderflow)));
    }

    #[test]
    fn test_throw_unwinds_several_frames() {
        let mut builder = StoryBuilder::new(5);
        let routine = builder.routine(&[], &[0xB0]);
        let caller = builder.code(&[0x10]);
        let mut vm = builder.build_vm();
        vm.pc = caller;

        vm.call(&[routine], CallType::Function).unwrap();
        let token = vm.fp as u16;
        vm.call(&[routine], CallType::Procedure).unwrap();
        vm.call(&[routine], CallType::Procedure).unwrap();

        vm.throw(77, token).unwrap();
        assert_eq!(vm.fp, STACK_SIZE - 1);
        assert_eq!(vm.load_variable(0x10).unwrap(), 77);
    }

    #[test]
    fn test_throw_to_newer_frame_is_fatal() {
        let mut builder = StoryBuilder::new(5);
        let routine = builder.routine(&[], &[0xB0]);
        let mut vm = builder.build_vm();
        vm.call(&[routine], CallType::Procedure).unwrap();
        let current = vm.fp as u16;
        assert!(matches!(
            vm.throw(0, current - 1),
            Err(ZError::IllegalThrow { .. })
        ));
    }

    #[test]
    fn test_throw_to_corrupt_frame_fails_cleanly() {
        let mut builder = StoryBuilder::new(5);
        let routine = builder.routine(&[], &[0xB0]);
        let mut vm = builder.build_vm();
        for word in [0, 0x2000, 0xFFFF, 0x0100] {
            vm.push(word).unwrap();
        }
        let token = (vm.sp - 1) as u16;
        vm.fp = token as usize;
        vm.call(&[routine], CallType::Procedure).unwrap();

        assert!(matches!(vm.throw(0, token), Err(ZError::StackUnderflow)));
        assert!(vm.fp < STACK_SIZE);
        assert!(vm.load_variable(1).is_ok());
    }

    #[test]
    fn test_branch_c1_returns_one() {
        let mut builder = StoryBuilder::new(3);
        let routine = builder.routine(&[], &[0xC1]);
        let caller = builder.code(&[0x10]);
        let mut vm = builder.build_vm();
        vm.pc = caller;
        vm.call(&[routine], CallType::Function).unwrap();

        vm.conditional_jump(true).unwrap();
        assert_eq!(vm.pc, caller + 1);
        assert_eq!(vm.load_variable(0x10).unwrap(), 1);
    }

    #[test]
    fn test_check_arg_count() {
        let mut builder = StoryBuilder::new(5);
        // Two branches: taken returns true, not taken falls through
        let routine = builder.routine(&[0, 0, 0], &[0xC1, 0xC1]);
        let mut vm = builder.build_vm();
        vm.call(&[routine, 1, 2], CallType::Procedure).unwrap();
        let fp = vm.fp;

        vm.check_arg_count(3).unwrap();
        assert_eq!(vm.fp, fp);
        vm.check_arg_count(2).unwrap();
        assert_eq!(vm.fp, STACK_SIZE - 1);
    }
}
