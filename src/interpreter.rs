//! The decode/execute loop
//!
//! `interpret` runs instructions until the engine leaves the `Run` state or
//! the story quits. Each opcode number maps to exactly one operation; an
//! unmapped opcode is fatal. Operations live in the module for their concern
//! (math, memory tables, objects, properties, text, input, screen) and are
//! only wired together here.

use crate::control::CallType;
use crate::display_trait::Host;
use crate::error::ZError;
use crate::instruction::{Instruction, InstructionForm};
use crate::memory::AddressSpace;
use crate::opcodes_math::{art_shift, log_shift};
use crate::vm::{State, Vm};
use log::{debug, trace};

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Run until `Stop` or quit and return the session status. Also
    /// re-entered recursively by async calls.
    pub fn interpret(&mut self) -> Result<u16, ZError> {
        self.status = 1;
        self.state = State::Run;
        while self.state == State::Run && !self.halted {
            self.step()?;
        }
        Ok(self.status)
    }

    /// Decode and execute one instruction
    pub fn step(&mut self) -> Result<(), ZError> {
        let inst = self.decode_instruction()?;
        trace!("{}", inst);
        match inst.form {
            InstructionForm::ZeroOp => self.execute_0op(&inst),
            InstructionForm::OneOp => self.execute_1op(&inst),
            InstructionForm::TwoOp | InstructionForm::Variable => self.execute_var(&inst),
            InstructionForm::Extended => self.execute_ext(&inst),
        }
    }

    fn unknown_opcode(&self, inst: &Instruction) -> ZError {
        ZError::UnknownOpcode {
            form: inst.form.name(),
            opcode: inst.opcode,
            pc: inst.address,
        }
    }

    fn execute_0op(&mut self, inst: &Instruction) -> Result<(), ZError> {
        match inst.opcode {
            // 0OP:0x00 - rtrue
            0x00 => self.ret(1),
            // 0OP:0x01 - rfalse
            0x01 => self.ret(0),
            // 0OP:0x02 - print
            0x02 => self.print_literal(),
            // 0OP:0x03 - print_ret
            0x03 => self.print_ret(),
            // 0OP:0x04 - nop
            0x04 => Ok(()),
            // 0OP:0x05 - save
            0x05 => self.save(),
            // 0OP:0x06 - restore
            0x06 => self.restore(),
            // 0OP:0x07 - restart
            0x07 => self.restart(),
            // 0OP:0x08 - ret_popped
            0x08 => {
                let value = self.pop()?;
                self.ret(value)
            }
            // 0OP:0x09 - pop (V1-4) / catch (V5+)
            0x09 => self.catch(),
            // 0OP:0x0A - quit
            0x0A => {
                debug!("quit at {:#06x}", inst.address);
                self.halted = true;
                Ok(())
            }
            // 0OP:0x0B - new_line
            0x0B => self.new_line(),
            // 0OP:0x0C - show_status (V1-3 only, nop afterwards)
            0x0C => {
                if self.header.version < 4 {
                    self.show_status()
                } else {
                    Ok(())
                }
            }
            // 0OP:0x0D - verify
            0x0D => self.verify(),
            // 0OP:0x0F - piracy
            0x0F => self.conditional_jump(true),
            _ => Err(self.unknown_opcode(inst)),
        }
    }

    fn execute_1op(&mut self, inst: &Instruction) -> Result<(), ZError> {
        let a = inst.operands.get(0);
        match inst.opcode {
            // 1OP:0x00 - jz
            0x00 => self.conditional_jump(a == 0),
            // 1OP:0x01 - get_sibling
            0x01 => self.op_get_sibling(a),
            // 1OP:0x02 - get_child
            0x02 => self.op_get_child(a),
            // 1OP:0x03 - get_parent
            0x03 => self.op_get_parent(a),
            // 1OP:0x04 - get_prop_len
            0x04 => {
                let len = self.get_prop_len(a)?;
                self.store_operand(len)
            }
            // 1OP:0x05 - inc
            0x05 => self.op_inc(a as u8).map(|_| ()),
            // 1OP:0x06 - dec
            0x06 => self.op_dec(a as u8).map(|_| ()),
            // 1OP:0x07 - print_addr
            0x07 => self.print_addr(a),
            // 1OP:0x08 - call_1s
            0x08 => self.call(&[a], CallType::Function).map(|_| ()),
            // 1OP:0x09 - remove_obj
            0x09 => self.remove_obj(a),
            // 1OP:0x0A - print_obj
            0x0A => self.print_obj(a),
            // 1OP:0x0B - ret
            0x0B => self.ret(a),
            // 1OP:0x0C - jump
            0x0C => {
                self.jump(a);
                Ok(())
            }
            // 1OP:0x0D - print_paddr
            0x0D => self.print_paddr(a),
            // 1OP:0x0E - load
            0x0E => self.op_load(a as u8),
            // 1OP:0x0F - not (V1-4) / call_1n (V5+)
            0x0F => {
                if self.header.version > 4 {
                    self.call(&[a], CallType::Procedure).map(|_| ())
                } else {
                    self.store_operand(!a)
                }
            }
            _ => Err(self.unknown_opcode(inst)),
        }
    }

    /// 2OP opcodes in either long or variable form, and the VAR opcodes
    fn execute_var(&mut self, inst: &Instruction) -> Result<(), ZError> {
        let ops = &inst.operands;
        let (a, b) = (ops.get(0), ops.get(1));
        match inst.opcode {
            // 2OP:0x01 - je
            0x01 => self.op_je(ops.as_slice()),
            // 2OP:0x02 - jl
            0x02 => self.conditional_jump((a as i16) < (b as i16)),
            // 2OP:0x03 - jg
            0x03 => self.conditional_jump((a as i16) > (b as i16)),
            // 2OP:0x04 - dec_chk
            0x04 => {
                let value = self.op_dec(a as u8)?;
                self.conditional_jump((value as i16) < (b as i16))
            }
            // 2OP:0x05 - inc_chk
            0x05 => {
                let value = self.op_inc(a as u8)?;
                self.conditional_jump((value as i16) > (b as i16))
            }
            // 2OP:0x06 - jin
            0x06 => self.op_jin(a, b),
            // 2OP:0x07 - test
            0x07 => self.conditional_jump(!a & b == 0),
            // 2OP:0x08 - or
            0x08 => self.store_operand(a | b),
            // 2OP:0x09 - and
            0x09 => self.store_operand(a & b),
            // 2OP:0x0A - test_attr
            0x0A => {
                let set = self.test_attr(a, b)?;
                self.conditional_jump(set)
            }
            // 2OP:0x0B - set_attr
            0x0B => self.set_attr(a, b),
            // 2OP:0x0C - clear_attr
            0x0C => self.clear_attr(a, b),
            // 2OP:0x0D - store
            0x0D => self.store_variable(a as u8, b),
            // 2OP:0x0E - insert_obj
            0x0E => self.insert_obj(a, b),
            // 2OP:0x0F - loadw
            0x0F => self.op_loadw(a, b),
            // 2OP:0x10 - loadb
            0x10 => self.op_loadb(a, b),
            // 2OP:0x11 - get_prop
            0x11 => {
                let value = self.get_prop(a, b)?;
                self.store_operand(value)
            }
            // 2OP:0x12 - get_prop_addr
            0x12 => {
                let addr = self.get_prop_addr(a, b)?;
                self.store_operand(addr)
            }
            // 2OP:0x13 - get_next_prop
            0x13 => {
                let next = self.get_next_prop(a, b)?;
                self.store_operand(next)
            }
            // 2OP:0x14 - add
            0x14 => self.store_operand((a as i16).wrapping_add(b as i16) as u16),
            // 2OP:0x15 - sub
            0x15 => self.store_operand((a as i16).wrapping_sub(b as i16) as u16),
            // 2OP:0x16 - mul
            0x16 => self.store_operand((a as i16).wrapping_mul(b as i16) as u16),
            // 2OP:0x17 - div
            0x17 => self.op_div(a, b, inst.address),
            // 2OP:0x18 - mod
            0x18 => self.op_mod(a, b, inst.address),
            // 2OP:0x19 - call_2s
            0x19 => self.call(ops.as_slice(), CallType::Function).map(|_| ()),
            // 2OP:0x1A - call_2n
            0x1A => self.call(ops.as_slice(), CallType::Procedure).map(|_| ()),
            // 2OP:0x1B - set_colour (no colour support)
            0x1B => Ok(()),
            // 2OP:0x1C - throw
            0x1C => self.throw(a, b),

            // VAR:0x20 - call_vs
            0x20 => self.call(ops.as_slice(), CallType::Function).map(|_| ()),
            // VAR:0x21 - storew
            0x21 => self.op_storew(a, b, ops.get(2)),
            // VAR:0x22 - storeb
            0x22 => self.op_storeb(a, b, ops.get(2)),
            // VAR:0x23 - put_prop
            0x23 => self.put_prop(a, b, ops.get(2)),
            // VAR:0x24 - sread / aread
            0x24 => self.op_read(ops),
            // VAR:0x25 - print_char
            0x25 => self.write_zchar(a as u8),
            // VAR:0x26 - print_num
            0x26 => self.print_num(a),
            // VAR:0x27 - random
            0x27 => self.op_random(a),
            // VAR:0x28 - push
            0x28 => self.push(a),
            // VAR:0x29 - pull
            0x29 => {
                let value = self.pop()?;
                self.store_variable(a as u8, value)
            }
            // VAR:0x2A - split_window
            0x2A => self.split_window(a),
            // VAR:0x2B - set_window
            0x2B => self.set_window(a),
            // VAR:0x2C - call_vs2
            0x2C => self.call(ops.as_slice(), CallType::Function).map(|_| ()),
            // VAR:0x2D - erase_window
            0x2D => self.erase_window(a),
            // VAR:0x2E - erase_line
            0x2E => self.erase_line(a),
            // VAR:0x2F - set_cursor
            0x2F => self.set_cursor(a, b),
            // VAR:0x30 - get_cursor
            0x30 => self.get_cursor(a),
            // VAR:0x31 - set_text_style
            0x31 => self.set_text_style(a),
            // VAR:0x32 - buffer_mode
            0x32 => self.buffer_mode(a),
            // VAR:0x33 - output_stream
            0x33 => self.output_stream(a, b),
            // VAR:0x34 - input_stream (keyboard only)
            0x34 => Ok(()),
            // VAR:0x35 - sound_effect (no sound support)
            0x35 => Ok(()),
            // VAR:0x36 - read_char
            0x36 => self.op_read_char(ops),
            // VAR:0x37 - scan_table
            0x37 => self.op_scan_table(a, b, ops.get(2), ops.get_or(3, 0x82)),
            // VAR:0x38 - not
            0x38 => self.store_operand(!a),
            // VAR:0x39 - call_vn
            0x39 => self.call(ops.as_slice(), CallType::Procedure).map(|_| ()),
            // VAR:0x3A - call_vn2
            0x3A => self.call(ops.as_slice(), CallType::Procedure).map(|_| ()),
            // VAR:0x3B - tokenise
            0x3B => self.op_tokenise(ops),
            // VAR:0x3C - encode_text
            0x3C => self.encode_to_memory(a, b, ops.get(2), ops.get(3)),
            // VAR:0x3D - copy_table
            0x3D => self.op_copy_table(a, b, ops.get(2)),
            // VAR:0x3E - print_table
            0x3E => self.print_table(a, b, ops.get_or(2, 1), ops.get(3)),
            // VAR:0x3F - check_arg_count
            0x3F => self.check_arg_count(a),
            _ => Err(self.unknown_opcode(inst)),
        }
    }

    fn execute_ext(&mut self, inst: &Instruction) -> Result<(), ZError> {
        let (a, b) = (inst.operands.get(0), inst.operands.get(1));
        match inst.opcode {
            // EXT:0x00 - save
            0x00 => self.save_ext(),
            // EXT:0x01 - restore
            0x01 => self.restore_ext(),
            // EXT:0x02 - log_shift
            0x02 => self.store_operand(log_shift(a, b)),
            // EXT:0x03 - art_shift
            0x03 => self.store_operand(art_shift(a, b)),
            // EXT:0x04 - set_font
            0x04 => self.store_operand(if a == 1 { 1 } else { 0 }),
            // EXT:0x09 - save_undo
            0x09 => self.save_undo(),
            // EXT:0x0A - restore_undo
            0x0A => self.restore_undo(),
            _ => Err(self.unknown_opcode(inst)),
        }
    }
}
