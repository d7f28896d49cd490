/// Mathematical, comparison and variable operations for the Z-Machine
///
/// This module handles the signed 16 bit arithmetic opcodes that need more
/// than a one-line expression in the dispatcher:
/// - Division and remainder (truncating, fatal on zero)
/// - Multi-way equality (je)
/// - Indirect variable updates (inc, dec, load)
/// - The random number generator and the shift instructions
///
/// All arithmetic wraps; values are reinterpreted as `i16` where the
/// instruction is signed.
use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::debug;

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// 2OP:0x01 - je: branch if the first operand equals any of the others
    pub fn op_je(&mut self, operands: &[u16]) -> Result<(), ZError> {
        let matched = match operands.split_first() {
            Some((first, rest)) => rest.iter().any(|v| v == first),
            None => false,
        };
        self.conditional_jump(matched)
    }

    /// 1OP:0x05 - inc. Returns the new value for inc_chk.
    pub fn op_inc(&mut self, variable: u8) -> Result<u16, ZError> {
        let value = (self.load_variable(variable)? as i16).wrapping_add(1) as u16;
        self.store_variable(variable, value)?;
        Ok(value)
    }

    /// 1OP:0x06 - dec. Returns the new value for dec_chk.
    pub fn op_dec(&mut self, variable: u8) -> Result<u16, ZError> {
        let value = (self.load_variable(variable)? as i16).wrapping_sub(1) as u16;
        self.store_variable(variable, value)?;
        Ok(value)
    }

    /// 1OP:0x0E - load
    pub fn op_load(&mut self, variable: u8) -> Result<(), ZError> {
        let value = self.load_variable(variable)?;
        self.store_operand(value)
    }

    /// 2OP:0x17 - div
    pub fn op_div(&mut self, a: u16, b: u16, pc: u32) -> Result<(), ZError> {
        if b == 0 {
            return Err(ZError::DivisionByZero { pc });
        }
        self.store_operand((a as i16).wrapping_div(b as i16) as u16)
    }

    /// 2OP:0x18 - mod: the result takes the sign of the dividend
    pub fn op_mod(&mut self, a: u16, b: u16, pc: u32) -> Result<(), ZError> {
        if b == 0 {
            return Err(ZError::DivisionByZero { pc });
        }
        self.store_operand((a as i16).wrapping_rem(b as i16) as u16)
    }

    /// VAR:0x27 - random. A positive range yields 1..=range; zero reseeds
    /// from the clock and a negative range seeds predictably, both storing 0.
    pub fn op_random(&mut self, range: u16) -> Result<(), ZError> {
        let range = range as i16;
        let value = if range > 0 {
            self.rng.roll(range as u16)
        } else {
            if range == 0 {
                let millis = self.host.millis();
                self.rng.reseed_from_clock(millis);
            } else {
                debug!("random: predictable mode, seed {}", range.unsigned_abs());
                self.rng.seed(range.unsigned_abs() as u64);
            }
            0
        };
        self.store_operand(value)
    }
}

/// Shift left for positive `places`, logical shift right otherwise
pub fn log_shift(value: u16, places: u16) -> u16 {
    let places = places as i16;
    if places >= 0 {
        value.checked_shl(places as u32).unwrap_or(0)
    } else {
        value.checked_shr(places.unsigned_abs() as u32).unwrap_or(0)
    }
}

/// Shift left for positive `places`, sign-extending shift right otherwise
pub fn art_shift(value: u16, places: u16) -> u16 {
    let places = places as i16;
    if places >= 0 {
        value.checked_shl(places as u32).unwrap_or(0)
    } else {
        let places = places.unsigned_abs().min(15) as u32;
        ((value as i16) >> places) as u16
    }
}
