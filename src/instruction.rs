//! Instruction decoding
//!
//! Decoding reads the opcode byte and operands only. Store and branch bytes
//! stay in the code stream and are consumed by the operation itself, after it
//! has computed its result.

use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use std::fmt;

/// Operand types, as encoded in two bit fields
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandType {
    LargeConstant, // 00
    SmallConstant, // 01
    Variable,      // 10
    Omitted,       // 11
}

impl OperandType {
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x03 {
            0b00 => OperandType::LargeConstant,
            0b01 => OperandType::SmallConstant,
            0b10 => OperandType::Variable,
            _ => OperandType::Omitted,
        }
    }
}

/// The five encoding shapes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionForm {
    /// Long form, always two operands
    TwoOp,
    OneOp,
    ZeroOp,
    /// Operand types in a specifier byte (or word for the double calls)
    Variable,
    /// 0xBE prefix from version 5; operands as for `Variable`
    Extended,
}

impl InstructionForm {
    /// Form of an instruction starting with `opcode` in a story of `version`
    pub fn classify(opcode: u8, version: u8) -> Self {
        match opcode {
            0xBE if version > 4 => InstructionForm::Extended,
            0x00..=0x7F => InstructionForm::TwoOp,
            0x80..=0xAF => InstructionForm::OneOp,
            0xB0..=0xBF => InstructionForm::ZeroOp,
            _ => InstructionForm::Variable,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            InstructionForm::TwoOp => "2OP",
            InstructionForm::OneOp => "1OP",
            InstructionForm::ZeroOp => "0OP",
            InstructionForm::Variable => "VAR",
            InstructionForm::Extended => "EXT",
        }
    }
}

/// Up to eight operand values
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Operands {
    values: [u16; 8],
    count: usize,
}

impl Operands {
    pub fn push(&mut self, value: u16) {
        if self.count < self.values.len() {
            self.values[self.count] = value;
            self.count += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Operand `index`, or 0 when it was not supplied
    pub fn get(&self, index: usize) -> u16 {
        if index < self.count {
            self.values[index]
        } else {
            0
        }
    }

    /// Operand `index`, or `default` when it was not supplied
    pub fn get_or(&self, index: usize, default: u16) -> u16 {
        if index < self.count {
            self.values[index]
        } else {
            default
        }
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.values[..self.count]
    }
}

/// A decoded instruction
#[derive(Debug, Clone, Copy)]
pub struct Instruction {
    /// Address of the first byte
    pub address: u32,
    pub form: InstructionForm,
    /// Opcode number within its form. 2OP opcodes in variable form keep
    /// their 2OP number (0x00-0x1F); true VAR opcodes are 0x20-0x3F.
    pub opcode: u8,
    pub operands: Operands,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:05x}: {}:{:#04x}",
            self.address,
            self.form.name(),
            self.opcode
        )?;
        for value in self.operands.as_slice() {
            write!(f, " #{:04x}", value)?;
        }
        Ok(())
    }
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Fetch one operand of the given type. A variable operand of 0 pops.
    pub fn load_operand(&mut self, kind: OperandType) -> Result<u16, ZError> {
        match kind {
            OperandType::LargeConstant => self.read_code_word(),
            OperandType::SmallConstant => Ok(self.read_code_byte()? as u16),
            OperandType::Variable => {
                let number = self.read_code_byte()?;
                if number == 0 {
                    self.pop()
                } else {
                    self.load_variable(number)
                }
            }
            OperandType::Omitted => Ok(0),
        }
    }

    fn load_variable_operands(&mut self, opcode: u8, operands: &mut Operands) -> Result<(), ZError> {
        // call_vs2 and call_vn2 carry a specifier word for eight operands
        let (specifier, max) = if opcode == 0x2C || opcode == 0x3A {
            (self.read_code_word()?, 8)
        } else {
            (self.read_code_byte()? as u16, 4)
        };
        for slot in (0..max).rev() {
            let kind = OperandType::from_bits((specifier >> (slot * 2)) as u8);
            if kind == OperandType::Omitted {
                break;
            }
            operands.push(self.load_operand(kind)?);
        }
        Ok(())
    }

    /// Read the instruction at PC and its operands
    pub fn decode_instruction(&mut self) -> Result<Instruction, ZError> {
        let address = self.pc;
        let byte = self.read_code_byte()?;
        let form = InstructionForm::classify(byte, self.header.version);
        let mut operands = Operands::default();

        let opcode = match form {
            InstructionForm::Extended => {
                let opcode = self.read_code_byte()?;
                self.load_variable_operands(opcode, &mut operands)?;
                opcode
            }
            InstructionForm::TwoOp => {
                for bit in [0x40, 0x20] {
                    let kind = if byte & bit != 0 {
                        OperandType::Variable
                    } else {
                        OperandType::SmallConstant
                    };
                    operands.push(self.load_operand(kind)?);
                }
                byte & 0x1F
            }
            InstructionForm::OneOp => {
                operands.push(self.load_operand(OperandType::from_bits(byte >> 4))?);
                byte & 0x0F
            }
            InstructionForm::ZeroOp => byte & 0x0F,
            InstructionForm::Variable => {
                let opcode = byte & 0x3F;
                self.load_variable_operands(opcode, &mut operands)?;
                opcode
            }
        };

        Ok(Instruction {
            address,
            form,
            opcode,
            operands,
        })
    }
}
