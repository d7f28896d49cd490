//! Fatal error conditions raised by the Z-machine core
//!
//! Anything that reaches the host as a `ZError` means the session cannot
//! continue and must be restarted. Recoverable conditions (save, restore and
//! undo being unavailable) never surface here; they are reported to story
//! code as in-band values instead.

use crate::display_trait::DisplayError;
use std::fmt;

#[derive(Debug)]
pub enum ZError {
    /// Header version byte outside the range the host accepts
    UnsupportedVersion { version: u8, min: u8, max: u8 },
    /// Story was written on a machine with the opposite byte order
    ByteSwapped,
    /// Story file could not be opened
    StoryOpen { path: String, reason: String },
    /// Read or write-back failure in the backing storage
    Storage(String),
    /// Access outside `[0, size)` of the address space
    AddressOutOfRange { addr: u32, size: u32 },
    /// `throw` targeting a frame newer than the current one
    IllegalThrow { target: u16, current: u16 },
    /// Opcode with no operation in the dispatch tables
    UnknownOpcode { form: &'static str, opcode: u8, pc: u32 },
    /// `put_prop` or `get_next_prop` on a property the object does not have
    MissingProperty { object: u16, property: u16 },
    StackOverflow,
    StackUnderflow,
    DivisionByZero { pc: u32 },
    /// Abbreviation expanding into another abbreviation beyond the depth limit
    NestedAbbreviation { addr: u32 },
    Display(DisplayError),
    Config(String),
}

impl fmt::Display for ZError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZError::UnsupportedVersion { version, min, max } => write!(
                f,
                "Unsupported zcode version {} (interpreter handles {}-{})",
                version, min, max
            ),
            ZError::ByteSwapped => write!(f, "Story file is byte swapped"),
            ZError::StoryOpen { path, reason } => {
                write!(f, "Cannot open story file '{}': {}", path, reason)
            }
            ZError::Storage(msg) => write!(f, "Storage error: {}", msg),
            ZError::AddressOutOfRange { addr, size } => write!(
                f,
                "Address {:#06x} out of range (story size {:#06x})",
                addr, size
            ),
            ZError::IllegalThrow { target, current } => write!(
                f,
                "Illegal throw to frame {} from frame {}",
                target, current
            ),
            ZError::UnknownOpcode { form, opcode, pc } => write!(
                f,
                "Unknown {} opcode {:#04x} at PC {:#06x}",
                form, opcode, pc
            ),
            ZError::MissingProperty { object, property } => write!(
                f,
                "Object {} has no property {}",
                object, property
            ),
            ZError::StackOverflow => write!(f, "Stack overflow"),
            ZError::StackUnderflow => write!(f, "Stack underflow"),
            ZError::DivisionByZero { pc } => write!(f, "Division by zero at PC {:#06x}", pc),
            ZError::NestedAbbreviation { addr } => {
                write!(f, "Abbreviations nested too deeply at {:#06x}", addr)
            }
            ZError::Display(err) => write!(f, "{}", err),
            ZError::Config(msg) => write!(f, "Configuration error: {}", msg),
        }
    }
}

impl std::error::Error for ZError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ZError::Display(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DisplayError> for ZError {
    fn from(error: DisplayError) -> Self {
        ZError::Display(error)
    }
}

impl From<std::io::Error> for ZError {
    fn from(error: std::io::Error) -> Self {
        ZError::Storage(error.to_string())
    }
}
