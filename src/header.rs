use std::fmt::Display;
use std::fmt::Error;
use std::fmt::Formatter;

use crate::error::ZError;
use crate::memory::AddressSpace;
use log::debug;

// Fixed header offsets
pub const H_TYPE: u32 = 0x00;
pub const H_CONFIG: u32 = 0x01;
pub const H_RELEASE: u32 = 0x02;
pub const H_DATA_SIZE: u32 = 0x04;
pub const H_START_PC: u32 = 0x06;
pub const H_WORDS_OFFSET: u32 = 0x08;
pub const H_OBJECTS_OFFSET: u32 = 0x0A;
pub const H_GLOBALS_OFFSET: u32 = 0x0C;
pub const H_RESTART_SIZE: u32 = 0x0E;
pub const H_FLAGS: u32 = 0x10;
pub const H_SERIAL: u32 = 0x12;
pub const H_SYNONYMS_OFFSET: u32 = 0x18;
pub const H_FILE_SIZE: u32 = 0x1A;
pub const H_CHECKSUM: u32 = 0x1C;
pub const H_INTERPRETER: u32 = 0x1E;
pub const H_INTERPRETER_VERSION: u32 = 0x1F;
pub const H_SCREEN_ROWS: u32 = 0x20;
pub const H_SCREEN_COLUMNS: u32 = 0x21;
pub const H_SCREEN_LEFT: u32 = 0x22;
pub const H_SCREEN_RIGHT: u32 = 0x23;
pub const H_SCREEN_TOP: u32 = 0x24;
pub const H_SCREEN_BOTTOM: u32 = 0x25;
pub const H_MAX_CHAR_WIDTH: u32 = 0x26;
pub const H_MAX_CHAR_HEIGHT: u32 = 0x27;
pub const H_STANDARD_HIGH: u32 = 0x32;
pub const H_STANDARD_LOW: u32 = 0x33;
pub const H_ALTERNATE_ALPHABET_OFFSET: u32 = 0x34;
pub const H_UNICODE_TABLE: u32 = 0x22;

// Config byte bits
pub const CONFIG_BYTE_SWAPPED: u8 = 0x01;
pub const CONFIG_TIME: u8 = 0x02;
pub const CONFIG_NOSTATUSLINE: u8 = 0x10;

// Flags word bits
pub const SCRIPTING_FLAG: u16 = 0x0001;
pub const GRAPHICS_FLAG: u16 = 0x0008;

/// Header fields read once at configure time plus the version dependent
/// constants derived from them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub config: u8,
    pub release: u16,
    pub serial: String,
    pub data_size: u16,
    pub start_pc: u16,
    pub words_offset: u16,
    pub objects_offset: u16,
    pub globals_offset: u16,
    pub restart_size: u16,
    pub flags: u16,
    pub synonyms_offset: u16,
    pub file_size: u16,
    pub checksum: u16,
    pub alternate_alphabet_offset: u16,
    /// Only present from version 5
    pub unicode_table: u16,
    /// Multiplier turning a packed address into a byte address
    pub story_scaler: u32,
    pub story_shift: u32,
    pub property_mask: u8,
    pub property_size_mask: u8,
}

impl Header {
    /// Parse the header, rejecting versions outside `[min_version, max_version]`
    /// and byte-swapped images.
    pub fn configure<M: AddressSpace + ?Sized>(
        mem: &mut M,
        min_version: u8,
        max_version: u8,
    ) -> Result<Header, ZError> {
        let version = mem.get_byte(H_TYPE)?;
        if version < min_version || version > max_version {
            return Err(ZError::UnsupportedVersion {
                version,
                min: min_version,
                max: max_version,
            });
        }
        let config = mem.get_byte(H_CONFIG)?;
        if config & CONFIG_BYTE_SWAPPED != 0 {
            return Err(ZError::ByteSwapped);
        }

        let (story_scaler, story_shift, property_mask, property_size_mask) = match version {
            v if v < 4 => (2, 1, 0x1F, 0xE0),
            v if v < 8 => (4, 2, 0x3F, 0x3F),
            _ => (8, 3, 0x3F, 0x3F),
        };

        let mut serial = String::new();
        for offset in 0..6 {
            serial.push(mem.get_byte(H_SERIAL + offset)? as char);
        }

        let header = Header {
            version,
            config,
            release: mem.get_word(H_RELEASE)?,
            serial,
            data_size: mem.get_word(H_DATA_SIZE)?,
            start_pc: mem.get_word(H_START_PC)?,
            words_offset: mem.get_word(H_WORDS_OFFSET)?,
            objects_offset: mem.get_word(H_OBJECTS_OFFSET)?,
            globals_offset: mem.get_word(H_GLOBALS_OFFSET)?,
            restart_size: mem.get_word(H_RESTART_SIZE)?,
            flags: mem.get_word(H_FLAGS)?,
            synonyms_offset: mem.get_word(H_SYNONYMS_OFFSET)?,
            file_size: mem.get_word(H_FILE_SIZE)?,
            checksum: mem.get_word(H_CHECKSUM)?,
            alternate_alphabet_offset: mem.get_word(H_ALTERNATE_ALPHABET_OFFSET)?,
            unicode_table: if version >= 5 {
                mem.get_word(H_UNICODE_TABLE)?
            } else {
                0
            },
            story_scaler,
            story_shift,
            property_mask,
            property_size_mask,
        };
        debug!("Configured header:{}", header);
        Ok(header)
    }

    /// Length of the story in bytes. The header field is zero in some early
    /// stories, in which case the size of the real storage is used.
    pub fn story_size(&self, real_size: u32) -> u32 {
        if self.file_size == 0 {
            real_size
        } else {
            self.file_size as u32 * self.story_scaler
        }
    }

    /// Byte address of a packed routine or string address
    pub fn unpack(&self, packed: u16) -> u32 {
        packed as u32 * self.story_scaler
    }

    /// Size of an object record: 9 bytes before version 4, 14 after
    pub fn object_size(&self) -> u32 {
        if self.version < 4 {
            9
        } else {
            14
        }
    }

    /// Number of entries in the property defaults table, plus one
    pub fn property_max(&self) -> u32 {
        if self.version < 4 {
            0x20
        } else {
            0x40
        }
    }
}

impl Display for Header {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), Error> {
        write!(
            f,
            "
Z-code version:           {}
Interpreter flags:        {:#04x}
Release number:           {}
Size of resident memory:  {:#06x}
Start PC:                 {:#06x}
Dictionary address:       {:#06x}
Object table address:     {:#06x}
Global variables address: {:#06x}
Size of dynamic memory:   {:#06x}
Game flags:               {:#06x}
Serial number:            {}
Abbreviations address:    {:#06x}
File size:                {:#06x}
Checksum:                 {:#06x}
",
            self.version,
            self.config,
            self.release,
            self.data_size,
            self.start_pc,
            self.words_offset,
            self.objects_offset,
            self.globals_offset,
            self.restart_size,
            self.flags,
            self.serial,
            self.synonyms_offset,
            self.file_size as u32 * self.story_scaler,
            self.checksum,
        )
    }
}
