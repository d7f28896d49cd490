// Test utilities for assembling small story images in memory
use crate::config::InterpreterConfig;
use crate::display_headless::HeadlessDisplay;
use crate::header::*;
use crate::memory::MemoryImage;
use crate::text::{encode_text, encode_zchars, pack_zchars};
use crate::vm::Vm;

pub const SYNONYMS_ADDR: u32 = 0x0040;
pub const OBJECTS_ADDR: u32 = 0x0100;
pub const PROPERTIES_ADDR: u32 = 0x0400;
pub const GLOBALS_ADDR: u32 = 0x0600;
/// Free dynamic memory for text buffers and tables
pub const SCRATCH_ADDR: u32 = 0x0800;
pub const STATIC_ADDR: u32 = 0x1000;
pub const DICTIONARY_ADDR: u32 = 0x1000;
pub const STRINGS_ADDR: u32 = 0x1400;
pub const CODE_ADDR: u32 = 0x2000;
pub const STORY_SIZE: usize = 0x4000;

/// Builds a story image with a valid header and fixed regions for
/// synonyms, objects, globals, a dictionary, strings and code
pub struct StoryBuilder {
    pub version: u8,
    pub bytes: Vec<u8>,
    next_code: u32,
    next_string: u32,
    next_property: u32,
    objects: u16,
    pub host: HeadlessDisplay,
    pub config: InterpreterConfig,
}

impl StoryBuilder {
    pub fn new(version: u8) -> Self {
        let mut builder = StoryBuilder {
            version,
            bytes: vec![0; STORY_SIZE],
            next_code: CODE_ADDR,
            next_string: STRINGS_ADDR,
            next_property: PROPERTIES_ADDR,
            objects: 0,
            host: HeadlessDisplay::new(),
            config: InterpreterConfig {
                random_seed: Some(7),
                ..InterpreterConfig::default()
            },
        };
        builder.bytes[H_TYPE as usize] = version;
        builder.poke_word(H_RELEASE, 1);
        builder.poke(H_SERIAL, b"261019");
        builder.poke_word(H_DATA_SIZE, CODE_ADDR as u16);
        builder.poke_word(H_START_PC, CODE_ADDR as u16);
        builder.poke_word(H_WORDS_OFFSET, DICTIONARY_ADDR as u16);
        builder.poke_word(H_OBJECTS_OFFSET, OBJECTS_ADDR as u16);
        builder.poke_word(H_GLOBALS_OFFSET, GLOBALS_ADDR as u16);
        builder.poke_word(H_RESTART_SIZE, STATIC_ADDR as u16);
        builder.poke_word(H_SYNONYMS_OFFSET, SYNONYMS_ADDR as u16);
        builder
    }

    fn scaler(&self) -> u32 {
        match self.version {
            v if v < 4 => 2,
            v if v < 8 => 4,
            _ => 8,
        }
    }

    pub fn poke(&mut self, addr: u32, data: &[u8]) {
        let start = addr as usize;
        self.bytes[start..start + data.len()].copy_from_slice(data);
    }

    pub fn poke_word(&mut self, addr: u32, value: u16) {
        self.poke(addr, &value.to_be_bytes());
    }

    pub fn peek_word(&self, addr: u32) -> u16 {
        let addr = addr as usize;
        u16::from_be_bytes([self.bytes[addr], self.bytes[addr + 1]])
    }

    pub fn global(&mut self, number: u8, value: u16) {
        self.poke_word(GLOBALS_ADDR + (number as u32 - 16) * 2, value);
    }

    /// Append raw code bytes, returning their address
    pub fn code(&mut self, code: &[u8]) -> u32 {
        let addr = self.next_code;
        self.poke(addr, code);
        self.next_code += code.len() as u32;
        addr
    }

    /// Append a routine with one local per default value, returning its
    /// packed address. Defaults are only stored before version 5.
    pub fn routine(&mut self, defaults: &[u16], body: &[u8]) -> u16 {
        let scaler = self.scaler();
        self.next_code = (self.next_code + scaler - 1) / scaler * scaler;
        let addr = self.next_code;
        self.code(&[defaults.len() as u8]);
        if self.version < 5 {
            for &value in defaults {
                self.code(&value.to_be_bytes());
            }
        }
        self.code(body);
        (addr / scaler) as u16
    }

    /// Encode `text` as a z-string in the strings area, returning its
    /// byte address
    pub fn string(&mut self, text: &str) -> u32 {
        let scaler = self.scaler();
        self.next_string = (self.next_string + scaler - 1) / scaler * scaler;
        let addr = self.next_string;
        let words = pack_zchars(&encode_zchars(text.as_bytes(), self.version));
        for word in words {
            self.poke_word(self.next_string, word);
            self.next_string += 2;
        }
        addr
    }

    /// Pack raw z-characters into a string, returning its byte address
    pub fn zchars(&mut self, codes: &[u8]) -> u32 {
        let addr = self.next_string;
        for word in pack_zchars(codes) {
            self.poke_word(self.next_string, word);
            self.next_string += 2;
        }
        addr
    }

    /// Encoded z-string bytes, for inline `print` operands
    pub fn string_bytes(&self, text: &str) -> Vec<u8> {
        pack_zchars(&encode_zchars(text.as_bytes(), self.version))
            .into_iter()
            .flat_map(|word| word.to_be_bytes())
            .collect()
    }

    /// Encode `text` as a z-string at the packed address form
    pub fn packed_string(&mut self, text: &str) -> u16 {
        (self.string(text) / self.scaler()) as u16
    }

    /// Make abbreviation `index` in `table` (1-3) point at `addr`
    pub fn abbreviation(&mut self, table: u8, index: u8, addr: u32) {
        let entry = SYNONYMS_ADDR + (table as u32 - 1) * 64 + index as u32 * 2;
        self.poke_word(entry, (addr / 2) as u16);
    }

    pub fn property_default(&mut self, property: u8, value: u16) {
        self.poke_word(OBJECTS_ADDR + (property as u32 - 1) * 2, value);
    }

    fn object_address(&self, object: u16) -> u32 {
        let (defaults, size) = if self.version < 4 { (31, 9) } else { (63, 14) };
        OBJECTS_ADDR + defaults * 2 + (object as u32 - 1) * size
    }

    /// Append an object with the given links, short name and properties
    /// (listed in descending property order). Returns its number.
    pub fn object(
        &mut self,
        (parent, sibling, child): (u16, u16, u16),
        name: &str,
        properties: &[(u8, &[u8])],
    ) -> u16 {
        self.objects += 1;
        let object = self.objects;
        let addr = self.object_address(object);

        let table = self.next_property;
        let name_words = if name.is_empty() {
            Vec::new()
        } else {
            pack_zchars(&encode_zchars(name.as_bytes(), self.version))
        };
        let mut data = vec![name_words.len() as u8];
        for word in name_words {
            data.extend_from_slice(&word.to_be_bytes());
        }
        for (id, value) in properties {
            let len = value.len() as u8;
            if self.version < 4 {
                data.push(((len - 1) << 5) | id);
            } else if len <= 2 {
                data.push(((len - 1) << 6) | id);
            } else {
                data.push(0x80 | id);
                data.push(0x80 | (len & 0x3F));
            }
            data.extend_from_slice(value);
        }
        data.push(0);
        self.poke(table, &data);
        self.next_property += data.len() as u32;

        if self.version < 4 {
            self.poke(addr + 4, &[parent as u8, sibling as u8, child as u8]);
            self.poke_word(addr + 7, table as u16);
        } else {
            self.poke_word(addr + 6, parent);
            self.poke_word(addr + 8, sibling);
            self.poke_word(addr + 10, child);
            self.poke_word(addr + 12, table as u16);
        }
        object
    }

    pub fn attribute(&mut self, object: u16, attribute: u8) {
        let addr = self.object_address(object) + (attribute as u32 >> 3);
        self.bytes[addr as usize] |= 0x80 >> (attribute & 7);
    }

    /// Write a dictionary with the given separators and words at the
    /// header's dictionary address. Entries are sorted and carry no data
    /// bytes beyond the encoded text.
    pub fn dictionary(&mut self, separators: &[u8], words: &[&str]) {
        self.dictionary_at(DICTIONARY_ADDR, separators, words, true);
    }

    /// Write a dictionary at `addr`. An unsorted dictionary stores a
    /// negative entry count.
    pub fn dictionary_at(&mut self, addr: u32, separators: &[u8], words: &[&str], sorted: bool) {
        let text_len = if self.version < 4 { 4 } else { 6 };
        let entry_size = text_len + 3;
        let mut entries: Vec<[u16; 3]> = words
            .iter()
            .map(|word| encode_text(word.as_bytes(), self.version))
            .collect();
        if sorted {
            entries.sort();
        }

        let mut data = vec![separators.len() as u8];
        data.extend_from_slice(separators);
        data.push(entry_size as u8);
        let count = if sorted {
            entries.len() as i16
        } else {
            -(entries.len() as i16)
        };
        data.extend_from_slice(&count.to_be_bytes());
        for entry in entries {
            for word in &entry[..text_len / 2] {
                data.extend_from_slice(&word.to_be_bytes());
            }
            data.extend_from_slice(&[0, 0, 0]);
        }
        self.poke(addr, &data);
    }

    /// Address of dictionary entry `index` in the sorted header dictionary
    pub fn dictionary_entry(&self, index: u16) -> u16 {
        let separators = self.bytes[DICTIONARY_ADDR as usize] as u32;
        let entry_size = self.bytes[(DICTIONARY_ADDR + 1 + separators) as usize] as u32;
        (DICTIONARY_ADDR + separators + 4 + index as u32 * entry_size) as u16
    }

    pub fn image(&self) -> MemoryImage {
        MemoryImage::new(self.bytes.clone())
    }

    pub fn build_vm(self) -> Vm<MemoryImage, HeadlessDisplay> {
        let image = MemoryImage::new(self.bytes);
        match Vm::new(image, self.host, self.config) {
            Ok(vm) => vm,
            Err(e) => panic!("test story rejected: {}", e),
        }
    }
}
