//! Byte/word view over the story image
//!
//! Everything in the core reads and writes story memory through
//! `AddressSpace`. Words are big-endian, and a word store is always two byte
//! stores, high byte first, so an implementation only has to get bytes right.

use crate::error::ZError;
use crate::storage::Storage;
use log::debug;

pub trait AddressSpace {
    fn get_byte(&mut self, addr: u32) -> Result<u8, ZError>;

    fn set_byte(&mut self, addr: u32, value: u8) -> Result<(), ZError>;

    /// Size of the addressable region in bytes
    fn size(&self) -> u32;

    fn get_word(&mut self, addr: u32) -> Result<u16, ZError> {
        let high = self.get_byte(addr)?;
        let low = self.get_byte(addr.wrapping_add(1))?;
        Ok(((high as u16) << 8) | low as u16)
    }

    fn set_word(&mut self, addr: u32, value: u16) -> Result<(), ZError> {
        self.set_byte(addr, (value >> 8) as u8)?;
        self.set_byte(addr.wrapping_add(1), (value & 0xff) as u8)
    }

    /// Push any buffered writes down to storage
    fn flush(&mut self) -> Result<(), ZError> {
        Ok(())
    }
}

impl<A: AddressSpace + ?Sized> AddressSpace for Box<A> {
    fn get_byte(&mut self, addr: u32) -> Result<u8, ZError> {
        (**self).get_byte(addr)
    }

    fn set_byte(&mut self, addr: u32, value: u8) -> Result<(), ZError> {
        (**self).set_byte(addr, value)
    }

    fn size(&self) -> u32 {
        (**self).size()
    }

    fn get_word(&mut self, addr: u32) -> Result<u16, ZError> {
        (**self).get_word(addr)
    }

    fn set_word(&mut self, addr: u32, value: u16) -> Result<(), ZError> {
        (**self).set_word(addr, value)
    }

    fn flush(&mut self) -> Result<(), ZError> {
        (**self).flush()
    }
}

/// Whole story held in memory
#[derive(Debug, Clone)]
pub struct MemoryImage {
    bytes: Vec<u8>,
}

impl MemoryImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        MemoryImage { bytes }
    }

    /// Read the entire contents of `storage` into memory
    pub fn load<S: Storage>(storage: &mut S) -> Result<Self, ZError> {
        let size = storage.size()?;
        let mut bytes = vec![0u8; size as usize];
        let read = storage.read_at(0, &mut bytes)?;
        bytes.truncate(read);
        debug!("Loaded {} byte story image", read);
        Ok(MemoryImage { bytes })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn check(&self, addr: u32) -> Result<usize, ZError> {
        if (addr as usize) < self.bytes.len() {
            Ok(addr as usize)
        } else {
            Err(ZError::AddressOutOfRange {
                addr,
                size: self.size(),
            })
        }
    }
}

impl AddressSpace for MemoryImage {
    fn get_byte(&mut self, addr: u32) -> Result<u8, ZError> {
        let index = self.check(addr)?;
        Ok(self.bytes[index])
    }

    fn set_byte(&mut self, addr: u32, value: u8) -> Result<(), ZError> {
        let index = self.check(addr)?;
        self.bytes[index] = value;
        Ok(())
    }

    fn size(&self) -> u32 {
        self.bytes.len() as u32
    }
}
