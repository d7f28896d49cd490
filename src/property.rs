/// Property table access for the Z-Machine
///
/// Each object's property table starts with its short name (a length byte
/// counting words, then the z-string) followed by properties in descending
/// number order and a terminating zero byte. Absent properties fall back
/// to the defaults table at the start of the object area.
use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::debug;

/// One decoded property header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEntry {
    /// Address of the size byte(s)
    pub addr: u32,
    pub id: u16,
    /// Address of the first data byte
    pub data: u32,
    pub size: u32,
    /// Whether get_prop/put_prop treat the value as a single byte
    pub byte_sized: bool,
}

impl PropertyEntry {
    /// Address of the header of the following property
    pub fn next(&self) -> u32 {
        self.data + self.size
    }
}

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Decode the property header at `addr`
    pub fn property_entry(&mut self, addr: u32) -> Result<PropertyEntry, ZError> {
        let b = self.mem.get_byte(addr)?;
        let id = (b & self.header.property_mask) as u16;

        let (data, size, byte_sized) = if self.header.version < 4 {
            (addr + 1, (b >> 5) as u32 + 1, b & 0xe0 == 0)
        } else if b & 0x80 != 0 {
            let size = (self.mem.get_byte(addr + 1)? & self.header.property_size_mask) as u32;
            (addr + 2, if size == 0 { 64 } else { size }, false)
        } else {
            (addr + 1, ((b >> 6) & 1) as u32 + 1, b & 0xc0 == 0)
        };

        Ok(PropertyEntry {
            addr,
            id,
            data,
            size,
            byte_sized,
        })
    }

    /// Address of the first property header of `object`
    pub fn first_property(&mut self, object: u16) -> Result<u32, ZError> {
        let table = self.property_table(object)?;
        let name_words = self.mem.get_byte(table)? as u32;
        Ok(table + name_words * 2 + 1)
    }

    /// Find `property` in the descending list of `object`
    pub fn find_property(&mut self, object: u16, property: u16) -> Result<Option<PropertyEntry>, ZError> {
        let first = self.first_property(object)?;
        let mut entry = self.property_entry(first)?;
        while entry.id > property {
            entry = self.property_entry(entry.next())?;
        }
        Ok(if entry.id == property && property != 0 {
            Some(entry)
        } else {
            None
        })
    }

    fn property_default(&mut self, property: u16) -> Result<u16, ZError> {
        let addr = self.header.objects_offset as u32 + (property as u32).saturating_sub(1) * 2;
        self.mem.get_word(addr)
    }

    /// 2OP:0x11 - get_prop
    pub fn get_prop(&mut self, object: u16, property: u16) -> Result<u16, ZError> {
        if object == 0 {
            return Ok(0);
        }
        match self.find_property(object, property)? {
            Some(entry) if entry.byte_sized => Ok(self.mem.get_byte(entry.data)? as u16),
            Some(entry) => self.mem.get_word(entry.data),
            None => self.property_default(property),
        }
    }

    /// 2OP:0x12 - get_prop_addr: data address, or 0 when absent
    pub fn get_prop_addr(&mut self, object: u16, property: u16) -> Result<u16, ZError> {
        if object == 0 {
            return Ok(0);
        }
        Ok(self
            .find_property(object, property)?
            .map(|entry| entry.data as u16)
            .unwrap_or(0))
    }

    /// 2OP:0x13 - get_next_prop: 0 asks for the first property, and the
    /// last property answers 0
    pub fn get_next_prop(&mut self, object: u16, property: u16) -> Result<u16, ZError> {
        if object == 0 {
            return Ok(0);
        }
        let next = if property == 0 {
            self.first_property(object)?
        } else {
            match self.find_property(object, property)? {
                Some(entry) => entry.next(),
                None => return Err(ZError::MissingProperty { object, property }),
            }
        };
        Ok(self.property_entry(next)?.id)
    }

    /// VAR:0x23 - put_prop. The property must exist.
    pub fn put_prop(&mut self, object: u16, property: u16, value: u16) -> Result<(), ZError> {
        if object == 0 {
            debug!("put_prop: ignoring object 0");
            return Ok(());
        }
        match self.find_property(object, property)? {
            Some(entry) if entry.byte_sized => self.mem.set_byte(entry.data, value as u8),
            Some(entry) => self.mem.set_word(entry.data, value),
            None => Err(ZError::MissingProperty { object, property }),
        }
    }

    /// 1OP:0x04 - get_prop_len, from a data address as returned by
    /// get_prop_addr
    pub fn get_prop_len(&mut self, data: u16) -> Result<u16, ZError> {
        if data == 0 {
            return Ok(0);
        }
        let b = self.mem.get_byte(data as u32 - 1)?;
        let len = if self.header.version < 4 {
            (b >> 5) as u16 + 1
        } else if b & 0x80 != 0 {
            match (b & self.header.property_size_mask) as u16 {
                0 => 64,
                size => size,
            }
        } else {
            ((b >> 6) & 1) as u16 + 1
        };
        Ok(len)
    }
}
