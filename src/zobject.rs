/// Object tree operations for the Z-Machine
///
/// Objects are fixed size records following the property defaults table:
/// an attribute bit field, parent, sibling and child links, then the
/// address of the property table. Links are bytes before version 4 and
/// words afterwards. Object 0 means "nothing": reads through it yield 0 and
/// updates to it are ignored.
use crate::display_trait::Host;
use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::vm::Vm;
use log::{debug, warn};

/// The three tree links stored in an object record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Link {
    Parent,
    Sibling,
    Child,
}

impl Link {
    fn offset(self, version: u8) -> u32 {
        match (self, version < 4) {
            (Link::Parent, true) => 4,
            (Link::Sibling, true) => 5,
            (Link::Child, true) => 6,
            (Link::Parent, false) => 6,
            (Link::Sibling, false) => 8,
            (Link::Child, false) => 10,
        }
    }
}

// Longest sibling chain walked before giving up on a corrupt tree
const MAX_SIBLINGS: usize = 0xFFFF;

impl<M: AddressSpace, H: Host> Vm<M, H> {
    /// Byte address of the record for `object` (numbered from 1)
    pub fn object_address(&self, object: u16) -> u32 {
        self.header.objects_offset as u32
            + (self.header.property_max() - 1) * 2
            + (object as u32 - 1) * self.header.object_size()
    }

    pub fn read_link(&mut self, object: u16, link: Link) -> Result<u16, ZError> {
        if object == 0 {
            return Ok(0);
        }
        let addr = self.object_address(object) + link.offset(self.header.version);
        if self.header.version < 4 {
            Ok(self.mem.get_byte(addr)? as u16)
        } else {
            self.mem.get_word(addr)
        }
    }

    pub fn write_link(&mut self, object: u16, link: Link, value: u16) -> Result<(), ZError> {
        if object == 0 {
            return Ok(());
        }
        let addr = self.object_address(object) + link.offset(self.header.version);
        if self.header.version < 4 {
            self.mem.set_byte(addr, value as u8)
        } else {
            self.mem.set_word(addr, value)
        }
    }

    /// Address of the property table (short name first) of `object`
    pub fn property_table(&mut self, object: u16) -> Result<u32, ZError> {
        let offset = if self.header.version < 4 { 7 } else { 12 };
        Ok(self.mem.get_word(self.object_address(object) + offset)? as u32)
    }

    /// Decoded short name of `object`, empty when it has none
    pub fn object_name(&mut self, object: u16) -> Result<Vec<u8>, ZError> {
        if object == 0 {
            return Ok(Vec::new());
        }
        let table = self.property_table(object)?;
        if self.mem.get_byte(table)? == 0 {
            return Ok(Vec::new());
        }
        Ok(self.decode_string(table + 1)?.0)
    }

    /// 1OP:0x03 - get_parent
    pub fn op_get_parent(&mut self, object: u16) -> Result<(), ZError> {
        let parent = self.read_link(object, Link::Parent)?;
        self.store_operand(parent)
    }

    /// 1OP:0x01 - get_sibling
    pub fn op_get_sibling(&mut self, object: u16) -> Result<(), ZError> {
        let sibling = self.read_link(object, Link::Sibling)?;
        self.store_operand(sibling)?;
        self.conditional_jump(sibling != 0)
    }

    /// 1OP:0x02 - get_child
    pub fn op_get_child(&mut self, object: u16) -> Result<(), ZError> {
        let child = self.read_link(object, Link::Child)?;
        self.store_operand(child)?;
        self.conditional_jump(child != 0)
    }

    /// 2OP:0x06 - jin
    pub fn op_jin(&mut self, object: u16, parent: u16) -> Result<(), ZError> {
        let actual = self.read_link(object, Link::Parent)?;
        self.conditional_jump(actual == parent)
    }

    /// 1OP:0x09 - remove_obj: detach `object` from its parent, keeping its
    /// own children
    pub fn remove_obj(&mut self, object: u16) -> Result<(), ZError> {
        let parent = self.read_link(object, Link::Parent)?;
        if parent == 0 {
            return Ok(());
        }
        let sibling = self.read_link(object, Link::Sibling)?;
        let first = self.read_link(parent, Link::Child)?;

        if first == object {
            self.write_link(parent, Link::Child, sibling)?;
        } else {
            let mut current = first;
            let mut steps = 0;
            while current != 0 {
                let next = self.read_link(current, Link::Sibling)?;
                if next == object {
                    self.write_link(current, Link::Sibling, sibling)?;
                    break;
                }
                current = next;
                steps += 1;
                if steps > MAX_SIBLINGS {
                    warn!("remove_obj: sibling chain of {} does not end", parent);
                    break;
                }
            }
        }

        self.write_link(object, Link::Parent, 0)?;
        self.write_link(object, Link::Sibling, 0)
    }

    /// 2OP:0x0E - insert_obj: make `object` the first child of `destination`
    pub fn insert_obj(&mut self, object: u16, destination: u16) -> Result<(), ZError> {
        if object == 0 || destination == 0 {
            debug!("insert_obj: ignoring {} -> {}", object, destination);
            return Ok(());
        }
        self.remove_obj(object)?;
        let child = self.read_link(destination, Link::Child)?;
        self.write_link(object, Link::Parent, destination)?;
        self.write_link(object, Link::Sibling, child)?;
        self.write_link(destination, Link::Child, object)
    }

    fn attribute_location(&self, object: u16, attribute: u16) -> (u32, u8) {
        let addr = self.object_address(object) + (attribute as u32 >> 3);
        (addr, 0x80 >> (attribute & 7))
    }

    /// 2OP:0x0A - test_attr
    pub fn test_attr(&mut self, object: u16, attribute: u16) -> Result<bool, ZError> {
        if object == 0 {
            return Ok(false);
        }
        let (addr, mask) = self.attribute_location(object, attribute);
        Ok(self.mem.get_byte(addr)? & mask != 0)
    }

    /// 2OP:0x0B - set_attr
    pub fn set_attr(&mut self, object: u16, attribute: u16) -> Result<(), ZError> {
        if object == 0 {
            return Ok(());
        }
        let (addr, mask) = self.attribute_location(object, attribute);
        let value = self.mem.get_byte(addr)?;
        self.mem.set_byte(addr, value | mask)
    }

    /// 2OP:0x0C - clear_attr
    pub fn clear_attr(&mut self, object: u16, attribute: u16) -> Result<(), ZError> {
        if object == 0 {
            return Ok(());
        }
        let (addr, mask) = self.attribute_location(object, attribute);
        let value = self.mem.get_byte(addr)?;
        self.mem.set_byte(addr, value & !mask)
    }

    /// 1OP:0x0A - print_obj
    pub fn print_obj(&mut self, object: u16) -> Result<(), ZError> {
        for c in self.object_name(object)? {
            self.write_zchar(c)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::H_OBJECTS_OFFSET;
    use crate::test_utils::StoryBuilder;
    use test_log::test;

    /// Room 1 holding 2 and 3, with 4 a sibling of the room
    fn tree(version: u8) -> StoryBuilder {
        let mut builder = StoryBuilder::new(version);
        builder.object((0, 4, 2), "room", &[]);
        builder.object((1, 3, 0), "lamp", &[]);
        builder.object((1, 0, 0), "sword", &[]);
        builder.object((0, 0, 0), "", &[]);
        builder
    }

    #[test]
    fn test_object_address_layout() {
        let mut builder = StoryBuilder::new(3);
        builder.poke_word(H_OBJECTS_OFFSET, 100);
        let vm = builder.build_vm();
        assert_eq!(vm.object_address(1), 162);
        assert_eq!(vm.object_address(2), 171);

        let mut builder = StoryBuilder::new(5);
        builder.poke_word(H_OBJECTS_OFFSET, 100);
        let vm = builder.build_vm();
        assert_eq!(vm.object_address(1), 226);
        assert_eq!(vm.object_address(3), 254);
    }

    #[test]
    fn test_links_v3_and_v5() {
        for version in [3, 5] {
            let mut vm = tree(version).build_vm();
            assert_eq!(vm.read_link(2, Link::Parent).unwrap(), 1);
            assert_eq!(vm.read_link(2, Link::Sibling).unwrap(), 3);
            assert_eq!(vm.read_link(1, Link::Child).unwrap(), 2);
            assert_eq!(vm.read_link(0, Link::Child).unwrap(), 0);
        }
    }

    #[test]
    fn test_remove_middle_and_first_child() {
        let mut vm = tree(3).build_vm();
        vm.remove_obj(3).unwrap();
        assert_eq!(vm.read_link(2, Link::Sibling).unwrap(), 0);
        assert_eq!(vm.read_link(3, Link::Parent).unwrap(), 0);

        vm.remove_obj(2).unwrap();
        assert_eq!(vm.read_link(1, Link::Child).unwrap(), 0);
        // Removing an orphan is a no-op
        vm.remove_obj(2).unwrap();
        vm.remove_obj(0).unwrap();
    }

    #[test]
    fn test_insert_moves_object() {
        let mut vm = tree(5).build_vm();
        vm.insert_obj(3, 4).unwrap();
        assert_eq!(vm.read_link(4, Link::Child).unwrap(), 3);
        assert_eq!(vm.read_link(3, Link::Parent).unwrap(), 4);
        assert_eq!(vm.read_link(3, Link::Sibling).unwrap(), 0);
        assert_eq!(vm.read_link(2, Link::Sibling).unwrap(), 0);

        vm.insert_obj(2, 4).unwrap();
        assert_eq!(vm.read_link(4, Link::Child).unwrap(), 2);
        assert_eq!(vm.read_link(2, Link::Sibling).unwrap(), 3);
        assert_eq!(vm.read_link(1, Link::Child).unwrap(), 0);

        vm.insert_obj(0, 4).unwrap();
        assert_eq!(vm.read_link(4, Link::Child).unwrap(), 2);
    }

    #[test]
    fn test_attributes() {
        let mut builder = tree(3);
        builder.attribute(2, 0);
        builder.attribute(2, 31);
        let mut vm = builder.build_vm();
        assert!(vm.test_attr(2, 0).unwrap());
        assert!(vm.test_attr(2, 31).unwrap());
        assert!(!vm.test_attr(2, 30).unwrap());

        vm.set_attr(2, 9).unwrap();
        assert!(vm.test_attr(2, 9).unwrap());
        let addr = vm.object_address(2);
        assert_eq!(vm.mem.get_byte(addr + 1).unwrap(), 0x40);
        vm.clear_attr(2, 0).unwrap();
        assert!(!vm.test_attr(2, 0).unwrap());
        assert!(!vm.test_attr(0, 0).unwrap());
    }

    #[test]
    fn test_get_child_branches_on_nonzero() {
        let mut builder = tree(3);
        // get_child #01 -> G00 ?(+5) ; get_child #04 -> G01 ?(+5)
        let pc = builder.code(&[0x92, 0x01, 0x10, 0xC5, 0x92, 0x04, 0x11, 0xC5]);
        let mut vm = builder.build_vm();
        vm.pc = pc;
        vm.step().unwrap();
        assert_eq!(vm.load_variable(0x10).unwrap(), 2);
        assert_eq!(vm.pc, pc + 4 + 5 - 2);

        vm.pc = pc + 4;
        vm.step().unwrap();
        assert_eq!(vm.load_variable(0x11).unwrap(), 0);
        assert_eq!(vm.pc, pc + 8);
    }

    #[test]
    fn test_print_obj_short_name() {
        let mut vm = tree(3).build_vm();
        vm.print_obj(3).unwrap();
        vm.print_obj(4).unwrap();
        vm.print_obj(0).unwrap();
        assert_eq!(vm.host.get_output(), "sword");
    }
}
