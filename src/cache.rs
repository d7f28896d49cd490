//! Block cache address space
//!
//! Story memory is served from a handful of 512 byte slots in front of a
//! `Storage`. A miss picks a victim slot, writes it back if dirty, then loads
//! the requested block. Writes only mark a slot dirty; storage sees them on
//! eviction or on an explicit flush. A dirty slot is therefore the only
//! authoritative copy of its block until it is written back.

use crate::error::ZError;
use crate::memory::AddressSpace;
use crate::storage::Storage;
use log::{debug, trace};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

pub const BLOCK_SIZE: u32 = 512;

/// How a victim slot is chosen on a cache miss
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Eviction {
    /// Uniformly random over all slots
    #[default]
    Random,
    /// Empty slots first, then the least recently used
    Lru,
}

#[derive(Debug)]
struct Slot {
    base: Option<u32>,
    dirty: bool,
    last_used: u64,
    data: Vec<u8>,
}

impl Slot {
    fn empty() -> Self {
        Slot {
            base: None,
            dirty: false,
            last_used: 0,
            data: vec![0; BLOCK_SIZE as usize],
        }
    }
}

pub struct BlockCache<S: Storage> {
    storage: S,
    slots: Vec<Slot>,
    policy: Eviction,
    rng: StdRng,
    size: u32,
    tick: u64,
}

impl<S: Storage> BlockCache<S> {
    /// Front `storage` with `slots` blocks. `seed` fixes the random eviction
    /// sequence; `None` seeds from the OS.
    pub fn new(mut storage: S, slots: usize, policy: Eviction, seed: Option<u64>) -> Result<Self, ZError> {
        let size = storage.size()?;
        let slots = (0..slots.max(1)).map(|_| Slot::empty()).collect();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!("Block cache over {} bytes, policy {:?}", size, policy);
        Ok(BlockCache {
            storage,
            slots,
            policy,
            rng,
            size,
            tick: 0,
        })
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Write back every dirty slot
    pub fn flush_all(&mut self) -> Result<(), ZError> {
        for index in 0..self.slots.len() {
            self.write_back(index)?;
        }
        Ok(())
    }

    /// Flush and hand back the storage
    pub fn close(mut self) -> Result<S, ZError> {
        self.flush_all()?;
        Ok(self.storage)
    }

    fn slot_for(&mut self, addr: u32) -> Result<usize, ZError> {
        if addr >= self.size {
            return Err(ZError::AddressOutOfRange {
                addr,
                size: self.size,
            });
        }
        self.tick += 1;
        let base = addr / BLOCK_SIZE * BLOCK_SIZE;

        if let Some(index) = self.slots.iter().position(|s| s.base == Some(base)) {
            self.slots[index].last_used = self.tick;
            return Ok(index);
        }

        let victim = self.choose_victim();
        trace!("Cache miss for block {:#06x}, evicting slot {}", base, victim);
        self.write_back(victim)?;
        self.load(victim, base)?;
        self.slots[victim].last_used = self.tick;
        Ok(victim)
    }

    fn choose_victim(&mut self) -> usize {
        match self.policy {
            Eviction::Random => self.rng.gen_range(0..self.slots.len()),
            Eviction::Lru => {
                if let Some(index) = self.slots.iter().position(|s| s.base.is_none()) {
                    return index;
                }
                self.slots
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, s)| s.last_used)
                    .map(|(index, _)| index)
                    .unwrap_or(0)
            }
        }
    }

    fn block_len(&self, base: u32) -> usize {
        (self.size - base).min(BLOCK_SIZE) as usize
    }

    fn write_back(&mut self, index: usize) -> Result<(), ZError> {
        let (base, dirty) = (self.slots[index].base, self.slots[index].dirty);
        if let (Some(base), true) = (base, dirty) {
            let len = self.block_len(base);
            debug!("Writing back block {:#06x}", base);
            self.storage
                .write_at(base, &self.slots[index].data[..len])
                .map_err(|e| ZError::Storage(format!("write-back of block {:#06x} failed: {}", base, e)))?;
            self.slots[index].dirty = false;
        }
        Ok(())
    }

    fn load(&mut self, index: usize, base: u32) -> Result<(), ZError> {
        let len = self.block_len(base);
        let slot = &mut self.slots[index];
        slot.data.fill(0);
        slot.base = None;
        slot.dirty = false;
        self.storage.read_at(base, &mut slot.data[..len])?;
        slot.base = Some(base);
        Ok(())
    }
}

impl<S: Storage> AddressSpace for BlockCache<S> {
    fn get_byte(&mut self, addr: u32) -> Result<u8, ZError> {
        let index = self.slot_for(addr)?;
        Ok(self.slots[index].data[(addr % BLOCK_SIZE) as usize])
    }

    fn set_byte(&mut self, addr: u32, value: u8) -> Result<(), ZError> {
        let index = self.slot_for(addr)?;
        let slot = &mut self.slots[index];
        slot.data[(addr % BLOCK_SIZE) as usize] = value;
        slot.dirty = true;
        Ok(())
    }

    fn size(&self) -> u32 {
        self.size
    }

    fn flush(&mut self) -> Result<(), ZError> {
        self.flush_all()
    }
}
