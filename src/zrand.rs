use rand::{rngs::StdRng, Rng, RngCore, SeedableRng};

/// RandMode controls random generator behaviour. May be predictable for testing or truly random for gameplay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RandMode {
    Predictable,
    RandomUniform,
}

pub struct ZRand {
    rng: Box<dyn RngCore>,
    rand_mode: RandMode,
}

impl ZRand {
    pub fn new_uniform() -> ZRand {
        ZRand {
            rng: Box::new(StdRng::from_entropy()),
            rand_mode: RandMode::RandomUniform,
        }
    }

    pub fn new_predictable(seed: u64) -> ZRand {
        ZRand {
            rng: Box::new(StdRng::seed_from_u64(seed)),
            rand_mode: RandMode::Predictable,
        }
    }

    pub fn mode(&self) -> RandMode {
        self.rand_mode
    }

    /// Restart the sequence from `seed`. Story code does this with a
    /// negative `random` operand to get repeatable results.
    pub fn seed(&mut self, seed: u64) {
        *self = ZRand::new_predictable(seed);
    }

    /// Reseed from a clock reading, returning to unpredictable behaviour
    pub fn reseed_from_clock(&mut self, millis: u64) {
        self.rng = Box::new(StdRng::seed_from_u64(millis ^ rand::random::<u64>()));
        self.rand_mode = RandMode::RandomUniform;
    }

    /// Uniform value in `1..=range`
    pub fn roll(&mut self, range: u16) -> u16 {
        if range == 0 {
            0
        } else {
            self.rng.gen_range(1..=range)
        }
    }
}
