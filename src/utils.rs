/// Multiplicative mixing constant (64-bit golden ratio).
const GOLDEN: u64 = 0x9E37_79B9_7F4A_7C15;

/// Mix two `u64` values into one hash, with wrapping arithmetic throughout.
pub fn mix2(a: u64, b: u64) -> u64 {
    let h = a.wrapping_mul(GOLDEN).rotate_left(31) ^ b;
    h.wrapping_mul(GOLDEN) ^ (h >> 29)
}

/// Mix three `u64` values into one hash.
pub fn mix3(a: u64, b: u64, c: u64) -> u64 {
    mix2(mix2(a, b), c)
}

pub trait MyHash {
    /// Hash used for bucket selection in the node table and the computed table.
    fn hash(&self) -> u64;
}

impl MyHash for u64 {
    fn hash(&self) -> u64 {
        mix2(*self, 0)
    }
}

impl MyHash for (u64, u64) {
    fn hash(&self) -> u64 {
        mix2(self.0, self.1)
    }
}

impl MyHash for (u64, u64, u64) {
    fn hash(&self) -> u64 {
        mix3(self.0, self.1, self.2)
    }
}
