/// Polynomial (Rabin-Karp) rolling hash for chunk matching.
///
/// The hash of a window `b[0..n]` is `SEED * MULT^n + sum(b[i] * MULT^(n-1-i))`,
/// all modulo 2^32. Alongside the hash we carry the weight `MULT^n`, which is
/// what lets a byte leave the front of the window in O(1).
///
/// Wrapping arithmetic is the hash, not an overflow accident.
pub const SEED: u32 = 1;
pub const MULT: u32 = 0x0810_4225;
/// Multiplicative inverse of `MULT` modulo 2^32.
pub const INVM: u32 = 0x98f0_09ad;
/// Cancels the seed term carried by every window: `(MULT - 1) * SEED`.
pub const ADJ: u32 = MULT.wrapping_sub(1).wrapping_mul(SEED);

/// Hash a whole window, returning `(hash, weight)` where `weight == MULT^len`.
pub fn hash(window: &[u8]) -> (u32, u32) {
    let hash = window.iter().fold(SEED, |h, &byte| {
        h.wrapping_mul(MULT).wrapping_add(u32::from(byte))
    });
    (hash, weight(window.len()))
}

/// `MULT^len` by square-and-multiply.
fn weight(len: usize) -> u32 {
    let mut exp = len;
    let mut pow: u32 = 1;
    let mut sq = MULT;
    while exp > 0 {
        if exp & 1 != 0 {
            pow = pow.wrapping_mul(sq);
        }
        sq = sq.wrapping_mul(sq);
        exp >>= 1;
    }
    pow
}

/// Slide a fixed-size window one byte: drop `old` from the front, append `new`.
/// `weight` is unchanged by this operation.
pub fn rotate(hash: u32, weight: u32, old: u8, new: u8) -> u32 {
    hash.wrapping_mul(MULT)
        .wrapping_sub(u32::from(old).wrapping_add(ADJ).wrapping_mul(weight))
        .wrapping_add(u32::from(new))
}

/// Shrink the window by dropping `old` from the front.
pub fn roll_out(hash: u32, weight: u32, old: u8) -> (u32, u32) {
    let weight = weight.wrapping_mul(INVM);
    let hash = hash.wrapping_sub(weight.wrapping_mul(u32::from(old).wrapping_add(ADJ)));
    (hash, weight)
}

/// Hash state for a window whose bytes are held elsewhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingHash {
    hash: u32,
    weight: u32,
}

impl Default for RollingHash {
    fn default() -> Self {
        Self::new()
    }
}

impl RollingHash {
    /// State of the empty window.
    pub fn new() -> Self {
        Self {
            hash: SEED,
            weight: 1,
        }
    }

    /// Compute hash over an initial block of data.
    pub fn init(&mut self, data: &[u8]) {
        (self.hash, self.weight) = hash(data);
    }

    /// Slide the window: remove `old_byte` from front, add `new_byte` at back.
    pub fn rotate(&mut self, old_byte: u8, new_byte: u8) {
        self.hash = rotate(self.hash, self.weight, old_byte, new_byte);
    }

    /// Remove `old_byte` from the front without a replacement.
    pub fn roll_out(&mut self, old_byte: u8) {
        (self.hash, self.weight) = roll_out(self.hash, self.weight, old_byte);
    }

    pub fn digest(&self) -> u32 {
        self.hash
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_inverse_constant() {
        assert_eq!(MULT.wrapping_mul(INVM), 1);
        assert_eq!(ADJ, 0x0810_4224);
    }

    #[test]
    fn test_empty_window() {
        assert_eq!(hash(&[]), (SEED, 1));
        let rolling = RollingHash::new();
        assert_eq!(rolling.digest(), SEED);
        assert_eq!(rolling.weight(), 1);
    }

    #[test]
    fn test_weight_matches_repeated_multiplication() {
        let mut expected: u32 = 1;
        for len in 0..600 {
            assert_eq!(weight(len), expected, "len {len}");
            expected = expected.wrapping_mul(MULT);
        }
    }

    #[test]
    fn test_init_deterministic() {
        let data = b"Hello, World!";
        let mut h1 = RollingHash::new();
        h1.init(data);
        let mut h2 = RollingHash::new();
        h2.init(data);
        assert_eq!(h1, h2);
    }

    #[test]
    fn test_different_data_different_hash() {
        assert_ne!(hash(b"Hello").0, hash(b"World").0);
    }

    #[test]
    fn test_zero_bytes_do_not_vanish() {
        // Without the seed every run of zeros would hash to 0.
        let (short, _) = hash(&[0u8; 4]);
        let (long, _) = hash(&[0u8; 5]);
        assert_ne!(short, 0);
        assert_ne!(short, long);
    }

    #[test]
    fn test_rotate_equals_fresh_init() {
        let data = b"ABCDE";
        let mut rolling = RollingHash::new();
        rolling.init(&data[0..4]);
        rolling.rotate(data[0], data[4]);

        let mut fresh = RollingHash::new();
        fresh.init(&data[1..5]);

        assert_eq!(rolling, fresh);
    }

    #[test]
    fn test_rotate_extreme_bytes() {
        let data = [0x00, 0xFF, 0x00, 0xFF, 0xFF, 0x00, 0x00];
        let (mut h, w) = hash(&data[0..4]);
        for i in 4..data.len() {
            h = rotate(h, w, data[i - 4], data[i]);
            assert_eq!(h, hash(&data[i - 3..=i]).0);
        }
    }

    #[test]
    fn test_roll_out_to_empty() {
        let data = b"rolling";
        let mut rolling = RollingHash::new();
        rolling.init(data);
        for (i, &byte) in data.iter().enumerate() {
            rolling.roll_out(byte);
            let mut fresh = RollingHash::new();
            fresh.init(&data[i + 1..]);
            assert_eq!(rolling, fresh);
        }
        assert_eq!(rolling, RollingHash::new());
    }

    proptest! {
        #[test]
        fn prop_rotate_matches_recompute(
            window in proptest::collection::vec(any::<u8>(), 1..300),
            next in any::<u8>(),
        ) {
            let (h, w) = hash(&window);
            let mut shifted = window[1..].to_vec();
            shifted.push(next);
            prop_assert_eq!(rotate(h, w, window[0], next), hash(&shifted).0);
        }

        #[test]
        fn prop_roll_out_matches_recompute(
            window in proptest::collection::vec(any::<u8>(), 1..300),
        ) {
            let (h, w) = hash(&window);
            prop_assert_eq!(roll_out(h, w, window[0]), hash(&window[1..]));
        }
    }
}
