//! Deterministic byte source for synthetic pixel data.
//!
//! Every byte is a pure function of `(seed, index)`. There is no generator state,
//! so any range of the payload can be produced in any order, from any thread,
//! without memoization.

/// LCG multiplier (Knuth's MMIX constant).
const MULTIPLIER: u64 = 6_364_136_223_846_793_005;

/// LCG increment.
const INCREMENT: u64 = 1_442_695_040_888_963_407;

/// Return the byte at `index` of the payload seeded by `seed`.
///
/// The index is mixed with the seed, pushed through one multiply-add step and the
/// high-order byte of the result is returned.
#[inline]
pub fn byte_at(seed: u64, index: u64) -> u8 {
    let x = (index ^ seed)
        .wrapping_mul(MULTIPLIER)
        .wrapping_add(INCREMENT);
    (x >> 56) as u8
}

/// Fill `buf` with the bytes at `start..start + buf.len()`.
pub fn fill_bytes(seed: u64, start: u64, buf: &mut [u8]) {
    for (offset, slot) in buf.iter_mut().enumerate() {
        *slot = byte_at(seed, start + offset as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_byte_at_is_pure() {
        for seed in [0, 1, 5, 42, u64::MAX] {
            for index in [0, 1, 53, 1 << 20, u64::MAX - 1] {
                assert_eq!(byte_at(seed, index), byte_at(seed, index));
            }
        }
    }

    #[test]
    fn test_byte_at_known_values() {
        // Pinned so that payloads stay byte-identical across releases.
        let x = 0u64.wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        assert_eq!(byte_at(0, 0), (x >> 56) as u8);
        assert_eq!(byte_at(0, 0), 0x14);

        let x = (7u64 ^ 3).wrapping_mul(MULTIPLIER).wrapping_add(INCREMENT);
        assert_eq!(byte_at(3, 7), (x >> 56) as u8);
    }

    #[test]
    fn test_seed_changes_output() {
        let a: Vec<u8> = (0..256).map(|i| byte_at(1, i)).collect();
        let b: Vec<u8> = (0..256).map(|i| byte_at(2, i)).collect();
        assert_ne!(a, b);
    }

    #[test]
    fn test_fill_bytes_matches_byte_at() {
        let mut buf = [0u8; 64];
        fill_bytes(9, 1000, &mut buf);
        for (i, b) in buf.iter().enumerate() {
            assert_eq!(*b, byte_at(9, 1000 + i as u64));
        }
    }
}
