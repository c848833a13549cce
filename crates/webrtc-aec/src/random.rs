//! Linear congruential generator for comfort-noise phases.

const MULTIPLIER: u32 = 69069;
const MASK: u32 = 0x7fff_ffff;

/// Fills `out` with uniform values in `0..32768` and advances `seed`.
///
/// Each value is the upper 15 bits of a 31-bit LCG state, so the sequence
/// is reproducible from the seed alone.
pub(crate) fn fill_uniform16(seed: &mut u32, out: &mut [i16]) {
    for v in out.iter_mut() {
        *seed = seed.wrapping_mul(MULTIPLIER).wrapping_add(1) & MASK;
        *v = (*seed >> 16) as i16;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_values_from_known_seed() {
        let mut seed = 777u32;
        let mut out = [0i16; 2];
        fill_uniform16(&mut seed, &mut out);
        let s1 = (777u32 * 69069 + 1) & MASK;
        let s2 = s1.wrapping_mul(69069).wrapping_add(1) & MASK;
        assert_eq!(out, [(s1 >> 16) as i16, (s2 >> 16) as i16]);
        assert_eq!(seed, s2);
    }

    #[test]
    fn values_are_non_negative_and_spread() {
        let mut seed = 1u32;
        let mut out = [0i16; 4096];
        fill_uniform16(&mut seed, &mut out);
        assert!(out.iter().all(|&v| v >= 0));
        let mean = out.iter().map(|&v| v as f64).sum::<f64>() / out.len() as f64;
        assert!((mean - 16384.0).abs() < 1000.0, "mean {mean}");
    }
}
