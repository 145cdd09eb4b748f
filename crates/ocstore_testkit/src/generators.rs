//! Random payload and name generators.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Creates a deterministic RNG for reproducible tests.
#[must_use]
pub fn seeded_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Generates a random payload of `len` bytes.
pub fn payload(rng: &mut impl Rng, len: usize) -> Vec<u8> {
    (0..len).map(|_| rng.gen()).collect()
}

/// Generates `count` distinct random payloads of `len` bytes each.
///
/// Distinctness is forced by prefixing each payload with its index, so
/// value-identity lookups in tests are unambiguous.
pub fn distinct_payloads(rng: &mut impl Rng, count: usize, len: usize) -> Vec<Vec<u8>> {
    (0..count)
        .map(|i| {
            let mut p = (i as u64).to_be_bytes().to_vec();
            p.extend(payload(rng, len));
            p
        })
        .collect()
}

/// Generates a random binding name with the given prefix.
pub fn name(rng: &mut impl Rng, prefix: &str) -> String {
    format!("{prefix}-{:08x}", rng.gen::<u32>())
}
