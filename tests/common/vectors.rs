use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use graphlift::corpus::{CorpusHandle, InMemoryCorpus};

/// Generate `n` random vectors of dimension `dims` with uniform f32 values in [-1, 1].
pub fn random_vectors(n: usize, dims: usize) -> Vec<Vec<f32>> {
    let mut rng = StdRng::seed_from_u64(42);
    (0..n)
        .map(|_| (0..dims).map(|_| rng.gen_range(-1.0..1.0)).collect())
        .collect()
}

/// In-memory corpus over [`random_vectors`], doc ids are ordinals.
pub fn random_corpus(n: usize, dims: usize) -> CorpusHandle {
    Arc::new(InMemoryCorpus::from_vectors(dims, random_vectors(n, dims)).unwrap())
}

/// The logical byte sequence a vector stream should produce.
pub fn le_bytes(vectors: &[Vec<f32>]) -> Vec<u8> {
    vectors
        .iter()
        .flatten()
        .flat_map(|v| v.to_le_bytes())
        .collect()
}

/// `n` pseudo-random bytes, seeded.
pub fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n).map(|_| rng.gen()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_vectors() {
        let vecs = random_vectors(10, 16);
        assert_eq!(vecs.len(), 10);
        assert_eq!(vecs[0].len(), 16);
        assert_eq!(vecs, random_vectors(10, 16));
        assert_eq!(le_bytes(&vecs).len(), 10 * 16 * 4);
    }
}
