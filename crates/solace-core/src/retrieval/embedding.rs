//! Deterministic placeholder embeddings.
//!
//! Stands in for a real embedding model: a rolling hash of the input seeds a
//! PRNG whose output is L2-normalized. Identical text always yields a
//! bit-identical vector, which the test suite relies on.

use super::semantic::{SemanticError, SemanticResult};

/// Fixed embedding dimensionality.
pub const EMBEDDING_DIM: usize = 768;

/// Embeds text as a deterministic unit vector of [`EMBEDDING_DIM`] values.
pub fn embed(text: &str) -> Vec<f32> {
    let mut rng = fastrand::Rng::with_seed(rolling_hash(text));
    let mut v: Vec<f32> = (0..EMBEDDING_DIM).map(|_| rng.f32() * 2.0 - 1.0).collect();
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

// FNV-1a over the raw bytes.
fn rolling_hash(text: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325;
    for b in text.bytes() {
        h ^= b as u64;
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}

/// Standard normalized dot product.
///
/// Returns 0.0 when either vector has zero magnitude. Mismatched lengths are
/// a configuration bug and surface as [`SemanticError::DimensionMismatch`].
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> SemanticResult<f32> {
    if a.len() != b.len() {
        return Err(SemanticError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let mut dot = 0.0f32;
    let mut na = 0.0f32;
    let mut nb = 0.0f32;
    for i in 0..a.len() {
        dot += a[i] * b[i];
        na += a[i] * a[i];
        nb += b[i] * b[i];
    }
    let denom = na.sqrt() * nb.sqrt();
    if denom > 0.0 {
        Ok(dot / denom)
    } else {
        Ok(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn embed_is_deterministic_and_unit_length() {
        let a = embed("I feel anxious about tomorrow");
        let b = embed("I feel anxious about tomorrow");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert_relative_eq!(norm, 1.0, epsilon = 1e-4);
    }

    #[test]
    fn different_text_yields_different_vectors() {
        assert_ne!(embed("sleep trouble"), embed("work stress"));
    }

    #[test]
    fn cosine_of_self_is_one() {
        let v = embed("a steady example sentence");
        assert_relative_eq!(cosine_similarity(&v, &v).unwrap(), 1.0, epsilon = 1e-4);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let z = vec![0.0f32; 8];
        let v = vec![0.5f32; 8];
        assert_eq!(cosine_similarity(&z, &v).unwrap(), 0.0);
        assert_eq!(cosine_similarity(&v, &z).unwrap(), 0.0);
    }

    #[test]
    fn cosine_rejects_mismatched_dimensions() {
        let a = vec![1.0f32; 4];
        let b = vec![1.0f32; 5];
        match cosine_similarity(&a, &b) {
            Err(SemanticError::DimensionMismatch { expected, actual }) => {
                assert_eq!(expected, 4);
                assert_eq!(actual, 5);
            }
            other => panic!("expected dimension mismatch, got {:?}", other),
        }
    }
}
