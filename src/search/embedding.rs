//! Feature-hashing embedding
//!
//! A deterministic, model-free text embedding:
//! - tokens are maximal runs of letters (`\p{L}`) and numbers (`\p{N}`) in the
//!   lowercased text, so Devanāgarī vowel signs and virama end a token
//! - each token adds weight to buckets chosen by 64-bit FNV-1a modulo `dim`
//!   (unigram 1.0, character bigrams 0.5 for tokens of 4+ chars,
//!   character quadgrams 0.25 for tokens of 6+ chars)
//! - the result is L2 normalized
//!
//! No vocabulary is stored, so any implementation using the same dimension
//! and algorithm name produces the same vectors.

use lazy_static::lazy_static;
use regex::Regex;

use crate::error::{CorpusError, Result};

lazy_static! {
    static ref WORD_RE: Regex = Regex::new(r"[\p{L}\p{N}]+").unwrap();
}

/// Default embedding dimension (matches common sentence-transformer dims)
pub const DEFAULT_DIM: usize = 384;

/// Algorithm name recorded in the semantic store's meta table
pub const HASHED_ALGORITHM: &str = "hashed-fnv1a64";

pub const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
pub const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

const UNIGRAM_WEIGHT: f64 = 1.0;
const BIGRAM_WEIGHT: f64 = 0.5;
const QUADGRAM_WEIGHT: f64 = 0.25;
const BIGRAM_MIN_CHARS: usize = 4;
const QUADGRAM_MIN_CHARS: usize = 6;

/// 64-bit FNV-1a: xor the byte in, then multiply (wrapping)
pub fn fnv1a64(bytes: &[u8]) -> u64 {
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// Split lowercased text into runs of letters and numbers
pub fn tokenize(text: &str) -> Vec<String> {
    WORD_RE
        .find_iter(&text.to_lowercase())
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Anything that turns passage text into a unit-norm vector of fixed length.
///
/// The hashed encoder below is the built-in one; a neural encoder with the
/// same output contract can be plugged in without touching the store.
pub trait TextEncoder {
    fn dim(&self) -> usize;

    /// Name recorded as `meta.algorithm`
    fn algorithm(&self) -> &str;

    fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEncoder {
    dim: usize,
}

impl HashingEncoder {
    pub fn new(dim: usize) -> Result<Self> {
        if dim == 0 {
            return Err(CorpusError::Config(
                "embedding dimension must be greater than zero".into(),
            ));
        }
        Ok(Self { dim })
    }

    /// Embed text; empty input gives the zero vector
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f64; self.dim];
        for token in tokenize(text) {
            self.add_features(&mut acc, &token);
        }

        let norm = acc.iter().map(|x| x * x).sum::<f64>().sqrt();
        if norm > 0.0 {
            acc.iter().map(|x| (x / norm) as f32).collect()
        } else {
            acc.iter().map(|x| *x as f32).collect()
        }
    }

    fn bucket(&self, bytes: &[u8]) -> usize {
        (fnv1a64(bytes) % self.dim as u64) as usize
    }

    fn add_features(&self, acc: &mut [f64], token: &str) {
        if token.is_empty() {
            return;
        }
        acc[self.bucket(token.as_bytes())] += UNIGRAM_WEIGHT;

        let chars: Vec<char> = token.chars().collect();
        if chars.len() >= BIGRAM_MIN_CHARS {
            for window in chars.windows(2) {
                let feature: String = "bg:".chars().chain(window.iter().copied()).collect();
                acc[self.bucket(feature.as_bytes())] += BIGRAM_WEIGHT;
            }
        }
        if chars.len() >= QUADGRAM_MIN_CHARS {
            for window in chars.windows(4) {
                let feature: String = "cg:".chars().chain(window.iter().copied()).collect();
                acc[self.bucket(feature.as_bytes())] += QUADGRAM_WEIGHT;
            }
        }
    }
}

impl Default for HashingEncoder {
    fn default() -> Self {
        Self { dim: DEFAULT_DIM }
    }
}

impl TextEncoder for HashingEncoder {
    fn dim(&self) -> usize {
        self.dim
    }

    fn algorithm(&self) -> &str {
        HASHED_ALGORITHM
    }

    fn encode(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.embed(text))
    }
}

/// Dot product; equals cosine similarity for unit-norm inputs
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Scale to unit length in place; zero vectors are left alone
pub fn l2_normalize(v: &mut [f32]) {
    let norm = l2_norm(v);
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_fnv_known_values() {
        assert_eq!(fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
        assert_eq!(fnv1a64(b"foobar"), 0x85944171f73967e8);
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize("Dharma-kṣetre, kuru_kṣetre!"),
            vec!["dharma", "kṣetre", "kuru", "kṣetre"]
        );
        assert_eq!(tokenize("  ...  "), Vec::<String>::new());
        assert_eq!(tokenize("Verse 47"), vec!["verse", "47"]);
    }

    #[test]
    fn test_tokenize_devanagari_splits_on_marks() {
        assert_eq!(
            tokenize("ईशा वास्यम् पूर्णमदः"),
            vec!["ईश", "व", "स", "यम", "प", "र", "णमद"]
        );
    }

    #[test]
    fn test_golden_devanagari() {
        let v = HashingEncoder::new(8).unwrap().embed("ईशा वास्यम्");
        let expected = [0.40824830, 0.0, 0.0, 0.81649661, 0.40824830, 0.0, 0.0, 0.0];
        for (x, y) in v.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_golden_latin_with_quadgrams() {
        let v = HashingEncoder::new(16).unwrap().embed("Dharmakshetre");
        let expected = [
            0.0, 0.0, 0.07856742, 0.23570226, 0.07856742, 0.47140452, 0.15713484, 0.31426968,
            0.23570226, 0.0, 0.62853936, 0.07856742, 0.15713484, 0.15713484, 0.23570226,
            0.15713484,
        ];
        assert_eq!(v.len(), expected.len());
        for (x, y) in v.iter().zip(expected.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_unit_norm() {
        let encoder = HashingEncoder::new(384).unwrap();
        for text in ["Om.", "karmaṇy evādhikāras te", "ॐ पूर्णमदः पूर्णमिदम्", "a"] {
            let v = encoder.embed(text);
            assert_eq!(v.len(), 384);
            assert_abs_diff_eq!(l2_norm(&v), 1.0, epsilon = 1e-4);
        }
    }

    #[test]
    fn test_empty_is_zero() {
        let encoder = HashingEncoder::new(16).unwrap();
        assert!(encoder.embed("").iter().all(|x| *x == 0.0));
        assert!(encoder.embed(" -- ।। ").iter().all(|x| *x == 0.0));
    }

    #[test]
    fn test_deterministic() {
        let a = HashingEncoder::new(128).unwrap();
        let b = HashingEncoder::new(128).unwrap();
        let text = "Whatever is in the universe is pervaded by the Lord";
        let va: Vec<u32> = a.embed(text).iter().map(|x| x.to_bits()).collect();
        let vb: Vec<u32> = b.embed(text).iter().map(|x| x.to_bits()).collect();
        assert_eq!(va, vb);
    }

    #[test]
    fn test_repeated_token_reinforces_same_buckets() {
        let encoder = HashingEncoder::new(8).unwrap();
        let once = encoder.embed("dharma");
        let twice = encoder.embed("dharma dharma");

        let unigram = (fnv1a64(b"dharma") % 8) as usize;
        assert!(twice[unigram] > 0.0);
        assert_abs_diff_eq!(l2_norm(&twice), 1.0, epsilon = 1e-4);
        for (x, y) in once.iter().zip(twice.iter()) {
            assert_abs_diff_eq!(*x, *y, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_short_token_is_unigram_only() {
        let encoder = HashingEncoder::new(1024).unwrap();
        let v = encoder.embed("om");
        let nonzero: Vec<usize> = (0..v.len()).filter(|&i| v[i] != 0.0).collect();
        assert_eq!(nonzero, vec![(fnv1a64(b"om") % 1024) as usize]);
        assert_abs_diff_eq!(v[nonzero[0]], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_shared_words_score_higher() {
        let encoder = HashingEncoder::default();
        let q = encoder.embed("the self is unborn");
        let related = encoder.embed("The Self is unborn and eternal");
        let unrelated = encoder.embed("rivers flow toward the ocean");
        assert!(dot(&q, &related) > dot(&q, &unrelated));
    }

    #[test]
    fn test_zero_dim_rejected() {
        assert!(HashingEncoder::new(0).is_err());
    }

    #[test]
    fn test_normalize_helpers() {
        let mut v = vec![3.0, 4.0];
        l2_normalize(&mut v);
        assert_abs_diff_eq!(v[0], 0.6, epsilon = 1e-6);
        assert_abs_diff_eq!(dot(&v, &v), 1.0, epsilon = 1e-6);

        let mut zero = vec![0.0; 3];
        l2_normalize(&mut zero);
        assert_eq!(zero, vec![0.0; 3]);
    }
}
