use std::collections::HashSet;

use crate::error::{Result, SimilarityError};

pub const DEFAULT_SAMPLE_SIZE: usize = 5000;

/// Jaccard coefficient over whitespace-delimited token sets.
pub fn token_overlap_similarity(text_a: &str, text_b: &str) -> Result<f64> {
    let tokens_a: HashSet<&str> = text_a.split_whitespace().collect();
    let tokens_b: HashSet<&str> = text_b.split_whitespace().collect();
    let union = tokens_a.union(&tokens_b).count();
    if union == 0 {
        return Err(SimilarityError::DegenerateInput(
            "token overlap of two texts without tokens",
        ));
    }
    let intersection = tokens_a.intersection(&tokens_b).count();
    Ok(intersection as f64 / union as f64)
}

/// Cheap comparison of the leading `sample_size` bytes of two payloads.
///
/// Both samples are decoded leniently and scored with [`sequence_ratio`].
pub fn raw_byte_similarity(bytes_a: &[u8], bytes_b: &[u8], sample_size: usize) -> f64 {
    let a = decode_lossy(&bytes_a[..sample_size.min(bytes_a.len())]);
    let b = decode_lossy(&bytes_b[..sample_size.min(bytes_b.len())]);
    sequence_ratio(&a, &b)
}

/// UTF-8 decode that drops invalid byte sequences instead of replacing them.
/// A truncated trailing code point is dropped the same way.
pub fn decode_lossy(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for chunk in bytes.utf8_chunks() {
        out.push_str(chunk.valid());
    }
    out
}

/// `2 * LCS / (len_a + len_b)` over characters, in [0.0, 1.0].
///
/// Two empty strings are identical and score 1.0.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * longest_common_subsequence(&a, &b) as f64 / total as f64
}

fn longest_common_subsequence(a: &[char], b: &[char]) -> usize {
    let (outer, inner) = if a.len() >= b.len() { (a, b) } else { (b, a) };
    if inner.is_empty() {
        return 0;
    }
    let mut previous = vec![0usize; inner.len() + 1];
    let mut current = vec![0usize; inner.len() + 1];
    for x in outer {
        for (j, y) in inner.iter().enumerate() {
            current[j + 1] = if x == y {
                previous[j] + 1
            } else {
                current[j].max(previous[j + 1])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }
    previous[inner.len()]
}
