//! Distance and string-similarity primitives
//!
//! Vector distance is Euclidean (L2) everywhere in the crate. Lexical
//! similarity follows the trigram model of PostgreSQL `pg_trgm`: words are
//! runs of alphanumerics, lowercased, padded with two leading blanks and
//! one trailing blank, and similarity is the Jaccard index of the two
//! trigram sets.

use std::collections::HashSet;

/// Euclidean distance; `None` on dimension mismatch
pub fn l2_distance(a: &[f32], b: &[f32]) -> Option<f32> {
    if a.len() != b.len() {
        return None;
    }

    let sum: f32 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();

    Some(sum.sqrt())
}

/// Trigram set of a text
pub fn trigrams(text: &str) -> HashSet<[char; 3]> {
    let mut set = HashSet::new();

    for word in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let padded: Vec<char> = "  "
            .chars()
            .chain(word.chars().flat_map(char::to_lowercase))
            .chain(std::iter::once(' '))
            .collect();

        for window in padded.windows(3) {
            set.insert([window[0], window[1], window[2]]);
        }
    }

    set
}

/// Similarity between two precomputed trigram sets, in [0, 1]
pub fn set_similarity(a: &HashSet<[char; 3]>, b: &HashSet<[char; 3]>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let shared = a.intersection(b).count();
    let union = a.len() + b.len() - shared;
    shared as f32 / union as f32
}

/// Trigram similarity of two texts, in [0, 1]
pub fn trigram_similarity(a: &str, b: &str) -> f32 {
    set_similarity(&trigrams(a), &trigrams(b))
}
