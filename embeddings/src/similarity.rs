//! Similarity computation for embeddings.

use ordered_float::OrderedFloat;

use crate::Embedding;
use crate::error::{EmbeddingError, Result};

fn check_dimensions(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(EmbeddingError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    Ok(())
}

/// Euclidean norm of a vector.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Compute the dot product between two embeddings.
pub fn dot_product(a: &[f32], b: &[f32]) -> Result<f32> {
    check_dimensions(a, b)?;
    Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).sum())
}

/// Compute the cosine similarity between two embeddings.
///
/// Returns a value between -1.0 and 1.0, where:
/// - 1.0 means identical direction
/// - 0.0 means orthogonal vectors
/// - -1.0 means opposite vectors
///
/// A zero-norm vector on either side yields 0.0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Result<f32> {
    let dot = dot_product(a, b)?;
    let magnitude_a = magnitude(a);
    let magnitude_b = magnitude(b);

    if magnitude_a == 0.0 || magnitude_b == 0.0 {
        return Ok(0.0);
    }

    Ok(dot / (magnitude_a * magnitude_b))
}

/// Cosine distance in `[0, 2]`, the complement of [`cosine_similarity`].
pub fn cosine_distance(a: &[f32], b: &[f32]) -> Result<f32> {
    Ok(1.0 - cosine_similarity(a, b)?)
}

/// Cosine similarity of `query` against every candidate, in candidate order.
///
/// Candidates with zero norm are divided by 1 instead, so their score is the
/// dot product with the normalized query. A zero-norm query scores 0.0
/// against everything.
pub fn batch_similarity(query: &[f32], candidates: &[Embedding]) -> Result<Vec<f32>> {
    for candidate in candidates {
        check_dimensions(query, candidate)?;
    }

    let query_norm = magnitude(query);
    if query_norm == 0.0 {
        return Ok(vec![0.0; candidates.len()]);
    }

    let scores = candidates
        .iter()
        .map(|candidate| {
            let mut candidate_norm = magnitude(candidate);
            if candidate_norm == 0.0 {
                candidate_norm = 1.0;
            }
            let dot: f32 = query.iter().zip(candidate.iter()).map(|(q, c)| q * c).sum();
            dot / (query_norm * candidate_norm)
        })
        .collect();

    Ok(scores)
}

/// Indices of the `k` candidates closest to `query` by cosine distance,
/// paired with that distance, closest first. Equal distances keep candidate
/// order.
pub fn nearest_by_cosine<'a, I>(query: &[f32], candidates: I, k: usize) -> Result<Vec<(usize, f32)>>
where
    I: IntoIterator<Item = &'a [f32]>,
{
    let mut scored: Vec<(OrderedFloat<f32>, usize)> = Vec::new();
    for (position, candidate) in candidates.into_iter().enumerate() {
        let distance = cosine_distance(query, candidate)?;
        scored.push((OrderedFloat(distance), position));
    }

    // Stable sort keeps insertion order between ties.
    scored.sort_by_key(|(distance, _)| *distance);

    Ok(scored
        .into_iter()
        .take(k)
        .map(|(distance, position)| (position, distance.0))
        .collect())
}

/// Normalize an embedding to unit length.
pub fn normalize(embedding: &mut Embedding) {
    let magnitude = magnitude(embedding);
    if magnitude > 0.0 {
        for x in embedding.iter_mut() {
            *x /= magnitude;
        }
    }
}
