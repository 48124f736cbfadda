//! Recurrence analysis and structural boundary clustering
//!
//! A k-nearest-neighbor affinity matrix over per-frame feature vectors
//! exposes repeated material as off-diagonal blocks. Path enhancement
//! sharpens those blocks, and constrained agglomerative clustering of the
//! (enhanced) frame signatures yields contiguous structural boundaries.

use crate::dsp::stats::EPSILON;

/// Cosine similarity between two feature vectors
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    dot / (norm_a * norm_b + EPSILON)
}

/// Symmetric k-nearest-neighbor affinity matrix
///
/// Frames within `width` of the diagonal are excluded as neighbors so a
/// frame's trivial similarity to its surroundings does not drown out
/// genuine repeats.
pub fn knn_affinity(features: &[Vec<f32>], k: usize, width: usize) -> Vec<Vec<f32>> {
    let n = features.len();
    let mut affinity = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        let mut similarities: Vec<(usize, f32)> = (0..n)
            .filter(|&j| j.abs_diff(i) >= width)
            .map(|j| (j, cosine_similarity(&features[i], &features[j])))
            .collect();
        similarities
            .sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        for &(j, sim) in similarities.iter().take(k) {
            if sim > 0.0 {
                affinity[i][j] = sim;
            }
        }
    }

    // Symmetrize: keep a link if either endpoint selected it
    for i in 0..n {
        for j in (i + 1)..n {
            let v = affinity[i][j].max(affinity[j][i]);
            affinity[i][j] = v;
            affinity[j][i] = v;
        }
    }

    affinity
}

/// Strengthen the first off-diagonal so temporal continuity competes with
/// long-range repeats during clustering
pub fn reinforce_diagonal(matrix: &mut [Vec<f32>], weight: f32) {
    let n = matrix.len();
    for i in 0..n.saturating_sub(1) {
        matrix[i][i + 1] += weight;
        matrix[i + 1][i] += weight;
    }
}

/// Average each cell along its diagonal over `2 * length + 1` steps
///
/// Stripes parallel to the main diagonal (repeated passages) survive the
/// smoothing; isolated spurious matches are attenuated.
pub fn path_enhance(matrix: &[Vec<f32>], length: usize) -> Vec<Vec<f32>> {
    let n = matrix.len();
    let mut enhanced = vec![vec![0.0f32; n]; n];

    for i in 0..n {
        for j in 0..n {
            let mut sum = 0.0;
            let mut count = 0;
            for d in -(length as isize)..=(length as isize) {
                let (di, dj) = (i as isize + d, j as isize + d);
                if di >= 0 && dj >= 0 && (di as usize) < n && (dj as usize) < n {
                    sum += matrix[di as usize][dj as usize];
                    count += 1;
                }
            }
            enhanced[i][j] = sum / count.max(1) as f32;
        }
    }

    enhanced
}

/// Cluster frames into `n_segments` contiguous spans, returning the internal
/// boundary frame indices (`n_segments - 1` of them, sorted)
///
/// Bottom-up: every frame starts as its own cluster and the most similar
/// adjacent pair merges until the target count remains. Only adjacent
/// clusters merge, so spans stay contiguous.
pub fn agglomerative_boundaries(features: &[Vec<f32>], n_segments: usize) -> Vec<usize> {
    let n = features.len();
    if n == 0 || n_segments <= 1 || n_segments > n {
        return Vec::new();
    }

    struct Cluster {
        start: usize,
        centroid: Vec<f32>,
        count: usize,
    }

    let mut clusters: Vec<Cluster> = features
        .iter()
        .enumerate()
        .map(|(i, f)| Cluster {
            start: i,
            centroid: f.clone(),
            count: 1,
        })
        .collect();

    while clusters.len() > n_segments {
        // Most similar adjacent pair by centroid distance
        let mut best_idx = 0;
        let mut best_dist = f32::MAX;
        for idx in 0..clusters.len() - 1 {
            let dist = euclidean(&clusters[idx].centroid, &clusters[idx + 1].centroid);
            if dist < best_dist {
                best_dist = dist;
                best_idx = idx;
            }
        }

        let right = clusters.remove(best_idx + 1);
        let left = &mut clusters[best_idx];
        let total = (left.count + right.count) as f32;
        for (dim, value) in left.centroid.iter_mut().enumerate() {
            *value = (*value * left.count as f32 + right.centroid[dim] * right.count as f32)
                / total;
        }
        left.count += right.count;
    }

    clusters.iter().skip(1).map(|c| c.start).collect()
}

/// Average feature frames into at most `max_frames` blocks
///
/// Recurrence construction and clustering are quadratic in frame count, so
/// structural analysis runs on pooled frames. Returns the pooled features
/// and the block size for mapping boundaries back to frame indices.
pub fn pool_features(features: &[Vec<f32>], max_frames: usize) -> (Vec<Vec<f32>>, usize) {
    if features.len() <= max_frames || features.is_empty() {
        return (features.to_vec(), 1);
    }

    let block = features.len().div_ceil(max_frames);
    let dim = features[0].len();
    let pooled = features
        .chunks(block)
        .map(|chunk| {
            let mut centroid = vec![0.0f32; dim];
            for frame in chunk {
                for (c, v) in centroid.iter_mut().zip(frame.iter()) {
                    *c += v;
                }
            }
            for c in centroid.iter_mut() {
                *c /= chunk.len() as f32;
            }
            centroid
        })
        .collect();

    (pooled, block)
}

fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Two blocks of distinct feature vectors with a boundary at `split`
    fn two_block_features(n: usize, split: usize) -> Vec<Vec<f32>> {
        (0..n)
            .map(|i| {
                if i < split {
                    vec![1.0, 0.0, 0.1]
                } else {
                    vec![0.0, 1.0, 0.1]
                }
            })
            .collect()
    }

    #[test]
    fn test_affinity_is_symmetric() {
        let features = two_block_features(20, 10);
        let affinity = knn_affinity(&features, 3, 2);
        for i in 0..20 {
            for j in 0..20 {
                assert!((affinity[i][j] - affinity[j][i]).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_affinity_prefers_same_block() {
        let features = two_block_features(20, 10);
        let affinity = knn_affinity(&features, 3, 2);
        // Frame 0's strongest links should stay inside the first block
        let cross: f32 = (10..20).map(|j| affinity[0][j]).sum();
        let within: f32 = (2..10).map(|j| affinity[0][j]).sum();
        assert!(within > cross);
    }

    #[test]
    fn test_agglomerative_finds_block_boundary() {
        let features = two_block_features(30, 12);
        let boundaries = agglomerative_boundaries(&features, 2);
        assert_eq!(boundaries, vec![12]);
    }

    #[test]
    fn test_agglomerative_boundary_count() {
        let features: Vec<Vec<f32>> = (0..40).map(|i| vec![(i / 10) as f32]).collect();
        let boundaries = agglomerative_boundaries(&features, 4);
        assert_eq!(boundaries.len(), 3);
        assert!(boundaries.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_agglomerative_degenerate_inputs() {
        assert!(agglomerative_boundaries(&[], 3).is_empty());
        let one = vec![vec![1.0]];
        assert!(agglomerative_boundaries(&one, 1).is_empty());
        assert!(agglomerative_boundaries(&one, 5).is_empty());
    }

    #[test]
    fn test_pool_features() {
        let features: Vec<Vec<f32>> = (0..100).map(|i| vec![i as f32]).collect();
        let (pooled, block) = pool_features(&features, 10);
        assert!(pooled.len() <= 10);
        assert_eq!(block, 10);
        assert!((pooled[0][0] - 4.5).abs() < 1e-6);

        let (unpooled, block) = pool_features(&features, 200);
        assert_eq!(unpooled.len(), 100);
        assert_eq!(block, 1);
    }

    #[test]
    fn test_path_enhance_preserves_shape() {
        let features = two_block_features(16, 8);
        let affinity = knn_affinity(&features, 3, 2);
        let enhanced = path_enhance(&affinity, 2);
        assert_eq!(enhanced.len(), 16);
        assert_eq!(enhanced[0].len(), 16);
    }

    #[test]
    fn test_reinforce_diagonal() {
        let mut matrix = vec![vec![0.0f32; 4]; 4];
        reinforce_diagonal(&mut matrix, 0.5);
        assert_eq!(matrix[0][1], 0.5);
        assert_eq!(matrix[1][0], 0.5);
        assert_eq!(matrix[0][0], 0.0);
    }
}
