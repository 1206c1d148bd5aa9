use crate::utils::error::{PlanError, Result};
use crate::utils::validation::validate_positive_volume;
use serde::{Deserialize, Serialize};

/// Slack for floating point remainders left over after repeated subtraction.
pub(crate) const VOLUME_EPSILON: f64 = 1e-9;

/// Most chunks a single volume, or a whole plan, may be split into.
pub const MAX_CHUNKS: usize = 100_000;

/// Fails when splitting `volumes` at `capacity` would exceed [`MAX_CHUNKS`].
pub(crate) fn check_chunk_count(volumes: impl IntoIterator<Item = f64>, capacity: f64) -> Result<()> {
    let count: f64 = volumes
        .into_iter()
        .map(|volume| (volume / capacity).ceil())
        .sum();
    if count > MAX_CHUNKS as f64 {
        return Err(PlanError::invalid_value(
            "volume",
            format!("{} chunks", count),
            format!(
                "splitting at {} uL would need more than {} cycles",
                capacity, MAX_CHUNKS
            ),
        ));
    }
    Ok(())
}

/// How a volume larger than the pipette capacity is split into cycles.
///
/// Volumes are cut greedily into capacity-sized chunks. When the trailing
/// remainder is smaller than `rebalance_below * capacity`, the last full
/// chunk and the remainder are split evenly instead, so no cycle moves a
/// near-empty amount. `1.0` always balances the last two chunks, `0.0`
/// never does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkPolicy {
    pub rebalance_below: f64,
}

impl Default for ChunkPolicy {
    fn default() -> Self {
        Self {
            rebalance_below: 1.0,
        }
    }
}

impl ChunkPolicy {
    pub fn new(rebalance_below: f64) -> Self {
        Self { rebalance_below }
    }

    pub fn chunk(&self, total: f64, capacity: f64) -> Result<Vec<f64>> {
        validate_positive_volume("volume", total)?;
        validate_positive_volume("capacity", capacity)?;

        check_chunk_count([total], capacity)?;

        let mut chunks = Vec::new();
        let mut remaining = total;
        while remaining > capacity + VOLUME_EPSILON {
            chunks.push(capacity);
            remaining -= capacity;
        }

        if remaining < capacity * self.rebalance_below {
            if let Some(full) = chunks.pop() {
                let half = (full + remaining) / 2.0;
                chunks.push(half);
                chunks.push(half);
                return Ok(chunks);
            }
        }
        // Within VOLUME_EPSILON above capacity still counts as one full chunk.
        chunks.push(remaining.min(capacity));
        Ok(chunks)
    }
}

/// Splits `total` with the default policy.
pub fn chunk_volume(total: f64, capacity: f64) -> Result<Vec<f64>> {
    ChunkPolicy::default().chunk(total, capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_invariants(chunks: &[f64], total: f64, capacity: f64) {
        let sum: f64 = chunks.iter().sum();
        assert!((sum - total).abs() < 1e-6, "{:?} does not sum to {}", chunks, total);
        for chunk in chunks {
            assert!(*chunk > 0.0 && *chunk <= capacity, "bad chunk {}", chunk);
        }
    }

    #[test]
    fn test_fits_in_one_chunk() {
        assert_eq!(chunk_volume(100.0, 300.0).unwrap(), vec![100.0]);
        assert_eq!(chunk_volume(300.0, 300.0).unwrap(), vec![300.0]);
    }

    #[test]
    fn test_oversized_volume_rebalances_tail() {
        let chunks = chunk_volume(700.0, 300.0).unwrap();
        assert_eq!(chunks, vec![300.0, 200.0, 200.0]);
        assert_invariants(&chunks, 700.0, 300.0);
    }

    #[test]
    fn test_exact_multiple_is_not_rebalanced() {
        assert_eq!(chunk_volume(600.0, 300.0).unwrap(), vec![300.0, 300.0]);
    }

    #[test]
    fn test_partial_threshold_keeps_large_remainder() {
        let policy = ChunkPolicy::new(0.5);
        assert_eq!(policy.chunk(800.0, 300.0).unwrap(), vec![300.0, 300.0, 200.0]);
        assert_eq!(policy.chunk(700.0, 300.0).unwrap(), vec![300.0, 200.0, 200.0]);
    }

    #[test]
    fn test_zero_threshold_is_plain_greedy() {
        let policy = ChunkPolicy::new(0.0);
        assert_eq!(policy.chunk(610.0, 300.0).unwrap(), vec![300.0, 300.0, 10.0]);
    }

    #[test]
    fn test_invariants_hold_across_volumes() {
        for total in [1.0, 50.0, 299.0, 301.0, 450.0, 901.0, 1234.5, 5000.0] {
            for rebalance in [0.0, 0.25, 0.5, 1.0] {
                let chunks = ChunkPolicy::new(rebalance).chunk(total, 300.0).unwrap();
                assert_invariants(&chunks, total, 300.0);
            }
        }
    }

    #[test]
    fn test_deterministic() {
        assert_eq!(
            chunk_volume(1234.5, 200.0).unwrap(),
            chunk_volume(1234.5, 200.0).unwrap()
        );
    }

    #[test]
    fn test_remainder_just_above_capacity_is_clamped() {
        let chunks = chunk_volume(900.0000000005, 300.0).unwrap();
        assert_eq!(chunks, vec![300.0, 300.0, 300.0]);
        assert_invariants(&chunks, 900.0000000005, 300.0);

        let chunks = ChunkPolicy::new(0.0).chunk(300.0000000005, 300.0).unwrap();
        assert_eq!(chunks, vec![300.0]);
    }

    #[test]
    fn test_too_many_chunks_is_rejected() {
        assert!(matches!(
            chunk_volume(1e15, 1.0),
            Err(PlanError::InvalidConfigValueError { .. })
        ));
        assert_eq!(chunk_volume(100_000.0, 1.0).unwrap().len(), MAX_CHUNKS);
        assert!(chunk_volume(100_001.0, 1.0).is_err());
    }

    #[test]
    fn test_rejects_non_positive_inputs() {
        assert!(chunk_volume(0.0, 300.0).is_err());
        assert!(chunk_volume(-5.0, 300.0).is_err());
        assert!(chunk_volume(100.0, 0.0).is_err());
    }
}
