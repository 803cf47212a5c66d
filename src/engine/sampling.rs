// Block sampling for the pre- and post-migration windows.

/// `start..=end` every `stride` blocks; `end` is always included.
pub fn stride_blocks(start: u64, end: u64, stride: u64) -> Vec<u64> {
    if start > end {
        return Vec::new();
    }
    let stride = stride.max(1);
    let mut blocks: Vec<u64> = (start..=end).step_by(stride as usize).collect();
    if blocks.last() != Some(&end) {
        blocks.push(end);
    }
    blocks
}

/// Keep at most `max_points` blocks, evenly spread over the input (first and last kept).
pub fn thin_evenly(blocks: &[u64], max_points: usize) -> Vec<u64> {
    if max_points == 0 {
        return Vec::new();
    }
    if blocks.len() <= max_points {
        return blocks.to_vec();
    }
    if max_points == 1 {
        return vec![blocks[0]];
    }
    let last = (blocks.len() - 1) as u128;
    let steps = (max_points - 1) as u128;
    let mut out: Vec<u64> = (0..max_points as u128)
        .map(|i| blocks[((i * last + steps / 2) / steps) as usize])
        .collect();
    out.dedup();
    out
}

/// Blocks strictly before the migration, stepping `stride`, thinned to `max_points`.
pub fn pre_migration_blocks(start: u64, migration_block: u64, stride: u64, max_points: usize) -> Vec<u64> {
    if migration_block == 0 || start >= migration_block {
        return Vec::new();
    }
    thin_evenly(&stride_blocks(start, migration_block - 1, stride), max_points)
}

/// Blocks from the migration to `latest`, stepping `stride`, `latest` always included.
pub fn post_migration_blocks(migration_block: u64, latest: u64, stride: u64) -> Vec<u64> {
    stride_blocks(migration_block, latest, stride)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stride_includes_the_end() {
        assert_eq!(stride_blocks(100, 1000, 300), vec![100, 400, 700, 1000]);
        assert_eq!(stride_blocks(100, 1001, 300), vec![100, 400, 700, 1000, 1001]);
        assert_eq!(stride_blocks(5, 5, 300), vec![5]);
        assert!(stride_blocks(6, 5, 300).is_empty());
    }

    #[test]
    fn zero_stride_is_treated_as_one() {
        assert_eq!(stride_blocks(1, 3, 0), vec![1, 2, 3]);
    }

    #[test]
    fn thinning_keeps_endpoints_and_bound() {
        let blocks: Vec<u64> = (0..10_000).collect();
        let thin = thin_evenly(&blocks, 800);
        assert_eq!(thin.len(), 800);
        assert_eq!(thin.first(), Some(&0));
        assert_eq!(thin.last(), Some(&9_999));
        assert!(thin.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn short_inputs_are_untouched() {
        assert_eq!(thin_evenly(&[1, 2, 3], 800), vec![1, 2, 3]);
        assert_eq!(thin_evenly(&[1, 2, 3], 1), vec![1]);
    }

    #[test]
    fn windows_split_at_migration() {
        let pre = pre_migration_blocks(1_000, 2_000, 300, 800);
        assert_eq!(pre, vec![1_000, 1_300, 1_600, 1_900, 1_999]);
        assert!(pre.iter().all(|b| *b < 2_000));

        let post = post_migration_blocks(2_000, 2_650, 300);
        assert_eq!(post, vec![2_000, 2_300, 2_600, 2_650]);
    }
}
