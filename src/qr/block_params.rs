//! Panel geometry for the block-banded factorization.

/// Panel geometry: how many columns form a block, and how many rows the
/// active window starts with.
///
/// `block_rows` should typically be at least `2 * block_cols`; the driver
/// does not enforce this but panel quality (and the validity of the banded
/// assumption the implicit-zeroing heuristic relies on) degrades quickly if
/// it isn't.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockParams {
    pub block_rows: usize,
    pub block_cols: usize,
}

impl Default for BlockParams {
    fn default() -> Self {
        Self {
            block_rows: 4,
            block_cols: 2,
        }
    }
}

impl BlockParams {
    pub fn new(block_rows: usize, block_cols: usize) -> Self {
        Self {
            block_rows,
            block_cols,
        }
    }

    /// Per-iteration growth of the active window absent implicit zeroing.
    pub fn row_increment(&self) -> usize {
        self.block_rows - self.block_cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_reference_geometry() {
        let p = BlockParams::default();
        assert_eq!(p.block_rows, 4);
        assert_eq!(p.block_cols, 2);
        assert_eq!(p.row_increment(), 2);
    }
}
