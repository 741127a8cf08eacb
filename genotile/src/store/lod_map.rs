//! Remapping of quantized LOD levels onto the levels a source can serve.

/// How a store translates a quantized LOD level into the level it addresses.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LodMap {
    /// Use the quantized level unchanged.
    #[default]
    Identity,

    /// Always use one level (annotation sources serve everything at 0).
    Fixed(u32),

    /// `table[level]`; levels past the end use the last entry.
    Table(Vec<u32>),
}

impl LodMap {
    /// Map every level onto the nearest of `available`.
    ///
    /// Ties go to the finer (lower) level. Levels above the highest
    /// available one map to it. An empty list yields [`LodMap::Identity`].
    pub fn nearest_available(available: &[u32]) -> Self {
        let mut levels = available.to_vec();
        levels.sort_unstable();
        levels.dedup();

        let Some(&top) = levels.last() else {
            return LodMap::Identity;
        };

        let table = (0..=top)
            .map(|level| {
                levels
                    .iter()
                    .copied()
                    .min_by_key(|candidate| (candidate.abs_diff(level), *candidate))
                    .unwrap_or(top)
            })
            .collect();
        LodMap::Table(table)
    }

    pub fn map(&self, level: u32) -> u32 {
        match self {
            LodMap::Identity => level,
            LodMap::Fixed(fixed) => *fixed,
            LodMap::Table(table) => table
                .get(level as usize)
                .or_else(|| table.last())
                .copied()
                .unwrap_or(level),
        }
    }
}
