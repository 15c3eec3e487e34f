use crate::models::StationTable;
use rayon::prelude::*;

pub struct DataMerger {
    expected_stations: usize,
}

impl DataMerger {
    pub fn new() -> Self {
        Self {
            expected_stations: 0,
        }
    }

    pub fn with_expected_stations(expected_stations: usize) -> Self {
        Self { expected_stations }
    }

    /// Fold shard tables into one global table.
    ///
    /// Tables must no longer be mutated by their shards. Composition of
    /// min/max/sum/count is associative and commutative, so tables are reduced
    /// pairwise in parallel. The result has room for `expected_stations`.
    pub fn merge_tables(&self, tables: Vec<StationTable>) -> StationTable {
        let mut merged = tables
            .into_par_iter()
            .reduce(StationTable::new, |mut acc, table| {
                acc.merge(table);
                acc
            });
        merged.reserve_for(self.expected_stations);

        tracing::debug!(
            stations = merged.len(),
            expected = self.expected_stations,
            "merged shard tables"
        );
        merged
    }

}

impl Default for DataMerger {
    fn default() -> Self {
        Self::new()
    }
}
