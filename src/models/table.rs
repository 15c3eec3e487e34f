use crate::models::StationStats;
use std::collections::hash_map::{self, HashMap};

/// Station name to running statistics.
///
/// Names are raw bytes: the input encoding is never validated, and output must
/// echo the name bytes unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StationTable {
    stations: HashMap<Box<[u8]>, StationStats>,
}

impl StationTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            stations: HashMap::with_capacity(capacity),
        }
    }

    /// Fold one observation into the entry for `name`.
    ///
    /// `name` may borrow from a transient batch buffer; it is copied into owned
    /// storage only the first time the station is seen.
    #[inline]
    pub fn record(&mut self, name: &[u8], temperature: i32) {
        match self.stations.get_mut(name) {
            Some(stats) => stats.record(temperature),
            None => {
                self.stations
                    .insert(Box::from(name), StationStats::new(temperature));
            }
        }
    }

    /// Compose another table's stats into this one.
    pub fn merge(&mut self, other: StationTable) {
        if self.stations.is_empty() && self.stations.capacity() <= other.stations.capacity() {
            self.stations = other.stations;
            return;
        }

        for (name, stats) in other.stations {
            match self.stations.entry(name) {
                hash_map::Entry::Occupied(mut entry) => entry.get_mut().merge(&stats),
                hash_map::Entry::Vacant(entry) => {
                    entry.insert(stats);
                }
            }
        }
    }

    /// Make room for at least `expected` stations in total.
    pub fn reserve_for(&mut self, expected: usize) {
        self.stations
            .reserve(expected.saturating_sub(self.stations.len()));
    }

    pub fn capacity(&self) -> usize {
        self.stations.capacity()
    }

    pub fn get(&self, name: &[u8]) -> Option<&StationStats> {
        self.stations.get(name)
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Total number of observations across all stations.
    pub fn observations(&self) -> u64 {
        self.stations.values().map(|s| s.count).sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], &StationStats)> {
        self.stations.iter().map(|(name, stats)| (&**name, stats))
    }
}

impl<'a> FromIterator<(&'a [u8], i32)> for StationTable {
    fn from_iter<I: IntoIterator<Item = (&'a [u8], i32)>>(iter: I) -> Self {
        let mut table = StationTable::new();
        for (name, temperature) in iter {
            table.record(name, temperature);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(records: &[(&str, i32)]) -> StationTable {
        records
            .iter()
            .map(|(name, temp)| (name.as_bytes(), *temp))
            .collect()
    }

    #[test]
    fn test_record_creates_then_updates() {
        let table = table(&[("Hamburg", 120), ("Hamburg", 140), ("Berlin", 55)]);

        assert_eq!(table.len(), 2);
        assert_eq!(table.observations(), 3);

        let hamburg = table.get(b"Hamburg").unwrap();
        assert_eq!((hamburg.min, hamburg.max, hamburg.sum, hamburg.count), (120, 140, 260, 2));
        assert_eq!(table.get(b"Berlin").unwrap().count, 1);
        assert!(table.get(b"Oslo").is_none());
    }

    #[test]
    fn test_merge_composes_shared_names() {
        let mut a = table(&[("Oslo", -32), ("Berlin", 55)]);
        let b = table(&[("Oslo", 10), ("Cairo", 300)]);
        a.merge(b);

        assert_eq!(a.len(), 3);
        let oslo = a.get(b"Oslo").unwrap();
        assert_eq!((oslo.min, oslo.max, oslo.sum, oslo.count), (-32, 10, -22, 2));
    }

    #[test]
    fn test_merge_order_does_not_matter() {
        let a = table(&[("x", 1), ("y", 2)]);
        let b = table(&[("x", -5), ("z", 7)]);
        let c = table(&[("y", 40), ("z", -7), ("x", 3)]);

        let mut abc = StationTable::new();
        abc.merge(a.clone());
        abc.merge(b.clone());
        abc.merge(c.clone());

        let mut cab = c;
        cab.merge(a);
        cab.merge(b);

        assert_eq!(abc, cab);
    }

    #[test]
    fn test_merge_into_empty_keeps_larger_map() {
        let mut sized = StationTable::with_capacity(1_000);
        sized.merge(table(&[("Oslo", 10)]));
        assert!(sized.capacity() >= 1_000);
        assert_eq!(sized.len(), 1);

        let mut small = StationTable::new();
        let big = StationTable::with_capacity(1_000);
        small.merge(big);
        assert!(small.capacity() >= 1_000);
    }

    #[test]
    fn test_reserve_for_expected_stations() {
        let mut table = table(&[("a", 1), ("b", 2)]);
        table.reserve_for(500);
        assert!(table.capacity() >= 500);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_names_are_raw_bytes() {
        let mut table = StationTable::new();
        table.record(&[0xff, 0xfe], 10);
        table.record("São Paulo".as_bytes(), 20);

        assert!(table.get(&[0xff, 0xfe]).is_some());
        assert!(table.get("São Paulo".as_bytes()).is_some());
    }
}
