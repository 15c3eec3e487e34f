use serde::{Deserialize, Serialize};

/// Running statistics for one station, all values in tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationStats {
    pub min: i32,
    pub max: i32,
    pub sum: i64,
    pub count: u64,
}

impl StationStats {
    /// Stats for a station seen exactly once.
    #[inline]
    pub fn new(temperature: i32) -> Self {
        Self {
            min: temperature,
            max: temperature,
            sum: temperature as i64,
            count: 1,
        }
    }

    /// Fold a single observation in.
    #[inline]
    pub fn record(&mut self, temperature: i32) {
        self.min = self.min.min(temperature);
        self.max = self.max.max(temperature);
        self.sum += temperature as i64;
        self.count += 1;
    }

    /// Compose with stats gathered elsewhere for the same station.
    #[inline]
    pub fn merge(&mut self, other: &StationStats) {
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Mean in tenths, rounded towards positive infinity.
    ///
    /// The second value is true when the exact mean is negative but rounds up
    /// to zero, so callers can still render the sign.
    pub fn mean_tenths_ceil(&self) -> (i64, bool) {
        let count = self.count as i64;
        let quotient = self.sum / count;
        let remainder = self.sum % count;
        let mean = if remainder > 0 { quotient + 1 } else { quotient };
        (mean, self.sum < 0 && mean == 0)
    }
}
