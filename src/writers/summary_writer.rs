use crate::error::Result;
use crate::models::{StationStats, StationTable};
use rayon::prelude::*;
use std::io::Write;

/// Renders a station table as a single summary line:
/// `{name1=min/mean/max, name2=min/mean/max}\n`
pub struct SummaryWriter {
    parallel_sort: bool,
}

impl SummaryWriter {
    pub fn new() -> Self {
        Self {
            parallel_sort: true,
        }
    }

    pub fn with_parallel_sort(mut self, parallel_sort: bool) -> Self {
        self.parallel_sort = parallel_sort;
        self
    }

    /// Stations sorted by raw name bytes.
    pub fn sorted<'a>(&self, table: &'a StationTable) -> Vec<(&'a [u8], &'a StationStats)> {
        let mut entries: Vec<_> = table.iter().collect();
        // Names are unique, so an unstable sort is deterministic.
        if self.parallel_sort {
            entries.par_sort_unstable_by(|a, b| a.0.cmp(b.0));
        } else {
            entries.sort_unstable_by(|a, b| a.0.cmp(b.0));
        }
        entries
    }

    /// Render the full summary, terminator included.
    pub fn render(&self, table: &StationTable) -> Vec<u8> {
        // ~ name + three numbers per station
        let mut out = Vec::with_capacity(2 + table.len() * 40);

        out.push(b'{');
        for (i, (name, stats)) in self.sorted(table).into_iter().enumerate() {
            if i > 0 {
                out.extend_from_slice(b", ");
            }
            out.extend_from_slice(name);
            out.push(b'=');
            push_tenths(&mut out, stats.min as i64, false);
            out.push(b'/');
            let (mean, negative_zero) = stats.mean_tenths_ceil();
            push_tenths(&mut out, mean, negative_zero);
            out.push(b'/');
            push_tenths(&mut out, stats.max as i64, false);
        }
        out.extend_from_slice(b"}\n");

        out
    }

    /// Render and write the summary in one call, then flush.
    ///
    /// Nothing reaches `sink` unless the whole line was rendered.
    pub fn write_summary<W: Write>(&self, table: &StationTable, sink: &mut W) -> Result<()> {
        let summary = self.render(table);
        sink.write_all(&summary)?;
        sink.flush()?;
        Ok(())
    }
}

impl Default for SummaryWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Append a tenths value with exactly one fractional digit: -123 => "-12.3".
fn push_tenths(out: &mut Vec<u8>, tenths: i64, negative_zero: bool) {
    if tenths < 0 || negative_zero {
        out.push(b'-');
    }
    let magnitude = tenths.unsigned_abs();
    push_digits(out, magnitude / 10);
    out.push(b'.');
    out.push(b'0' + (magnitude % 10) as u8);
}

/// Append the decimal digits of `n`, most significant first.
fn push_digits(out: &mut Vec<u8>, mut n: u64) {
    let mut digits = [0u8; 20];
    let mut start = digits.len();
    loop {
        start -= 1;
        digits[start] = b'0' + (n % 10) as u8;
        n /= 10;
        if n == 0 {
            break;
        }
    }
    out.extend_from_slice(&digits[start..]);
}
