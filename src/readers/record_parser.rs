use crate::error::{ProcessingError, Result};
use crate::models::Record;
use crate::utils::constants::{
    FIELD_SEPARATOR, MAX_TEMPERATURE_LEN, MIN_TEMPERATURE_LEN, RECORD_TERMINATOR,
};

#[inline(always)]
fn digit(byte: u8) -> Option<i32> {
    byte.is_ascii_digit().then(|| (byte - b'0') as i32)
}

/// Decode a temperature field into tenths of a degree.
///
/// Accepts exactly `D.D`, `DD.D`, `-D.D` and `-DD.D`:
/// "-12.3" => -123, "7.7" => 77
#[inline]
pub fn parse_temperature(field: &[u8]) -> Result<i32> {
    let (negative, magnitude) = match field.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, field),
    };

    // The position of the decimal point decides between one and two integer digits.
    let value = match *magnitude {
        [d0, b'.', d1] => digit(d0).zip(digit(d1)).map(|(a, b)| a * 10 + b),
        [d0, d1, b'.', d2] => digit(d0)
            .zip(digit(d1))
            .zip(digit(d2))
            .map(|((a, b), c)| a * 100 + b * 10 + c),
        _ => None,
    }
    .ok_or_else(|| ProcessingError::invalid_temperature(field))?;

    Ok(if negative { -value } else { value })
}

/// Split a single line (without terminator) into name and temperature.
///
/// The temperature field is 3 to 5 bytes long, so the separator is found by
/// probing those fixed offsets from the end of the line instead of scanning.
#[inline]
pub fn parse_line(line: &[u8]) -> Result<Record<'_>> {
    let separator = (MIN_TEMPERATURE_LEN..=MAX_TEMPERATURE_LEN)
        .map(|temp_len| temp_len + 1)
        .filter(|&offset| offset < line.len())
        .map(|offset| line.len() - offset)
        .find(|&at| line[at] == FIELD_SEPARATOR)
        .ok_or_else(|| ProcessingError::malformed(line))?;

    let temperature = parse_temperature(&line[separator + 1..])?;
    Ok(Record::new(&line[..separator], temperature))
}

/// Iterator over the records of a batch of complete lines.
///
/// Each call consumes one line; the iterator stops at the first error.
pub struct RecordIter<'a> {
    remaining: &'a [u8],
    failed: bool,
}

impl<'a> RecordIter<'a> {
    pub fn new(batch: &'a [u8]) -> Self {
        Self {
            remaining: batch,
            failed: false,
        }
    }
}

impl<'a> Iterator for RecordIter<'a> {
    type Item = Result<Record<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.remaining.is_empty() {
            return None;
        }

        let (line, rest) = match memchr::memchr(RECORD_TERMINATOR, self.remaining) {
            Some(end) => (&self.remaining[..end], &self.remaining[end + 1..]),
            None => (self.remaining, &self.remaining[self.remaining.len()..]),
        };
        self.remaining = rest;

        let record = parse_line(line);
        self.failed = record.is_err();
        Some(record)
    }
}

impl std::iter::FusedIterator for RecordIter<'_> {}

/// Parse every record in `batch`.
pub fn records(batch: &[u8]) -> RecordIter<'_> {
    RecordIter::new(batch)
}
