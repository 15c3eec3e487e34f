use crate::error::{ProcessingError, Result};
use crate::utils::constants::{DEFAULT_BLOCK_SIZE, DEFAULT_MAX_RECORD_LEN, RECORD_TERMINATOR};
use std::io::{ErrorKind, Read};

/// A run of complete records, each terminated by a newline.
pub type Batch = Vec<u8>;

/// Reads an input stream in fixed-size blocks and yields batches that end on a
/// record boundary.
///
/// The partial record after the last terminator of a block is held back and
/// prepended to the next block. Every yielded batch is a fresh allocation, so
/// it can be handed to another thread and parsed in place.
pub struct ChunkReader<R> {
    reader: R,
    block_size: usize,
    max_record_len: usize,
    leftover: Vec<u8>,
    bytes_read: u64,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_block_size(reader, DEFAULT_BLOCK_SIZE, DEFAULT_MAX_RECORD_LEN)
    }

    pub fn with_block_size(reader: R, block_size: usize, max_record_len: usize) -> Self {
        Self {
            reader,
            block_size: block_size.max(1),
            max_record_len,
            leftover: Vec::with_capacity(max_record_len),
            bytes_read: 0,
            finished: false,
        }
    }

    /// Total bytes pulled from the underlying stream so far.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fill `buf` from the stream until `len` more bytes are appended or the
    /// stream ends. Returns the number of bytes appended.
    fn fill(&mut self, buf: &mut Vec<u8>, len: usize) -> Result<usize> {
        let start = buf.len();
        buf.resize(start + len, 0);

        let mut filled = 0;
        while filled < len {
            match self.reader.read(&mut buf[start + filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    buf.truncate(start);
                    return Err(e.into());
                }
            }
        }

        buf.truncate(start + filled);
        self.bytes_read += filled as u64;
        Ok(filled)
    }

    /// Read the next block and split it on the last terminator.
    ///
    /// `Ok(None)` means the stream is exhausted and no records remain.
    pub fn next_batch(&mut self) -> Result<Option<Batch>> {
        if self.finished {
            return Ok(None);
        }

        let result = self.read_batch();
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    fn read_batch(&mut self) -> Result<Option<Batch>> {
        loop {
            let mut batch = Vec::with_capacity(self.leftover.len() + self.block_size);
            batch.extend_from_slice(&self.leftover);
            let carried = self.leftover.len();
            self.leftover.clear();

            let block_size = self.block_size;
            let n = self.fill(&mut batch, block_size)?;

            if n == 0 {
                if batch.is_empty() {
                    return Ok(None);
                }
                return Err(ProcessingError::TruncatedInput { trailing: batch });
            }

            // Only the fresh bytes can hold a new terminator; the carried
            // prefix never contains one.
            match memchr::memrchr(RECORD_TERMINATOR, &batch[carried..]) {
                Some(pos) => {
                    let end = carried + pos + 1;
                    self.hold_back(&batch[end..])?;
                    batch.truncate(end);
                    return Ok(Some(batch));
                }
                None => {
                    // No complete record yet: keep everything and read on.
                    self.hold_back(&batch)?;
                }
            }
        }
    }

    fn hold_back(&mut self, partial: &[u8]) -> Result<()> {
        if partial.len() >= self.max_record_len {
            return Err(ProcessingError::RecordTooLong {
                length: partial.len(),
                max: self.max_record_len,
            });
        }
        self.leftover.clear();
        self.leftover.extend_from_slice(partial);
        Ok(())
    }
}

impl<R: Read> Iterator for ChunkReader<R> {
    type Item = Result<Batch>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_batch().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    fn batches(input: &[u8], block_size: usize) -> Result<Vec<Batch>> {
        ChunkReader::with_block_size(Cursor::new(input), block_size, DEFAULT_MAX_RECORD_LEN)
            .collect()
    }

    #[test]
    fn test_single_block() {
        let input = b"Hamburg;12.0\nBerlin;5.5\n";
        let out = batches(input, 1024).unwrap();

        assert_eq!(out, vec![input.to_vec()]);
    }

    #[test]
    fn test_batches_end_on_terminator() {
        let input = b"Hamburg;12.0\nBerlin;5.5\nOslo;-3.2\nCairo;30.1\n";
        for block_size in 1..input.len() + 2 {
            let out = batches(input, block_size).unwrap();

            assert!(out.iter().all(|b| b.last() == Some(&b'\n')));
            assert_eq!(out.concat(), input.to_vec(), "block size {}", block_size);
        }
    }

    #[test]
    fn test_record_straddling_block_boundary() {
        // Block of 16 bytes ends in the middle of "Berlin;5.5"
        let input = b"Hamburg;12.0\nBerlin;5.5\n";
        let out = batches(input, 16).unwrap();

        assert_eq!(out, vec![b"Hamburg;12.0\n".to_vec(), b"Berlin;5.5\n".to_vec()]);
    }

    #[test]
    fn test_empty_input() {
        assert!(batches(b"", 8).unwrap().is_empty());
    }

    #[test]
    fn test_truncated_input() {
        let err = batches(b"Hamburg;12.0\nBerlin;5", 1024).unwrap_err();
        match err {
            ProcessingError::TruncatedInput { trailing } => assert_eq!(trailing, b"Berlin;5"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_record_too_long() {
        let mut input = vec![b'x'; 64];
        input.extend_from_slice(b";1.0\n");

        let err = ChunkReader::with_block_size(Cursor::new(&input), 16, 32)
            .collect::<Result<Vec<_>>>()
            .unwrap_err();
        assert!(matches!(err, ProcessingError::RecordTooLong { max: 32, .. }));
    }

    #[test]
    fn test_fused_after_error() {
        let mut reader = ChunkReader::with_block_size(Cursor::new(b"abc"), 8, 16);
        assert!(reader.next().unwrap().is_err());
        assert!(reader.next().is_none());
    }

    struct Trickle<'a> {
        data: &'a [u8],
        interrupted: bool,
    }

    impl Read for Trickle<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            // Alternate an interruption with a one-byte read.
            self.interrupted = !self.interrupted;
            if self.interrupted {
                return Err(io::Error::from(ErrorKind::Interrupted));
            }
            let n = self.data.len().min(buf.len()).min(1);
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_short_and_interrupted_reads() {
        let input = b"Oslo;-3.2\nOslo;1.0\n";
        let mut reader = ChunkReader::with_block_size(
            Trickle {
                data: input,
                interrupted: false,
            },
            1024,
            DEFAULT_MAX_RECORD_LEN,
        );

        assert_eq!(reader.next_batch().unwrap(), Some(input.to_vec()));
        assert_eq!(reader.next_batch().unwrap(), None);
        assert_eq!(reader.bytes_read(), input.len() as u64);
    }

    struct Failing;

    impl Read for Failing {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(ErrorKind::Other, "disk on fire"))
        }
    }

    #[test]
    fn test_io_error_propagates() {
        let err = ChunkReader::new(Failing).next().unwrap().unwrap_err();
        assert!(matches!(err, ProcessingError::Io(_)));
    }
}
