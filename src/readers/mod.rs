pub mod chunk_reader;
pub mod record_parser;

pub use chunk_reader::{Batch, ChunkReader};
pub use record_parser::{parse_line, parse_temperature, records, RecordIter};
