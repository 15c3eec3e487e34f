/// Byte sizes
pub const KB: usize = 1 << 10;
pub const MB: usize = KB << 10;

/// Record format
pub const FIELD_SEPARATOR: u8 = b';';
pub const RECORD_TERMINATOR: u8 = b'\n';

/// Shortest temperature field (`D.D`) and longest (`-DD.D`)
pub const MIN_TEMPERATURE_LEN: usize = 3;
pub const MAX_TEMPERATURE_LEN: usize = 5;

/// Processing defaults
pub const DEFAULT_BLOCK_SIZE: usize = 16 * MB;
// Does not need to be exact, only larger than the longest possible line.
pub const DEFAULT_MAX_RECORD_LEN: usize = 110;
pub const DEFAULT_QUEUE_DEPTH: usize = 4;
pub const DEFAULT_EXPECTED_STATIONS: usize = 10_000;
pub const SHARD_TABLE_CAPACITY: usize = 512;
pub const SHARDS_PER_CPU: usize = 2;

/// Environment variable prefix for configuration overrides
pub const ENV_PREFIX: &str = "STATION_STATS";
