use crate::error::{ProcessingError, Result};
use crate::utils::constants::{
    DEFAULT_BLOCK_SIZE, DEFAULT_EXPECTED_STATIONS, DEFAULT_MAX_RECORD_LEN, DEFAULT_QUEUE_DEPTH,
    ENV_PREFIX, MAX_TEMPERATURE_LEN, SHARDS_PER_CPU,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use validator::Validate;

/// Tuning knobs for the aggregation pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bytes requested from the input per read.
    #[validate(range(min = 1))]
    pub block_size: usize,

    /// Upper bound on a single record, terminator included.
    #[validate(range(min = 6))]
    pub max_record_len: usize,

    /// Number of aggregation shards.
    #[validate(range(min = 1, max = 4096))]
    pub shard_count: usize,

    /// Batches buffered per shard before the reader blocks.
    #[validate(range(min = 1))]
    pub queue_depth: usize,

    /// Capacity hint for the merged station table.
    pub expected_stations: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            block_size: DEFAULT_BLOCK_SIZE,
            max_record_len: DEFAULT_MAX_RECORD_LEN,
            shard_count: num_cpus::get() * SHARDS_PER_CPU,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            expected_stations: DEFAULT_EXPECTED_STATIONS,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer defaults, an optional config file and `STATION_STATS_*`
    /// environment variables, then validate the result.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder =
            config::Config::builder().add_source(config::Config::try_from(&Self::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let config: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?
            .try_deserialize()?;

        config.validated()
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_record_len(mut self, max_record_len: usize) -> Self {
        self.max_record_len = max_record_len;
        self
    }

    pub fn with_shard_count(mut self, shard_count: usize) -> Self {
        self.shard_count = shard_count;
        self
    }

    pub fn with_queue_depth(mut self, queue_depth: usize) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_expected_stations(mut self, expected_stations: usize) -> Self {
        self.expected_stations = expected_stations;
        self
    }

    /// Check field ranges and the relations between fields.
    pub fn validated(self) -> Result<Self> {
        self.validate()?;

        if self.block_size <= self.max_record_len {
            return Err(ProcessingError::Config(format!(
                "block_size ({}) must be larger than max_record_len ({})",
                self.block_size, self.max_record_len
            )));
        }

        // One name byte, separator, `-DD.D` and terminator.
        if self.max_record_len < MAX_TEMPERATURE_LEN + 3 {
            tracing::warn!(
                max_record_len = self.max_record_len,
                "max_record_len rejects some valid temperature shapes"
            );
        }

        Ok(self)
    }
}
