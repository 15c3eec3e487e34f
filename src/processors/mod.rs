pub mod data_merger;
pub mod parallel_processor;
pub mod shard;

pub use data_merger::DataMerger;
pub use parallel_processor::{run, Aggregate, ParallelProcessor, PipelineReport, SequentialProcessor};
pub use shard::{AggregationShard, ShardOutput};
