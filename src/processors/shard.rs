use crate::error::{ProcessingError, Result};
use crate::models::StationTable;
use crate::readers::{records, Batch};
use crate::utils::constants::SHARD_TABLE_CAPACITY;
use crossbeam::channel::Receiver;
use std::sync::atomic::{AtomicBool, Ordering};

/// A worker owning one private station table.
///
/// Names borrowed from a batch are copied into the table before the batch is
/// dropped, so batches never outlive the fold that consumes them.
pub struct AggregationShard {
    id: usize,
    table: StationTable,
    records: u64,
}

impl AggregationShard {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            table: StationTable::with_capacity(SHARD_TABLE_CAPACITY),
            records: 0,
        }
    }

    /// Records folded so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    /// Fold every record of a batch into the shard table.
    pub fn fold_batch(&mut self, batch: &[u8]) -> Result<u64> {
        let mut folded = 0;
        for record in records(batch) {
            let record = record?;
            self.table.record(record.name, record.temperature);
            folded += 1;
        }
        self.records += folded;
        Ok(folded)
    }

    /// Consume batches until the queue is closed and drained, then hand the
    /// table back.
    ///
    /// Stops early with [`ProcessingError::Cancelled`] once `cancelled` is set
    /// by another part of the pipeline.
    pub fn run(mut self, queue: Receiver<Batch>, cancelled: &AtomicBool) -> Result<ShardOutput> {
        tracing::debug!(shard = self.id, "shard started");

        for batch in queue {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ProcessingError::Cancelled);
            }
            if let Err(e) = self.fold_batch(&batch) {
                cancelled.store(true, Ordering::Relaxed);
                tracing::error!(shard = self.id, error = %e, "shard failed");
                return Err(e);
            }
        }

        tracing::debug!(
            shard = self.id,
            records = self.records,
            stations = self.table.len(),
            "shard finished"
        );

        Ok(self.finish())
    }

    /// Publish the shard's table.
    pub fn finish(self) -> ShardOutput {
        ShardOutput {
            shard: self.id,
            records: self.records,
            table: self.table,
        }
    }
}

/// What a shard publishes once its queue is exhausted.
#[derive(Debug)]
pub struct ShardOutput {
    pub shard: usize,
    pub records: u64,
    pub table: StationTable,
}
