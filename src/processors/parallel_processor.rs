use crate::config::PipelineConfig;
use crate::error::{ProcessingError, Result};
use crate::models::StationTable;
use crate::processors::{AggregationShard, DataMerger, ShardOutput};
use crate::readers::{Batch, ChunkReader};
use crate::writers::SummaryWriter;
use crossbeam::channel::{bounded, Sender};
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Counters describing one pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineReport {
    pub shards: usize,
    pub batches: u64,
    pub bytes: u64,
    pub records: u64,
    pub stations: usize,
}

impl PipelineReport {
    pub fn summary(&self) -> String {
        format!(
            "{} records from {} bytes in {} batches across {} shards, {} stations",
            self.records, self.bytes, self.batches, self.shards, self.stations
        )
    }
}

/// The merged table together with the counters of the run that built it.
#[derive(Debug)]
pub struct Aggregate {
    pub table: StationTable,
    pub report: PipelineReport,
}

/// Fans complete-record batches out to a fixed pool of aggregation shards and
/// merges their tables once every shard has finished.
pub struct ParallelProcessor {
    config: PipelineConfig,
}

impl ParallelProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    /// Read `reader` to the end and aggregate every record.
    ///
    /// The calling thread reads and dispatches; shards run on scoped threads.
    /// The first root-cause error wins and tears the whole pipeline down.
    pub fn aggregate<R: Read>(&self, reader: R) -> Result<Aggregate> {
        let config = self.config.clone().validated()?;
        let cancelled = AtomicBool::new(false);

        tracing::info!(
            shards = config.shard_count,
            block_size = config.block_size,
            queue_depth = config.queue_depth,
            "starting aggregation"
        );

        let (dispatched, outputs) = thread::scope(|scope| -> Result<_> {
            let mut queues = Vec::with_capacity(config.shard_count);
            let mut handles = Vec::with_capacity(config.shard_count);

            for id in 0..config.shard_count {
                let (queue, inbox) = bounded::<Batch>(config.queue_depth);
                let cancelled = &cancelled;
                let handle = thread::Builder::new()
                    .name(format!("shard-{}", id))
                    .spawn_scoped(scope, move || AggregationShard::new(id).run(inbox, cancelled))?;
                queues.push(queue);
                handles.push(handle);
            }

            let chunks =
                ChunkReader::with_block_size(reader, config.block_size, config.max_record_len);
            let dispatched = Self::dispatch(chunks, &queues, &cancelled);

            // Closing the queues lets every shard drain and publish.
            drop(queues);

            // Barrier: no table is read until every shard has returned it.
            let outputs: Vec<Result<ShardOutput>> = handles
                .into_iter()
                .enumerate()
                .map(|(shard, handle)| {
                    handle
                        .join()
                        .unwrap_or_else(|_| Err(ProcessingError::WorkerPanicked { shard }))
                })
                .collect();

            Ok((dispatched, outputs))
        })?;

        let (tables, report) = Self::collect(dispatched, outputs, config.shard_count)?;

        let merger = DataMerger::with_expected_stations(config.expected_stations);
        let table = merger.merge_tables(tables);
        let report = PipelineReport {
            stations: table.len(),
            ..report
        };

        tracing::info!(
            batches = report.batches,
            bytes = report.bytes,
            records = report.records,
            stations = report.stations,
            "aggregation complete"
        );

        Ok(Aggregate { table, report })
    }

    /// Aggregate `reader` and write the summary line to `sink`.
    pub fn run<R: Read, W: Write>(&self, reader: R, sink: &mut W) -> Result<PipelineReport> {
        let aggregate = self.aggregate(reader)?;
        SummaryWriter::new().write_summary(&aggregate.table, sink)?;
        Ok(aggregate.report)
    }

    /// Round-robin batches over the shard queues until the input is exhausted.
    ///
    /// Blocks while the target queue is full.
    fn dispatch<R: Read>(
        mut chunks: ChunkReader<R>,
        queues: &[Sender<Batch>],
        cancelled: &AtomicBool,
    ) -> Result<(u64, u64)> {
        let mut batches: u64 = 0;

        loop {
            if cancelled.load(Ordering::Relaxed) {
                return Err(ProcessingError::Cancelled);
            }

            let batch = match chunks.next_batch() {
                Ok(Some(batch)) => batch,
                Ok(None) => break,
                Err(e) => {
                    cancelled.store(true, Ordering::Relaxed);
                    tracing::error!(error = %e, "reading input failed");
                    return Err(e);
                }
            };

            let target = (batches % queues.len() as u64) as usize;
            if queues[target].send(batch).is_err() {
                // The shard has already exited with an error.
                cancelled.store(true, Ordering::Relaxed);
                return Err(ProcessingError::Cancelled);
            }
            batches += 1;
        }

        Ok((batches, chunks.bytes_read()))
    }

    /// Pick the root-cause error if anything failed, otherwise gather the
    /// shard tables.
    fn collect(
        dispatched: Result<(u64, u64)>,
        outputs: Vec<Result<ShardOutput>>,
        shards: usize,
    ) -> Result<(Vec<StationTable>, PipelineReport)> {
        let mut first_error: Option<ProcessingError> = None;
        let mut keep = |err: ProcessingError| {
            let replace = match &first_error {
                None => true,
                Some(ProcessingError::Cancelled) => !matches!(err, ProcessingError::Cancelled),
                Some(_) => false,
            };
            if replace {
                first_error = Some(err);
            }
        };

        let (batches, bytes) = match dispatched {
            Ok(counts) => counts,
            Err(e) => {
                keep(e);
                (0, 0)
            }
        };

        let mut tables = Vec::with_capacity(outputs.len());
        let mut records = 0;
        for output in outputs {
            match output {
                Ok(output) => {
                    records += output.records;
                    tables.push(output.table);
                }
                Err(e) => keep(e),
            }
        }

        if let Some(err) = first_error {
            tracing::warn!(error = %err, "aggregation aborted");
            return Err(err);
        }

        Ok((
            tables,
            PipelineReport {
                shards,
                batches,
                bytes,
                records,
                stations: 0,
            },
        ))
    }
}

impl Default for ParallelProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Single-threaded counterpart of [`ParallelProcessor`]: one shard folds
/// batches on the calling thread as they are read.
pub struct SequentialProcessor {
    config: PipelineConfig,
}

impl SequentialProcessor {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn aggregate<R: Read>(&self, reader: R) -> Result<Aggregate> {
        let config = self.config.clone().validated()?;
        let mut chunks =
            ChunkReader::with_block_size(reader, config.block_size, config.max_record_len);
        let mut shard = AggregationShard::new(0);
        let mut batches = 0;

        while let Some(batch) = chunks.next_batch()? {
            shard.fold_batch(&batch)?;
            batches += 1;
        }

        let output = shard.finish();
        let report = PipelineReport {
            shards: 1,
            batches,
            bytes: chunks.bytes_read(),
            records: output.records,
            stations: output.table.len(),
        };

        tracing::info!(records = report.records, stations = report.stations, "aggregation complete");

        Ok(Aggregate {
            table: output.table,
            report,
        })
    }

    pub fn run<R: Read, W: Write>(&self, reader: R, sink: &mut W) -> Result<PipelineReport> {
        let aggregate = self.aggregate(reader)?;
        SummaryWriter::new()
            .with_parallel_sort(false)
            .write_summary(&aggregate.table, sink)?;
        Ok(aggregate.report)
    }
}

impl Default for SequentialProcessor {
    fn default() -> Self {
        Self::new(PipelineConfig::default())
    }
}

/// Aggregate `reader` with the parallel pipeline and write the summary line to `sink`.
pub fn run<R: Read, W: Write>(reader: R, sink: &mut W, config: &PipelineConfig) -> Result<PipelineReport> {
    ParallelProcessor::new(config.clone()).run(reader, sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::{self, Cursor, ErrorKind};

    fn small_config(shards: usize) -> PipelineConfig {
        PipelineConfig::new()
            .with_block_size(128)
            .with_shard_count(shards)
            .with_queue_depth(1)
    }

    fn summary(input: &[u8], config: PipelineConfig) -> Result<String> {
        let mut out = Vec::new();
        ParallelProcessor::new(config).run(Cursor::new(input), &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_end_to_end() -> Result<()> {
        let out = summary(b"Hamburg;12.0\nHamburg;14.0\nBerlin;5.5\n", small_config(3))?;
        assert_eq!(out, "{Berlin=5.5/5.5/5.5, Hamburg=12.0/13.0/14.0}\n");

        let out = summary(b"Oslo;-3.2\nOslo;1.0\n", small_config(2))?;
        assert_eq!(out, "{Oslo=-3.2/-1.1/1.0}\n");
        Ok(())
    }

    #[test]
    fn test_report_counts() -> Result<()> {
        let input: Vec<u8> = (0..100)
            .flat_map(|i| format!("station{};{}.{}\n", i % 7, i % 50, i % 10).into_bytes())
            .collect();

        let aggregate = ParallelProcessor::new(small_config(4)).aggregate(Cursor::new(&input))?;

        assert_eq!(aggregate.report.records, 100);
        assert_eq!(aggregate.report.stations, 7);
        assert_eq!(aggregate.report.bytes, input.len() as u64);
        assert_eq!(aggregate.report.shards, 4);
        assert!(aggregate.report.batches > 1);
        assert_eq!(aggregate.table.observations(), 100);
        Ok(())
    }

    #[test]
    fn test_more_shards_than_batches() -> Result<()> {
        let out = summary(b"a;1.0\n", small_config(16))?;
        assert_eq!(out, "{a=1.0/1.0/1.0}\n");
        Ok(())
    }

    #[test]
    fn test_empty_input() -> Result<()> {
        assert_eq!(summary(b"", small_config(2))?, "{}\n");
        Ok(())
    }

    #[test]
    fn test_malformed_line_writes_nothing() {
        let mut input = Vec::new();
        for _ in 0..50 {
            input.extend_from_slice(b"Hamburg;12.0\n");
        }
        input.extend_from_slice(b"Hamburg12.0\n");
        for _ in 0..50 {
            input.extend_from_slice(b"Berlin;1.0\n");
        }

        let mut out = Vec::new();
        let err = ParallelProcessor::new(small_config(3))
            .run(Cursor::new(&input), &mut out)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::MalformedRecord { .. }));
        assert!(out.is_empty());
    }

    #[test]
    fn test_truncated_input_writes_nothing() {
        let mut out = Vec::new();
        let err = ParallelProcessor::new(small_config(2))
            .run(Cursor::new(b"Hamburg;12.0\nBerlin;5.5"), &mut out)
            .unwrap_err();

        assert!(matches!(err, ProcessingError::TruncatedInput { .. }));
        assert!(out.is_empty());
    }

    struct FailAfter<'a> {
        data: &'a [u8],
    }

    impl Read for FailAfter<'_> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.data.is_empty() {
                return Err(io::Error::new(ErrorKind::Other, "device gone"));
            }
            let n = self.data.len().min(buf.len());
            buf[..n].copy_from_slice(&self.data[..n]);
            self.data = &self.data[n..];
            Ok(n)
        }
    }

    #[test]
    fn test_io_error_is_root_cause() {
        let mut out = Vec::new();
        let err = ParallelProcessor::new(small_config(2))
            .run(
                FailAfter {
                    data: b"Oslo;1.0\nOslo;2.0\n",
                },
                &mut out,
            )
            .unwrap_err();

        assert!(matches!(err, ProcessingError::Io(_)));
        assert!(out.is_empty());
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = ParallelProcessor::new(small_config(0))
            .aggregate(Cursor::new(b"a;1.0\n"))
            .unwrap_err();
        assert!(matches!(err, ProcessingError::Validation(_)));
    }

    #[test]
    fn test_sequential_matches_parallel() -> Result<()> {
        let input: Vec<u8> = (0..2_000)
            .flat_map(|i| {
                let sign = if i % 3 == 0 { "-" } else { "" };
                format!("s{};{}{}.{}\n", i % 37, sign, i % 100, i % 10).into_bytes()
            })
            .collect();

        let mut parallel = Vec::new();
        ParallelProcessor::new(small_config(5)).run(Cursor::new(&input), &mut parallel)?;

        let mut sequential = Vec::new();
        let report = SequentialProcessor::new(small_config(1).with_block_size(4096))
            .run(Cursor::new(&input), &mut sequential)?;

        assert_eq!(String::from_utf8(parallel).unwrap(), String::from_utf8(sequential).unwrap());
        assert_eq!(report.records, 2_000);
        assert_eq!(report.stations, 37);
        Ok(())
    }

    #[test]
    fn test_run_entry_point() -> Result<()> {
        let mut out = Vec::new();
        let report = run(Cursor::new(b"x;1.0\ny;2.0\nx;3.0\n"), &mut out, &small_config(2))?;

        assert_eq!(out, b"{x=1.0/2.0/3.0, y=2.0/2.0/2.0}\n".to_vec());
        assert_eq!(report.records, 3);
        Ok(())
    }
}
