use crate::cli::args::Cli;
use crate::config::PipelineConfig;
use crate::error::Result;
use crate::processors::{ParallelProcessor, PipelineReport, SequentialProcessor};
use crate::utils::progress::{ProgressReader, ProgressReporter};
use anyhow::Context;
use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read, Write};
use std::time::Instant;
use tracing::Level;

pub fn run(cli: Cli) -> anyhow::Result<()> {
    init_logging(cli.verbose);

    let config = build_config(&cli)?;

    let file = File::open(&cli.input)
        .with_context(|| format!("failed to open {}", cli.input.display()))?;
    let total = file.metadata()?.len();

    tracing::info!(
        input = %cli.input.display(),
        bytes = total,
        shards = config.shard_count,
        sequential = cli.sequential,
        mmap = cli.mmap,
        "processing measurements"
    );

    let progress = if cli.progress {
        ProgressReporter::new_bytes(total, "Aggregating measurements...", false)
    } else {
        ProgressReporter::silent()
    };

    let start = Instant::now();
    let stdout = io::stdout();
    let mut sink = stdout.lock();

    let result = if cli.mmap {
        // The file must not be truncated while mapped; it is only read here.
        let mmap = unsafe { Mmap::map(&file) }
            .with_context(|| format!("failed to map {}", cli.input.display()))?;
        execute(&cli, &config, &mmap[..], &progress, &mut sink)
    } else {
        execute(&cli, &config, file, &progress, &mut sink)
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            progress.abandon();
            return Err(e).with_context(|| format!("failed to process {}", cli.input.display()));
        }
    };

    progress.finish_with_message("Aggregation complete");
    tracing::info!(elapsed = ?start.elapsed(), "took {:.2?}", start.elapsed());

    if cli.stats {
        eprintln!("{}", report.summary());
    }

    Ok(())
}

fn execute<R: Read, W: Write>(
    cli: &Cli,
    config: &PipelineConfig,
    reader: R,
    progress: &ProgressReporter,
    sink: &mut W,
) -> Result<PipelineReport> {
    let reader = ProgressReader::new(reader, progress);

    if cli.sequential {
        SequentialProcessor::new(config.clone()).run(reader, sink)
    } else {
        ParallelProcessor::new(config.clone()).run(reader, sink)
    }
}

/// Config file and environment first, then command-line overrides.
fn build_config(cli: &Cli) -> anyhow::Result<PipelineConfig> {
    let mut config = PipelineConfig::load(cli.config.as_deref())
        .context("failed to load pipeline configuration")?;

    if let Some(shards) = cli.shards {
        config = config.with_shard_count(shards);
    }
    if let Some(block_size) = cli.block_size {
        config = config.with_block_size(block_size);
    }
    if let Some(queue_depth) = cli.queue_depth {
        config = config.with_queue_depth(queue_depth);
    }
    if let Some(max_record_len) = cli.max_record_len {
        config = config.with_max_record_len(max_record_len);
    }

    Ok(config.validated()?)
}

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_overrides_win_over_defaults() {
        let cli = Cli::parse_from([
            "station-stats",
            "in.txt",
            "--shards",
            "3",
            "--block-size",
            "8192",
            "--queue-depth",
            "7",
        ]);
        let config = build_config(&cli).unwrap();

        assert_eq!(config.shard_count, 3);
        assert_eq!(config.block_size, 8192);
        assert_eq!(config.queue_depth, 7);
    }

    #[test]
    fn test_invalid_override_is_rejected() {
        let cli = Cli::parse_from(["station-stats", "in.txt", "--shards", "0"]);
        assert!(build_config(&cli).is_err());
    }
}
