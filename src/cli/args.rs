use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "station-stats")]
#[command(about = "Per-station min/mean/max summary of a large measurements file")]
#[command(version)]
pub struct Cli {
    #[arg(help = "Measurements file with one `name;temperature` record per line")]
    pub input: PathBuf,

    #[arg(short, long, help = "Pipeline config file (TOML, JSON or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Number of aggregation shards [default: 2 x CPUs]")]
    pub shards: Option<usize>,

    #[arg(long, help = "Bytes read per block [default: 16 MiB]")]
    pub block_size: Option<usize>,

    #[arg(long, help = "Batches queued per shard before the reader blocks")]
    pub queue_depth: Option<usize>,

    #[arg(long, help = "Longest accepted record in bytes, terminator included")]
    pub max_record_len: Option<usize>,

    #[arg(long, default_value = "false", help = "Aggregate on a single thread")]
    pub sequential: bool,

    #[arg(long, help = "Memory-map the input instead of streaming reads")]
    pub mmap: bool,

    #[arg(long, help = "Show a progress bar on stderr")]
    pub progress: bool,

    #[arg(long, help = "Print pipeline counters to stderr")]
    pub stats: bool,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,
}
