use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use graph_diff::compare::{self, DiffOpt};
use graph_diff::index::{build, store};
use graph_diff::io;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(
    name = "graph-diff",
    author,
    version,
    about = "Find sequence present in a variant read set but absent from a base read set",
    arg_required_else_help = true
)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build .fmi/.ssa index files for a FASTA or FASTQ file
    Index {
        /// Sequence file (FASTA or FASTQ)
        reads: String,
        /// Output prefix (defaults to the input path without its extension)
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Write variant-only bubbles to a FASTA file
    Diff {
        /// Base read set (indexed)
        #[arg(short = 'b', long = "base")]
        base: String,
        /// Variant read set (indexed)
        #[arg(short = 'r', long = "variant")]
        variant: String,
        /// Reference sequences (indexed) used to place bubble anchors
        #[arg(long = "reference")]
        reference: String,
        /// Output FASTA path
        #[arg(short, long, default_value = "variants.fa")]
        out: String,
        /// k-mer length
        #[arg(short = 'k', long = "kmer", default_value_t = 55)]
        kmer: usize,
        /// Minimum variant occurrence count (both strands) to seed or extend
        #[arg(short = 'x', long = "kmer-threshold", default_value_t = 2)]
        kmer_threshold: usize,
        /// Base occurrence count at which a k-mer counts as present in base
        #[arg(long = "base-threshold", default_value_t = 1)]
        base_threshold: usize,
        /// Branch budget per walk
        #[arg(short = 'y', long = "max-branches", default_value_t = 0)]
        max_branches: usize,
        /// Maximum symbols appended per walk direction
        #[arg(long = "max-length", default_value_t = 10_000)]
        max_length: usize,
        #[arg(short = 't', long = "threads", default_value_t = 1)]
        threads: usize,
        /// Occurrence and locator sampling rate applied when loading indexes
        #[arg(short = 'd', long = "sample-rate", default_value_t = 128)]
        sample_rate: usize,
        /// Interval cache depth
        #[arg(long = "cache-length", default_value_t = 10)]
        cache_length: usize,
        /// Reads handed to each worker per round
        #[arg(long = "batch-size", default_value_t = 1000)]
        batch_size: usize,
    },
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    let mut builder = env_logger::Builder::from_default_env();
    if std::env::var_os("RUST_LOG").is_none() {
        builder.filter_level(level);
    }
    builder.format_timestamp(None).format_target(false).init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    match cli.command {
        Commands::Index { reads, prefix } => run_index(&reads, prefix),
        Commands::Diff {
            base,
            variant,
            reference,
            out,
            kmer,
            kmer_threshold,
            base_threshold,
            max_branches,
            max_length,
            threads,
            sample_rate,
            cache_length,
            batch_size,
        } => {
            let opt = DiffOpt {
                base,
                variant,
                reference,
                out,
                kmer,
                kmer_threshold,
                base_threshold,
                max_branches,
                max_length,
                threads,
                sample_rate,
                cache_length,
                batch_size,
            };
            run_diff(&opt)
        }
    }
}

fn run_index(reads: &str, prefix: Option<String>) -> Result<()> {
    let prefix = prefix.unwrap_or_else(|| store::index_prefix(reads));
    let records = io::open_sequences(reads)
        .with_context(|| format!("cannot read sequences from '{}'", reads))?
        .map(|r| r.map(|rec| (rec.id, rec.seq)))
        .collect::<Result<Vec<_>, _>>()
        .with_context(|| format!("malformed sequence file '{}'", reads))?;

    let mut built = build::build_collection(records)
        .with_context(|| format!("cannot index '{}'", reads))?;
    built.index.meta = store::IndexMeta {
        source_file: Some(reads.to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    };

    println!("input:     {}", reads);
    println!("sequences: {}", built.index.directory.len());
    println!("symbols:   {}", built.index.len);

    let fmi = store::index_path(&prefix, store::FMI_EXT);
    built.index.save_to_file(&fmi).with_context(|| format!("cannot write '{}'", fmi))?;
    let ssa = store::index_path(&prefix, store::SSA_EXT);
    built.sa.save_to_file(&ssa).with_context(|| format!("cannot write '{}'", ssa))?;
    println!("index saved: {} {}", fmi, ssa);
    Ok(())
}

fn run_diff(opt: &DiffOpt) -> Result<()> {
    log::info!("base {} / variant {} / reference {}", opt.base, opt.variant, opt.reference);
    let stats = compare::run_diff(opt).context("comparison failed")?;
    println!("{}", stats);
    println!("output: {}", opt.out);
    Ok(())
}
