use anyhow::{bail, Context, Result};
use clap::{ArgGroup, Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

use exact_align::align::{self, AlignOpt, PairOpt, ReadsInput};
use exact_align::index::fm::{FMIndex, IndexMeta};
use exact_align::index::reference::Reference;
use exact_align::io::fasta;
use exact_align::io::refmap::ReferenceMap;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser, Debug)]
#[command(name = "exact-align", author, version, about = "Exact-match short read aligner over an FM index", arg_required_else_help = true)]
struct Cli {
    /// Verbose logging (debug level)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build the FM index and sequence store of a reference FASTA
    Index {
        /// Reference FASTA file
        reference: PathBuf,
        /// Output prefix; writes <prefix>.fm and <prefix>.ref
        #[arg(short, long, default_value = "ref")]
        output: String,
        /// Sample every Nth suffix array position
        #[arg(long, default_value_t = 32)]
        sa_interval: u32,
        /// Occ checkpoint spacing in BWT rows
        #[arg(long, default_value_t = 128)]
        occ_block: usize,
    },
    /// Align reads exactly against an index
    Align(AlignArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("orientation").args(["ff", "fr", "rf"])))]
struct AlignArgs {
    /// Index prefix given to `index -o`
    #[arg(short = 'i', long = "index")]
    index: String,
    /// Unpaired reads FASTQ
    #[arg(conflicts_with_all = ["mate1", "mate2"], required_unless_present = "mate1")]
    reads: Option<PathBuf>,
    /// Mate 1 FASTQ
    #[arg(short = '1', requires = "mate2")]
    mate1: Option<PathBuf>,
    /// Mate 2 FASTQ
    #[arg(short = '2', requires = "mate1")]
    mate2: Option<PathBuf>,
    /// Output path (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
    /// Do not search the forward strand
    #[arg(long)]
    nofw: bool,
    /// Do not search the reverse-complement strand
    #[arg(long)]
    norc: bool,
    /// Report at most K alignments per read or pair
    #[arg(short = 'k', value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_hits: Option<usize>,
    /// Cached rows per strand (0 disables caching)
    #[arg(long = "cache-lim", default_value_t = 1 << 16)]
    cache_limit: usize,
    /// Prefer the strand with more hits so far when breaking ties
    #[arg(long = "strand-fix", default_value_t = true, action = clap::ArgAction::Set)]
    strand_fix: bool,
    /// Report index ranges instead of positions (unpaired only)
    #[arg(long)]
    range_mode: bool,
    /// Pseudo-random seed
    #[arg(long, default_value_t = 0)]
    seed: u32,
    #[arg(short = 'p', long = "threads", default_value_t = 1)]
    threads: usize,
    /// Reads per batch handed to the worker threads
    #[arg(long, default_value_t = 4096)]
    batch_size: usize,
    /// Minimum insert size
    #[arg(short = 'I', long = "minins", default_value_t = 0)]
    pe_inner: u32,
    /// Maximum insert size
    #[arg(short = 'X', long = "maxins", default_value_t = 250)]
    pe_outer: u32,
    /// Mates align forward/forward
    #[arg(long)]
    ff: bool,
    /// Mates align forward/reverse (default)
    #[arg(long)]
    fr: bool,
    /// Mates align reverse/forward
    #[arg(long)]
    rf: bool,
    /// Report mate hits independently, never pair them
    #[arg(long)]
    dont_reconcile: bool,
    /// Candidates kept per mate for pairing
    #[arg(long, default_value_t = 100)]
    sym_ceil: u32,
    /// Rescue only until this many pairs are found (0 disables rescue)
    #[arg(long, default_value_t = 4)]
    mixed_thresh: u32,
    /// Rescue attempts per pair
    #[arg(long = "mixed-attempts", default_value_t = 100)]
    mixed_attempt_lim: u32,
    /// Reference map file applied to reported coordinates
    #[arg(long)]
    refmap: Option<PathBuf>,
    /// Also read reference names from the map file
    #[arg(long, requires = "refmap")]
    refmap_names: bool,
}

impl AlignArgs {
    fn input(&self) -> Result<ReadsInput> {
        match (&self.reads, &self.mate1, &self.mate2) {
            (Some(r), None, None) => Ok(ReadsInput::Single(r.clone())),
            (None, Some(m1), Some(m2)) => Ok(ReadsInput::Paired(m1.clone(), m2.clone())),
            _ => bail!("give either one reads file or both -1 and -2"),
        }
    }

    fn opts(&self) -> Result<(AlignOpt, PairOpt)> {
        if self.nofw && self.norc {
            bail!("--nofw and --norc together leave nothing to search");
        }
        if self.pe_inner > self.pe_outer {
            bail!("--minins ({}) exceeds --maxins ({})", self.pe_inner, self.pe_outer);
        }
        let opt = AlignOpt {
            do_fw: !self.nofw,
            do_rc: !self.norc,
            cache_limit: self.cache_limit,
            strand_fix: self.strand_fix,
            range_mode: self.range_mode,
            seed: self.seed,
            max_hits: self.max_hits,
            threads: self.threads,
            batch_size: self.batch_size,
        };
        let (mate1_fw, mate2_fw) = if self.ff {
            (true, true)
        } else if self.rf {
            (false, true)
        } else {
            (true, false)
        };
        let pair = PairOpt {
            mate1_fw,
            mate2_fw,
            pe_inner: self.pe_inner,
            pe_outer: self.pe_outer,
            dont_reconcile: self.dont_reconcile,
            sym_ceil: self.sym_ceil,
            mixed_thresh: self.mixed_thresh,
            mixed_attempt_lim: self.mixed_attempt_lim,
        };
        Ok((opt, pair))
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("exact_align=debug,info")
        } else {
            EnvFilter::new("exact_align=info,warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Index { reference, output, sa_interval, occ_block } => {
            run_index(&reference, &output, sa_interval, occ_block)
        }
        Commands::Align(args) => run_align(&args),
    }
}

fn run_index(reference: &Path, output: &str, sa_interval: u32, occ_block: usize) -> Result<()> {
    if sa_interval == 0 || occ_block == 0 {
        bail!("--sa-interval and --occ-block must be positive");
    }
    let records = fasta::read_reference(reference)?;
    if records.is_empty() {
        bail!("FASTA file '{}' contains no sequences", reference.display());
    }
    let total_len: usize = records.iter().map(|r| r.seq.len()).sum();
    if total_len == 0 {
        bail!("FASTA file '{}' contains only empty sequences", reference.display());
    }
    info!(reference = %reference.display(), sequences = records.len(), total_len, "building index");

    let (mut fm, text) =
        FMIndex::from_contigs(records.iter().map(|r| (r.id.as_str(), &r.seq[..])), occ_block, sa_interval);
    fm.set_meta(IndexMeta {
        reference_file: Some(reference.display().to_string()),
        build_args: Some(std::env::args().collect::<Vec<_>>().join(" ")),
        build_timestamp: Some(chrono::Utc::now().to_rfc3339()),
    });
    let store = Reference::from_text(&text, &fm.contigs);

    let (fm_path, ref_path) = align::pipeline::index_paths(output);
    fm.save_to_file(&fm_path)?;
    store.save_to_file(&ref_path)?;
    info!(fm = %fm_path.display(), reference = %ref_path.display(), "index saved");
    Ok(())
}

fn run_align(args: &AlignArgs) -> Result<()> {
    let input = args.input()?;
    let (opt, pair) = args.opts()?;
    let refmap = args
        .refmap
        .as_ref()
        .map(|p| ReferenceMap::from_file(p, args.refmap_names))
        .transpose()
        .context("cannot load reference map")?;
    align::align_reads(&args.index, &input, args.out.as_deref(), refmap.as_ref(), opt, pair)?;
    Ok(())
}
