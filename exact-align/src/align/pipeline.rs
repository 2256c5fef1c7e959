//! 批量比对流程：加载索引 → 分批读入 FASTQ → rayon 并行比对 → 按输入顺序写出。

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use std::io::{BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::index::fm::FMIndex;
use crate::index::reference::Reference;
use crate::io::fastq::{trim_mate_suffix, FastqReader, FastqRecord};
use crate::io::hits::{HitStats, HitWriter};
use crate::io::refmap::ReferenceMap;
use crate::io::sink::{HitSinkFactory, VecSinkFactory};

use super::chaser::PositionCaches;
use super::combinator::StrandTally;
use super::paired::PairedAlignerFactory;
use super::types::{HitEvent, MateId, Read, Strand};
use super::unpaired::UnpairedAlignerFactory;
use super::{AlignOpt, PairOpt};

/// 待比对的 read 文件
#[derive(Debug, Clone)]
pub enum ReadsInput {
    Single(PathBuf),
    Paired(PathBuf, PathBuf),
}

/// 整次运行的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub output: HitStats,
    pub rescue_attempts: u64,
    pub rescued: u64,
    pub truncated: u64,
    pub fw_hits: u64,
    pub rc_hits: u64,
}

/// 由索引前缀得到 `.fm` / `.ref` 路径
pub fn index_paths(prefix: &str) -> (PathBuf, PathBuf) {
    (PathBuf::from(format!("{}.fm", prefix)), PathBuf::from(format!("{}.ref", prefix)))
}

fn open_fastq(path: &Path) -> Result<FastqReader<BufReader<std::fs::File>>> {
    let fh = std::fs::File::open(path).with_context(|| format!("cannot open reads file '{}'", path.display()))?;
    Ok(FastqReader::new(BufReader::new(fh)))
}

fn next_batch<R: std::io::BufRead>(reader: &mut FastqReader<R>, n: usize) -> Result<Vec<FastqRecord>> {
    let mut batch = Vec::with_capacity(n);
    while batch.len() < n {
        match reader.next_record()? {
            Some(rec) => batch.push(rec),
            None => break,
        }
    }
    Ok(batch)
}

fn mate_read(rec: FastqRecord, mate: MateId) -> Read {
    let mut read = Read::from_fastq(rec, Some(mate));
    read.id = trim_mate_suffix(&read.id).to_string();
    read
}

/// 比对入口：读索引、逐批比对并写出 TSV 结果
pub fn align_reads(
    index_prefix: &str,
    input: &ReadsInput,
    out_path: Option<&Path>,
    refmap: Option<&ReferenceMap>,
    opt: AlignOpt,
    pair: PairOpt,
) -> Result<RunSummary> {
    let (fm_path, ref_path) = index_paths(index_prefix);
    let fm = FMIndex::load_from_file(&fm_path)?;
    info!(index = %fm_path.display(), contigs = fm.contigs.len(), text_len = fm.len(), "index loaded");

    let out: Box<dyn Write> = match out_path {
        Some(p) => Box::new(std::io::BufWriter::new(
            std::fs::File::create(p).with_context(|| format!("cannot create output '{}'", p.display()))?,
        )),
        None => Box::new(std::io::BufWriter::new(std::io::stdout())),
    };
    let mut writer = HitWriter::new(out, &fm.contigs, refmap);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opt.threads.max(1))
        .build()
        .context("failed to build thread pool")?;
    let caches = PositionCaches::new(opt.cache_limit);
    let tally = StrandTally::new();
    let batch_size = opt.batch_size.max(1);
    let mut summary = RunSummary::default();

    match input {
        ReadsInput::Single(path) => {
            let mut reader = open_fastq(path)?;
            let factory = UnpairedAlignerFactory::new(&fm, &caches, &tally, opt);
            loop {
                let batch = next_batch(&mut reader, batch_size)?;
                if batch.is_empty() {
                    break;
                }
                let reads: Vec<Read> = batch.into_iter().map(|rec| Read::from_fastq(rec, None)).collect();
                let results: Vec<Vec<HitEvent>> = pool.install(|| {
                    reads
                        .par_iter()
                        .map_init(
                            || VecSinkFactory.create(1),
                            |sink, read| {
                                factory.create(read).run(sink);
                                sink.take()
                            },
                        )
                        .collect()
                });
                for events in &results {
                    writer.write_read(events)?;
                }
            }
        }
        ReadsInput::Paired(path1, path2) => {
            let reference = Reference::load_from_file(&ref_path)?;
            let mut reader1 = open_fastq(path1)?;
            let mut reader2 = open_fastq(path2)?;
            let factory = PairedAlignerFactory::new(&fm, &reference, &caches, &tally, opt, pair);
            loop {
                let batch1 = next_batch(&mut reader1, batch_size)?;
                let batch2 = next_batch(&mut reader2, batch_size)?;
                if batch1.len() != batch2.len() {
                    bail!(
                        "paired read files '{}' and '{}' have different numbers of records ({} vs {})",
                        path1.display(),
                        path2.display(),
                        reader1.records(),
                        reader2.records()
                    );
                }
                if batch1.is_empty() {
                    break;
                }
                let pairs: Vec<(Read, Read)> = batch1
                    .into_iter()
                    .zip(batch2)
                    .map(|(r1, r2)| (mate_read(r1, MateId::First), mate_read(r2, MateId::Second)))
                    .collect();
                let results: Vec<_> = pool.install(|| {
                    pairs
                        .par_iter()
                        .map_init(
                            || VecSinkFactory.create(2),
                            |sink, (m1, m2)| {
                                let s = factory.create(m1, m2).run(sink);
                                (sink.take(), s)
                            },
                        )
                        .collect()
                });
                for (events, s) in &results {
                    writer.write_read(events)?;
                    summary.rescue_attempts += u64::from(s.rescue_attempts);
                    summary.rescued += s.rescued as u64;
                    summary.truncated += u64::from(s.truncated);
                }
            }
        }
    }
    writer.flush()?;

    summary.output = writer.stats();
    summary.fw_hits = tally.hits(Strand::Forward);
    summary.rc_hits = tally.hits(Strand::ReverseComplement);
    let fw = caches.fw.stats();
    let bw = caches.bw.stats();
    let lookups = fw.hits + fw.misses + bw.hits + bw.misses;
    let cache_hit_ratio = if lookups == 0 { 0.0 } else { (fw.hits + bw.hits) as f64 / lookups as f64 };
    info!(
        reads = summary.output.reads,
        aligned = summary.output.aligned,
        hits = summary.output.hits,
        ranges = summary.output.ranges,
        pairs = summary.output.pairs,
        rescue_attempts = summary.rescue_attempts,
        rescued = summary.rescued,
        "alignment finished"
    );
    info!(
        fw_hits = summary.fw_hits,
        rc_hits = summary.rc_hits,
        fw_cached = fw.len,
        rc_cached = bw.len,
        cache_hit_ratio = %format!("{:.3}", cache_hit_ratio),
        "position cache"
    );
    Ok(summary)
}
