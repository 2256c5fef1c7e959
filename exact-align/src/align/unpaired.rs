use tracing::debug;

use crate::index::FullTextIndex;
use crate::io::sink::HitSink;

use super::chaser::{PositionCaches, RangeChaser};
use super::combinator::{CostAwareCombinator, StrandTally};
use super::driver::SearchDriver;
use super::types::{AlignmentHit, HitEvent, MateId, RangeHit, Read, Strand};
use super::{read_seed, AlignOpt};

/// 单端精确比对器工厂。
///
/// 持有所有 worker 共享的资源（索引、两份位置缓存、链命中计数），
/// 每条 read 通过 [`create`](Self::create) 得到独占的编排器。
pub struct UnpairedAlignerFactory<'a, I: ?Sized> {
    index: &'a I,
    caches: &'a PositionCaches,
    tally: &'a StrandTally,
    opt: AlignOpt,
}

impl<'a, I: FullTextIndex + ?Sized> UnpairedAlignerFactory<'a, I> {
    pub fn new(index: &'a I, caches: &'a PositionCaches, tally: &'a StrandTally, opt: AlignOpt) -> Self {
        assert!(index.is_in_memory(), "exact aligner requires a memory-resident index");
        Self { index, caches, tally, opt }
    }

    pub fn opt(&self) -> &AlignOpt {
        &self.opt
    }

    pub fn create(&self, read: &Read) -> UnpairedOrchestrator<'a, I> {
        let strands = Strand::BOTH.into_iter().filter(|s| match s {
            Strand::Forward => self.opt.do_fw,
            Strand::ReverseComplement => self.opt.do_rc,
        });
        let drivers = strands
            .map(|s| SearchDriver::exact(self.index, read, s, read.mate))
            .collect();
        UnpairedOrchestrator {
            read_id: read.id.clone(),
            mate: read.mate,
            index: self.index,
            combinator: CostAwareCombinator::new(
                read_seed(self.opt.seed, &read.id),
                self.opt.strand_fix,
                self.tally,
                drivers,
            ),
            chaser: RangeChaser::new(self.index, self.caches),
            tally: self.tally,
            opt: self.opt,
        }
    }
}

/// 一次 `run` 的统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UnpairedSummary {
    pub hits: usize,
    pub ranges: usize,
    pub steps: u64,
}

/// 绑定到单条 read 的编排器
pub struct UnpairedOrchestrator<'a, I: ?Sized> {
    read_id: String,
    mate: Option<MateId>,
    index: &'a I,
    combinator: CostAwareCombinator<'a>,
    chaser: RangeChaser<'a, I>,
    tally: &'a StrandTally,
    opt: AlignOpt,
}

impl<I: FullTextIndex + ?Sized> UnpairedOrchestrator<'_, I> {
    fn limit_reached(&self, reported: usize) -> bool {
        self.opt.max_hits.is_some_and(|k| reported >= k)
    }

    pub fn run<S: HitSink + ?Sized>(&mut self, sink: &mut S) -> UnpairedSummary {
        let mut summary = UnpairedSummary::default();
        let mut matched = false;
        'search: while let Some(m) = self.combinator.next_match(self.index) {
            matched = true;
            if self.opt.range_mode {
                if self.limit_reached(summary.ranges) {
                    break;
                }
                self.tally.record(m.strand);
                sink.report(HitEvent::Range(RangeHit {
                    read_id: self.read_id.clone(),
                    mate: self.mate,
                    strand: m.strand,
                    range: m.range,
                }));
                summary.ranges += 1;
                continue;
            }
            for pos in self.chaser.resolve(m.range, m.strand) {
                if self.opt.max_hits.is_some_and(|k| summary.hits >= k) {
                    break 'search;
                }
                self.tally.record(m.strand);
                sink.report(HitEvent::Hit(AlignmentHit {
                    read_id: self.read_id.clone(),
                    mate: self.mate,
                    pos,
                    len: m.read_len,
                }));
                summary.hits += 1;
            }
            if self.limit_reached(summary.hits) {
                break;
            }
        }
        summary.steps = self.combinator.steps();
        // k = 0 时命中被截掉，read 并非未比对
        if !matched {
            sink.report(HitEvent::Unaligned { read_id: self.read_id.clone(), mate: self.mate });
        }
        debug!(
            read = %self.read_id,
            hits = summary.hits,
            ranges = summary.ranges,
            steps = summary.steps,
            "unpaired search finished"
        );
        summary
    }
}
