use std::sync::atomic::{AtomicU64, Ordering};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::index::{FullTextIndex, IndexRange};

use super::driver::{Advance, SearchDriver};
use super::types::{MateId, Strand};

/// 按链累计的命中数，供 strand-fix 启发式使用。
///
/// 同一工厂创建的所有 worker 共享同一份计数。
#[derive(Debug, Default)]
pub struct StrandTally {
    fw: AtomicU64,
    rc: AtomicU64,
}

impl StrandTally {
    pub fn new() -> Self {
        Self::default()
    }

    fn counter(&self, strand: Strand) -> &AtomicU64 {
        match strand {
            Strand::Forward => &self.fw,
            Strand::ReverseComplement => &self.rc,
        }
    }

    pub fn record(&self, strand: Strand) {
        self.counter(strand).fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self, strand: Strand) -> u64 {
        self.counter(strand).load(Ordering::Relaxed)
    }
}

/// 某个驱动器到达的匹配
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverMatch {
    pub strand: Strand,
    pub mate: Option<MateId>,
    pub range: IndexRange,
    pub read_len: u32,
}

/// 组合多个驱动器，每一步推进估计代价最小的那个。
///
/// 代价相同时：开启 strand-fix 则偏向历史命中更多的链，仍并列再用种子化
/// 随机数选择，保证同一种子下结果可复现。
pub struct CostAwareCombinator<'a> {
    drivers: Vec<SearchDriver>,
    strand_fix: bool,
    tally: &'a StrandTally,
    rng: StdRng,
    steps: u64,
}

impl<'a> CostAwareCombinator<'a> {
    pub fn new(seed: u64, strand_fix: bool, tally: &'a StrandTally, drivers: Vec<SearchDriver>) -> Self {
        Self {
            drivers,
            strand_fix,
            tally,
            rng: StdRng::seed_from_u64(seed),
            steps: 0,
        }
    }

    /// 仍活跃的驱动器数
    pub fn active(&self) -> usize {
        self.drivers.len()
    }

    pub fn is_done(&self) -> bool {
        self.drivers.is_empty()
    }

    /// 已执行的推进次数
    pub fn steps(&self) -> u64 {
        self.steps
    }

    fn select(&mut self) -> usize {
        let min_cost = self.drivers.iter().map(SearchDriver::cost).min().unwrap_or(0);
        let mut ties: Vec<usize> = (0..self.drivers.len())
            .filter(|&i| self.drivers[i].cost() == min_cost)
            .collect();
        if ties.len() > 1 && self.strand_fix {
            let best = ties
                .iter()
                .map(|&i| self.tally.hits(self.drivers[i].strand()))
                .max()
                .unwrap_or(0);
            ties.retain(|&i| self.tally.hits(self.drivers[i].strand()) == best);
        }
        if ties.len() == 1 {
            ties[0]
        } else {
            ties[self.rng.gen_range(0..ties.len())]
        }
    }

    /// 推进直到出现下一个匹配；所有驱动器耗尽时返回 None
    pub fn next_match<I: FullTextIndex + ?Sized>(&mut self, index: &I) -> Option<DriverMatch> {
        while !self.drivers.is_empty() {
            let i = self.select();
            self.steps += 1;
            match self.drivers[i].advance(index) {
                Advance::InProgress => {}
                Advance::Matched(range) => {
                    let d = &self.drivers[i];
                    return Some(DriverMatch {
                        strand: d.strand(),
                        mate: d.mate(),
                        range,
                        read_len: d.read_len(),
                    });
                }
                Advance::Exhausted => {
                    self.drivers.remove(i);
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::align::types::Read;
    use crate::index::fm::FMIndex;

    fn drain(mut comb: CostAwareCombinator<'_>, fm: &FMIndex) -> Vec<DriverMatch> {
        let mut out = Vec::new();
        while let Some(m) = comb.next_match(fm) {
            out.push(m);
        }
        assert!(comb.is_done());
        out
    }

    fn both_strands(fm: &FMIndex, read: &Read) -> Vec<SearchDriver> {
        Strand::BOTH
            .iter()
            .map(|&s| SearchDriver::exact(fm, read, s, None))
            .collect()
    }

    #[test]
    fn union_equals_independent_runs() {
        let (fm, _) = FMIndex::from_contigs([("c", &b"AACGTTACGTAACGTTGCAACGTT"[..])], 8, 4);
        let tally = StrandTally::new();
        for read in ["ACGTT", "AACG", "GCAAC", "TTTT"] {
            let read = Read::new(read, read.as_bytes());
            let mut combined = drain(CostAwareCombinator::new(7, true, &tally, both_strands(&fm, &read)), &fm);
            let mut separate: Vec<DriverMatch> = both_strands(&fm, &read)
                .into_iter()
                .flat_map(|d| drain(CostAwareCombinator::new(1, false, &tally, vec![d]), &fm))
                .collect();
            combined.sort_by_key(|m| (m.strand, m.range.top));
            separate.sort_by_key(|m| (m.strand, m.range.top));
            assert_eq!(combined, separate);
        }
    }

    #[test]
    fn strand_fix_prefers_productive_strand() {
        let (fm, _) = FMIndex::from_contigs([("c", &b"ACGTTGCA"[..])], 8, 4);
        let tally = StrandTally::new();
        for _ in 0..5 {
            tally.record(Strand::ReverseComplement);
        }
        let read = Read::new("r", b"TGCA");
        for seed in 0..8 {
            let mut comb = CostAwareCombinator::new(seed, true, &tally, both_strands(&fm, &read));
            // 第一次匹配必然来自先被选中的反向链
            let first = comb.next_match(&fm).unwrap();
            assert_eq!(first.strand, Strand::ReverseComplement);
        }
    }

    #[test]
    fn tie_break_is_seed_deterministic() {
        let (fm, _) = FMIndex::from_contigs([("c", &b"ACGTTGCA"[..])], 8, 4);
        let tally = StrandTally::new();
        let read = Read::new("r", b"TGCA");
        let order = |seed| {
            drain(CostAwareCombinator::new(seed, false, &tally, both_strands(&fm, &read)), &fm)
                .iter()
                .map(|m| m.strand)
                .collect::<Vec<_>>()
        };
        for seed in 0..8 {
            assert_eq!(order(seed), order(seed));
        }
    }

    #[test]
    fn exhausted_drivers_are_dropped() {
        let (fm, _) = FMIndex::from_contigs([("c", &b"AAAAAAA"[..])], 8, 4);
        let tally = StrandTally::new();
        let read = Read::new("r", b"CCC");
        let mut comb = CostAwareCombinator::new(3, false, &tally, both_strands(&fm, &read));
        assert_eq!(comb.active(), 2);
        assert!(comb.next_match(&fm).is_none());
        assert_eq!(comb.active(), 0);
        assert!(comb.steps() >= 2);
    }
}
