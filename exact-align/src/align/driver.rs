//! 单链搜索过程与驱动器。
//!
//! `StrandSearchProcess` 对一条 read 的一个方向做 backward search，每次
//! `advance` 吞入一个碱基并收窄索引区间；`SearchDriver` 在其外层施加 pin
//! 策略并维护终态。精确比对把四段边界全部 pin 到 read 长度，
//! 因而不存在回溯：一遍线性收窄要么匹配整条 read，要么失败。

use crate::index::{FullTextIndex, IndexRange};
use crate::util::dna;

use super::types::{MateId, Read, Strand};

/// 单步推进的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    InProgress,
    /// 整条 read 已匹配，区间保证非空
    Matched(IndexRange),
    Exhausted,
}

/// 某一段回溯边界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pin {
    /// 边界延伸到 read 末端
    ToLen,
    At(u32),
}

pub const PIN_TO_LEN: Pin = Pin::ToLen;

impl Pin {
    #[inline]
    fn resolve(self, len: u32) -> u32 {
        match self {
            Pin::ToLen => len,
            Pin::At(n) => n.min(len),
        }
    }
}

/// 四段式 pin 策略：深度落在 `[0, revK)` 内时最多允许 K 处修改。
///
/// `seed_len` 与 `nudge_left` 只随策略携带，供回溯型驱动器使用；
/// 修改数只由 `rev` 决定，精确驱动器从不读取这两项。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinPolicy {
    /// 种子长度，0 表示整条 read
    pub seed_len: u32,
    /// 回溯时是否优先左移
    pub nudge_left: bool,
    pub rev: [Pin; 4],
}

impl PinPolicy {
    /// 整条比对不可回溯
    pub const EXACT: PinPolicy = PinPolicy {
        seed_len: 0,
        nudge_left: true,
        rev: [PIN_TO_LEN; 4],
    };

    /// 深度 `depth` 处允许的修改数
    pub fn allowed_edits(&self, depth: u32, len: u32) -> u32 {
        self.rev
            .iter()
            .take_while(|pin| depth >= pin.resolve(len))
            .count() as u32
    }

    /// 长度为 `len` 的 read 上是否存在可回访的位置
    pub fn is_exact(&self, len: u32) -> bool {
        (0..len).all(|d| self.allowed_edits(d, len) == 0)
    }
}

/// 单链可恢复搜索
#[derive(Debug, Clone)]
pub struct StrandSearchProcess {
    strand: Strand,
    pattern: Vec<u8>,
    range: IndexRange,
}

impl StrandSearchProcess {
    pub fn new<I: FullTextIndex + ?Sized>(index: &I, read: &Read, strand: Strand) -> Self {
        Self {
            strand,
            pattern: read.oriented_codes(strand),
            range: index.full_range(),
        }
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.strand
    }

    #[inline]
    pub fn range(&self) -> IndexRange {
        self.range
    }

    #[inline]
    pub fn read_len(&self) -> u32 {
        self.pattern.len() as u32
    }

    /// 尚未吞入的碱基数
    #[inline]
    pub fn remaining(&self) -> u32 {
        self.read_len() - self.range.depth
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        !self.range.is_empty()
    }

    /// backward search 一步：从 read 末端向前吞入下一个碱基
    pub fn advance<I: FullTextIndex + ?Sized>(&mut self, index: &I) -> Advance {
        if self.pattern.is_empty() || !self.is_active() {
            return Advance::Exhausted;
        }
        let remaining = self.remaining() as usize;
        if remaining == 0 {
            return Advance::Matched(self.range);
        }
        let sym = self.pattern[remaining - 1];
        if !dna::is_base(sym) {
            self.range = IndexRange::new(self.range.top, self.range.top, self.range.depth + 1);
            return Advance::Exhausted;
        }
        self.range = index.narrow(self.range, sym);
        if self.range.is_empty() {
            Advance::Exhausted
        } else if self.remaining() == 0 {
            Advance::Matched(self.range)
        } else {
            Advance::InProgress
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DriverState {
    Searching,
    Matched,
    Done,
}

/// 在 `StrandSearchProcess` 之上维护终态与 pin 策略
#[derive(Debug, Clone)]
pub struct SearchDriver {
    process: StrandSearchProcess,
    policy: PinPolicy,
    mate: Option<MateId>,
    state: DriverState,
}

impl SearchDriver {
    pub fn new(process: StrandSearchProcess, policy: PinPolicy, mate: Option<MateId>) -> Self {
        assert!(
            policy.is_exact(process.read_len()),
            "search driver only supports fully pinned (exact) policies"
        );
        Self { process, policy, mate, state: DriverState::Searching }
    }

    /// 精确比对驱动器
    pub fn exact<I: FullTextIndex + ?Sized>(index: &I, read: &Read, strand: Strand, mate: Option<MateId>) -> Self {
        Self::new(StrandSearchProcess::new(index, read, strand), PinPolicy::EXACT, mate)
    }

    #[inline]
    pub fn strand(&self) -> Strand {
        self.process.strand()
    }

    #[inline]
    pub fn mate(&self) -> Option<MateId> {
        self.mate
    }

    #[inline]
    pub fn policy(&self) -> &PinPolicy {
        &self.policy
    }

    #[inline]
    pub fn read_len(&self) -> u32 {
        self.process.read_len()
    }

    /// 到达终态的估计代价：剩余待吞入碱基数
    pub fn cost(&self) -> u32 {
        match self.state {
            DriverState::Searching => self.process.remaining(),
            DriverState::Matched | DriverState::Done => 0,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == DriverState::Done
    }

    pub fn advance<I: FullTextIndex + ?Sized>(&mut self, index: &I) -> Advance {
        match self.state {
            // 整条比对已 pin 住，匹配之后没有可回访的位置
            DriverState::Matched | DriverState::Done => {
                self.state = DriverState::Done;
                Advance::Exhausted
            }
            DriverState::Searching => {
                let step = self.process.advance(index);
                match step {
                    Advance::InProgress => {}
                    Advance::Matched(_) => self.state = DriverState::Matched,
                    Advance::Exhausted => self.state = DriverState::Done,
                }
                step
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::FMIndex;

    fn index(seq: &[u8]) -> FMIndex {
        FMIndex::from_contigs([("chr1", seq)], 4, 2).0
    }

    fn run(driver: &mut SearchDriver, fm: &FMIndex) -> (Vec<Advance>, Option<IndexRange>) {
        let mut trace = Vec::new();
        loop {
            let step = driver.advance(fm);
            trace.push(step);
            match step {
                Advance::InProgress => {}
                Advance::Matched(r) => return (trace, Some(r)),
                Advance::Exhausted => return (trace, None),
            }
        }
    }

    #[test]
    fn exact_policy_pins_everything() {
        assert!(PinPolicy::EXACT.is_exact(100));
        assert_eq!(PinPolicy::EXACT.allowed_edits(0, 10), 0);
        let loose = PinPolicy { rev: [Pin::At(2), PIN_TO_LEN, PIN_TO_LEN, PIN_TO_LEN], ..PinPolicy::EXACT };
        assert_eq!(loose.allowed_edits(1, 10), 0);
        assert_eq!(loose.allowed_edits(5, 10), 1);
        assert!(!loose.is_exact(10));
    }

    #[test]
    fn seed_len_and_nudge_do_not_change_edits() {
        assert_eq!(PinPolicy::EXACT.seed_len, 0);
        assert!(PinPolicy::EXACT.nudge_left);
        let seeded = PinPolicy { seed_len: 4, nudge_left: false, ..PinPolicy::EXACT };
        assert!(seeded.is_exact(10));
        assert!((0..10).all(|d| seeded.allowed_edits(d, 10) == 0));
    }

    #[test]
    fn one_base_per_advance_until_match() {
        let fm = index(b"ACGTACGT");
        let read = Read::new("r", b"ACGT");
        let mut d = SearchDriver::exact(&fm, &read, Strand::Forward, None);
        assert_eq!(d.cost(), 4);
        let (trace, range) = run(&mut d, &fm);
        assert_eq!(trace.len(), 4);
        let range = range.unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range.depth, 4);
        assert_eq!(d.cost(), 0);
        // 匹配后不再产出
        assert_eq!(d.advance(&fm), Advance::Exhausted);
        assert!(d.is_done());
    }

    #[test]
    fn mismatch_exhausts_without_backtracking() {
        let fm = index(b"ACGTACGT");
        let mut d = SearchDriver::exact(&fm, &Read::new("r", b"ACCT"), Strand::Forward, None);
        let (trace, range) = run(&mut d, &fm);
        assert!(range.is_none());
        assert!(trace.len() <= 4);
        assert_eq!(d.advance(&fm), Advance::Exhausted);
    }

    #[test]
    fn reverse_complement_strand_matches_revcomp() {
        let fm = index(b"TTTTGGCCAATTTT");
        // GGCCAA 的反向互补为 TTGGCC
        let mut d = SearchDriver::exact(&fm, &Read::new("r", b"TTGGCC"), Strand::ReverseComplement, None);
        assert!(run(&mut d, &fm).1.is_some());
    }

    #[test]
    fn n_and_empty_reads_never_match() {
        let fm = index(b"ACGTNACGT");
        let mut d = SearchDriver::exact(&fm, &Read::new("r", b"GTNA"), Strand::Forward, None);
        assert!(run(&mut d, &fm).1.is_none());
        let mut e = SearchDriver::exact(&fm, &Read::new("e", b""), Strand::Forward, None);
        assert_eq!(e.advance(&fm), Advance::Exhausted);
    }
}
