//! 精确比对的搜索编排层。
//!
//! 数据流：read → 每条链一个 [`driver::SearchDriver`] → [`combinator::CostAwareCombinator`]
//! → 终态索引区间 → [`chaser::RangeChaser`] → 参考坐标 →（双端时）配对与 mate rescue
//! → [`crate::io::sink::HitSink`]。

pub mod chaser;
pub mod combinator;
pub mod driver;
pub mod paired;
pub mod pipeline;
pub mod refalign;
pub mod types;
pub mod unpaired;

pub use chaser::{PositionCache, PositionCaches, RangeChaser};
pub use combinator::{CostAwareCombinator, StrandTally};
pub use driver::{Advance, PinPolicy, SearchDriver, StrandSearchProcess, PIN_TO_LEN};
pub use paired::{PairedAlignerFactory, PairedOrchestrator};
pub use pipeline::{align_reads, ReadsInput, RunSummary};
pub use refalign::{ExactRefAligner, RefAligner};
pub use types::{AlignmentHit, GenomePosition, HitEvent, MateId, PairedAlignment, Read, Strand};
pub use unpaired::{UnpairedAlignerFactory, UnpairedOrchestrator};

/// 单端与双端共用的比对参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignOpt {
    /// 搜索正链
    pub do_fw: bool,
    /// 搜索反向互补链
    pub do_rc: bool,
    /// 每条链缓存的行数上限，0 表示不缓存
    pub cache_limit: usize,
    pub strand_fix: bool,
    /// 只上报索引区间，不解析坐标（仅单端）
    pub range_mode: bool,
    pub seed: u32,
    /// 每条 read（或每对）最多上报的比对数
    pub max_hits: Option<usize>,
    pub threads: usize,
    pub batch_size: usize,
}

impl Default for AlignOpt {
    fn default() -> Self {
        Self {
            do_fw: true,
            do_rc: true,
            cache_limit: 1 << 16,
            strand_fix: true,
            range_mode: false,
            seed: 0,
            max_hits: None,
            threads: 1,
            batch_size: 4096,
        }
    }
}

/// 双端配对参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PairOpt {
    /// 上游片段中 mate1 是否为正链
    pub mate1_fw: bool,
    pub mate2_fw: bool,
    /// 插入片段长度下限（含）
    pub pe_inner: u32,
    /// 插入片段长度上限（含）
    pub pe_outer: u32,
    pub dont_reconcile: bool,
    /// 每条 mate 参与配对的候选上限
    pub sym_ceil: u32,
    /// 已配对数低于此值时才尝试 rescue
    pub mixed_thresh: u32,
    /// 每对 read 的 rescue 尝试上限
    pub mixed_attempt_lim: u32,
}

impl Default for PairOpt {
    fn default() -> Self {
        Self {
            mate1_fw: true,
            mate2_fw: false,
            pe_inner: 0,
            pe_outer: 250,
            dont_reconcile: false,
            sym_ceil: 100,
            mixed_thresh: 4,
            mixed_attempt_lim: 100,
        }
    }
}

impl PairOpt {
    pub fn mate_fw(&self, mate: MateId) -> bool {
        match mate {
            MateId::First => self.mate1_fw,
            MateId::Second => self.mate2_fw,
        }
    }
}

/// 由全局种子与 read 名得到每条 read 的随机种子（FNV-1a）
pub fn read_seed(seed: u32, name: &str) -> u64 {
    let mut h: u64 = 0xcbf2_9ce4_8422_2325 ^ u64::from(seed);
    for &b in name.as_bytes() {
        h ^= u64::from(b);
        h = h.wrapping_mul(0x0000_0100_0000_01b3);
    }
    h
}
