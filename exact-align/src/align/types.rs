//! 比对核心共用的数据类型。

use std::fmt;

use crate::index::IndexRange;
use crate::io::fastq::FastqRecord;
use crate::util::dna;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Strand {
    Forward,
    ReverseComplement,
}

impl Strand {
    pub const BOTH: [Strand; 2] = [Strand::Forward, Strand::ReverseComplement];

    #[inline]
    pub fn is_forward(self) -> bool {
        self == Strand::Forward
    }

    pub fn from_forward(fw: bool) -> Self {
        if fw { Strand::Forward } else { Strand::ReverseComplement }
    }
}

impl fmt::Display for Strand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(if self.is_forward() { "+" } else { "-" })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MateId {
    First,
    Second,
}

impl MateId {
    pub fn other(self) -> Self {
        match self {
            MateId::First => MateId::Second,
            MateId::Second => MateId::First,
        }
    }

    #[inline]
    pub fn slot(self) -> usize {
        match self {
            MateId::First => 0,
            MateId::Second => 1,
        }
    }
}

impl fmt::Display for MateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MateId::First => "1",
            MateId::Second => "2",
        })
    }
}

/// 待比对的 read：碱基已规整为 A/C/G/T/N。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Read {
    pub id: String,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
    pub mate: Option<MateId>,
}

impl Read {
    pub fn new(id: impl Into<String>, seq: &[u8]) -> Self {
        Self {
            id: id.into(),
            seq: dna::normalize_seq(seq),
            qual: Vec::new(),
            mate: None,
        }
    }

    pub fn with_mate(mut self, mate: MateId) -> Self {
        self.mate = Some(mate);
        self
    }

    pub fn from_fastq(rec: FastqRecord, mate: Option<MateId>) -> Self {
        Self {
            id: rec.id,
            seq: dna::normalize_seq(&rec.seq),
            qual: rec.qual,
            mate,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.seq.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.seq.is_empty()
    }

    /// 按链方向取编码序列：反向互补链先做反向互补
    pub fn oriented_codes(&self, strand: Strand) -> Vec<u8> {
        let codes = dna::encode(&self.seq);
        match strand {
            Strand::Forward => codes,
            Strand::ReverseComplement => dna::revcomp_codes(&codes),
        }
    }
}

/// 参考坐标：contig 内 0-based 最左位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GenomePosition {
    pub contig: u32,
    pub offset: u32,
    pub strand: Strand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlignmentHit {
    pub read_id: String,
    pub mate: Option<MateId>,
    pub pos: GenomePosition,
    pub len: u32,
}

impl AlignmentHit {
    #[inline]
    pub fn strand(&self) -> Strand {
        self.pos.strand
    }

    /// 参考上的右端（开区间）
    #[inline]
    pub fn end(&self) -> u32 {
        self.pos.offset + self.len
    }
}

/// range 模式下直接上报的索引区间
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeHit {
    pub read_id: String,
    pub mate: Option<MateId>,
    pub strand: Strand,
    pub range: IndexRange,
}

/// 成对比对中两条 mate 的相对朝向，按上游 mate 在前命名
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairOrientation {
    Ff,
    Fr,
    Rf,
    Rr,
}

impl PairOrientation {
    pub fn from_strands(upstream: Strand, downstream: Strand) -> Self {
        match (upstream.is_forward(), downstream.is_forward()) {
            (true, true) => PairOrientation::Ff,
            (true, false) => PairOrientation::Fr,
            (false, true) => PairOrientation::Rf,
            (false, false) => PairOrientation::Rr,
        }
    }
}

impl fmt::Display for PairOrientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PairOrientation::Ff => "FF",
            PairOrientation::Fr => "FR",
            PairOrientation::Rf => "RF",
            PairOrientation::Rr => "RR",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairedAlignment {
    pub mate1: AlignmentHit,
    pub mate2: AlignmentHit,
    pub insert_size: u32,
    pub orientation: PairOrientation,
}

/// 上报给 hit sink 的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitEvent {
    Hit(AlignmentHit),
    Range(RangeHit),
    Pair(PairedAlignment),
    Unaligned { read_id: String, mate: Option<MateId> },
}
