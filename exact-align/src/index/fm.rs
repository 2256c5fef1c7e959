use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{sa, FullTextIndex, IndexError, IndexRange, RowLocation};
use crate::util::dna;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Contig {
    pub name: String,
    pub len: u32,
    pub offset: u32,
}

/// 构建信息，写入索引文件便于追溯
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub reference_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

/// 常驻内存的 FM 索引：
/// - 字母编码为 [0..sigma)，0 为 contig 分隔符 $。
/// - Occ 按定长分块采样，块内顺扫补偿。
/// - SA 稀疏采样：文本位置为 `sa_interval` 的倍数或紧跟分隔符时记录，
///   其余行经 LF 回走到最近的采样点再加上步数。
#[derive(Debug, Serialize, Deserialize)]
pub struct FMIndex {
    pub sigma: u8,
    pub block: u32,
    /// C[i] = 文本中字母 < i 的累计数量
    pub c: Vec<u32>,
    pub bwt: Vec<u8>,
    /// occ_samples[block_id * sigma + c]
    pub occ_samples: Vec<u32>,
    pub sa_interval: u32,
    /// 采样行位图及每个字之前的累计置位数
    sa_marks: Vec<u64>,
    sa_mark_rank: Vec<u32>,
    /// 按行序存放的采样值
    sa_values: Vec<u32>,
    pub contigs: Vec<Contig>,
    #[serde(default)]
    pub meta: IndexMeta,
}

impl FMIndex {
    /// 由编码文本构建索引（文本须以分隔符结尾）
    pub fn build(text: &[u8], contigs: Vec<Contig>, sigma: u8, block: usize, sa_interval: u32) -> Self {
        let n = text.len();
        let sigma_us = sigma as usize;
        let block = block.max(1);
        let sa_interval = sa_interval.max(1);
        let sa_arr = sa::build_sa(text);
        let bwt = sa::bwt_from_sa(text, &sa_arr);

        let mut freq = vec![0u32; sigma_us];
        for &ch in &bwt {
            if let Some(f) = freq.get_mut(ch as usize) {
                *f += 1;
            }
        }
        let mut c = vec![0u32; sigma_us];
        let mut acc = 0u32;
        for (slot, f) in c.iter_mut().zip(&freq) {
            *slot = acc;
            acc += f;
        }

        let num_blocks = n.div_ceil(block);
        let mut occ_samples = vec![0u32; num_blocks * sigma_us];
        let mut running = vec![0u32; sigma_us];
        for bi in 0..num_blocks {
            occ_samples[bi * sigma_us..(bi + 1) * sigma_us].copy_from_slice(&running);
            for &ch in &bwt[bi * block..((bi + 1) * block).min(n)] {
                if let Some(r) = running.get_mut(ch as usize) {
                    *r += 1;
                }
            }
        }

        let words = n.div_ceil(64);
        let mut sa_marks = vec![0u64; words];
        let mut sa_values = Vec::with_capacity(n / sa_interval as usize + contigs.len() + 1);
        for (row, &p) in sa_arr.iter().enumerate() {
            let pu = p as usize;
            if p % sa_interval == 0 || text[pu - 1] == dna::SENTINEL {
                sa_marks[row / 64] |= 1u64 << (row % 64);
                sa_values.push(p);
            }
        }
        let mut sa_mark_rank = Vec::with_capacity(words);
        let mut seen = 0u32;
        for w in &sa_marks {
            sa_mark_rank.push(seen);
            seen += w.count_ones();
        }

        Self {
            sigma,
            block: block as u32,
            c,
            bwt,
            occ_samples,
            sa_interval,
            sa_marks,
            sa_mark_rank,
            sa_values,
            contigs,
            meta: IndexMeta::default(),
        }
    }

    /// 由 ASCII contig 序列直接构建
    pub fn from_contigs<'s, I>(seqs: I, block: usize, sa_interval: u32) -> (Self, Vec<u8>)
    where
        I: IntoIterator<Item = (&'s str, &'s [u8])>,
    {
        let mut text: Vec<u8> = Vec::new();
        let mut contigs = Vec::new();
        for (name, seq) in seqs {
            let start = text.len() as u32;
            text.extend(seq.iter().map(|&b| dna::to_alphabet(b)));
            contigs.push(Contig {
                name: name.to_string(),
                len: text.len() as u32 - start,
                offset: start,
            });
            text.push(dna::SENTINEL);
        }
        let fm = Self::build(&text, contigs, dna::SIGMA as u8, block, sa_interval);
        (fm, text)
    }

    pub fn set_meta(&mut self, meta: IndexMeta) {
        self.meta = meta;
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    /// BWT[0..pos) 中 c 的出现次数
    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        if pos == 0 {
            return 0;
        }
        let sigma_us = self.sigma as usize;
        let block = self.block as usize;
        let bi = (pos - 1) / block;
        let base = self.occ_samples[bi * sigma_us + c as usize];
        let add = self.bwt[bi * block..pos].iter().filter(|&&ch| ch == c).count() as u32;
        base + add
    }

    #[inline]
    pub fn rank_range(&self, c: u8, l: usize, r: usize) -> (usize, usize) {
        let c0 = self.c[c as usize] as usize;
        (c0 + self.occ(c, l) as usize, c0 + self.occ(c, r) as usize)
    }

    /// 整串反向搜索（便于测试与基准）
    pub fn backward_search(&self, pat: &[u8]) -> Option<IndexRange> {
        let mut range = self.full_range();
        for &a in pat.iter().rev() {
            range = self.narrow(range, a);
            if range.is_empty() {
                return None;
            }
        }
        Some(range)
    }

    #[inline]
    fn lf(&self, row: usize) -> usize {
        let ch = self.bwt[row];
        self.c[ch as usize] as usize + self.occ(ch, row) as usize
    }

    #[inline]
    fn sampled(&self, row: usize) -> Option<u32> {
        let (w, b) = (row / 64, row % 64);
        let word = self.sa_marks[w];
        if word & (1u64 << b) == 0 {
            return None;
        }
        let below = (word & ((1u64 << b) - 1)).count_ones();
        Some(self.sa_values[(self.sa_mark_rank[w] + below) as usize])
    }

    /// 行号 -> 文本位置，返回 (位置, LF 步数)
    pub fn locate(&self, row: u32) -> (u32, u32) {
        let mut row = row as usize;
        let mut steps = 0u32;
        loop {
            if let Some(p) = self.sampled(row) {
                return (p + steps, steps);
            }
            row = self.lf(row);
            steps += 1;
        }
    }

    /// 将文本位置映射到 (contig_index, contig_offset)。若落在分隔符位置，则返回 None。
    pub fn map_text_pos(&self, pos: u32) -> Option<(usize, u32)> {
        let idx = self.contigs.partition_point(|c| c.offset + c.len <= pos);
        let c = self.contigs.get(idx)?;
        (pos >= c.offset).then(|| (idx, pos - c.offset))
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        super::save_bincode(self, path.as_ref())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        super::load_bincode(path.as_ref())
    }
}

impl FullTextIndex for FMIndex {
    fn full_range(&self) -> IndexRange {
        IndexRange::new(0, self.bwt.len() as u32, 0)
    }

    fn narrow(&self, range: IndexRange, sym: u8) -> IndexRange {
        if sym == dna::SENTINEL || sym >= self.sigma || range.is_empty() {
            return IndexRange::new(range.top, range.top, range.depth + 1);
        }
        let (top, bot) = self.rank_range(sym, range.top as usize, range.bot as usize);
        IndexRange::new(top as u32, bot as u32, range.depth + 1)
    }

    fn position_of(&self, row: u32) -> Option<RowLocation> {
        if row as usize >= self.bwt.len() {
            return None;
        }
        let (pos, steps) = self.locate(row);
        let (contig, offset) = self.map_text_pos(pos)?;
        Some(RowLocation { contig: contig as u32, offset, steps })
    }

    fn is_in_memory(&self) -> bool {
        true
    }
}
