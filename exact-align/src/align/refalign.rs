use std::ops::Range;

use crate::index::reference::Reference;
use crate::util::dna;

/// 在参考窗口内校验 read 的落点（mate rescue 使用）
pub trait RefAligner: Send + Sync {
    /// 返回 `pattern` 完整落在 `window` 内的全部起点（contig 坐标，升序）
    fn find(&self, reference: &Reference, contig: u32, window: Range<u32>, pattern: &[u8]) -> Vec<u32>;
}

/// 逐位精确比较；含 N 的位置不与任何碱基相等
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactRefAligner;

impl RefAligner for ExactRefAligner {
    fn find(&self, reference: &Reference, contig: u32, window: Range<u32>, pattern: &[u8]) -> Vec<u32> {
        if pattern.is_empty() || !pattern.iter().all(|&c| dna::is_base(c)) {
            return Vec::new();
        }
        let seq = reference.window(contig, window.start, window.end);
        let base = window.start;
        seq.windows(pattern.len())
            .enumerate()
            .filter(|(_, w)| *w == pattern)
            .map(|(i, _)| base + i as u32)
            .collect()
    }
}
