use serde::{Deserialize, Serialize};
use std::path::Path;

use super::fm::Contig;
use super::IndexError;

/// 参考序列（编码后），供 mate rescue 在窗口内逐位校验。
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Reference {
    seqs: Vec<Vec<u8>>,
}

impl Reference {
    /// 从拼接文本中按 contig 切出各条序列
    pub fn from_text(text: &[u8], contigs: &[Contig]) -> Self {
        let seqs = contigs
            .iter()
            .map(|c| text[c.offset as usize..(c.offset + c.len) as usize].to_vec())
            .collect();
        Self { seqs }
    }

    pub fn num_contigs(&self) -> usize {
        self.seqs.len()
    }

    pub fn contig_len(&self, contig: u32) -> Option<u32> {
        self.seqs.get(contig as usize).map(|s| s.len() as u32)
    }

    /// 取 `[start, end)` 窗口，越界部分截断
    pub fn window(&self, contig: u32, start: u32, end: u32) -> &[u8] {
        match self.seqs.get(contig as usize) {
            Some(seq) => {
                let end = (end as usize).min(seq.len());
                let start = (start as usize).min(end);
                &seq[start..end]
            }
            None => &[],
        }
    }

    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), IndexError> {
        super::save_bincode(self, path.as_ref())
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, IndexError> {
        super::load_bincode(path.as_ref())
    }
}
