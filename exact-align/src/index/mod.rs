//! 全文索引：FM 索引、参考序列存储，以及比对核心使用的查询接口。

pub mod fm;
pub mod reference;
pub mod sa;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// 索引行区间 `[top, bot)`，附带已消耗的碱基数。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexRange {
    pub top: u32,
    pub bot: u32,
    pub depth: u32,
}

impl IndexRange {
    pub fn new(top: u32, bot: u32, depth: u32) -> Self {
        Self { top, bot, depth }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.bot.saturating_sub(self.top)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bot <= self.top
    }

    pub fn rows(&self) -> std::ops::Range<u32> {
        self.top..self.bot.max(self.top)
    }
}

/// 某一索引行对应的参考坐标，以及为此走过的 LF 步数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowLocation {
    pub contig: u32,
    pub offset: u32,
    pub steps: u32,
}

/// 比对核心消费的索引能力。
///
/// 索引只建正链；反向互补在 read 一侧完成，因此 `narrow` 不区分链。
pub trait FullTextIndex {
    /// 空前缀对应的全体行
    fn full_range(&self) -> IndexRange;

    /// 在当前区间前追加一个字母（backward search 一步）
    fn narrow(&self, range: IndexRange, sym: u8) -> IndexRange;

    /// 解析行号到 (contig, offset)；落在分隔符上时返回 None
    fn position_of(&self, row: u32) -> Option<RowLocation>;

    fn is_in_memory(&self) -> bool;
}

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("cannot open index file '{}': {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot decode index file '{}': {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("cannot write index file '{}': {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
}

/// bincode 落盘 / 读取的共用实现
pub(crate) fn save_bincode<T: Serialize>(value: &T, path: &std::path::Path) -> Result<(), IndexError> {
    let f = std::fs::File::create(path).map_err(|e| IndexError::Write {
        path: path.to_path_buf(),
        source: Box::new(bincode::ErrorKind::Io(e)),
    })?;
    bincode::serialize_into(std::io::BufWriter::new(f), value).map_err(|source| IndexError::Write {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn load_bincode<T: for<'de> Deserialize<'de>>(path: &std::path::Path) -> Result<T, IndexError> {
    let f = std::fs::File::open(path).map_err(|source| IndexError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    bincode::deserialize_from(std::io::BufReader::new(f)).map_err(|source| IndexError::Decode {
        path: path.to_path_buf(),
        source,
    })
}
