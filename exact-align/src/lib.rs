//! # exact-align
//!
//! 基于 FM 索引的短 read 精确比对器。
//!
//! 本 crate 包含：
//!
//! - **索引构建**：从 FASTA 参考序列构建 FM 索引（前缀倍增后缀数组 + BWT + 稀疏 SA 采样）
//! - **链搜索**：每条链一个精确匹配驱动器，由代价感知组合器交错推进
//! - **坐标解析**：带 LRU 位置缓存的索引区间追踪
//! - **双端配对**：插入片段 / 朝向校验与有界 mate rescue
//! - **参考映射**：把索引坐标改写为用户坐标
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use exact_align::align::{AlignOpt, PositionCaches, Read, StrandTally, UnpairedAlignerFactory};
//! use exact_align::index::fm::FMIndex;
//! use exact_align::io::sink::VecSink;
//!
//! let (fm, _text) = FMIndex::from_contigs([("chr1", &b"ACGTACGTAGCTGATCGTAG"[..])], 16, 4);
//! let caches = PositionCaches::new(1024);
//! let tally = StrandTally::new();
//! let factory = UnpairedAlignerFactory::new(&fm, &caches, &tally, AlignOpt::default());
//!
//! let mut sink = VecSink::new(1);
//! factory.create(&Read::new("r1", b"GCTGATC")).run(&mut sink);
//! for event in sink.take() {
//!     println!("{:?}", event);
//! }
//! ```
//!
//! ## 模块说明
//!
//! - [`io`] — FASTA / FASTQ 解析、结果输出、参考映射表
//! - [`index`] — FM 索引构建与查询
//! - [`align`] — 搜索编排（驱动器、组合器、区间追踪、单端 / 双端编排器）
//! - [`util`] — DNA 编码 / 反向互补等工具函数

pub mod io;
pub mod index;
pub mod util;
pub mod align;
