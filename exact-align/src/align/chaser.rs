use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::index::{FullTextIndex, IndexRange};

use super::types::{GenomePosition, Strand};

#[derive(Debug, Clone, Copy)]
struct Slot {
    contig: u32,
    offset: u32,
    stamp: u64,
}

#[derive(Debug, Default)]
struct CacheInner {
    slots: HashMap<u32, Slot>,
    /// stamp -> row，最小 stamp 即最久未解析
    order: BTreeMap<u64, u32>,
    clock: u64,
    hits: u64,
    misses: u64,
}

impl CacheInner {
    fn touch(&mut self, row: u32) -> Option<(u32, u32)> {
        self.clock += 1;
        let stamp = self.clock;
        let slot = self.slots.get_mut(&row)?;
        self.order.remove(&slot.stamp);
        slot.stamp = stamp;
        self.order.insert(stamp, row);
        Some((slot.contig, slot.offset))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub len: usize,
}

/// 行号 -> 参考坐标的有界缓存。
///
/// 所有 worker 线程共享；内部一把 `Mutex`，每次查询或插入只持锁一次，
/// 绝不在持锁期间访问索引；未命中总能从索引直接求得。
/// 锁中毒时沿用内部状态。
#[derive(Debug)]
pub struct PositionCache {
    limit: usize,
    inner: Mutex<CacheInner>,
}

impl PositionCache {
    pub fn new(limit: usize) -> Self {
        Self { limit, inner: Mutex::new(CacheInner::default()) }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 查询并刷新最近解析时间
    pub fn get(&self, row: u32) -> Option<(u32, u32)> {
        if self.limit == 0 {
            return None;
        }
        let mut inner = self.lock();
        let found = inner.touch(row);
        if found.is_some() {
            inner.hits += 1;
        } else {
            inner.misses += 1;
        }
        found
    }

    /// 插入；已满时淘汰最久未解析的条目
    pub fn insert(&self, row: u32, contig: u32, offset: u32) {
        if self.limit == 0 {
            return;
        }
        let mut inner = self.lock();
        if inner.touch(row).is_some() {
            return;
        }
        while inner.slots.len() >= self.limit {
            let Some((_, victim)) = inner.order.pop_first() else { break };
            inner.slots.remove(&victim);
        }
        let stamp = inner.clock;
        inner.slots.insert(row, Slot { contig, offset, stamp });
        inner.order.insert(stamp, row);
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats { hits: inner.hits, misses: inner.misses, len: inner.slots.len() }
    }
}

/// 正链 / 反向链两份共享缓存
#[derive(Debug, Clone)]
pub struct PositionCaches {
    pub fw: Arc<PositionCache>,
    pub bw: Arc<PositionCache>,
}

impl PositionCaches {
    pub fn new(limit: usize) -> Self {
        Self {
            fw: Arc::new(PositionCache::new(limit)),
            bw: Arc::new(PositionCache::new(limit)),
        }
    }

    pub fn for_strand(&self, strand: Strand) -> &PositionCache {
        match strand {
            Strand::Forward => &self.fw,
            Strand::ReverseComplement => &self.bw,
        }
    }
}

/// 将终态索引区间逐行解析为参考坐标
pub struct RangeChaser<'a, I: ?Sized> {
    index: &'a I,
    caches: &'a PositionCaches,
    resolved: u64,
    lf_steps: u64,
}

impl<'a, I: FullTextIndex + ?Sized> RangeChaser<'a, I> {
    pub fn new(index: &'a I, caches: &'a PositionCaches) -> Self {
        Self { index, caches, resolved: 0, lf_steps: 0 }
    }

    /// 惰性、有限、不可重启的坐标序列，按行序逐个产出
    pub fn resolve(&mut self, range: IndexRange, strand: Strand) -> Chase<'_, 'a, I> {
        Chase { rows: range.rows(), strand, chaser: self }
    }

    /// 已解析的行数
    pub fn resolved(&self) -> u64 {
        self.resolved
    }

    /// 未命中时累计走过的 LF 步数
    pub fn lf_steps(&self) -> u64 {
        self.lf_steps
    }

    fn resolve_row(&mut self, row: u32, strand: Strand) -> Option<GenomePosition> {
        let cache = self.caches.for_strand(strand);
        let (contig, offset) = match cache.get(row) {
            Some(hit) => hit,
            None => {
                let loc = self.index.position_of(row)?;
                self.lf_steps += u64::from(loc.steps);
                cache.insert(row, loc.contig, loc.offset);
                (loc.contig, loc.offset)
            }
        };
        self.resolved += 1;
        Some(GenomePosition { contig, offset, strand })
    }
}

pub struct Chase<'c, 'a, I: ?Sized> {
    chaser: &'c mut RangeChaser<'a, I>,
    rows: std::ops::Range<u32>,
    strand: Strand,
}

impl<I: FullTextIndex + ?Sized> Iterator for Chase<'_, '_, I> {
    type Item = GenomePosition;

    fn next(&mut self) -> Option<GenomePosition> {
        for row in self.rows.by_ref() {
            if let Some(pos) = self.chaser.resolve_row(row, self.strand) {
                return Some(pos);
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.rows.len()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::fm::FMIndex;
    use crate::util::dna;

    fn fm() -> FMIndex {
        FMIndex::from_contigs([("a", &b"ACGTACGTTACGA"[..]), ("b", &b"GGACGTCC"[..])], 4, 8).0
    }

    #[test]
    fn one_position_per_row_and_cache_equivalence() {
        let fm = fm();
        let range = fm.backward_search(&dna::encode(b"ACG")).unwrap();
        let cached = PositionCaches::new(16);
        let uncached = PositionCaches::new(0);

        let mut a = RangeChaser::new(&fm, &cached);
        let first: Vec<_> = a.resolve(range, Strand::Forward).collect();
        let again: Vec<_> = a.resolve(range, Strand::Forward).collect();
        let mut b = RangeChaser::new(&fm, &uncached);
        let plain: Vec<_> = b.resolve(range, Strand::Forward).collect();

        assert_eq!(first.len(), range.len() as usize);
        assert_eq!(first, again);
        assert_eq!(first, plain);
        assert_eq!(cached.fw.stats().hits, range.len() as u64);
        assert!(cached.bw.is_empty());
        assert!(uncached.fw.is_empty());

        let mut offsets: Vec<(u32, u32)> = first.iter().map(|p| (p.contig, p.offset)).collect();
        offsets.sort_unstable();
        assert_eq!(offsets, vec![(0, 0), (0, 4), (0, 9), (1, 2)]);
    }

    #[test]
    fn cache_is_bounded_and_evicts_oldest() {
        let cache = PositionCache::new(2);
        cache.insert(1, 0, 10);
        cache.insert(2, 0, 20);
        // 刷新 1，使 2 成为最久未解析
        assert_eq!(cache.get(1), Some((0, 10)));
        cache.insert(3, 0, 30);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(2), None);
        assert_eq!(cache.get(1), Some((0, 10)));
        assert_eq!(cache.get(3), Some((0, 30)));
    }

    #[test]
    fn small_cache_never_changes_answers() {
        let fm = fm();
        let caches = PositionCaches::new(1);
        let mut plain = RangeChaser::new(&fm, &caches);
        for pat in [&b"ACG"[..], b"GT", b"C", b"A"] {
            let range = fm.backward_search(&dna::encode(pat)).unwrap();
            for strand in Strand::BOTH {
                let got: Vec<_> = plain.resolve(range, strand).collect();
                let expect: Vec<_> = range
                    .rows()
                    .map(|r| fm.position_of(r).unwrap())
                    .map(|l| GenomePosition { contig: l.contig, offset: l.offset, strand })
                    .collect();
                assert_eq!(got, expect);
                assert!(caches.for_strand(strand).len() <= 1);
            }
        }
    }

    #[test]
    fn shared_cache_across_threads() {
        let fm = fm();
        let caches = PositionCaches::new(4);
        let range = fm.backward_search(&dna::encode(b"C")).unwrap();
        let expect: Vec<_> = RangeChaser::new(&fm, &PositionCaches::new(0))
            .resolve(range, Strand::Forward)
            .collect();
        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    let mut chaser = RangeChaser::new(&fm, &caches);
                    for _ in 0..10 {
                        let got: Vec<_> = chaser.resolve(range, Strand::Forward).collect();
                        assert_eq!(got, expect);
                    }
                });
            }
        });
        assert!(caches.fw.len() <= 4);
    }
}
