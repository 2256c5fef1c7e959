//! Tab-separated hit output.
//!
//! One line per reported alignment:
//! `name  strand  ref  offset  length` for unpaired hits, the same columns
//! plus the insert size for each mate of a concordant pair (names carry a
//! `/1` or `/2` suffix whenever the hit belongs to a mate), and
//! `name  strand  *  top  bot` for index ranges. Unaligned reads are only
//! counted.

use anyhow::Result;
use std::io::Write;

use crate::align::types::{AlignmentHit, HitEvent, MateId, RangeHit};
use crate::index::fm::Contig;

use super::refmap::ReferenceMap;

/// Counters accumulated while writing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HitStats {
    /// reads (or read pairs) seen
    pub reads: u64,
    /// reads (or pairs) with at least one reported hit, range or pair
    pub aligned: u64,
    pub hits: u64,
    pub ranges: u64,
    pub pairs: u64,
}

pub struct HitWriter<'a, W: Write> {
    out: W,
    contigs: &'a [Contig],
    refmap: Option<&'a ReferenceMap>,
    stats: HitStats,
}

impl<'a, W: Write> HitWriter<'a, W> {
    pub fn new(out: W, contigs: &'a [Contig], refmap: Option<&'a ReferenceMap>) -> Self {
        Self { out, contigs, refmap, stats: HitStats::default() }
    }

    pub fn stats(&self) -> HitStats {
        self.stats
    }

    /// Writes all events produced for one read (or one pair).
    pub fn write_read(&mut self, events: &[HitEvent]) -> Result<()> {
        self.stats.reads += 1;
        let mut aligned = false;
        for event in events {
            match event {
                HitEvent::Hit(h) => {
                    self.write_hit(h, None)?;
                    self.stats.hits += 1;
                    aligned = true;
                }
                HitEvent::Range(r) => {
                    self.write_range(r)?;
                    self.stats.ranges += 1;
                    aligned = true;
                }
                HitEvent::Pair(p) => {
                    self.write_hit(&p.mate1, Some(p.insert_size))?;
                    self.write_hit(&p.mate2, Some(p.insert_size))?;
                    self.stats.pairs += 1;
                    aligned = true;
                }
                HitEvent::Unaligned { .. } => {}
            }
        }
        if aligned {
            self.stats.aligned += 1;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.out.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_name(&mut self, hit_name: &str, mate: Option<MateId>) -> Result<()> {
        match mate {
            Some(m) => write!(self.out, "{}/{}", hit_name, m)?,
            None => write!(self.out, "{}", hit_name)?,
        }
        Ok(())
    }

    fn write_hit(&mut self, h: &AlignmentHit, insert_size: Option<u32>) -> Result<()> {
        let (ref_name, offset) = self.reference_coords(h.pos.contig, h.pos.offset)?;
        self.write_name(&h.read_id, h.mate)?;
        write!(self.out, "\t{}\t{}\t{}\t{}", h.strand(), ref_name, offset, h.len)?;
        if let Some(insert) = insert_size {
            write!(self.out, "\t{}", insert)?;
        }
        writeln!(self.out)?;
        Ok(())
    }

    fn write_range(&mut self, r: &RangeHit) -> Result<()> {
        self.write_name(&r.read_id, r.mate)?;
        writeln!(self.out, "\t{}\t*\t{}\t{}", r.strand, r.range.top, r.range.bot)?;
        Ok(())
    }

    /// 索引坐标 → 输出坐标；有参考映射表时先映射，缺项直接报错
    fn reference_coords(&self, contig: u32, offset: u32) -> Result<(String, u32)> {
        if let Some(map) = self.refmap {
            let (true_id, true_off) = map.map(contig, offset)?;
            let name = map.name(true_id).map_or_else(|| true_id.to_string(), str::to_string);
            return Ok((name, true_off));
        }
        let name = self
            .contigs
            .get(contig as usize)
            .map_or_else(|| contig.to_string(), |c| c.name.clone());
        Ok((name, offset))
    }
}
