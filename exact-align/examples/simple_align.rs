//! 演示如何在 library 模式下使用 exact-align 做单端与双端精确比对。
//!
//! 运行方式：
//! ```bash
//! cargo run --example simple_align
//! ```

use exact_align::align::{
    AlignOpt, HitEvent, MateId, PairOpt, PairedAlignerFactory, PositionCaches, Read, Strand, StrandTally,
    UnpairedAlignerFactory,
};
use exact_align::index::fm::FMIndex;
use exact_align::index::reference::Reference;
use exact_align::io::sink::VecSink;
use exact_align::util::dna;

fn main() {
    // 1. 构建参考序列与索引
    let reference = b"ACGTACGTAGCTGATCGTAGCTAGCTAGCTGATCGTAGCTAGCTAGCTGATTTGACCAGGTA";
    println!("参考长度: {} bp", reference.len());

    let (fm_idx, text) = FMIndex::from_contigs([("ref1", &reference[..])], 16, 4);
    let store = Reference::from_text(&text, &fm_idx.contigs);
    println!("FM 索引构建完成：BWT 长度={}", fm_idx.bwt.len());

    let caches = PositionCaches::new(1024);
    let tally = StrandTally::new();

    // 2. 单端精确比对
    let factory = UnpairedAlignerFactory::new(&fm_idx, &caches, &tally, AlignOpt::default());
    let read = Read::new("r1", b"GCTGATCGTAG");
    let mut sink = VecSink::new(1);
    let summary = factory.create(&read).run(&mut sink);
    println!("\n单端 read '{}': {} 处命中, {} 步", read.id, summary.hits, summary.steps);
    for event in sink.take() {
        if let HitEvent::Hit(h) = event {
            println!("  {} {}:{} len={}", h.strand(), fm_idx.contigs[h.pos.contig as usize].name, h.pos.offset, h.len);
        }
    }

    // 3. 双端比对：mate2 取自下游片段的反向互补
    let mate2_seq: Vec<u8> = dna::revcomp_codes(&dna::encode(&reference[44..56]))
        .into_iter()
        .map(dna::from_alphabet)
        .collect();
    let pair_opt = PairOpt { pe_outer: 80, ..PairOpt::default() };
    let paired = PairedAlignerFactory::new(&fm_idx, &store, &caches, &tally, AlignOpt::default(), pair_opt);
    let m1 = Read::new("p1", &reference[2..14]).with_mate(MateId::First);
    let m2 = Read::new("p1", &mate2_seq).with_mate(MateId::Second);
    let mut sink = VecSink::new(2);
    let summary = paired.create(&m1, &m2).run(&mut sink);
    println!("\n双端 '{}': {} 对, rescue 尝试 {} 次", m1.id, summary.pairs, summary.rescue_attempts);
    for event in sink.take() {
        match event {
            HitEvent::Pair(p) => println!(
                "  {} mate1@{} mate2@{} insert={}",
                p.orientation, p.mate1.pos.offset, p.mate2.pos.offset, p.insert_size
            ),
            other => println!("  {:?}", other),
        }
    }

    println!(
        "\n链命中统计: +{} -{}",
        tally.hits(Strand::Forward),
        tally.hits(Strand::ReverseComplement)
    );
}
