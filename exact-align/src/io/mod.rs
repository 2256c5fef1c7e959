pub mod fasta;
pub mod fastq;
pub mod hits;
pub mod refmap;
pub mod sink;
