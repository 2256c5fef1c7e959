use anyhow::{anyhow, Result};
use std::io::BufRead;

#[derive(Debug, Clone)]
pub struct FastqRecord {
    pub id: String,
    pub desc: Option<String>,
    pub seq: Vec<u8>,
    pub qual: Vec<u8>,
}

pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    records: u64,
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, records: 0 }
    }

    /// Number of records returned so far.
    pub fn records(&self) -> u64 {
        self.records
    }

    fn line(&mut self) -> Result<bool> {
        self.buf.clear();
        Ok(self.reader.read_line(&mut self.buf)? > 0)
    }

    pub fn next_record(&mut self) -> Result<Option<FastqRecord>> {
        if self.done {
            return Ok(None);
        }
        let nth = self.records + 1;

        // header line starting with '@', blank lines in between records are skipped
        loop {
            if !self.line()? {
                self.done = true;
                return Ok(None);
            }
            if !self.buf.trim().is_empty() {
                break;
            }
        }
        if !self.buf.starts_with('@') {
            return Err(anyhow!("FASTQ record {}: header not starting with '@'", nth));
        }
        let header = self.buf[1..].trim_end().to_string();
        let mut parts = header.splitn(2, char::is_whitespace);
        let id = parts.next().unwrap_or("").to_string();
        let desc = parts.next().map(|s| s.trim().to_string()).filter(|s| !s.is_empty());

        if !self.line()? {
            return Err(anyhow!("FASTQ record {} ('{}'): unexpected EOF after header", nth, id));
        }
        let seq = self.buf.trim_end().as_bytes().to_vec();

        if !self.line()? || !self.buf.starts_with('+') {
            return Err(anyhow!("FASTQ record {} ('{}'): missing '+' line", nth, id));
        }

        if !self.line()? {
            return Err(anyhow!("FASTQ record {} ('{}'): missing quality line", nth, id));
        }
        let qual = self.buf.trim_end().as_bytes().to_vec();
        if qual.len() != seq.len() {
            return Err(anyhow!(
                "FASTQ record {} ('{}'): seq/qual length mismatch ({} vs {})",
                nth,
                id,
                seq.len(),
                qual.len()
            ));
        }

        self.records = nth;
        Ok(Some(FastqRecord { id, desc, seq, qual }))
    }
}

/// Strips a trailing `/1` or `/2` mate suffix from a read name.
pub fn trim_mate_suffix(id: &str) -> &str {
    id.strip_suffix("/1").or_else(|| id.strip_suffix("/2")).unwrap_or(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_two_records() {
        let data = b"@r1 first\nACGT\n+\nIIII\n\n@r2\nNN\n+r2\n##\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        let a = r.next_record().unwrap().unwrap();
        assert_eq!(a.id, "r1");
        assert_eq!(a.desc.as_deref(), Some("first"));
        assert_eq!(a.seq, b"ACGT");
        let b = r.next_record().unwrap().unwrap();
        assert_eq!(b.id, "r2");
        assert_eq!(b.qual, b"##");
        assert!(r.next_record().unwrap().is_none());
        assert_eq!(r.records(), 2);
    }

    #[test]
    fn length_mismatch_names_the_record() {
        let data = b"@ok\nA\n+\nI\n@bad\nACGT\n+\nII\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        assert!(r.next_record().unwrap().is_some());
        let err = r.next_record().unwrap_err().to_string();
        assert!(err.contains("record 2"), "{}", err);
        assert!(err.contains("bad"), "{}", err);
    }

    #[test]
    fn mate_suffixes_are_trimmed() {
        assert_eq!(trim_mate_suffix("frag/1"), "frag");
        assert_eq!(trim_mate_suffix("frag/2"), "frag");
        assert_eq!(trim_mate_suffix("frag"), "frag");
    }
}
