use std::io::BufRead;

use crate::error::{DiffError, Result};
use crate::io::SeqRecord;

/// 四行 FASTQ；质量值只做长度校验，不保留
pub struct FastqReader<R: BufRead> {
    reader: R,
    buf: String,
    done: bool,
    line: usize,
}

fn malformed(line: usize, what: &str) -> DiffError {
    DiffError::Io(std::io::Error::new(
        std::io::ErrorKind::InvalidData,
        format!("FASTQ line {}: {}", line, what),
    ))
}

impl<R: BufRead> FastqReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: String::new(), done: false, line: 0 }
    }

    fn read_line(&mut self) -> Result<bool> {
        self.buf.clear();
        self.line += 1;
        Ok(self.reader.read_line(&mut self.buf)? != 0)
    }

    pub fn next_record(&mut self) -> Result<Option<SeqRecord>> {
        if self.done { return Ok(None); }

        // skip blank lines between records
        loop {
            if !self.read_line()? { self.done = true; return Ok(None); }
            if !self.buf.trim().is_empty() { break; }
        }
        let id = match self.buf.strip_prefix('@') {
            Some(h) => h.split_whitespace().next().unwrap_or("").to_string(),
            None => return Err(malformed(self.line, "header not starting with '@'")),
        };

        if !self.read_line()? { return Err(malformed(self.line, "unexpected EOF after header")); }
        let seq: Vec<u8> = self.buf.trim_end().bytes().map(|b| b.to_ascii_uppercase()).collect();

        if !self.read_line()? || !self.buf.starts_with('+') {
            return Err(malformed(self.line, "missing '+' line"));
        }

        if !self.read_line()? { return Err(malformed(self.line, "missing quality line")); }
        if self.buf.trim_end().len() != seq.len() {
            return Err(malformed(self.line, "seq/qual length mismatch"));
        }

        Ok(Some(SeqRecord { id, seq }))
    }
}

impl<R: BufRead> Iterator for FastqReader<R> {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn parse_two_records() {
        let data = b"@r1 extra\nacgt\n+\nIIII\n\n@r2\nGG\n+r2\n##\n";
        let recs: Vec<SeqRecord> = FastqReader::new(Cursor::new(&data[..]))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].id, "r1");
        assert_eq!(recs[0].seq, b"ACGT");
        assert_eq!(recs[1].seq, b"GG");
    }

    #[test]
    fn quality_length_mismatch_is_error() {
        let data = b"@r1\nACGT\n+\nIII\n";
        let mut r = FastqReader::new(Cursor::new(&data[..]));
        assert!(r.next_record().is_err());
    }
}
