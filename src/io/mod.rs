//! 输入读取：FASTA / FASTQ 记录与内存中的参考序列表。

pub mod fasta;
pub mod fastq;

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};

use crate::error::{DiffError, Result};
use fasta::FastaReader;
use fastq::FastqReader;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeqRecord {
    pub id: String,
    pub seq: Vec<u8>,
}

/// FASTA 或 FASTQ，由流中第一个非空白字节决定
pub enum SequenceReader<R: BufRead> {
    Fasta(FastaReader<R>),
    Fastq(FastqReader<R>),
}

impl<R: BufRead> SequenceReader<R> {
    pub fn detect(mut reader: R) -> Result<Self> {
        let first = loop {
            let buf = reader.fill_buf()?;
            if buf.is_empty() {
                break None;
            }
            match buf.iter().position(|b| !b.is_ascii_whitespace()) {
                Some(i) => break Some(buf[i]),
                None => {
                    let n = buf.len();
                    reader.consume(n);
                }
            }
        };
        Ok(match first {
            Some(b'@') => SequenceReader::Fastq(FastqReader::new(reader)),
            _ => SequenceReader::Fasta(FastaReader::new(reader)),
        })
    }
}

impl<R: BufRead> Iterator for SequenceReader<R> {
    type Item = Result<SeqRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            SequenceReader::Fasta(r) => r.next(),
            SequenceReader::Fastq(r) => r.next(),
        }
    }
}

pub fn open_sequences(path: &str) -> Result<SequenceReader<BufReader<File>>> {
    let fh = File::open(path).map_err(|e| {
        DiffError::Io(std::io::Error::new(e.kind(), format!("cannot open '{}': {}", path, e)))
    })?;
    SequenceReader::detect(BufReader::new(fh))
}

/// 内存中的参考序列，按名称查找
#[derive(Debug, Default)]
pub struct SequenceTable {
    records: Vec<SeqRecord>,
    by_id: HashMap<String, usize>,
}

impl SequenceTable {
    pub fn from_records<I>(records: I) -> Result<Self>
    where
        I: IntoIterator<Item = Result<SeqRecord>>,
    {
        let mut table = SequenceTable::default();
        for rec in records {
            let rec = rec?;
            table.by_id.entry(rec.id.clone()).or_insert(table.records.len());
            table.records.push(rec);
        }
        Ok(table)
    }

    pub fn load(path: &str) -> Result<Self> {
        Self::from_records(open_sequences(path)?)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn by_id(&self, id: &str) -> Option<&SeqRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }
}
