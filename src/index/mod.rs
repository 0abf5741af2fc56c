pub mod build;
pub mod cache;
pub mod fm;
pub mod locate;
pub mod store;

pub use cache::IntervalCache;
pub use fm::{FullTextIndex, Interval};
pub use locate::{CoordinateLocator, Location};

use crate::error::Result;
use crate::util::dna;

/// 一个序列集合的 FM 索引及其区间缓存
#[derive(Debug)]
pub struct IndexedCollection {
    pub index: FullTextIndex,
    pub cache: IntervalCache,
}

/// 同一 k-mer 在正反两条链上的区间
#[derive(Debug, Clone, Copy)]
pub struct StrandIntervals {
    pub fwd: Interval,
    pub rev: Interval,
    pub palindrome: bool,
}

impl StrandIntervals {
    /// 两链出现次数之和（回文只计一次）
    pub fn count(&self) -> Result<usize> {
        let fwd = self.fwd.width()?;
        if self.palindrome {
            return Ok(fwd);
        }
        Ok(fwd + self.rev.width()?)
    }
}

impl IndexedCollection {
    pub fn new(index: FullTextIndex, cache_depth: usize) -> Self {
        let cache = IntervalCache::build(&index, cache_depth);
        Self { index, cache }
    }

    /// 直接由内存中的序列构建（测试与小型输入）
    pub fn from_sequences<I>(records: I, sample_rate: usize, cache_depth: usize) -> Result<Self>
    where
        I: IntoIterator<Item = (String, Vec<u8>)>,
    {
        let built = build::build_collection(records)?;
        Ok(Self::new(built.index.into_index(sample_rate)?, cache_depth))
    }

    #[inline]
    pub fn find(&self, pat: &[u8]) -> Interval {
        self.cache.find(&self.index, pat)
    }

    /// `rc_buf` 为调用方复用的反向互补缓冲区
    pub fn strand_intervals(&self, kmer: &[u8], rc_buf: &mut Vec<u8>) -> StrandIntervals {
        dna::revcomp_into(kmer, rc_buf);
        let palindrome = rc_buf.as_slice() == kmer;
        let fwd = self.find(kmer);
        let rev = if palindrome { fwd } else { self.find(rc_buf) };
        StrandIntervals { fwd, rev, palindrome }
    }

    pub fn strand_count(&self, kmer: &[u8], rc_buf: &mut Vec<u8>) -> Result<usize> {
        self.strand_intervals(kmer, rc_buf).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strand_counts_add_reverse_complement_once() {
        let coll = IndexedCollection::from_sequences(
            vec![("a".to_string(), b"AACGTTGGCA".to_vec()), ("b".to_string(), b"TGCCAA".to_vec())],
            4,
            2,
        )
        .unwrap();
        let mut rc = Vec::new();
        // GGCA in a, its reverse complement TGCC in b
        assert_eq!(coll.strand_count(&dna::encode(b"GGCA"), &mut rc).unwrap(), 2);
        // ACGT is its own reverse complement
        let hits = coll.strand_intervals(&dna::encode(b"ACGT"), &mut rc);
        assert!(hits.palindrome);
        assert_eq!(hits.count().unwrap(), 1);
        assert_eq!(coll.strand_count(&dna::encode(b"CCCC"), &mut rc).unwrap(), 0);
    }
}
