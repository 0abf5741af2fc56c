use std::ops::Range;

use crate::error::{DiffError, Result};
use crate::util::dna::{SEP, SIGMA};

/// 后缀数组上的半开区间 [lo, hi)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    pub lo: usize,
    pub hi: usize,
}

impl Interval {
    pub fn new(lo: usize, hi: usize) -> Self {
        Self { lo, hi }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.lo >= self.hi
    }

    /// 出现次数 hi - lo；lo > hi 说明 rank 表已损坏
    #[inline]
    pub fn width(&self) -> Result<usize> {
        if self.lo > self.hi {
            return Err(DiffError::IndexCorrupt(format!(
                "interval [{}, {}) has negative width",
                self.lo, self.hi
            )));
        }
        Ok(self.hi - self.lo)
    }

    pub fn rows(&self) -> Range<usize> {
        self.lo..self.hi.max(self.lo)
    }
}

/// 只读 FM 索引：
/// - 字母表固定为 {0:$, 1:A, 2:C, 3:G, 4:T, 5:N}，每条序列后跟一个 $。
/// - Occ 采用定长分块采样（块内顺扫补偿），块长即加载时的采样率。
/// - 构建后不再修改，可被所有 worker 无锁并发读取。
#[derive(Debug)]
pub struct FullTextIndex {
    block: u32,
    /// C[i] = 文本中字母 < i 的累计数量，C[SIGMA] = 总长
    c: [u32; SIGMA + 1],
    bwt: Vec<u8>,
    /// occ_samples[block_id * SIGMA + c] = BWT[0..block_id*block) 中 c 的个数
    occ_samples: Vec<u32>,
    n_sequences: u32,
}

impl FullTextIndex {
    /// 由 BWT 重建 C 表与 Occ 采样，并与文件声明的长度、序列数核对。
    pub fn from_bwt(bwt: Vec<u8>, declared_len: u64, n_sequences: u32, block: usize) -> Result<Self> {
        if block == 0 {
            return Err(DiffError::Configuration("occurrence sample rate must be positive".into()));
        }
        let n = bwt.len();
        if n as u64 != declared_len {
            return Err(DiffError::IndexCorrupt(format!(
                "BWT holds {} symbols but index declares {}",
                n, declared_len
            )));
        }
        if n >= u32::MAX as usize {
            return Err(DiffError::IndexCorrupt(format!("BWT length {} exceeds 32-bit rank tables", n)));
        }

        let num_blocks = if n == 0 { 0 } else { (n + block - 1) / block };
        let mut occ_samples = vec![0u32; num_blocks * SIGMA];
        let mut running = [0u32; SIGMA];
        for bi in 0..num_blocks {
            occ_samples[bi * SIGMA..(bi + 1) * SIGMA].copy_from_slice(&running);
            let start = bi * block;
            let end = ((bi + 1) * block).min(n);
            for (off, &ch) in bwt[start..end].iter().enumerate() {
                let ci = ch as usize;
                if ci >= SIGMA {
                    return Err(DiffError::IndexCorrupt(format!(
                        "symbol {} at BWT row {} is outside the alphabet",
                        ch,
                        start + off
                    )));
                }
                running[ci] += 1;
            }
        }

        let mut c = [0u32; SIGMA + 1];
        for i in 0..SIGMA {
            c[i + 1] = c[i] + running[i];
        }

        let idx = Self { block: block as u32, c, bwt, occ_samples, n_sequences };
        idx.validate(&running)?;
        Ok(idx)
    }

    fn validate(&self, totals: &[u32; SIGMA]) -> Result<()> {
        if self.c[SIGMA] as usize != self.bwt.len() {
            return Err(DiffError::IndexCorrupt(format!(
                "C table covers {} symbols, BWT has {}",
                self.c[SIGMA],
                self.bwt.len()
            )));
        }
        if totals[SEP as usize] != self.n_sequences {
            return Err(DiffError::IndexCorrupt(format!(
                "BWT holds {} separators for {} declared sequences",
                totals[SEP as usize], self.n_sequences
            )));
        }
        for a in 0..SIGMA as u8 {
            if self.occ(a, self.bwt.len()) != totals[a as usize] {
                return Err(DiffError::IndexCorrupt(format!("occurrence samples disagree for symbol {}", a)));
            }
        }
        Ok(())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bwt.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bwt.is_empty()
    }

    pub fn n_sequences(&self) -> u32 {
        self.n_sequences
    }

    pub fn sample_rate(&self) -> usize {
        self.block as usize
    }

    /// 空串对应的整个区间
    #[inline]
    pub fn full(&self) -> Interval {
        Interval::new(0, self.bwt.len())
    }

    #[inline]
    pub fn symbol_at(&self, row: usize) -> u8 {
        self.bwt[row]
    }

    #[inline]
    pub fn occ(&self, c: u8, pos: usize) -> u32 {
        // 返回 BWT[0..pos) 中 c 的出现次数
        if pos == 0 { return 0; }
        let block = self.block as usize;
        let bi = (pos - 1) / block;
        let base = self.occ_samples[bi * SIGMA + c as usize];
        let start = bi * block;
        let mut add = 0u32;
        for &ch in &self.bwt[start..pos] {
            if ch == c { add += 1; }
        }
        base + add
    }

    /// 反向搜索一步：由 P 的区间得到 cP 的区间（可能为空）。
    #[inline]
    pub fn extend(&self, iv: Interval, c: u8) -> Interval {
        let c0 = self.c[c as usize] as usize;
        Interval::new(c0 + self.occ(c, iv.lo) as usize, c0 + self.occ(c, iv.hi) as usize)
    }

    /// LF 映射：行 row 的后缀向左移动一个字符后的行号
    #[inline]
    pub fn lf(&self, row: usize) -> usize {
        let c = self.bwt[row];
        self.c[c as usize] as usize + self.occ(c, row) as usize
    }

    /// 从完整区间出发对编码后的 pattern 做反向搜索。
    pub fn find(&self, pat: &[u8]) -> Interval {
        self.find_from(self.full(), pat)
    }

    /// 从已知的后缀区间 `iv` 继续，把 `pat` 前置到该后缀之前。
    pub fn find_from(&self, mut iv: Interval, pat: &[u8]) -> Interval {
        for &a in pat.iter().rev() {
            if iv.is_empty() {
                break;
            }
            iv = self.extend(iv, a);
        }
        iv
    }

    /// 近似的内存占用（字节）
    pub fn heap_bytes(&self) -> usize {
        self.bwt.len() + self.occ_samples.len() * std::mem::size_of::<u32>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::build_collection;
    use crate::util::dna;

    fn build(seqs: &[&[u8]], block: usize) -> FullTextIndex {
        let built = build_collection(seqs.iter().enumerate().map(|(i, s)| (format!("s{}", i), s.to_vec())))
            .expect("build");
        FullTextIndex::from_bwt(built.index.bwt, built.index.len, built.index.directory.len() as u32, block)
            .expect("index")
    }

    fn naive_count(seqs: &[&[u8]], pat: &[u8]) -> usize {
        seqs.iter()
            .map(|s| s.windows(pat.len()).filter(|w| *w == pat).count())
            .sum()
    }

    #[test]
    fn counts_match_naive_across_sequences() {
        let seqs: [&[u8]; 3] = [b"ACGTACGTTGCA", b"TTACGA", b"GGGACGT"];
        for block in [1usize, 3, 64] {
            let idx = build(&seqs, block);
            for pat in [&b"ACG"[..], b"A", b"GT", b"TTGCA", b"CCC", b"GACGT"] {
                let iv = idx.find(&dna::encode(pat));
                assert_eq!(iv.width().unwrap(), naive_count(&seqs, pat), "pattern {:?}", pat);
            }
        }
    }

    #[test]
    fn pattern_never_spans_separator() {
        // "TA" only occurs across the boundary between the two sequences
        let seqs: [&[u8]; 2] = [b"CCT", b"ACC"];
        let idx = build(&seqs, 2);
        assert!(idx.find(&dna::encode(b"TA")).is_empty());
    }

    #[test]
    fn extension_never_widens() {
        let seqs: [&[u8]; 1] = [b"ACGTTGCAACGT"];
        let idx = build(&seqs, 4);
        let mut iv = idx.full();
        for &a in dna::encode(b"CGT").iter().rev() {
            let next = idx.extend(iv, a);
            assert!(next.width().unwrap() <= iv.width().unwrap());
            iv = next;
        }
        assert_eq!(iv.width().unwrap(), 2);
    }

    #[test]
    fn rejects_declared_length_mismatch() {
        let err = FullTextIndex::from_bwt(vec![1, 0, 2], 4, 1, 2).unwrap_err();
        assert!(matches!(err, DiffError::IndexCorrupt(_)));
    }

    #[test]
    fn rejects_separator_count_mismatch() {
        let err = FullTextIndex::from_bwt(vec![1, 0, 2], 3, 2, 2).unwrap_err();
        assert!(matches!(err, DiffError::IndexCorrupt(_)));
    }

    #[test]
    fn negative_width_is_corruption() {
        assert!(matches!(Interval::new(5, 3).width(), Err(DiffError::IndexCorrupt(_))));
    }
}
