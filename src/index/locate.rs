//! 采样后缀数组：行号 -> (序列编号, 序列内偏移)。
//!
//! 只保存偏移为采样率整数倍的行；其余行沿 LF 映射向左走，直到遇到采样行，
//! 或遇到 BWT 中的 $（当前后缀即序列起点，由 $ 的秩得到序列编号）。

use crate::error::{DiffError, Result};
use crate::index::fm::FullTextIndex;
use crate::index::store::SeqEntry;
use crate::util::dna::SEP;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub sequence_id: u32,
    pub offset: u32,
}

#[derive(Debug)]
pub struct CoordinateLocator {
    rate: u32,
    len: usize,
    /// 每行一位，标记该行是否被采样
    marks: Vec<u64>,
    /// marks 中每个字之前的置位总数
    mark_rank: Vec<u32>,
    values: Vec<Location>,
    /// $ 在 BWT 中的秩 -> 序列编号
    start_ids: Vec<u32>,
    directory: Vec<SeqEntry>,
}

enum TextPos {
    Inside(u32, u32),
    Separator(u32),
}

fn classify(directory: &[SeqEntry], pos: u32) -> Option<TextPos> {
    let idx = directory.partition_point(|e| e.offset <= pos).checked_sub(1)?;
    let e = &directory[idx];
    let off = pos - e.offset;
    if off < e.len {
        Some(TextPos::Inside(idx as u32, off))
    } else if off == e.len {
        Some(TextPos::Separator(idx as u32))
    } else {
        None
    }
}

impl CoordinateLocator {
    pub fn from_suffix_array(sa: &[u32], directory: Vec<SeqEntry>, rate: usize) -> Result<Self> {
        if rate == 0 {
            return Err(DiffError::Configuration("locator sample rate must be positive".into()));
        }
        let expected: usize = directory.iter().map(|e| e.len as usize + 1).sum();
        if expected != sa.len() {
            return Err(DiffError::IndexCorrupt(format!(
                "suffix array has {} rows, sequence directory describes {}",
                sa.len(),
                expected
            )));
        }

        let words = (sa.len() + 63) / 64;
        let mut marks = vec![0u64; words];
        let mut values = Vec::new();
        let mut start_ids = Vec::with_capacity(directory.len());

        for (row, &pos) in sa.iter().enumerate() {
            let kind = classify(&directory, pos).ok_or_else(|| {
                DiffError::IndexCorrupt(format!("suffix array row {} points outside the text ({})", row, pos))
            })?;
            match kind {
                TextPos::Inside(id, off) => {
                    if off == 0 {
                        start_ids.push(id);
                    }
                    if off as usize % rate == 0 {
                        marks[row / 64] |= 1u64 << (row % 64);
                        values.push(Location { sequence_id: id, offset: off });
                    }
                }
                TextPos::Separator(id) => {
                    // 空序列的起点就是它的分隔符
                    if directory[id as usize].len == 0 {
                        start_ids.push(id);
                    }
                }
            }
        }
        if start_ids.len() != directory.len() {
            return Err(DiffError::IndexCorrupt(format!(
                "found {} sequence starts for {} sequences",
                start_ids.len(),
                directory.len()
            )));
        }

        let mut mark_rank = Vec::with_capacity(words);
        let mut acc = 0u32;
        for w in &marks {
            mark_rank.push(acc);
            acc += w.count_ones();
        }

        Ok(Self { rate: rate as u32, len: sa.len(), marks, mark_rank, values, start_ids, directory })
    }

    pub fn sample_rate(&self) -> usize {
        self.rate as usize
    }

    pub fn directory(&self) -> &[SeqEntry] {
        &self.directory
    }

    pub fn sampled_rows(&self) -> usize {
        self.values.len()
    }

    #[inline]
    fn sample(&self, row: usize) -> Option<Location> {
        let word = self.marks[row / 64];
        let bit = 1u64 << (row % 64);
        if word & bit == 0 {
            return None;
        }
        let rank = self.mark_rank[row / 64] + (word & (bit - 1)).count_ones();
        Some(self.values[rank as usize])
    }

    /// 把 `index` 中的行号解析为原始坐标。`index` 必须与构建本定位器的 SA 同源。
    pub fn locate(&self, index: &FullTextIndex, row: usize) -> Result<Location> {
        if index.len() != self.len || row >= self.len {
            return Err(DiffError::IndexCorrupt(format!(
                "row {} cannot be located: locator covers {} rows, index has {}",
                row,
                self.len,
                index.len()
            )));
        }
        let mut cur = row;
        let mut steps = 0u32;
        loop {
            if let Some(loc) = self.sample(cur) {
                return Ok(Location { sequence_id: loc.sequence_id, offset: loc.offset + steps });
            }
            if index.symbol_at(cur) == SEP {
                let rank = index.occ(SEP, cur) as usize;
                let id = *self.start_ids.get(rank).ok_or_else(|| {
                    DiffError::IndexCorrupt(format!("separator rank {} has no sequence", rank))
                })?;
                return Ok(Location { sequence_id: id, offset: steps });
            }
            cur = index.lf(cur);
            steps += 1;
            if steps as usize > self.len {
                return Err(DiffError::IndexCorrupt(format!("LF walk from row {} does not terminate", row)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::build_collection;
    use crate::util::dna;

    fn fixture(rate: usize) -> (FullTextIndex, CoordinateLocator, Vec<u32>) {
        let built = build_collection(vec![
            ("chrA".to_string(), b"ACGTTGCAAGGT".to_vec()),
            ("empty".to_string(), Vec::new()),
            ("chrB".to_string(), b"GGATCCAACGTA".to_vec()),
        ])
        .unwrap();
        let sa = built.sa.sa.clone();
        let idx = built.index.into_index(4).unwrap();
        let loc = built.sa.into_locator(rate).unwrap();
        (idx, loc, sa)
    }

    #[test]
    fn every_sequence_row_resolves_to_its_origin() {
        for rate in [1usize, 3, 5, 64] {
            let (idx, loc, sa) = fixture(rate);
            for (row, &pos) in sa.iter().enumerate() {
                if let Some(TextPos::Inside(id, off)) = classify(loc.directory(), pos) {
                    let got = loc.locate(&idx, row).unwrap();
                    assert_eq!(got, Location { sequence_id: id, offset: off }, "rate={} row={}", rate, row);
                }
            }
        }
    }

    #[test]
    fn sampling_rate_controls_density() {
        let (_, dense, _) = fixture(1);
        let (_, sparse, _) = fixture(8);
        assert_eq!(dense.sampled_rows(), 24);
        assert!(sparse.sampled_rows() < dense.sampled_rows());
    }

    #[test]
    fn locate_pattern_hit() {
        let (idx, loc, _) = fixture(5);
        let iv = idx.find(&dna::encode(b"ATCC"));
        assert_eq!(iv.width().unwrap(), 1);
        let hit = loc.locate(&idx, iv.lo).unwrap();
        assert_eq!(loc.directory()[hit.sequence_id as usize].name, "chrB");
        assert_eq!(hit.offset, 2);
    }

    #[test]
    fn directory_mismatch_is_corruption() {
        let built = build_collection(vec![("r".to_string(), b"ACGT".to_vec())]).unwrap();
        let mut dir = built.sa.directory.clone();
        dir[0].len = 7;
        let err = CoordinateLocator::from_suffix_array(&built.sa.sa, dir, 2).unwrap_err();
        assert!(matches!(err, DiffError::IndexCorrupt(_)));
    }
}
