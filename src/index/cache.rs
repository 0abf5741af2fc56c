//! 定长前缀区间缓存：预先枚举所有长度为 L 的 ACGT 串并记录其 SA 区间。
//!
//! 构建后只读，多线程无锁读取。表大小 4^L 项，每项 8 字节。

use crate::index::fm::{FullTextIndex, Interval};
use crate::util::dna::{is_base, BASES};

#[derive(Debug)]
pub struct IntervalCache {
    depth: usize,
    table: Vec<(u32, u32)>,
}

impl IntervalCache {
    pub fn build(index: &FullTextIndex, depth: usize) -> Self {
        let mut table = vec![(0u32, 0u32); 1usize << (2 * depth)];
        if depth > 0 {
            // 深度优先：第 j 层前置串的第 (L-1-j) 个字符，键的第 j 个两位组
            let mut stack: Vec<(Interval, usize, usize)> = vec![(index.full(), 0, 0)];
            while let Some((iv, level, key)) = stack.pop() {
                for &a in &BASES {
                    let next = index.extend(iv, a);
                    if next.is_empty() {
                        continue;
                    }
                    let k = key | (((a - 1) as usize) << (2 * level));
                    if level + 1 == depth {
                        table[k] = (next.lo as u32, next.hi as u32);
                    } else {
                        stack.push((next, level + 1, k));
                    }
                }
            }
        }
        Self { depth, table }
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn heap_bytes(&self) -> usize {
        self.table.len() * std::mem::size_of::<(u32, u32)>()
    }

    /// 长度恰为 L 且只含 ACGT 的串返回缓存区间，否则 None。
    #[inline]
    pub fn lookup(&self, pat: &[u8]) -> Option<Interval> {
        if self.depth == 0 || pat.len() != self.depth {
            return None;
        }
        let mut key = 0usize;
        for (j, &a) in pat.iter().rev().enumerate() {
            if !is_base(a) {
                return None;
            }
            key |= ((a - 1) as usize) << (2 * j);
        }
        let (lo, hi) = self.table[key];
        Some(Interval::new(lo as usize, hi as usize))
    }

    /// 缓存辅助的反向搜索：末尾 L 个字符查表，其余逐步 extend。
    pub fn find(&self, index: &FullTextIndex, pat: &[u8]) -> Interval {
        if pat.len() >= self.depth {
            let split = pat.len() - self.depth;
            if let Some(iv) = self.lookup(&pat[split..]) {
                return index.find_from(iv, &pat[..split]);
            }
        }
        index.find(pat)
    }
}
