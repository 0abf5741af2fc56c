use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// variant 索引每一行对应一位，所有 worker 共享。
///
/// - 置位后整个运行期间不再清除。
/// - 认领（检查 + 置位）在同一把锁内完成，任意交错下每一位只有一个认领者成功。
/// - 读取（[`is_set`](DedupBitVector::is_set) / [`count_set`](DedupBitVector::count_set)）无需加锁。
#[derive(Debug)]
pub struct DedupBitVector {
    words: Vec<AtomicU64>,
    len: usize,
    guard: Mutex<()>,
}

/// 区间在第 w 个字中覆盖的位
#[inline]
fn word_mask(range: &Range<usize>, w: usize) -> u64 {
    let word_lo = w * 64;
    let lo = range.start.max(word_lo) - word_lo;
    let hi = range.end.min(word_lo + 64) - word_lo;
    let upper = if hi == 64 { u64::MAX } else { (1u64 << hi) - 1 };
    upper & !((1u64 << lo) - 1)
}

impl DedupBitVector {
    pub fn new(len: usize) -> Self {
        let words = (0..(len + 63) / 64).map(|_| AtomicU64::new(0)).collect();
        Self { words, len, guard: Mutex::new(()) }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_set(&self, pos: usize) -> bool {
        self.words[pos / 64].load(Ordering::Acquire) & (1u64 << (pos % 64)) != 0
    }

    pub fn count_set(&self) -> usize {
        self.words.iter().map(|w| w.load(Ordering::Acquire).count_ones() as usize).sum()
    }

    fn word_span(range: &Range<usize>) -> Range<usize> {
        range.start / 64..(range.end - 1) / 64 + 1
    }

    /// 调用方须持有 `guard`
    fn is_free(&self, range: &Range<usize>) -> bool {
        Self::word_span(range).all(|w| self.words[w].load(Ordering::Acquire) & word_mask(range, w) == 0)
    }

    /// 调用方须持有 `guard`
    fn set(&self, range: &Range<usize>) {
        for w in Self::word_span(range) {
            self.words[w].fetch_or(word_mask(range, w), Ordering::AcqRel);
        }
    }

    fn check(&self, range: &Range<usize>) {
        assert!(range.end <= self.len, "claim {:?} beyond {} bits", range, self.len);
    }

    /// `range` 内无任何位被置位时整体置位并返回 true，否则不做修改并返回 false。
    /// 空区间不认领任何位，返回 false。
    pub fn try_claim(&self, range: Range<usize>) -> bool {
        self.check(&range);
        if range.start >= range.end {
            return false;
        }
        let _held = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        if !self.is_free(&range) {
            return false;
        }
        self.set(&range);
        true
    }

    /// 一次加锁内对每个区间做 [`try_claim`](DedupBitVector::try_claim)，返回成功认领的区间数。
    ///
    /// 用于把一整段已探索区域的全部 k-mer 一起登记：返回 0 表示整段早已被覆盖。
    pub fn claim_each(&self, ranges: &[Range<usize>]) -> usize {
        ranges.iter().for_each(|r| self.check(r));
        let _held = self.guard.lock().unwrap_or_else(|e| e.into_inner());
        let mut claimed = 0;
        for r in ranges {
            if r.start < r.end && self.is_free(r) {
                self.set(r);
                claimed += 1;
            }
        }
        claimed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn mask_covers_partial_words() {
        assert_eq!(word_mask(&(0..64), 0), u64::MAX);
        assert_eq!(word_mask(&(3..5), 0), 0b11000);
        assert_eq!(word_mask(&(60..70), 0), 0xF << 60);
        assert_eq!(word_mask(&(60..70), 1), 0b111111);
    }

    #[test]
    fn claim_is_exclusive_and_sticky() {
        let bv = DedupBitVector::new(200);
        assert!(bv.try_claim(10..20));
        assert!(!bv.try_claim(10..20));
        assert!(!bv.try_claim(19..25));
        assert!(bv.try_claim(20..25));
        assert_eq!(bv.count_set(), 15);
    }

    #[test]
    fn failed_claim_leaves_state_unchanged() {
        let bv = DedupBitVector::new(300);
        assert!(bv.try_claim(130..131));
        // spans words 0..=2, conflicts in word 2
        assert!(!bv.try_claim(5..140));
        assert_eq!(bv.count_set(), 1);
        assert!(!bv.is_set(5));
        assert!(bv.try_claim(5..130));
    }

    #[test]
    fn empty_range_claims_nothing() {
        let bv = DedupBitVector::new(8);
        assert!(!bv.try_claim(4..4));
        assert_eq!(bv.claim_each(&[4..4]), 0);
        assert_eq!(bv.count_set(), 0);
    }

    #[test]
    fn claim_each_counts_only_free_ranges() {
        let bv = DedupBitVector::new(256);
        assert!(bv.try_claim(70..80));
        assert_eq!(bv.claim_each(&[0..10, 75..76, 100..200, 0..5]), 2);
        assert_eq!(bv.count_set(), 10 + 10 + 100);
        assert_eq!(bv.claim_each(&[0..10, 100..200]), 0);
    }

    #[test]
    fn concurrent_identical_claims_have_one_winner() {
        let bv = DedupBitVector::new(1024);
        let ranges: Vec<Range<usize>> = (0..32).map(|i| (i * 30)..(i * 30 + 30)).collect();
        let wins = AtomicUsize::new(0);
        std::thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for r in &ranges {
                        if bv.try_claim(r.clone()) {
                            wins.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                });
            }
        });
        assert_eq!(wins.load(Ordering::Relaxed), ranges.len());
        assert_eq!(bv.count_set(), 960);
    }

    #[test]
    fn concurrent_overlapping_claims_partition_the_bits() {
        const BITS: usize = 640;
        let bv = DedupBitVector::new(BITS);
        // word-straddling ranges of mixed width, different per thread
        let plans: Vec<Vec<Range<usize>>> = (0..6u64)
            .map(|t| {
                let mut x = t * 7919 + 1;
                (0..200)
                    .map(|_| {
                        x = x.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1_442_695_040_888_963_407);
                        let start = (x >> 33) as usize % (BITS - 1);
                        let width = 1 + (x >> 17) as usize % 150;
                        start..(start + width).min(BITS)
                    })
                    .collect()
            })
            .collect();

        let won: Vec<Vec<Range<usize>>> = std::thread::scope(|s| {
            let handles: Vec<_> = plans
                .iter()
                .map(|plan| {
                    let bv = &bv;
                    s.spawn(move || plan.iter().filter(|r| bv.try_claim((*r).clone())).cloned().collect::<Vec<_>>())
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        let mut owner = vec![0u32; BITS];
        for r in won.iter().flatten() {
            for b in r.clone() {
                owner[b] += 1;
            }
        }
        for (b, &n) in owner.iter().enumerate() {
            assert!(n <= 1, "bit {} claimed {} times", b, n);
            assert_eq!(bv.is_set(b), n == 1, "bit {}", b);
        }
        // every failed claim overlaps some winner
        for plan in &plans {
            for r in plan {
                let lost = won.iter().flatten().all(|w| w != r);
                if lost {
                    assert!(r.clone().any(|b| owner[b] == 1), "{:?} lost without a conflict", r);
                }
            }
        }
    }
}
