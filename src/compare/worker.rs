use std::ops::Range;

use crate::compare::aggregate::AggregateStatistics;
use crate::compare::walk::{Bubble, BranchingWalker, WalkResult};
use crate::compare::ComparisonParameters;
use crate::error::Result;
use crate::util::dna::{self, AMBIG};

/// 一条序列中找到的 bubble 及其间累计的计数
#[derive(Debug, Default)]
pub struct WorkOutput {
    pub bubbles: Vec<Bubble>,
    pub stats: AggregateStatistics,
}

/// 每个线程一个处理器：自带临时缓冲区，其余状态经 `ComparisonParameters` 共享。
pub trait SequenceWorker: Send {
    /// 处理 variant 集合中的一条原始（ASCII）序列。
    fn process(&mut self, seq: &[u8]) -> Result<WorkOutput>;
}

/// 滑窗取种子 → 新颖性判断 → 认领 → 游走 → 登记整段区域并去重输出。
pub struct Worker<'a> {
    params: &'a ComparisonParameters<'a>,
    walker: BranchingWalker<'a>,
    codes: Vec<u8>,
    rc_buf: Vec<u8>,
}

impl<'a> Worker<'a> {
    pub fn new(params: &'a ComparisonParameters<'a>) -> Self {
        Self { params, walker: BranchingWalker::new(params), codes: Vec::new(), rc_buf: Vec::new() }
    }

    /// `canonical` 在 variant 索引中的行区间；规范链不出现时取反向互补链的区间。
    fn claim_range(&mut self, canonical: &[u8]) -> Result<Range<usize>> {
        let hits = self.params.variant.strand_intervals(canonical, &mut self.rc_buf);
        let iv = if hits.fwd.width()? > 0 { hits.fwd } else { hits.rev };
        Ok(iv.rows())
    }

    /// bubble 内部全部 k-mer 的认领区间
    fn region(&mut self, bubble: &Bubble) -> Result<Vec<Range<usize>>> {
        bubble.interior_kmers().map(|kmer| self.claim_range(&dna::canonical(kmer))).collect()
    }

    fn seed(&mut self, window: &[u8], out: &mut WorkOutput) -> Result<()> {
        let p = self.params;
        let stats = &mut out.stats;
        stats.kmers_examined += 1;

        if p.variant.strand_count(window, &mut self.rc_buf)? < p.kmer_threshold {
            return Ok(());
        }
        if p.base.strand_count(window, &mut self.rc_buf)? >= p.base_threshold {
            return Ok(());
        }
        stats.kmers_novel += 1;

        let seed = dna::canonical(window);
        let rows = self.claim_range(&seed)?;
        if !p.claims.try_claim(rows) {
            stats.seeds_already_claimed += 1;
            return Ok(());
        }
        stats.seeds_claimed += 1;

        let mut bubble = match self.walker.walk(&seed)? {
            WalkResult::Bubble(bubble) => bubble,
            WalkResult::Abandoned(reason) => {
                // 只保留种子本身的认领
                log::trace!("walk from {} abandoned: {:?}", String::from_utf8_lossy(&dna::decode(&seed)), reason);
                stats.record_abandon(reason);
                return Ok(());
            }
        };

        // 后续落在该区域内的种子直接认领失败，不再游走
        let region = self.region(&bubble)?;
        p.claims.claim_each(&region);
        if p.emitted.claim_each(&region) == 0 {
            // 另一个 worker 已经写出了同一区域
            stats.redundant += 1;
            return Ok(());
        }

        bubble.reference = match p.reference.place(bubble.left_anchor(), &mut self.rc_buf)? {
            Some(hit) => Some(hit),
            None => p.reference.place(bubble.right_anchor(), &mut self.rc_buf)?,
        };
        log::debug!(
            "bubble of {} bp ({} divergent) from seed {}",
            bubble.sequence.len(),
            bubble.divergent().len(),
            String::from_utf8_lossy(&dna::decode(&seed))
        );
        stats.bubbles += 1;
        out.bubbles.push(bubble);
        Ok(())
    }
}

impl SequenceWorker for Worker<'_> {
    fn process(&mut self, seq: &[u8]) -> Result<WorkOutput> {
        let mut out = WorkOutput::default();
        out.stats.sequences = 1;

        let k = self.params.kmer;
        let mut codes = std::mem::take(&mut self.codes);
        codes.clear();
        codes.extend(seq.iter().map(|&b| dna::to_alphabet(b)));

        // 下一个不含 N 的窗口起点
        let mut clean_from = 0usize;
        let windows = codes.len().saturating_sub(k - 1);
        let mut result = Ok(());
        for i in 0..windows {
            if let Some(n) = codes[i..i + k].iter().rposition(|&a| a == AMBIG) {
                clean_from = clean_from.max(i + n + 1);
            }
            if i < clean_from {
                continue;
            }
            result = self.seed(&codes[i..i + k], &mut out);
            if result.is_err() {
                break;
            }
        }
        self.codes = codes;
        result.map(|()| out)
    }
}
