//! 从新颖种子 k-mer 出发，在隐式 variant k-mer 图上做有界游走。
//!
//! 先向种子右侧延伸，再以种子反向互补向右延伸（即原方向的左侧），直到每一侧都
//! 遇到 base 集合中存在的 k-mer。每一侧按 A,C,G,T 顺序对存活路径做广度优先扩展；
//! 某一步中一个节点每多出一个后继消耗一个分支预算，两侧共用同一份预算。
//! 同一步中若已有路径重新连回 base，该步的分叉不计入预算。

use crate::compare::{ComparisonParameters, ReferenceHit};
use crate::error::Result;
use crate::util::dna::{self, BASES};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AbandonReason {
    BranchBudgetExceeded,
    DeadEnd,
    /// 某一侧追加了 `max_length` 个字符仍未连回
    LengthExceeded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bubble {
    /// 左锚 k-mer + 分歧字符 + 右锚 k-mer（编码后，取规范链）
    pub sequence: Vec<u8>,
    pub anchor_len: usize,
    /// 两个锚点在 base 集合中的出现次数（两链合计）
    pub left_support: usize,
    pub right_support: usize,
    pub reference: Option<ReferenceHit>,
}

impl Bubble {
    pub fn left_anchor(&self) -> &[u8] {
        &self.sequence[..self.anchor_len]
    }

    pub fn right_anchor(&self) -> &[u8] {
        &self.sequence[self.sequence.len() - self.anchor_len..]
    }

    /// 两锚之间的字符
    pub fn divergent(&self) -> &[u8] {
        let end = self.sequence.len().saturating_sub(self.anchor_len);
        &self.sequence[self.anchor_len.min(end)..end]
    }

    /// 除两个锚点外的全部 k-mer，即游走经过的新颖 k-mer
    pub fn interior_kmers(&self) -> impl Iterator<Item = &[u8]> {
        let windows = (self.sequence.len() + 1).saturating_sub(self.anchor_len);
        self.sequence.windows(self.anchor_len).skip(1).take(windows.saturating_sub(2))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkResult {
    Bubble(Bubble),
    Abandoned(AbandonReason),
}

/// 已连回 base 的一侧
#[derive(Debug)]
struct Reach {
    path: Vec<u8>,
    support: usize,
}

#[derive(Debug)]
enum Side {
    Right,
    Left { right: Reach },
}

#[derive(Debug)]
enum WalkState {
    Seeded,
    Extending { side: Side, frontier: Vec<Vec<u8>>, appended: usize },
    Done(WalkResult),
}

enum Step {
    Frontier(Vec<Vec<u8>>),
    Reconnected(Reach),
    Abandoned(AbandonReason),
}

pub struct BranchingWalker<'a> {
    params: &'a ComparisonParameters<'a>,
    kmer: Vec<u8>,
    rc_buf: Vec<u8>,
}

impl<'a> BranchingWalker<'a> {
    pub fn new(params: &'a ComparisonParameters<'a>) -> Self {
        Self { params, kmer: Vec::with_capacity(params.kmer), rc_buf: Vec::with_capacity(params.kmer) }
    }

    /// 从 `seed`（编码后，长度 k）出发游走。种子应当是新颖的：在 variant 中
    /// 达到阈值、在 base 中低于阈值。
    pub fn walk(&mut self, seed: &[u8]) -> Result<WalkResult> {
        debug_assert_eq!(seed.len(), self.params.kmer);
        let mut used = 0usize;
        let mut state = WalkState::Seeded;
        loop {
            state = match state {
                WalkState::Seeded => WalkState::Extending {
                    side: Side::Right,
                    frontier: vec![seed.to_vec()],
                    appended: 0,
                },
                WalkState::Extending { side, frontier, appended } => match self.step(frontier, &mut used)? {
                    Step::Frontier(_) if appended + 1 >= self.params.max_length => {
                        WalkState::Done(WalkResult::Abandoned(AbandonReason::LengthExceeded))
                    }
                    Step::Frontier(next) => WalkState::Extending { side, frontier: next, appended: appended + 1 },
                    Step::Reconnected(reach) => match side {
                        Side::Right => WalkState::Extending {
                            side: Side::Left { right: reach },
                            frontier: vec![dna::revcomp(seed)],
                            appended: 0,
                        },
                        Side::Left { right } => WalkState::Done(WalkResult::Bubble(self.assemble(reach, right))),
                    },
                    Step::Abandoned(reason) => WalkState::Done(WalkResult::Abandoned(reason)),
                },
                WalkState::Done(result) => return Ok(result),
            };
        }
    }

    /// 给每条存活路径追加一个字符。
    fn step(&mut self, frontier: Vec<Vec<u8>>, used: &mut usize) -> Result<Step> {
        let p = self.params;
        let k = p.kmer;
        let mut next = Vec::with_capacity(frontier.len());
        let mut reconnected: Option<Reach> = None;
        let mut forks = 0usize;

        for path in frontier {
            let mut valid = [(0u8, 0usize); 4];
            let mut n = 0;
            for &a in &BASES {
                self.kmer.clear();
                self.kmer.extend_from_slice(&path[path.len() - (k - 1)..]);
                self.kmer.push(a);
                if p.variant.strand_count(&self.kmer, &mut self.rc_buf)? < p.kmer_threshold {
                    continue;
                }
                valid[n] = (a, p.base.strand_count(&self.kmer, &mut self.rc_buf)?);
                n += 1;
            }
            forks += n.saturating_sub(1);

            let Some((&(last_a, last_support), rest)) = valid[..n].split_last() else {
                continue;
            };
            let mut route = |ext: Vec<u8>, support: usize| {
                if support >= p.base_threshold {
                    if reconnected.is_none() {
                        reconnected = Some(Reach { path: ext, support });
                    }
                } else {
                    next.push(ext);
                }
            };
            for &(a, support) in rest {
                let mut ext = path.clone();
                ext.push(a);
                route(ext, support);
            }
            let mut ext = path;
            ext.push(last_a);
            route(ext, last_support);
        }

        if let Some(reach) = reconnected {
            return Ok(Step::Reconnected(reach));
        }
        *used += forks;
        Ok(if *used > p.max_branches {
            Step::Abandoned(AbandonReason::BranchBudgetExceeded)
        } else if next.is_empty() {
            Step::Abandoned(AbandonReason::DeadEnd)
        } else {
            Step::Frontier(next)
        })
    }

    fn assemble(&self, left: Reach, right: Reach) -> Bubble {
        let k = self.params.kmer;
        // left.path 从反向互补的种子向外延伸
        let mut sequence = dna::revcomp(&left.path);
        sequence.extend_from_slice(&right.path[k..]);
        let (mut left_support, mut right_support) = (left.support, right.support);
        if !dna::is_canonical(&sequence) {
            sequence = dna::revcomp(&sequence);
            std::mem::swap(&mut left_support, &mut right_support);
        }
        Bubble { sequence, anchor_len: k, left_support, right_support, reference: None }
    }
}
