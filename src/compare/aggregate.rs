use std::fmt;
use std::io::Write;
use std::ops::AddAssign;
use std::sync::Mutex;

use crate::compare::walk::{AbandonReason, Bubble};
use crate::error::Result;
use crate::util::dna;

/// FASTA 输出每行字符数
const LINE_WIDTH: usize = 60;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AggregateStatistics {
    pub sequences: u64,
    pub kmers_examined: u64,
    pub kmers_novel: u64,
    pub seeds_claimed: u64,
    pub seeds_already_claimed: u64,
    pub bubbles: u64,
    pub redundant: u64,
    pub abandoned_branch: u64,
    pub abandoned_dead_end: u64,
    pub abandoned_length: u64,
}

impl AggregateStatistics {
    pub fn record_abandon(&mut self, reason: AbandonReason) {
        match reason {
            AbandonReason::BranchBudgetExceeded => self.abandoned_branch += 1,
            AbandonReason::DeadEnd => self.abandoned_dead_end += 1,
            AbandonReason::LengthExceeded => self.abandoned_length += 1,
        }
    }

    pub fn abandoned(&self) -> u64 {
        self.abandoned_branch + self.abandoned_dead_end + self.abandoned_length
    }
}

impl AddAssign for AggregateStatistics {
    fn add_assign(&mut self, o: Self) {
        self.sequences += o.sequences;
        self.kmers_examined += o.kmers_examined;
        self.kmers_novel += o.kmers_novel;
        self.seeds_claimed += o.seeds_claimed;
        self.seeds_already_claimed += o.seeds_already_claimed;
        self.bubbles += o.bubbles;
        self.redundant += o.redundant;
        self.abandoned_branch += o.abandoned_branch;
        self.abandoned_dead_end += o.abandoned_dead_end;
        self.abandoned_length += o.abandoned_length;
    }
}

impl fmt::Display for AggregateStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sequences processed:     {}", self.sequences)?;
        writeln!(f, "k-mers examined:         {}", self.kmers_examined)?;
        writeln!(f, "novel k-mers:            {}", self.kmers_novel)?;
        writeln!(f, "seeds claimed:           {}", self.seeds_claimed)?;
        writeln!(f, "seeds already claimed:   {}", self.seeds_already_claimed)?;
        writeln!(f, "bubbles emitted:         {}", self.bubbles)?;
        writeln!(f, "redundant walks:         {}", self.redundant)?;
        writeln!(f, "abandoned (branching):   {}", self.abandoned_branch)?;
        writeln!(f, "abandoned (dead end):    {}", self.abandoned_dead_end)?;
        write!(f, "abandoned (max length):  {}", self.abandoned_length)
    }
}

/// 结果汇总：bubble 写出与统计合并，各自由一把互斥锁保护。
pub struct ResultAggregator<W: Write + Send> {
    out: Mutex<(W, u64)>,
    stats: Mutex<AggregateStatistics>,
}

impl<W: Write + Send> ResultAggregator<W> {
    pub fn new(out: W) -> Self {
        Self { out: Mutex::new((out, 0)), stats: Mutex::new(AggregateStatistics::default()) }
    }

    /// 以 FASTA 记录写出一个 bubble；记录之间不会交错。
    pub fn emit(&self, bubble: &Bubble) -> Result<()> {
        let mut guard = self.out.lock().unwrap_or_else(|e| e.into_inner());
        let (w, n) = &mut *guard;
        *n += 1;
        let reference = match &bubble.reference {
            Some(hit) => format!("{}:{}:{}", hit.name, hit.offset + 1, if hit.reverse { '-' } else { '+' }),
            None => "*".to_string(),
        };
        writeln!(
            w,
            ">bubble-{} len={} divergent={} support={},{} ref={}",
            n,
            bubble.sequence.len(),
            bubble.divergent().len(),
            bubble.left_support,
            bubble.right_support,
            reference
        )?;
        let ascii = dna::decode(&bubble.sequence);
        for line in ascii.chunks(LINE_WIDTH) {
            w.write_all(line)?;
            w.write_all(b"\n")?;
        }
        Ok(())
    }

    pub fn merge_stats(&self, delta: AggregateStatistics) {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner()) += delta;
    }

    pub fn report(&self) -> AggregateStatistics {
        *self.stats.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn emitted(&self) -> u64 {
        self.out.lock().unwrap_or_else(|e| e.into_inner()).1
    }

    /// 刷新并交回底层 writer
    pub fn finish(self) -> Result<W> {
        let (mut w, _) = self.out.into_inner().unwrap_or_else(|e| e.into_inner());
        w.flush()?;
        Ok(w)
    }
}
