//! variant 与 base 的比较：种子、有界游走、去重与结果输出。

pub mod aggregate;
pub mod bitvec;
pub mod dispatch;
pub mod walk;
pub mod worker;

use std::fs::File;
use std::io::BufWriter;

use crate::error::{DiffError, Result};
use crate::index::{self, CoordinateLocator, IndexedCollection};
use crate::io::{self, SeqRecord, SequenceTable};
use crate::util::dna;

pub use aggregate::{AggregateStatistics, ResultAggregator};
pub use bitvec::DedupBitVector;
pub use dispatch::Dispatcher;
pub use walk::{AbandonReason, Bubble, BranchingWalker, WalkResult};
pub use worker::{SequenceWorker, WorkOutput, Worker};

/// 区间缓存深度上限（4^12 项，128 MiB）
pub const MAX_CACHE_LENGTH: usize = 12;

/// `diff` 子命令的全部参数
#[derive(Clone, Debug)]
pub struct DiffOpt {
    pub base: String,
    pub variant: String,
    pub reference: String,
    pub out: String,
    pub kmer: usize,
    pub kmer_threshold: usize,
    pub base_threshold: usize,
    pub max_branches: usize,
    pub max_length: usize,
    pub threads: usize,
    pub sample_rate: usize,
    pub cache_length: usize,
    pub batch_size: usize,
}

impl Default for DiffOpt {
    fn default() -> Self {
        Self {
            base: String::new(),
            variant: String::new(),
            reference: String::new(),
            out: "variants.fa".to_string(),
            kmer: 55,
            kmer_threshold: 2,
            base_threshold: 1,
            max_branches: 0,
            max_length: 10_000,
            threads: 1,
            sample_rate: 128,
            cache_length: 10,
            batch_size: 1000,
        }
    }
}

impl DiffOpt {
    pub fn validate(&self) -> Result<()> {
        let bad = |msg: String| Err(DiffError::Configuration(msg));
        if self.base.is_empty() || self.variant.is_empty() {
            return bad("a --base and --variant file must be provided".into());
        }
        if self.reference.is_empty() {
            return bad("a --reference file must be provided".into());
        }
        if self.threads == 0 {
            return bad(format!("invalid number of threads: {}", self.threads));
        }
        if self.kmer < 2 {
            return bad(format!("k-mer length must be at least 2, got {}", self.kmer));
        }
        if self.kmer_threshold == 0 || self.base_threshold == 0 {
            return bad("occurrence thresholds must be positive".into());
        }
        if self.sample_rate == 0 {
            return bad("sample rate must be positive".into());
        }
        if self.cache_length == 0 || self.cache_length > MAX_CACHE_LENGTH || self.cache_length > self.kmer {
            return bad(format!(
                "cache length must be in 1..={} and not exceed k ({}), got {}",
                MAX_CACHE_LENGTH, self.kmer, self.cache_length
            ));
        }
        if self.batch_size == 0 || self.max_length == 0 {
            return bad("batch size and max walk length must be positive".into());
        }
        Ok(())
    }
}

/// bubble 锚点在参考序列上的位置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceHit {
    pub name: String,
    /// 锚点在参考正链上的 0 起始偏移
    pub offset: u32,
    pub reverse: bool,
}

/// 参考序列索引、坐标定位器，以及建索引所用的原始序列
#[derive(Debug)]
pub struct ReferenceCollection {
    pub indexed: IndexedCollection,
    pub locator: CoordinateLocator,
    pub table: SequenceTable,
}

impl ReferenceCollection {
    pub fn from_records(records: Vec<SeqRecord>, sample_rate: usize, cache_depth: usize) -> Result<Self> {
        let built = index::build::build_collection(records.iter().map(|r| (r.id.clone(), r.seq.clone())))?;
        let idx = built.index.into_index(sample_rate)?;
        let locator = built.sa.into_locator(sample_rate)?;
        let table = SequenceTable::from_records(records.into_iter().map(Ok))?;
        Ok(Self { indexed: IndexedCollection::new(idx, cache_depth), locator, table })
    }

    /// 在两条链上查找 `anchor`，并解析其第一次出现的位置。
    ///
    /// 定位结果会与序列表核对；不一致说明序列表与索引并非来自同一文件。
    pub fn place(&self, anchor: &[u8], rc_buf: &mut Vec<u8>) -> Result<Option<ReferenceHit>> {
        let hits = self.indexed.strand_intervals(anchor, rc_buf);
        let (iv, reverse) = if hits.fwd.width()? > 0 {
            (hits.fwd, false)
        } else if hits.rev.width()? > 0 {
            (hits.rev, true)
        } else {
            return Ok(None);
        };
        let loc = self.locator.locate(&self.indexed.index, iv.lo)?;
        let entry = &self.locator.directory()[loc.sequence_id as usize];
        let rec = self.table.by_id(&entry.name).ok_or_else(|| {
            DiffError::IndexCorrupt(format!("reference table has no sequence '{}'", entry.name))
        })?;
        let start = loc.offset as usize;
        let expected: &[u8] = if reverse { rc_buf.as_slice() } else { anchor };
        let slice = rec.seq.get(start..start + anchor.len()).map(dna::encode);
        if slice.as_deref() != Some(expected) {
            return Err(DiffError::IndexCorrupt(format!(
                "reference '{}' at {} does not match its index",
                entry.name, start
            )));
        }
        Ok(Some(ReferenceHit { name: entry.name.clone(), offset: loc.offset, reverse }))
    }
}

/// 整个运行期间所有 worker 共享的只读状态。
///
/// `claims` 记录已认领的种子与已探索的区域，`emitted` 记录已写出的 bubble 所覆盖的 k-mer。
#[derive(Debug)]
pub struct ComparisonParameters<'a> {
    pub base: &'a IndexedCollection,
    pub variant: &'a IndexedCollection,
    pub reference: &'a ReferenceCollection,
    pub claims: &'a DedupBitVector,
    pub emitted: &'a DedupBitVector,
    pub kmer: usize,
    pub kmer_threshold: usize,
    pub base_threshold: usize,
    pub max_branches: usize,
    pub max_length: usize,
}

impl<'a> ComparisonParameters<'a> {
    pub fn new(
        base: &'a IndexedCollection,
        variant: &'a IndexedCollection,
        reference: &'a ReferenceCollection,
        claims: &'a DedupBitVector,
        emitted: &'a DedupBitVector,
        opt: &DiffOpt,
    ) -> Self {
        Self {
            base,
            variant,
            reference,
            claims,
            emitted,
            kmer: opt.kmer,
            kmer_threshold: opt.kmer_threshold,
            base_threshold: opt.base_threshold,
            max_branches: opt.max_branches,
            max_length: opt.max_length,
        }
    }
}

fn load_collection(path: &str, opt: &DiffOpt) -> Result<IndexedCollection> {
    let prefix = index::store::index_prefix(path);
    let idx = index::store::load_index(&prefix, opt.sample_rate)?;
    log::info!("loaded index {} ({} symbols, {} sequences)", prefix, idx.len(), idx.n_sequences());
    let coll = IndexedCollection::new(idx, opt.cache_length);
    log::info!(
        "{}: index {} bytes, interval cache {} bytes",
        prefix,
        coll.index.heap_bytes(),
        coll.cache.heap_bytes()
    );
    Ok(coll)
}

fn load_reference(path: &str, opt: &DiffOpt) -> Result<ReferenceCollection> {
    let prefix = index::store::index_prefix(path);
    let indexed = load_collection(path, opt)?;
    let locator = index::store::load_locator(&prefix, opt.sample_rate)?;
    let table = SequenceTable::load(path).map_err(|e| DiffError::load(path, e))?;
    if table.is_empty() {
        return Err(DiffError::load(path, "reference file holds no sequences"));
    }
    if table.len() != locator.directory().len() {
        return Err(DiffError::IndexCorrupt(format!(
            "reference file has {} sequences, its index has {}",
            table.len(),
            locator.directory().len()
        )));
    }
    log::info!("reference locator keeps {} sampled rows", locator.sampled_rows());
    Ok(ReferenceCollection { indexed, locator, table })
}

/// 加载三个集合，把每条 variant 读段交给 worker 处理，bubble 写入 `opt.out`。
/// 返回合并后的统计。
pub fn run_diff(opt: &DiffOpt) -> Result<AggregateStatistics> {
    opt.validate()?;

    let base = load_collection(&opt.base, opt)?;
    let variant = load_collection(&opt.variant, opt)?;
    let reference = load_reference(&opt.reference, opt)?;

    let claims = DedupBitVector::new(variant.index.len());
    let emitted = DedupBitVector::new(variant.index.len());
    let params = ComparisonParameters::new(&base, &variant, &reference, &claims, &emitted, opt);

    let out = File::create(&opt.out).map_err(|e| {
        DiffError::Io(std::io::Error::new(e.kind(), format!("cannot create '{}': {}", opt.out, e)))
    })?;
    let aggregator = ResultAggregator::new(BufWriter::new(out));

    let input = io::open_sequences(&opt.variant)?;
    Dispatcher::new(opt.threads, opt.batch_size).run(input, || Worker::new(&params), &aggregator)?;

    let stats = aggregator.report();
    let written = aggregator.emitted();
    aggregator.finish()?;
    log::info!("{} of {} variant rows claimed", claims.count_set(), claims.len());
    log::info!("finished: {} bubbles written to {}", written, opt.out);
    Ok(stats)
}
