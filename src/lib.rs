//! # graph-diff
//!
//! 基于 FM 索引的读段集合比较：找出只在 variant 读段集合中出现、
//! 在 base 集合中缺失的序列（bubble），并在参考序列上给出锚点坐标。
//!
//! 流程概要：
//!
//! - **索引**：每个集合一份 BWT + 分块 Occ 采样，外加定长前缀区间缓存
//! - **种子**：variant 中频繁、base 中缺失的 k-mer（两条链合计计数）
//! - **游走**：在隐式 k-mer 图上向两侧有界扩展，直到重新连回 base
//! - **去重**：位向量按 SA 区间认领种子与已探索区域，每个分歧区域只游走一次、只写出一次
//!
//! ## 快速示例
//!
//! ```rust,no_run
//! use graph_diff::index::IndexedCollection;
//! use graph_diff::util::dna;
//!
//! let reads = vec![("r1".to_string(), b"ACGTACGTAGCTGATCGTAG".to_vec())];
//! let coll = IndexedCollection::from_sequences(reads, 32, 4).unwrap();
//!
//! let mut rc = Vec::new();
//! let n = coll.strand_count(&dna::encode(b"GCTGATC"), &mut rc).unwrap();
//! println!("GCTGATC occurs {} times on either strand", n);
//! ```
//!
//! ## 模块说明
//!
//! - [`io`]：FASTA / FASTQ 解析与参考序列表
//! - [`index`]：FM 索引构建、存储、区间缓存与坐标定位
//! - [`compare`]：种子认领、分支游走、多线程调度与结果输出
//! - [`util`]：DNA 编码 / 反向互补等工具函数
//! - [`error`]：库错误类型

pub mod compare;
pub mod error;
pub mod index;
pub mod io;
pub mod util;
