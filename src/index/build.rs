//! 由序列集合生成可加载的索引文件（SA → BWT）。
//!
//! 构建仅服务于 `graph-diff index` 和测试：倍增法排序，O(n log² n)。

use crate::error::{DiffError, Result};
use crate::index::store::{IndexFile, IndexMeta, SeqEntry, SuffixArrayFile};
use crate::util::dna::{self, SEP};

pub struct BuiltCollection {
    pub index: IndexFile,
    pub sa: SuffixArrayFile,
}

/// 拼接序列：每条序列编码后跟一个分隔符 $。
pub fn concat_collection<I>(records: I) -> Result<(Vec<u8>, Vec<SeqEntry>)>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let mut text: Vec<u8> = Vec::new();
    let mut directory = Vec::new();
    for (name, seq) in records {
        let offset = text.len();
        text.extend(dna::encode(&seq));
        let len = text.len() - offset;
        text.push(SEP);
        if text.len() >= u32::MAX as usize {
            return Err(DiffError::Configuration(format!(
                "collection exceeds {} symbols at sequence '{}'",
                u32::MAX,
                name
            )));
        }
        directory.push(SeqEntry { name, len: len as u32, offset: offset as u32 });
    }
    Ok((text, directory))
}

/// 后缀数组（倍增法）。文本中的多个 0 均视为同一个最小字符，
/// 相同前缀的比较会越过分隔符继续，保证 Occ/C 反向搜索对不含 $ 的模式正确。
pub fn suffix_array(text: &[u8]) -> Vec<u32> {
    let n = text.len();
    if n == 0 {
        return Vec::new();
    }
    let mut sa: Vec<usize> = (0..n).collect();
    let mut rank: Vec<i64> = text.iter().map(|&b| b as i64).collect();
    let mut next: Vec<i64> = vec![0; n];

    let mut k = 1usize;
    loop {
        let key = |i: usize, rank: &[i64]| (rank[i], if i + k < n { rank[i + k] } else { -1 });
        sa.sort_unstable_by_key(|&i| key(i, &rank));

        next[sa[0]] = 0;
        for w in 1..n {
            let bump = key(sa[w], &rank) != key(sa[w - 1], &rank);
            next[sa[w]] = next[sa[w - 1]] + i64::from(bump);
        }
        std::mem::swap(&mut rank, &mut next);

        if rank[sa[n - 1]] as usize == n - 1 || k >= n {
            break;
        }
        k <<= 1;
    }

    sa.into_iter().map(|x| x as u32).collect()
}

/// 循环 BWT：BWT[i] = text[SA[i] - 1]，SA[i] = 0 时取末尾的 $。
pub fn bwt_from_sa(text: &[u8], sa: &[u32]) -> Vec<u8> {
    let n = text.len();
    sa.iter()
        .map(|&p| {
            let i = p as usize;
            if i == 0 { text[n - 1] } else { text[i - 1] }
        })
        .collect()
}

pub fn build_collection<I>(records: I) -> Result<BuiltCollection>
where
    I: IntoIterator<Item = (String, Vec<u8>)>,
{
    let (text, directory) = concat_collection(records)?;
    if directory.is_empty() {
        return Err(DiffError::Configuration("collection contains no sequences".into()));
    }
    let sa = suffix_array(&text);
    let bwt = bwt_from_sa(&text, &sa);
    Ok(BuiltCollection {
        index: IndexFile { len: bwt.len() as u64, bwt, directory: directory.clone(), meta: IndexMeta::default() },
        sa: SuffixArrayFile { sa, directory },
    })
}
