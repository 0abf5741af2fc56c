//! 索引文件：`<prefix>.fmi`（BWT + 序列目录）与 `<prefix>.ssa`（完整 SA）。
//!
//! Occ 采样与坐标采样都在加载时按采样率重建，文件本身与采样率无关。

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{DiffError, Result};
use crate::index::fm::FullTextIndex;
use crate::index::locate::CoordinateLocator;

pub const FMI_EXT: &str = "fmi";
pub const SSA_EXT: &str = "ssa";

/// 序列目录项：名称、长度、在拼接文本中的起始偏移
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SeqEntry {
    pub name: String,
    pub len: u32,
    pub offset: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IndexMeta {
    pub source_file: Option<String>,
    pub build_args: Option<String>,
    pub build_timestamp: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexFile {
    /// 声明的 BWT 长度，加载时与实际内容核对
    pub len: u64,
    pub bwt: Vec<u8>,
    pub directory: Vec<SeqEntry>,
    pub meta: IndexMeta,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SuffixArrayFile {
    pub sa: Vec<u32>,
    pub directory: Vec<SeqEntry>,
}

/// 去掉扩展名得到索引前缀：`reads/base.fa` -> `reads/base`
pub fn index_prefix(path: &str) -> String {
    let p = std::path::Path::new(path);
    match p.extension() {
        Some(_) => p.with_extension("").to_string_lossy().into_owned(),
        None => path.to_string(),
    }
}

pub fn index_path(prefix: &str, ext: &str) -> String {
    format!("{}.{}", prefix, ext)
}

fn save_bincode<T: Serialize>(value: &T, path: &str) -> Result<()> {
    let f = std::fs::File::create(path)?;
    let mut w = std::io::BufWriter::new(f);
    bincode::serialize_into(&mut w, value)
        .map_err(|e| DiffError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
    Ok(())
}

fn load_bincode<T: DeserializeOwned>(path: &str) -> Result<T> {
    let f = std::fs::File::open(path).map_err(|e| DiffError::load(path, e))?;
    bincode::deserialize_from(std::io::BufReader::new(f)).map_err(|e| DiffError::load(path, e))
}

impl IndexFile {
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        save_bincode(self, path)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        load_bincode(path)
    }

    pub fn into_index(self, sample_rate: usize) -> Result<FullTextIndex> {
        FullTextIndex::from_bwt(self.bwt, self.len, self.directory.len() as u32, sample_rate)
    }
}

impl SuffixArrayFile {
    pub fn save_to_file(&self, path: &str) -> Result<()> {
        save_bincode(self, path)
    }

    pub fn load_from_file(path: &str) -> Result<Self> {
        load_bincode(path)
    }

    pub fn into_locator(self, sample_rate: usize) -> Result<CoordinateLocator> {
        CoordinateLocator::from_suffix_array(&self.sa, self.directory, sample_rate)
    }
}

/// 加载 `<prefix>.fmi`，返回索引与序列目录
pub fn load_index(prefix: &str, sample_rate: usize) -> Result<FullTextIndex> {
    let path = index_path(prefix, FMI_EXT);
    let file = IndexFile::load_from_file(&path)?;
    log::debug!(
        "{}: {} symbols, {} sequences, built {}",
        path,
        file.len,
        file.directory.len(),
        file.meta.build_timestamp.as_deref().unwrap_or("?")
    );
    file.into_index(sample_rate)
}

pub fn load_locator(prefix: &str, sample_rate: usize) -> Result<CoordinateLocator> {
    let path = index_path(prefix, SSA_EXT);
    SuffixArrayFile::load_from_file(&path)?.into_locator(sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::build::build_collection;

    fn temp_prefix(tag: &str) -> String {
        let dir = std::env::temp_dir();
        dir.join(format!("graph_diff_store_{}_{}", tag, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[test]
    fn prefix_strips_extension() {
        assert_eq!(index_prefix("reads/base.fa"), "reads/base");
        assert_eq!(index_prefix("variant"), "variant");
    }

    #[test]
    fn save_then_load_with_other_sample_rate() {
        let built = build_collection(vec![
            ("r1".to_string(), b"ACGTACGGT".to_vec()),
            ("r2".to_string(), b"TTGACA".to_vec()),
        ])
        .unwrap();
        let prefix = temp_prefix("roundtrip");
        built.index.save_to_file(&index_path(&prefix, FMI_EXT)).unwrap();
        built.sa.save_to_file(&index_path(&prefix, SSA_EXT)).unwrap();

        let idx = load_index(&prefix, 3).unwrap();
        assert_eq!(idx.len(), 17);
        assert_eq!(idx.sample_rate(), 3);
        let loc = load_locator(&prefix, 4).unwrap();
        assert_eq!(loc.directory().len(), 2);

        let _ = std::fs::remove_file(index_path(&prefix, FMI_EXT));
        let _ = std::fs::remove_file(index_path(&prefix, SSA_EXT));
    }

    #[test]
    fn missing_file_is_load_error() {
        let err = load_index(&temp_prefix("missing"), 16).unwrap_err();
        assert!(matches!(err, DiffError::IndexLoad { .. }));
    }

    #[test]
    fn garbage_file_is_load_error() {
        let prefix = temp_prefix("garbage");
        let path = index_path(&prefix, FMI_EXT);
        std::fs::write(&path, b"not an index").unwrap();
        let err = load_index(&prefix, 16).unwrap_err();
        assert!(matches!(err, DiffError::IndexLoad { .. }));
        let _ = std::fs::remove_file(path);
    }
}
