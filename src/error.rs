use thiserror::Error;

/// 索引加载、比较与结果输出中的错误。
///
/// 游走放弃不算错误，见 [`crate::compare::walk::WalkResult`]。
#[derive(Debug, Error)]
pub enum DiffError {
    /// 运行参数缺失或非法，在加载任何索引之前检出
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// 索引文件缺失、不可读或无法解码
    #[error("cannot load index '{path}': {reason}")]
    IndexLoad {
        /// 加载失败的文件
        path: String,
        /// 具体原因
        reason: String,
    },

    /// 内部一致性被破坏，此后的结果不可信
    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DiffError {
    pub(crate) fn load(path: &str, reason: impl std::fmt::Display) -> Self {
        DiffError::IndexLoad { path: path.to_string(), reason: reason.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, DiffError>;
