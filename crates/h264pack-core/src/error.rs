//! 统一错误类型定义.
//!
//! 所有 h264pack crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// h264pack 统一错误类型
#[derive(Debug, Error)]
pub enum PackError {
    /// 无效参数 (配置或头部字段超出范围)
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// I/O 错误 (输入不可读或输出不可写)
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 比特流已读到末尾
    #[error("已到达比特流末尾")]
    Eof,

    /// 码流结构损坏 (SPS 截断, Exp-Golomb 码非法等)
    #[error("码流损坏: {0}")]
    MalformedBitstream(String),

    /// SPS 使用了解析器拒绝处理的特性
    #[error("不支持的 SPS 特性: {0}")]
    UnsupportedSpsFeature(String),

    /// 无效数据 (头部记录损坏, 尺寸溢出等)
    #[error("无效数据: {0}")]
    InvalidData(String),
}

/// h264pack 统一 Result 类型
pub type PackResult<T> = Result<T, PackError>;
