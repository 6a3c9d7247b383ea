//! 统一错误类型定义.
//!
//! 所有 cvid crate 共用的错误类型, 支持跨模块传播.

use thiserror::Error;

/// 统一错误类型
#[derive(Debug, Error)]
pub enum CvidError {
    /// 无效参数
    #[error("无效参数: {0}")]
    InvalidArgument(String),

    /// 不支持的操作
    #[error("不支持的操作: {0}")]
    Unsupported(String),

    /// 编解码器错误 (状态误用等)
    #[error("编解码器错误: {0}")]
    Codec(String),

    /// 数据不足, 需要更多输入
    #[error("数据不足, 需要更多输入")]
    NeedMoreData,

    /// 已到达流末尾
    #[error("已到达流末尾")]
    Eof,

    /// 未找到指定的编解码器
    #[error("未找到编解码器: {0}")]
    CodecNotFound(String),

    /// 无效数据 (损坏的码流等)
    #[error("无效数据: {0}")]
    InvalidData(String),

    /// 条带几何违例 (尺寸不是 4 的倍数或超出帧边界), 不可恢复
    #[error("无效几何: {0}")]
    InvalidGeometry(String),
}

/// 统一 Result 类型
pub type CvidResult<T> = Result<T, CvidError>;
