//! 编解码器标识符.
//!
//! 为每种编解码算法分配唯一标识, 并负责容器 FourCC 到标识符的映射.

use std::fmt;

/// 编解码器标识符
///
/// 唯一标识一种编解码算法, 与容器格式无关.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum CodecId {
    /// 未知编解码器
    None,
    /// Cinepak (Radius/SuperMac CVID), AVI 与 QuickTime 中均使用
    Cinepak,
}

impl CodecId {
    /// 从容器中的 FourCC 查找编解码器
    ///
    /// AVI 的 `strh.fccHandler`/`strf.biCompression` 与 QuickTime 的 sample description
    /// 都使用 `cvid`, 部分编码器写成大写.
    pub fn from_fourcc(fourcc: &[u8; 4]) -> Self {
        match fourcc {
            b"cvid" | b"CVID" => Self::Cinepak,
            _ => Self::None,
        }
    }

    /// 获取编解码器的人类可读名称
    pub const fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Cinepak => "cinepak",
        }
    }
}

impl fmt::Display for CodecId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
