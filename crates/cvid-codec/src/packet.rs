//! 压缩数据包 (Packet).
//!
//! 表示从容器格式中读取的一帧压缩数据.

use bytes::Bytes;
use cvid_core::Palette;

/// 压缩数据包
///
/// 一个 Packet 对应恰好一帧 Cinepak 压缩数据.
#[derive(Debug, Clone)]
pub struct Packet {
    /// 压缩数据
    pub data: Bytes,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 是否为关键帧 (容器索引标记, 调用方据此决定负载过高时能否丢帧, 解码器不解释)
    pub is_keyframe: bool,
    /// 调色板侧数据 (AVI `xxpc` 调色板变更块等)
    pub palette: Option<Palette>,
}

/// 未指定的时间戳
pub const NOPTS_VALUE: i64 = i64::MIN;

impl Packet {
    /// 创建空数据包
    pub fn empty() -> Self {
        Self {
            data: Bytes::new(),
            pts: NOPTS_VALUE,
            is_keyframe: false,
            palette: None,
        }
    }

    /// 从数据创建数据包
    pub fn from_data(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            ..Self::empty()
        }
    }

    /// 数据大小 (字节)
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 是否为空包 (flush packet)
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
