//! 像素格式定义.
//!
//! 定义了解码输出表面中像素的存储格式. 面向小尺寸嵌入式屏幕,
//! 只包含单平面打包格式.

use std::fmt;

/// 像素格式
///
/// 命名规则: 颜色模型 + 位深 + 字节序 (LE/BE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum PixelFormat {
    /// 未指定
    None,
    /// RGB 5-6-5 打包, 16 位小端存储 (MCU 本地字节序)
    Rgb565le,
    /// RGB 5-6-5 打包, 16 位大端存储 (SPI 屏幕 DMA 直推的字节交换形式)
    Rgb565be,
    /// RGB 各 8 位, 打包
    Rgb24,
    /// 8 位调色板索引, 附带 256 色调色板
    Pal8,
}

impl PixelFormat {
    /// 每像素字节数
    pub const fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Pal8 => 1,
            Self::Rgb565le | Self::Rgb565be => 2,
            Self::Rgb24 => 3,
        }
    }

    /// 是否为调色板格式
    pub const fn is_paletted(&self) -> bool {
        matches!(self, Self::Pal8)
    }

    /// 计算每行字节数 (linesize / stride)
    ///
    /// # 返回
    /// - `Some(bytes)`: 每行字节数
    /// - `None`: 格式为 None
    pub fn linesize(&self, width: u32) -> Option<usize> {
        if *self == Self::None {
            return None;
        }
        Some(width as usize * self.bytes_per_pixel())
    }

    /// 计算整帧的字节数
    ///
    /// 调色板本身不计入.
    pub fn frame_size(&self, width: u32, height: u32) -> Option<usize> {
        Some(self.linesize(width)? * height as usize)
    }

    /// 按名称解析 (命令行等场景)
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "rgb565le" | "rgb565" => Some(Self::Rgb565le),
            "rgb565be" => Some(Self::Rgb565be),
            "rgb24" => Some(Self::Rgb24),
            "pal8" => Some(Self::Pal8),
            _ => None,
        }
    }
}

impl fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::None => "none",
            Self::Rgb565le => "rgb565le",
            Self::Rgb565be => "rgb565be",
            Self::Rgb24 => "rgb24",
            Self::Pal8 => "pal8",
        };
        write!(f, "{name}")
    }
}
