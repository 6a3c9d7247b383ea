//! 256 色调色板与抖动类型.
//!
//! 调色板有两种来源: 容器随流提供的调色板 (AVI `RGBQUAD` 或打包 RGB),
//! 以及显示层为抖动输出指定的目标调色板.

use std::fmt;

use crate::{CvidError, CvidResult};

/// 调色板条目数
pub const PALETTE_SIZE: usize = 256;

/// 抖动类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DitherType {
    /// Video for Windows 有序抖动 (默认 221 色调色板查表)
    Vfw,
    /// QuickTime 抖动 (RGB554 泛洪填充查表 + 误差修正平面)
    QuickTime,
}

impl DitherType {
    /// 按名称解析
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "vfw" => Some(Self::Vfw),
            "qt" | "quicktime" => Some(Self::QuickTime),
            _ => None,
        }
    }
}

impl fmt::Display for DitherType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Vfw => write!(f, "vfw"),
            Self::QuickTime => write!(f, "quicktime"),
        }
    }
}

/// 256 色 RGB 调色板
#[derive(Clone, PartialEq, Eq)]
pub struct Palette {
    entries: [[u8; 3]; PALETTE_SIZE],
}

impl Palette {
    /// 灰度渐变调色板 (索引 i 对应 (i, i, i))
    pub fn grayscale() -> Self {
        let mut entries = [[0u8; 3]; PALETTE_SIZE];
        for (i, e) in entries.iter_mut().enumerate() {
            *e = [i as u8; 3];
        }
        Self { entries }
    }

    /// 从打包 RGB 数据创建 (每条目 3 字节, 共 768 字节)
    pub fn from_rgb(data: &[u8]) -> CvidResult<Self> {
        if data.len() != PALETTE_SIZE * 3 {
            return Err(CvidError::InvalidArgument(format!(
                "调色板需要 {} 字节 RGB 数据, 实际 {}",
                PALETTE_SIZE * 3,
                data.len(),
            )));
        }
        let mut entries = [[0u8; 3]; PALETTE_SIZE];
        for (e, rgb) in entries.iter_mut().zip(data.chunks_exact(3)) {
            e.copy_from_slice(rgb);
        }
        Ok(Self { entries })
    }

    /// 从 AVI `RGBQUAD` 数据创建 (每条目 B, G, R, 保留)
    ///
    /// 条目不足 256 个时, 其余条目为黑色.
    pub fn from_bgr_quads(data: &[u8]) -> CvidResult<Self> {
        if data.len() % 4 != 0 || data.len() > PALETTE_SIZE * 4 {
            return Err(CvidError::InvalidArgument(format!(
                "RGBQUAD 调色板长度无效: {}",
                data.len(),
            )));
        }
        let mut entries = [[0u8; 3]; PALETTE_SIZE];
        for (e, quad) in entries.iter_mut().zip(data.chunks_exact(4)) {
            *e = [quad[2], quad[1], quad[0]];
        }
        Ok(Self { entries })
    }

    /// 获取指定索引的 RGB
    pub fn entry(&self, index: u8) -> [u8; 3] {
        self.entries[index as usize]
    }

    /// 全部条目
    pub fn entries(&self) -> &[[u8; 3]; PALETTE_SIZE] {
        &self.entries
    }

    /// 导出为打包 RGB (768 字节)
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.entries.iter().flatten().copied().collect()
    }
}

impl Default for Palette {
    fn default() -> Self {
        Self::grayscale()
    }
}

impl fmt::Debug for Palette {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Palette")
            .field("first", &self.entries[0])
            .field("last", &self.entries[PALETTE_SIZE - 1])
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grayscale() {
        let pal = Palette::grayscale();
        assert_eq!(pal.entry(0), [0, 0, 0]);
        assert_eq!(pal.entry(128), [128, 128, 128]);
        assert_eq!(pal.entry(255), [255, 255, 255]);
    }

    #[test]
    fn test_from_rgb() {
        let data: Vec<u8> = (0..768).map(|i| (i % 251) as u8).collect();
        let pal = Palette::from_rgb(&data).unwrap();
        assert_eq!(pal.entry(1), [3, 4, 5]);
        assert_eq!(pal.to_rgb_bytes(), data);
        assert!(Palette::from_rgb(&data[..700]).is_err());
    }

    #[test]
    fn test_from_bgr_quads_swaps_channels() {
        let data = [10u8, 20, 30, 0, 1, 2, 3, 0];
        let pal = Palette::from_bgr_quads(&data).unwrap();
        assert_eq!(pal.entry(0), [30, 20, 10]);
        assert_eq!(pal.entry(1), [3, 2, 1]);
        assert_eq!(pal.entry(2), [0, 0, 0]);
        assert!(Palette::from_bgr_quads(&data[..6]).is_err());
    }

    #[test]
    fn test_dither_type_names() {
        assert_eq!(DitherType::from_name("VFW"), Some(DitherType::Vfw));
        assert_eq!(DitherType::from_name("qt"), Some(DitherType::QuickTime));
        assert_eq!(DitherType::from_name("floyd"), None);
    }
}
