//! 解码后的帧数据 (Frame).
//!
//! 表示一帧解码后的原始像素数据. Cinepak 输出均为单平面打包格式.

use cvid_core::{CvidError, CvidResult, Palette, PixelFormat};

use crate::packet::NOPTS_VALUE;

/// 视频帧
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// 像素数据 (单平面, 行主序)
    pub data: Vec<u8>,
    /// 每行字节数 (linesize / stride)
    pub linesize: usize,
    /// 宽度 (像素)
    pub width: u32,
    /// 高度 (像素)
    pub height: u32,
    /// 像素格式
    pub pixel_format: PixelFormat,
    /// 调色板 (仅 Pal8)
    pub palette: Option<Palette>,
    /// 调色板自上一帧以来是否变化, 显示层据此重新上传调色板
    pub palette_changed: bool,
    /// 显示时间戳 (PTS)
    pub pts: i64,
    /// 是否为关键帧
    pub is_keyframe: bool,
}

impl VideoFrame {
    /// 创建全零视频帧
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        let linesize = pixel_format.linesize(width).unwrap_or(0);
        Self {
            data: vec![0; linesize * height as usize],
            linesize,
            width,
            height,
            pixel_format,
            palette: None,
            palette_changed: false,
            pts: NOPTS_VALUE,
            is_keyframe: false,
        }
    }

    /// 转换为打包 RGB24 (用于导出与显示)
    ///
    /// RGB565 按 5/6 位扩展到 8 位 (高位复制到低位), Pal8 经调色板查表.
    pub fn to_rgb24(&self) -> CvidResult<Vec<u8>> {
        let w = self.width as usize;
        let h = self.height as usize;
        let mut out = Vec::with_capacity(w * h * 3);
        if w == 0 || h == 0 {
            return Ok(out);
        }
        if self.linesize < w * self.pixel_format.bytes_per_pixel()
            || self.data.len() < self.linesize * h
        {
            return Err(CvidError::InvalidData(format!(
                "帧数据不足: linesize={}, 数据 {} 字节",
                self.linesize,
                self.data.len(),
            )));
        }

        match self.pixel_format {
            PixelFormat::Rgb24 => {
                for row in self.data.chunks(self.linesize).take(h) {
                    out.extend_from_slice(&row[..w * 3]);
                }
            }
            PixelFormat::Rgb565le | PixelFormat::Rgb565be => {
                let big_endian = self.pixel_format == PixelFormat::Rgb565be;
                for row in self.data.chunks(self.linesize).take(h) {
                    for px in row[..w * 2].chunks_exact(2) {
                        let v = if big_endian {
                            u16::from_be_bytes([px[0], px[1]])
                        } else {
                            u16::from_le_bytes([px[0], px[1]])
                        };
                        out.extend_from_slice(&rgb565_to_rgb(v));
                    }
                }
            }
            PixelFormat::Pal8 => {
                let palette = self.palette.as_ref().ok_or_else(|| {
                    CvidError::InvalidData("Pal8 帧缺少调色板".into())
                })?;
                for row in self.data.chunks(self.linesize).take(h) {
                    for &index in &row[..w] {
                        out.extend_from_slice(&palette.entry(index));
                    }
                }
            }
            other => {
                return Err(CvidError::Unsupported(format!(
                    "不支持将 {} 转换为 RGB24",
                    other
                )));
            }
        }
        Ok(out)
    }
}

/// RGB565 扩展为 8 位 RGB
fn rgb565_to_rgb(v: u16) -> [u8; 3] {
    let r = ((v >> 11) & 0x1F) as u8;
    let g = ((v >> 5) & 0x3F) as u8;
    let b = (v & 0x1F) as u8;
    [(r << 3) | (r >> 2), (g << 2) | (g >> 4), (b << 3) | (b >> 2)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rgb565_le_and_be_expand_same() {
        let mut le = VideoFrame::new(1, 1, PixelFormat::Rgb565le);
        le.data = 0xF800u16.to_le_bytes().to_vec();
        let mut be = VideoFrame::new(1, 1, PixelFormat::Rgb565be);
        be.data = 0xF800u16.to_be_bytes().to_vec();
        assert_eq!(le.to_rgb24().unwrap(), vec![255, 0, 0]);
        assert_eq!(be.to_rgb24().unwrap(), vec![255, 0, 0]);
    }

    #[test]
    fn test_pal8_requires_palette() {
        let mut frame = VideoFrame::new(2, 1, PixelFormat::Pal8);
        frame.data = vec![3, 200];
        assert!(frame.to_rgb24().is_err());
        frame.palette = Some(Palette::grayscale());
        assert_eq!(frame.to_rgb24().unwrap(), vec![3, 3, 3, 200, 200, 200]);
    }

    #[test]
    fn test_new_allocates_by_linesize() {
        let frame = VideoFrame::new(8, 4, PixelFormat::Rgb24);
        assert_eq!(frame.linesize, 24);
        assert_eq!(frame.data.len(), 96);
    }
}
