//! 解码输出目标.
//!
//! 向量解码循环把每个 4x4 像素块交给 [`BlockSink`]. 整帧解码写入 [`Surface`];
//! 流式解码写入一条 4 行高的带状缓冲区, 并通过回调把像素区域交给显示层.

use cvid_core::{CvidError, CvidResult, PixelFormat};

use super::convert::PixelBlock;

/// 4x4 像素块的接收方
pub trait BlockSink {
    /// 放置一个位于 (x, y) 的 4x4 块
    fn put_block(&mut self, x: u16, y: u16, block: &PixelBlock, bytes_per_pixel: usize);

    /// 以 `y` 为顶边的一行块已全部处理
    fn end_row(&mut self, _y: u16) {}
}

/// 整帧输出表面 (行主序, 单平面)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Surface {
    width: u16,
    height: u16,
    pixel_format: PixelFormat,
    linesize: usize,
    data: Vec<u8>,
}

impl Surface {
    /// 分配全零表面
    pub fn new(width: u16, height: u16, pixel_format: PixelFormat) -> CvidResult<Self> {
        let linesize = pixel_format.linesize(u32::from(width)).ok_or_else(|| {
            CvidError::InvalidArgument(format!("无法为 {} 分配表面", pixel_format))
        })?;
        Ok(Self {
            width,
            height,
            pixel_format,
            linesize,
            data: vec![0; linesize * height as usize],
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// 每行字节数
    pub fn linesize(&self) -> usize {
        self.linesize
    }

    /// 全部像素数据
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// 第 `y` 行
    pub fn row(&self, y: u16) -> &[u8] {
        let start = y as usize * self.linesize;
        &self.data[start..start + self.linesize]
    }

    /// (x, y) 处一个像素的字节
    pub fn pixel(&self, x: u16, y: u16) -> &[u8] {
        let bpp = self.pixel_format.bytes_per_pixel();
        let start = y as usize * self.linesize + x as usize * bpp;
        &self.data[start..start + bpp]
    }
}

impl BlockSink for Surface {
    fn put_block(&mut self, x: u16, y: u16, block: &PixelBlock, bytes_per_pixel: usize) {
        let offset = x as usize * bytes_per_pixel;
        let len = 4 * bytes_per_pixel;
        for (i, row) in block.rows.iter().enumerate() {
            let start = (y as usize + i) * self.linesize + offset;
            if let Some(dst) = self.data.get_mut(start..start + len) {
                dst.copy_from_slice(&row[..len]);
            }
        }
    }
}

/// 流式解码回调收到的像素区域
///
/// `pixels` 按行紧密排列, 行跨度为 `width * bytes_per_pixel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DrawRegion<'a> {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    pub pixels: &'a [u8],
}

/// 流式输出: 关键帧逐行带输出, 帧间帧逐块输出
pub struct StreamingSink<'a, F> {
    keyframe: bool,
    width: u16,
    bytes_per_pixel: usize,
    band: &'a mut Vec<u8>,
    draw: F,
}

impl<'a, F: FnMut(DrawRegion<'_>)> StreamingSink<'a, F> {
    /// `band` 在解码器中复用, 这里按帧宽调整大小
    pub fn new(
        keyframe: bool,
        width: u16,
        bytes_per_pixel: usize,
        band: &'a mut Vec<u8>,
        draw: F,
    ) -> Self {
        band.resize(width as usize * bytes_per_pixel * 4, 0);
        Self {
            keyframe,
            width,
            bytes_per_pixel,
            band,
            draw,
        }
    }
}

impl<F: FnMut(DrawRegion<'_>)> BlockSink for StreamingSink<'_, F> {
    fn put_block(&mut self, x: u16, y: u16, block: &PixelBlock, bytes_per_pixel: usize) {
        let len = 4 * bytes_per_pixel;
        if self.keyframe {
            let stride = self.width as usize * self.bytes_per_pixel;
            let offset = x as usize * bytes_per_pixel;
            for (i, row) in block.rows.iter().enumerate() {
                let start = i * stride + offset;
                if let Some(dst) = self.band.get_mut(start..start + len) {
                    dst.copy_from_slice(&row[..len]);
                }
            }
        } else {
            let mut pixels = [0u8; 48];
            for (i, row) in block.rows.iter().enumerate() {
                pixels[i * len..(i + 1) * len].copy_from_slice(&row[..len]);
            }
            (self.draw)(DrawRegion {
                x,
                y,
                width: 4,
                height: 4,
                pixels: &pixels[..4 * len],
            });
        }
    }

    fn end_row(&mut self, y: u16) {
        if self.keyframe {
            (self.draw)(DrawRegion {
                x: 0,
                y,
                width: self.width,
                height: 4,
                pixels: self.band.as_slice(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block_of(value: u8) -> PixelBlock {
        PixelBlock {
            rows: [[value; 12]; 4],
        }
    }

    #[test]
    fn test_surface_put_block() {
        let mut surface = Surface::new(8, 4, PixelFormat::Rgb565le).unwrap();
        assert_eq!(surface.linesize(), 16);
        surface.put_block(4, 0, &block_of(0xAB), 2);
        assert_eq!(surface.pixel(3, 0), &[0, 0]);
        assert_eq!(surface.pixel(4, 0), &[0xAB, 0xAB]);
        assert_eq!(surface.pixel(7, 3), &[0xAB, 0xAB]);
        assert_eq!(&surface.row(2)[..8], &[0u8; 8]);
    }

    #[test]
    fn test_surface_none_format_rejected() {
        assert!(Surface::new(4, 4, PixelFormat::None).is_err());
    }

    #[test]
    fn test_streaming_keyframe_draws_rows() {
        let mut band = Vec::new();
        let mut calls = Vec::new();
        {
            let mut sink = StreamingSink::new(true, 8, 1, &mut band, |r: DrawRegion<'_>| {
                calls.push((r.x, r.y, r.width, r.height, r.pixels.to_vec()));
            });
            sink.put_block(0, 4, &block_of(1), 1);
            sink.put_block(4, 4, &block_of(2), 1);
            sink.end_row(4);
        }
        assert_eq!(calls.len(), 1);
        let (x, y, w, h, pixels) = &calls[0];
        assert_eq!((*x, *y, *w, *h), (0, 4, 8, 4));
        assert_eq!(&pixels[..8], &[1, 1, 1, 1, 2, 2, 2, 2]);
        assert_eq!(pixels.len(), 32);
    }

    #[test]
    fn test_streaming_interframe_draws_blocks() {
        let mut band = Vec::new();
        let mut calls = Vec::new();
        {
            let mut sink = StreamingSink::new(false, 8, 2, &mut band, |r: DrawRegion<'_>| {
                calls.push((r.x, r.y, r.pixels.len()));
            });
            sink.put_block(4, 8, &block_of(7), 2);
            sink.end_row(8);
        }
        assert_eq!(calls, vec![(4, 8, 32)]);
    }
}
