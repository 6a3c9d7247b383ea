//! 码本条目到像素的转换.
//!
//! 颜色策略在解码器配置时选定一次, 向量解码循环按策略单态化 (泛型参数),
//! 逐块调用 `decode_block1` / `decode_block4` 生成 4x4 像素块.

use std::marker::PhantomData;

use super::codebook::CodebookBank;
use super::dither::VfwDither;

/// 裁剪表 (零点位于索引 512)
///
/// 索引 `i <= 512` 为 0, `i >= 768` 为 255, 其间为 `i - 512`.
pub static CLIP_TABLE: [u8; 1024] = build_clip_table();

const fn build_clip_table() -> [u8; 1024] {
    let mut table = [0u8; 1024];
    let mut i = 0;
    while i < 1024 {
        table[i] = if i <= 512 {
            0
        } else if i >= 768 {
            255
        } else {
            (i - 512) as u8
        };
        i += 1;
    }
    table
}

/// 以带符号偏移查裁剪表
#[inline]
pub fn clip(value: i32) -> u8 {
    CLIP_TABLE[(value + 512).clamp(0, 1023) as usize]
}

/// Cinepak YUV 转 RGB
#[inline]
pub fn yuv_to_rgb(y: u8, u: i8, v: i8) -> [u8; 3] {
    let y = i32::from(y);
    let u = i32::from(u);
    let v = i32::from(v);
    [clip(y + (v << 1)), clip(y - (u >> 1) - v), clip(y + (u << 1))]
}

/// 打包为 RGB565 数值
#[inline]
pub fn pack_rgb565([r, g, b]: [u8; 3]) -> u16 {
    (u16::from(r & 0xF8) << 8) | (u16::from(g & 0xFC) << 3) | u16::from(b >> 3)
}

/// 一个 4x4 输出像素块, 每行最多 4 像素 x 3 字节
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PixelBlock {
    /// 行数据 (只有前 `4 * bytes_per_pixel` 字节有效)
    pub rows: [[u8; 12]; 4],
}

impl PixelBlock {
    #[inline]
    fn put(&mut self, row: usize, col: usize, pixel: &[u8]) {
        let bpp = pixel.len();
        self.rows[row][col * bpp..(col + 1) * bpp].copy_from_slice(pixel);
    }

    /// 第 `row` 行的有效字节
    pub fn row(&self, row: usize, bytes_per_pixel: usize) -> &[u8] {
        &self.rows[row][..4 * bytes_per_pixel]
    }
}

/// 4x4 块内 (行, 列) 所属的 2x2 象限 (左上, 右上, 左下, 右下)
#[inline]
pub const fn quadrant(row: usize, col: usize) -> usize {
    (row / 2) * 2 + col / 2
}

/// 象限内 (行, 列) 的像素序号
#[inline]
pub const fn quadrant_pixel(row: usize, col: usize) -> usize {
    (row % 2) * 2 + col % 2
}

/// 码本块转换策略
pub trait BlockConverter {
    /// 输出每像素字节数
    const BYTES_PER_PIXEL: usize;

    /// 以 V1 条目填充整块
    fn decode_block1(&self, bank: &CodebookBank, index: u8, block: &mut PixelBlock);

    /// 以 4 个 V4 条目分别填充 4 个象限
    fn decode_block4(&self, bank: &CodebookBank, indices: [u8; 4], block: &mut PixelBlock);
}

/// 直出 RGB 的像素打包方式
pub trait PixelPacker {
    /// 每像素字节数
    const BYTES_PER_PIXEL: usize;
    /// 像素字节类型
    type Pixel: AsRef<[u8]> + Copy;

    /// 打包一个 RGB 像素
    fn pack(rgb: [u8; 3]) -> Self::Pixel;
}

/// RGB565, 小端存储
pub struct Rgb565Le;

impl PixelPacker for Rgb565Le {
    const BYTES_PER_PIXEL: usize = 2;
    type Pixel = [u8; 2];

    #[inline]
    fn pack(rgb: [u8; 3]) -> [u8; 2] {
        pack_rgb565(rgb).to_le_bytes()
    }
}

/// RGB565, 大端存储 (字节交换后直推 SPI 屏)
pub struct Rgb565Be;

impl PixelPacker for Rgb565Be {
    const BYTES_PER_PIXEL: usize = 2;
    type Pixel = [u8; 2];

    #[inline]
    fn pack(rgb: [u8; 3]) -> [u8; 2] {
        pack_rgb565(rgb).to_be_bytes()
    }
}

/// RGB24
pub struct Rgb24;

impl PixelPacker for Rgb24 {
    const BYTES_PER_PIXEL: usize = 3;
    type Pixel = [u8; 3];

    #[inline]
    fn pack(rgb: [u8; 3]) -> [u8; 3] {
        rgb
    }
}

/// 直接 YUV 转 RGB 输出
pub struct RawConverter<P> {
    _packer: PhantomData<P>,
}

impl<P> RawConverter<P> {
    pub fn new() -> Self {
        Self {
            _packer: PhantomData,
        }
    }
}

impl<P> Default for RawConverter<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PixelPacker> BlockConverter for RawConverter<P> {
    const BYTES_PER_PIXEL: usize = P::BYTES_PER_PIXEL;

    fn decode_block1(&self, bank: &CodebookBank, index: u8, block: &mut PixelBlock) {
        let e = &bank.v1[index as usize];
        let colors = e.y.map(|y| P::pack(yuv_to_rgb(y, e.u, e.v)));
        for row in 0..4 {
            for col in 0..4 {
                block.put(row, col, colors[quadrant(row, col)].as_ref());
            }
        }
    }

    fn decode_block4(&self, bank: &CodebookBank, indices: [u8; 4], block: &mut PixelBlock) {
        for (q, &index) in indices.iter().enumerate() {
            let e = &bank.v4[index as usize];
            let (top, left) = ((q / 2) * 2, (q % 2) * 2);
            for (k, &y) in e.y.iter().enumerate() {
                let pixel = P::pack(yuv_to_rgb(y, e.u, e.v));
                block.put(top + k / 2, left + k % 2, pixel.as_ref());
            }
        }
    }
}

/// 调色板索引直通: 亮度字节即调色板索引
///
/// 用于 4 字节码本条目承载调色板索引的流, 输出 Pal8.
pub struct IndexedConverter;

impl BlockConverter for IndexedConverter {
    const BYTES_PER_PIXEL: usize = 1;

    fn decode_block1(&self, bank: &CodebookBank, index: u8, block: &mut PixelBlock) {
        let e = &bank.v1[index as usize];
        for row in 0..4 {
            for col in 0..4 {
                block.rows[row][col] = e.y[quadrant(row, col)];
            }
        }
    }

    fn decode_block4(&self, bank: &CodebookBank, indices: [u8; 4], block: &mut PixelBlock) {
        for row in 0..4 {
            for col in 0..4 {
                let e = &bank.v4[indices[quadrant(row, col)] as usize];
                block.rows[row][col] = e.y[quadrant_pixel(row, col)];
            }
        }
    }
}

/// VFW 有序抖动输出
pub struct VfwConverter<'a> {
    pub dither: &'a VfwDither,
}

impl BlockConverter for VfwConverter<'_> {
    const BYTES_PER_PIXEL: usize = 1;

    fn decode_block1(&self, bank: &CodebookBank, index: u8, block: &mut PixelBlock) {
        let pixels = self.dither.dither_smooth(&bank.v1[index as usize]);
        for (row, chunk) in pixels.chunks_exact(4).enumerate() {
            block.rows[row][..4].copy_from_slice(chunk);
        }
    }

    fn decode_block4(&self, bank: &CodebookBank, indices: [u8; 4], block: &mut PixelBlock) {
        let quads = indices.map(|i| self.dither.dither_detail(&bank.v4[i as usize]));
        for row in 0..4 {
            for col in 0..4 {
                block.rows[row][col] = quads[quadrant(row, col)][row * 4 + col];
            }
        }
    }
}

/// QuickTime 抖动输出, 像素直接取自条带的抖动缓存
pub struct QtConverter;

impl BlockConverter for QtConverter {
    const BYTES_PER_PIXEL: usize = 1;

    fn decode_block1(&self, bank: &CodebookBank, index: u8, block: &mut PixelBlock) {
        let cache = &bank.qt_v1[index as usize];
        for (row, bytes) in cache.iter().enumerate() {
            block.rows[row][..4].copy_from_slice(bytes);
        }
    }

    fn decode_block4(&self, bank: &CodebookBank, indices: [u8; 4], block: &mut PixelBlock) {
        for (q, &index) in indices.iter().enumerate() {
            let cache = &bank.qt_v4[index as usize][q];
            let (top, left) = ((q / 2) * 2, (q % 2) * 2);
            block.rows[top][left..left + 2].copy_from_slice(&cache[0..2]);
            block.rows[top + 1][left..left + 2].copy_from_slice(&cache[2..4]);
        }
    }
}
