//! VFW 抖动查找表.
//!
//! 10 位查找索引 = V 等级 (3 位, bit7..9) | U 等级 (3 位, bit4..6) | Y 等级 (4 位, bit0..3).
//! Y/U/V 查找表每个分量值占两个 u32, 每个 u32 的低/高 16 位各存一个抖动相位的索引片段,
//! 同相位的三个片段按位或即得完整索引. 四个相位的阈值构成 2x2 Bayer 矩阵.
//!
//! 表在首次使用时生成, 之后只读共享.

use std::sync::OnceLock;

use super::convert::yuv_to_rgb;

/// 默认调色板颜色数 (6x6x6 立方体 + 5 级灰)
pub const DEFAULT_PALETTE_SIZE: usize = 221;

/// 查找索引空间大小
pub const LOOKUP_SIZE: usize = 1024;

const Y_LEVELS: u32 = 16;
const UV_LEVELS: u32 = 8;
const U_SHIFT: u32 = 4;
const V_SHIFT: u32 = 7;

/// 相位 0..3 的阈值 (以 1/8 为单位)
///
/// 相位 0/1 位于 u32 `[2n]` 的低/高半, 相位 2/3 位于 `[2n + 1]`.
const PHASE_EIGHTHS: [u32; 4] = [7, 3, 1, 5];

/// 立方体之外补充的灰阶
const EXTRA_GREYS: [u8; 5] = [25, 76, 127, 178, 229];

/// VFW 抖动使用的全部静态表
pub struct VfwTables {
    /// 默认调色板
    pub default_palette: [[u8; 3]; DEFAULT_PALETTE_SIZE],
    /// 查找索引 -> 默认调色板索引
    pub palette_lookup: [u8; LOOKUP_SIZE],
    /// 按亮度值索引 (`y * 2`, `y * 2 + 1`)
    pub y_lookup: [u32; 512],
    /// 按 U 的字节值索引 (`(u as u8) * 2`, `+ 1`)
    pub u_lookup: [u32; 512],
    /// 按 V 的字节值索引
    pub v_lookup: [u32; 512],
}

static VFW_TABLES: OnceLock<VfwTables> = OnceLock::new();

/// 获取 VFW 抖动表 (首次调用时生成)
pub fn vfw_tables() -> &'static VfwTables {
    VFW_TABLES.get_or_init(build_vfw_tables)
}

/// 带相位阈值的量化
fn quantize(value: u32, levels: u32, phase: usize) -> u32 {
    let level = (value * (levels - 1) * 8 + PHASE_EIGHTHS[phase] * 255) / (255 * 8);
    level.min(levels - 1)
}

/// 生成一个分量的两相位打包表
fn phase_table(levels: u32, shift: u32, value_of: impl Fn(usize) -> u32) -> [u32; 512] {
    let mut table = [0u32; 512];
    for n in 0..256 {
        let value = value_of(n);
        let part = |phase| quantize(value, levels, phase) << shift;
        table[n * 2] = part(0) | (part(1) << 16);
        table[n * 2 + 1] = part(2) | (part(3) << 16);
    }
    table
}

fn build_default_palette() -> [[u8; 3]; DEFAULT_PALETTE_SIZE] {
    let mut palette = [[0u8; 3]; DEFAULT_PALETTE_SIZE];
    let mut i = 0;
    for r in 0..6u8 {
        for g in 0..6u8 {
            for b in 0..6u8 {
                palette[i] = [r * 51, g * 51, b * 51];
                i += 1;
            }
        }
    }
    for grey in EXTRA_GREYS {
        palette[i] = [grey; 3];
        i += 1;
    }
    palette
}

/// 查找索引对应的量化单元中心色
fn cell_color(index: usize) -> [u8; 3] {
    let index = index as u32;
    let y_level = index & 0x0F;
    let u_level = (index >> U_SHIFT) & 0x07;
    let v_level = (index >> V_SHIFT) & 0x07;
    let y = (y_level * 255 / (Y_LEVELS - 1)) as u8;
    let u = (u_level * 255 / (UV_LEVELS - 1)) as i32 - 128;
    let v = (v_level * 255 / (UV_LEVELS - 1)) as i32 - 128;
    yuv_to_rgb(y, u as i8, v as i8)
}

fn nearest(palette: &[[u8; 3]], rgb: [u8; 3]) -> usize {
    let mut best = 0;
    let mut best_dist = i32::MAX;
    for (i, c) in palette.iter().enumerate() {
        let dist: i32 = c
            .iter()
            .zip(rgb.iter())
            .map(|(&a, &b)| (i32::from(a) - i32::from(b)).pow(2))
            .sum();
        if dist < best_dist {
            best_dist = dist;
            best = i;
        }
    }
    best
}

fn build_vfw_tables() -> VfwTables {
    let default_palette = build_default_palette();

    let mut palette_lookup = [0u8; LOOKUP_SIZE];
    for (i, slot) in palette_lookup.iter_mut().enumerate() {
        *slot = nearest(&default_palette, cell_color(i)) as u8;
    }

    // U/V 按字节值存储, 需还原为有符号数再偏移到 0..=255
    let chroma = |n: usize| (i32::from(n as u8 as i8) + 128) as u32;

    VfwTables {
        default_palette,
        palette_lookup,
        y_lookup: phase_table(Y_LEVELS, 0, |n| n as u32),
        u_lookup: phase_table(UV_LEVELS, U_SHIFT, chroma),
        v_lookup: phase_table(UV_LEVELS, V_SHIFT, chroma),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_palette_layout() {
        let t = vfw_tables();
        assert_eq!(t.default_palette[0], [0, 0, 0]);
        assert_eq!(t.default_palette[215], [255, 255, 255]);
        assert_eq!(t.default_palette[1], [0, 0, 51]);
        assert_eq!(t.default_palette[216], [25, 25, 25]);
        assert_eq!(t.default_palette[220], [229, 229, 229]);
    }

    #[test]
    fn test_lookup_indices_stay_in_range() {
        let t = vfw_tables();
        for n in 0..512 {
            for half in [t.y_lookup[n], t.u_lookup[n], t.v_lookup[n]] {
                assert!((half & 0xFFFF) < LOOKUP_SIZE as u32);
                assert!((half >> 16) < LOOKUP_SIZE as u32);
            }
        }
        assert!(t
            .palette_lookup
            .iter()
            .all(|&i| (i as usize) < DEFAULT_PALETTE_SIZE));
    }

    #[test]
    fn test_extreme_luma_levels() {
        let t = vfw_tables();
        // 亮度 0 所有相位为 0 级, 亮度 255 所有相位为 15 级
        assert_eq!(t.y_lookup[0], 0);
        assert_eq!(t.y_lookup[1], 0);
        assert_eq!(t.y_lookup[510], 15 | (15 << 16));
        assert_eq!(t.y_lookup[511], 15 | (15 << 16));
    }

    #[test]
    fn test_grey_cells_map_to_grey_colors() {
        let t = vfw_tables();
        // 色度取中间等级时, 最暗/最亮单元落在近黑/近白颜色上
        let black = t.palette_lookup[(4 << V_SHIFT) | (4 << U_SHIFT)];
        let white = t.palette_lookup[(4 << V_SHIFT) | (4 << U_SHIFT) | 15];
        let black_rgb = t.default_palette[black as usize];
        let white_rgb = t.default_palette[white as usize];
        assert!(black_rgb.iter().all(|&c| c < 60));
        assert!(white_rgb.iter().all(|&c| c > 200));
    }

    #[test]
    fn test_phases_differ_midtone() {
        let t = vfw_tables();
        // 中间亮度在不同相位上落到相邻等级
        let packed = [t.y_lookup[2 * 128], t.y_lookup[2 * 128 + 1]];
        let phases = [
            packed[0] & 0xFFFF,
            packed[0] >> 16,
            packed[1] & 0xFFFF,
            packed[1] >> 16,
        ];
        let min = *phases.iter().min().unwrap();
        let max = *phases.iter().max().unwrap();
        assert_eq!(max - min, 1);
    }
}
