//! 调色板抖动表构建.
//!
//! - VFW: 默认 221 色调色板到目标调色板的最近色映射, 配合有序抖动查找表使用.
//! - QuickTime: RGB554 空间到调色板索引的 64 KiB 表, 由泛洪填充生成基础平面,
//!   再经三轮误差修正得到另外三个平面, 分别供 2x2 内不同位置的像素使用.

use std::collections::VecDeque;

use cvid_core::Palette;
use log::debug;

use super::codebook::{CodebookEntry, QtDitherBlock};
use super::convert::yuv_to_rgb;
use super::tables::{DEFAULT_PALETTE_SIZE, LOOKUP_SIZE, vfw_tables};

/// RGB554 编码空间大小 (单个平面)
pub const QT_PLANE_SIZE: usize = 0x4000;

/// 编码 0 (近黑)
const QT_BLACK: u16 = 0;
/// 编码 0x3FFF (近白)
const QT_WHITE: u16 = 0x3FFF;

/// V1 抖动缓存各像素使用的平面, 按 [行][列]
const QT_V1_PLANES: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 0, 1, 2], [1, 2, 3, 0], [2, 3, 0, 1]];

/// V4 抖动缓存各像素使用的平面, 按 [象限][象限内像素]
const QT_V4_PLANES: [[usize; 4]; 4] = [[0, 1, 3, 0], [2, 3, 1, 2], [1, 2, 2, 3], [3, 0, 0, 1]];

/// RGB 转 RGB554 编码
#[inline]
pub fn rgb554(r: u8, g: u8, b: u8) -> u16 {
    (u16::from(r & 0xF8) << 6) | (u16::from(g & 0xF8) << 1) | u16::from(b >> 4)
}

/// Cinepak YUV 转 RGB554 编码
#[inline]
pub fn dither_table_index(y: u8, u: i8, v: i8) -> usize {
    let [r, g, b] = yuv_to_rgb(y, u, v);
    rgb554(r, g, b) as usize
}

/// VFW 抖动状态
#[derive(Debug, Clone)]
pub struct VfwDither {
    /// 默认调色板索引 -> 目标调色板索引
    color_map: [u8; DEFAULT_PALETTE_SIZE],
}

impl VfwDither {
    /// 为目标调色板建立映射
    pub fn new(palette: &Palette) -> Self {
        let tables = vfw_tables();
        let mut color_map = [0u8; DEFAULT_PALETTE_SIZE];
        for (slot, &rgb) in color_map.iter_mut().zip(tables.default_palette.iter()) {
            *slot = find_nearest_rgb(palette, rgb);
        }
        debug!("VFW 抖动映射已建立");
        Self { color_map }
    }

    /// 默认调色板索引到目标调色板的映射
    pub fn color_map(&self) -> &[u8; DEFAULT_PALETTE_SIZE] {
        &self.color_map
    }

    #[inline]
    fn lookup(&self, index: u32) -> u8 {
        let tables = vfw_tables();
        let cell = (index as usize).min(LOOKUP_SIZE - 1);
        self.color_map[tables.palette_lookup[cell] as usize]
    }

    /// 同相位的 UV 组合: (相位 0/1, 相位 2/3)
    fn chroma_groups(entry: &CodebookEntry) -> (u32, u32) {
        let tables = vfw_tables();
        let u = (entry.u as u8 as usize) * 2;
        let v = (entry.v as u8 as usize) * 2;
        (
            tables.u_lookup[u] | tables.v_lookup[v],
            tables.u_lookup[u + 1] | tables.v_lookup[v + 1],
        )
    }

    /// V1 条目的 4x4 抖动结果 (平滑图案)
    pub fn dither_smooth(&self, entry: &CodebookEntry) -> [u8; 16] {
        let y_lookup = &vfw_tables().y_lookup;
        let (uv1, uv2) = Self::chroma_groups(entry);
        let y = entry.y.map(|y| y as usize * 2);

        let g1 = uv2 | y_lookup[y[0] + 1];
        let g2 = uv1 | y_lookup[y[1]];
        let g3 = uv1 | y_lookup[y[0]];
        let g4 = uv2 | y_lookup[y[1] + 1];
        let g5 = uv2 | y_lookup[y[2] + 1];
        let g6 = uv1 | y_lookup[y[2]];
        let g7 = uv1 | y_lookup[y[3]];
        let g8 = uv2 | y_lookup[y[3] + 1];

        [
            g1 & 0xFFFF, g1 >> 16, g2 & 0xFFFF, g2 >> 16,
            g3 & 0xFFFF, g3 >> 16, g4 & 0xFFFF, g4 >> 16,
            g5 >> 16, g6 & 0xFFFF, g7 >> 16, g8 & 0xFFFF,
            g6 >> 16, g5 & 0xFFFF, g8 >> 16, g7 & 0xFFFF,
        ]
        .map(|index| self.lookup(index))
    }

    /// V4 条目的 4x4 抖动结果 (细节图案), 调用方只取所在象限的 2x2
    pub fn dither_detail(&self, entry: &CodebookEntry) -> [u8; 16] {
        let y_lookup = &vfw_tables().y_lookup;
        let (uv1, uv2) = Self::chroma_groups(entry);
        let y = entry.y.map(|y| y as usize * 2);

        let g1 = uv2 | y_lookup[y[0] + 1];
        let g2 = uv2 | y_lookup[y[1] + 1];
        let g3 = uv1 | y_lookup[y[2]];
        let g4 = uv1 | y_lookup[y[3]];
        let g5 = uv1 | y_lookup[y[0]];
        let g6 = uv1 | y_lookup[y[1]];
        let g7 = uv2 | y_lookup[y[2] + 1];
        let g8 = uv2 | y_lookup[y[3] + 1];

        [
            g1 & 0xFFFF, g2 >> 16, g5 & 0xFFFF, g6 >> 16,
            g3 & 0xFFFF, g4 >> 16, g7 & 0xFFFF, g8 >> 16,
            g1 >> 16, g6 & 0xFFFF, g5 >> 16, g2 & 0xFFFF,
            g3 >> 16, g8 & 0xFFFF, g7 >> 16, g4 & 0xFFFF,
        ]
        .map(|index| self.lookup(index))
    }
}

/// 在目标调色板中查找与 `rgb` 欧氏距离最近的颜色
///
/// 逐分量累减剩余预算, 预算耗尽即跳过该颜色; 距离相同取先出现者, 命中 0 距离立即结束.
pub fn find_nearest_rgb(palette: &Palette, [r, g, b]: [u8; 3]) -> u8 {
    let mut result = 0u8;
    let mut diff = i32::MAX;

    for (i, &[pr, pg, pb]) in palette.entries().iter().enumerate() {
        let b_diff = i32::from(b) - i32::from(pb);
        let cur_b = diff - b_diff * b_diff;
        if cur_b <= 0 {
            continue;
        }
        let g_diff = i32::from(g) - i32::from(pg);
        let cur_g = cur_b - g_diff * g_diff;
        if cur_g <= 0 {
            continue;
        }
        let r_diff = i32::from(r) - i32::from(pr);
        let cur_r = cur_g - r_diff * r_diff;
        if cur_r <= 0 {
            continue;
        }
        diff -= cur_r;
        result = i as u8;
        if diff == 0 {
            break;
        }
    }
    result
}

/// QuickTime 抖动表 (4 个 16 KiB 平面)
#[derive(Clone)]
pub struct QtDitherTable {
    table: Box<[u8]>,
}

impl QtDitherTable {
    /// 为目标调色板生成抖动表
    pub fn new(palette: &Palette) -> Self {
        let mut table = vec![0u8; QT_PLANE_SIZE * 4].into_boxed_slice();
        let base = flood_fill_base_plane(palette);
        table[..QT_PLANE_SIZE].copy_from_slice(&base);
        refine_planes(palette, &mut table);
        debug!("QuickTime 抖动表已生成");
        Self { table }
    }

    /// 查表: `plane` 为 0..=3, `index` 为 RGB554 编码
    #[inline]
    pub fn get(&self, plane: usize, index: usize) -> u8 {
        self.table[plane * QT_PLANE_SIZE + (index & (QT_PLANE_SIZE - 1))]
    }

    /// 原始表数据 (64 KiB)
    pub fn as_bytes(&self) -> &[u8] {
        &self.table
    }

    /// V1 条目的 4x4 抖动缓存
    pub fn dither_v1(&self, entry: &CodebookEntry) -> QtDitherBlock {
        let index = entry.y.map(|y| dither_table_index(y, entry.u, entry.v));
        let mut out = [[0u8; 4]; 4];
        for (row, line) in out.iter_mut().enumerate() {
            for (col, px) in line.iter_mut().enumerate() {
                let k = (row / 2) * 2 + col / 2;
                *px = self.get(QT_V1_PLANES[row][col], index[k]);
            }
        }
        out
    }

    /// V4 条目的抖动缓存: 该条目出现在每个象限时各自的 2x2 像素
    pub fn dither_v4(&self, entry: &CodebookEntry) -> QtDitherBlock {
        let index = entry.y.map(|y| dither_table_index(y, entry.u, entry.v));
        let mut out = [[0u8; 4]; 4];
        for (q, quad) in out.iter_mut().enumerate() {
            for (k, px) in quad.iter_mut().enumerate() {
                *px = self.get(QT_V4_PLANES[q][k], index[k]);
            }
        }
        out
    }
}

impl std::fmt::Debug for QtDitherTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QtDitherTable")
            .field("len", &self.table.len())
            .finish()
    }
}

/// 未找到颜色的工作单元低字节为 0
#[inline]
fn is_found(cell: u16) -> bool {
    cell & 0xFF != 0
}

fn add_color_to_queue(color: u32, index: u16, work: &mut [u16], queue: &mut VecDeque<u16>) {
    if let Some(cell) = work.get_mut(color as usize) {
        if !is_found(*cell) {
            *cell = index;
            queue.push_back(color as u16);
        }
    }
}

/// 泛洪填充 RGB554 基础平面
///
/// 工作单元为 `(调色板索引 << 8) | 1`. 调色板颜色落在的编码作为种子 (先到先得,
/// 近黑/近白直接覆盖), 再按广度优先向 B、G、R 方向相邻编码扩散.
fn flood_fill_base_plane(palette: &Palette) -> Vec<u8> {
    let mut work = vec![0u16; QT_PLANE_SIZE];
    let mut queue = VecDeque::new();
    let mut found_black = false;
    let mut found_white = false;

    for (i, &[r, g, b]) in palette.entries().iter().enumerate() {
        let cell = ((i as u16) << 8) | 1;
        match rgb554(r, g, b) {
            QT_BLACK => {
                work[QT_BLACK as usize] = cell;
                found_black = true;
            }
            QT_WHITE => {
                work[QT_WHITE as usize] = cell;
                found_white = true;
            }
            color => add_color_to_queue(u32::from(color), cell, &mut work, &mut queue),
        }
    }

    if found_white {
        queue.push_front(QT_WHITE);
    }
    if found_black {
        queue.push_front(QT_BLACK);
    }

    while let Some(color) = queue.pop_front() {
        let cell = work[color as usize];

        let x = u32::from(color) << 4;
        if x & 0xFF < 0xF0 {
            add_color_to_queue((x + 0x10) >> 4, cell, &mut work, &mut queue);
        }
        if x & 0xFF >= 0x10 {
            add_color_to_queue((x - 0x10) >> 4, cell, &mut work, &mut queue);
        }

        let y = u32::from(color) << 7;
        if y & 0xFF00 < 0xF800 {
            add_color_to_queue((y + 0x800) >> 7, cell, &mut work, &mut queue);
        }
        if y & 0xFF00 >= 0x800 {
            add_color_to_queue((y - 0x800) >> 7, cell, &mut work, &mut queue);
        }

        let z = u32::from(color) << 2;
        if z & 0xFF00 < 0xF800 {
            add_color_to_queue((z + 0x800) >> 2, cell, &mut work, &mut queue);
        }
        if z & 0xFF00 >= 0x800 {
            add_color_to_queue((z - 0x800) >> 2, cell, &mut work, &mut queue);
        }
    }

    work.iter().map(|&cell| (cell >> 8) as u8).collect()
}

#[inline]
fn adjust_color_range(current: u8, correct: u8, pal: u8) -> u8 {
    (i32::from(current) - i32::from(pal) + i32::from(correct)).clamp(0, 255) as u8
}

/// 误差修正平面 1..=3
///
/// 对每个量化单元, 将上一轮所选调色板颜色的量化误差加回采样值, 再在基础平面中查找.
fn refine_planes(palette: &Palette, table: &mut [u8]) {
    let masked = |index: u8| {
        let [r, g, b] = palette.entry(index);
        [r & 0xF8, g & 0xF8, b & 0xF0]
    };

    let mut cell = 0;
    for real_r in (0..=255u8).step_by(8) {
        for real_g in (0..=255u8).step_by(8) {
            for real_b in (0..=255u8).step_by(16) {
                let mut pal_index = table[cell];
                let (mut r, mut g, mut b) = (real_r, real_g, real_b);

                for plane in 1..4 {
                    let [pal_r, pal_g, pal_b] = masked(pal_index);
                    r = adjust_color_range(r, real_r, pal_r);
                    g = adjust_color_range(g, real_g, pal_g);
                    b = adjust_color_range(b, real_b, pal_b);
                    pal_index = table[rgb554(r, g, b) as usize];
                    table[plane * QT_PLANE_SIZE + cell] = pal_index;
                }
                cell += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 8 色调色板: 黑、白、纯红绿蓝等, 其余条目为黑
    fn small_palette() -> Palette {
        let mut rgb = vec![0u8; 768];
        let colors: [[u8; 3]; 6] = [
            [0, 0, 0],
            [255, 255, 255],
            [255, 0, 0],
            [0, 255, 0],
            [0, 0, 255],
            [128, 128, 128],
        ];
        for (i, c) in colors.iter().enumerate() {
            rgb[i * 3..i * 3 + 3].copy_from_slice(c);
        }
        Palette::from_rgb(&rgb).unwrap()
    }

    #[test]
    fn test_rgb554_code() {
        assert_eq!(rgb554(0, 0, 0), 0);
        assert_eq!(rgb554(255, 255, 255), 0x3FFF);
        assert_eq!(rgb554(0x08, 0, 0), 1 << 9);
        assert_eq!(rgb554(0, 0x08, 0), 1 << 4);
        assert_eq!(rgb554(0, 0, 0x10), 1);
    }

    #[test]
    fn test_find_nearest_exact_and_first_tie() {
        let pal = small_palette();
        assert_eq!(find_nearest_rgb(&pal, [255, 0, 0]), 2);
        assert_eq!(find_nearest_rgb(&pal, [120, 130, 125]), 5);
        // 黑色条目 0 与 6..255 等距, 取先出现的 0
        assert_eq!(find_nearest_rgb(&pal, [1, 1, 1]), 0);
    }

    #[test]
    fn test_vfw_color_map_greyscale() {
        let dither = VfwDither::new(&Palette::grayscale());
        let tables = vfw_tables();
        // 默认调色板中的灰色精确命中灰度调色板
        for (i, &mapped) in dither.color_map().iter().enumerate() {
            let [r, g, b] = tables.default_palette[i];
            if r == g && g == b {
                assert_eq!(mapped, r, "默认颜色 {i}");
            }
        }
        assert_eq!(dither.color_map()[216], 25);
        assert_eq!(dither.color_map()[215], 255);
    }

    #[test]
    fn test_vfw_dither_flat_white_block() {
        let dither = VfwDither::new(&small_palette());
        let white = CodebookEntry {
            y: [255; 4],
            u: 0,
            v: 0,
        };
        assert_eq!(dither.dither_smooth(&white), [1; 16]);
        assert_eq!(dither.dither_detail(&white), [1; 16]);
    }

    #[test]
    fn test_qt_table_exact_colors() {
        let pal = small_palette();
        let qt = QtDitherTable::new(&pal);
        assert_eq!(qt.as_bytes().len(), 0x10000);
        assert_eq!(qt.get(0, rgb554(255, 0, 0) as usize), 2);
        assert_eq!(qt.get(0, rgb554(0, 255, 0) as usize), 3);
        assert_eq!(qt.get(0, rgb554(0, 0, 255) as usize), 4);
        assert_eq!(qt.get(0, rgb554(128, 128, 128) as usize), 5);
        assert_eq!(qt.get(0, 0x3FFF), 1);
        // 近黑: 后出现的黑色条目覆盖先前的
        assert_eq!(qt.get(0, 0), 255);
    }

    #[test]
    fn test_qt_flood_fill_reaches_every_code() {
        let pal = small_palette();
        let base = flood_fill_base_plane(&pal);
        // 纯红附近的编码经泛洪得到红色
        assert_eq!(base[rgb554(240, 8, 0) as usize], 2);
        // 所有索引都来自真实调色板颜色 (0..=5 或覆盖后的 255)
        assert!(base.iter().all(|&i| i <= 5 || i == 255));
    }

    #[test]
    fn test_qt_refined_planes_exact_color_stable() {
        let pal = small_palette();
        let qt = QtDitherTable::new(&pal);
        // 调色板中精确存在的颜色误差为 0, 各平面选择相同
        let code = rgb554(255, 0, 0) as usize;
        for plane in 0..4 {
            assert_eq!(qt.get(plane, code), 2);
        }
    }

    #[test]
    fn test_qt_v1_v4_cache_layout() {
        let pal = small_palette();
        let qt = QtDitherTable::new(&pal);
        let red = CodebookEntry {
            y: [76, 76, 76, 76],
            u: -38,
            v: 90,
        };
        let idx = dither_table_index(76, -38, 90);
        let v1 = qt.dither_v1(&red);
        assert_eq!(v1[0][0], qt.get(0, idx));
        assert_eq!(v1[1][0], qt.get(3, idx));
        assert_eq!(v1[3][3], qt.get(1, idx));
        let v4 = qt.dither_v4(&red);
        assert_eq!(v4[0], [qt.get(0, idx), qt.get(1, idx), qt.get(3, idx), qt.get(0, idx)]);
        assert_eq!(v4[3][1], qt.get(0, idx));
    }
}
