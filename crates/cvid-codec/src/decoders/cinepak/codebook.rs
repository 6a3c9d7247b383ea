//! Cinepak 码本存储与加载.
//!
//! 每个条带持有 256 个 V1 条目与 256 个 V4 条目. 码本加载块 (0x20..=0x27) 可以是
//! 稠密或稀疏 (按 32 位标志字逐条更新), 条目为 6 字节 (Y0..Y3, U, V) 或 4 字节 (仅亮度).

use bitflags::bitflags;
use cvid_core::{ByteCursor, CvidResult};
use log::trace;

use super::dither::QtDitherTable;

/// 每种码本的条目数
pub const CODEBOOK_SIZE: usize = 256;

bitflags! {
    /// 块 ID 的低位含义 (码本块与向量块共用)
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ChunkFlags: u8 {
        /// 码本块: 稀疏更新; 向量块: 存在跳过标志
        const SPARSE = 0x01;
        /// 向量块: 全部使用 V1
        const V1_ONLY = 0x02;
        /// 码本块: 4 字节条目 (无色度)
        const LUMA_ONLY = 0x04;
    }
}

/// 码本类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodebookKind {
    /// 整块共用一组 2x2 亮度与色度
    V1,
    /// 每个 2x2 象限独立的条目
    V4,
}

impl CodebookKind {
    /// 由码本块 ID 判定类型
    pub fn from_chunk_id(chunk_id: u8) -> Option<Self> {
        match chunk_id {
            0x20 | 0x21 | 0x24 | 0x25 => Some(Self::V4),
            0x22 | 0x23 | 0x26 | 0x27 => Some(Self::V1),
            _ => None,
        }
    }
}

/// 码本条目 (Cinepak 自有 YUV 空间)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodebookEntry {
    /// 4 个亮度采样, 按 2x2 光栅顺序
    pub y: [u8; 4],
    /// 色度 U
    pub u: i8,
    /// 色度 V
    pub v: i8,
}

/// QuickTime 抖动缓存: 每条目 4 行 x 4 字节调色板索引
pub type QtDitherBlock = [[u8; 4]; 4];

/// 单个条带的码本状态
#[derive(Clone)]
pub struct CodebookBank {
    /// V1 码本
    pub v1: Box<[CodebookEntry; CODEBOOK_SIZE]>,
    /// V4 码本
    pub v4: Box<[CodebookEntry; CODEBOOK_SIZE]>,
    /// V1 条目的 QuickTime 抖动缓存 (按 [行][列])
    pub qt_v1: Box<[QtDitherBlock; CODEBOOK_SIZE]>,
    /// V4 条目的 QuickTime 抖动缓存 (按 [象限][2x2 像素])
    pub qt_v4: Box<[QtDitherBlock; CODEBOOK_SIZE]>,
}

impl CodebookBank {
    /// 创建全零码本
    ///
    /// 启用 QuickTime 抖动时, 缓存随即按零值条目计算.
    pub fn new(qt: Option<&QtDitherTable>) -> Self {
        let mut bank = Self {
            v1: Box::new([CodebookEntry::default(); CODEBOOK_SIZE]),
            v4: Box::new([CodebookEntry::default(); CODEBOOK_SIZE]),
            qt_v1: Box::new([[[0; 4]; 4]; CODEBOOK_SIZE]),
            qt_v4: Box::new([[[0; 4]; 4]; CODEBOOK_SIZE]),
        };
        if let Some(table) = qt {
            bank.refresh_qt_cache(table);
        }
        bank
    }

    /// 取指定类型的码本
    pub fn entries(&self, kind: CodebookKind) -> &[CodebookEntry; CODEBOOK_SIZE] {
        match kind {
            CodebookKind::V1 => &self.v1,
            CodebookKind::V4 => &self.v4,
        }
    }

    /// 继承另一条带的码本 (含抖动缓存), 不重新分配
    pub fn copy_from(&mut self, other: &CodebookBank) {
        *self.v1 = *other.v1;
        *self.v4 = *other.v4;
        *self.qt_v1 = *other.qt_v1;
        *self.qt_v4 = *other.qt_v4;
    }

    /// 重新计算全部 QuickTime 抖动缓存
    pub fn refresh_qt_cache(&mut self, table: &QtDitherTable) {
        for i in 0..CODEBOOK_SIZE {
            self.qt_v1[i] = table.dither_v1(&self.v1[i]);
            self.qt_v4[i] = table.dither_v4(&self.v4[i]);
        }
    }

    fn set_entry(
        &mut self,
        kind: CodebookKind,
        index: usize,
        entry: CodebookEntry,
        qt: Option<&QtDitherTable>,
    ) {
        match kind {
            CodebookKind::V1 => {
                self.v1[index] = entry;
                if let Some(table) = qt {
                    self.qt_v1[index] = table.dither_v1(&entry);
                }
            }
            CodebookKind::V4 => {
                self.v4[index] = entry;
                if let Some(table) = qt {
                    self.qt_v4[index] = table.dither_v4(&entry);
                }
            }
        }
    }
}

impl std::fmt::Debug for CodebookBank {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CodebookBank")
            .field("v1[0]", &self.v1[0])
            .field("v4[0]", &self.v4[0])
            .finish()
    }
}

/// 从码本加载块读取条目
///
/// 游标位于块负载起点, `chunk_size` 为负载长度. 下一个字段会越过块尾时停止,
/// 未读到的条目保持原值. 返回本次实际更新的条目数.
pub fn load_codebook(
    cursor: &mut ByteCursor<'_>,
    bank: &mut CodebookBank,
    kind: CodebookKind,
    chunk_id: u8,
    chunk_size: usize,
    qt: Option<&QtDitherTable>,
) -> CvidResult<usize> {
    let flags = ChunkFlags::from_bits_truncate(chunk_id);
    let sparse = flags.contains(ChunkFlags::SPARSE);
    let entry_size = if flags.contains(ChunkFlags::LUMA_ONLY) { 4 } else { 6 };
    let start = cursor.pos();
    let mut flag = 0u32;
    let mut mask = 0u32;
    let mut updated = 0;

    for index in 0..CODEBOOK_SIZE {
        if sparse {
            mask >>= 1;
            if mask == 0 {
                if cursor.pos() - start + 4 > chunk_size {
                    break;
                }
                flag = cursor.read_u32_be()?;
                mask = 0x8000_0000;
            }
        }

        if !sparse || flag & mask != 0 {
            if cursor.pos() - start + entry_size > chunk_size {
                break;
            }

            let mut entry = CodebookEntry {
                y: cursor.read_array()?,
                ..CodebookEntry::default()
            };
            // 4 字节条目为灰度或调色板索引, 色度置零
            if entry_size == 6 {
                entry.u = cursor.read_u8()? as i8;
                entry.v = cursor.read_u8()? as i8;
            }
            bank.set_entry(kind, index, entry, qt);
            updated += 1;
        }
    }

    trace!(
        "码本块 0x{:02X}: {:?}, 更新 {} 个条目",
        chunk_id, kind, updated
    );
    Ok(updated)
}
