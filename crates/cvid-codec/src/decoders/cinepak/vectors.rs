//! 向量块解码 (0x30..=0x32).
//!
//! 在条带矩形内按 4x4 块光栅顺序行进. 跳过位与 V1/V4 选择位来自同一个
//! 32 位标志寄存器, 按 MSB 优先逐位消耗, 耗尽时从码流补充:
//! - 块 ID bit0 置位: 每块先消耗一位, 0 表示跳过 (保留上一帧像素)
//! - 块 ID bit1 清零: 非跳过块再消耗一位, 0 为 V1, 1 为 V4
//! - 块 ID bit1 置位: 非跳过块一律为 V1

use cvid_core::{ByteCursor, CvidResult};
use log::trace;

use super::codebook::{ChunkFlags, CodebookBank};
use super::convert::{BlockConverter, PixelBlock};
use super::header::StripRect;
use super::surface::BlockSink;

/// 单个向量块的解码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorStats {
    /// V1 块数
    pub v1_blocks: usize,
    /// V4 块数
    pub v4_blocks: usize,
    /// 跳过的块数
    pub skipped_blocks: usize,
    /// 块数据在条带走完前耗尽
    pub truncated: bool,
}

/// 共享的标志/掩码寄存器
struct FlagRegister {
    flag: u32,
    mask: u32,
}

impl FlagRegister {
    /// 取下一位, 必要时补充标志字; 块内剩余不足 4 字节时返回 None
    #[inline]
    fn next(
        &mut self,
        cursor: &mut ByteCursor<'_>,
        start: usize,
        chunk_size: usize,
    ) -> CvidResult<Option<bool>> {
        self.mask >>= 1;
        if self.mask == 0 {
            if cursor.pos() - start + 4 > chunk_size {
                return Ok(None);
            }
            self.flag = cursor.read_u32_be()?;
            self.mask = 0x8000_0000;
        }
        Ok(Some(self.flag & self.mask != 0))
    }
}

/// 解码一个向量块
///
/// 游标位于块负载起点. 任何读取将越过 `chunk_size` 时, 本块剩余部分被放弃,
/// 已输出的像素保留.
pub fn decode_vectors<C: BlockConverter, S: BlockSink>(
    cursor: &mut ByteCursor<'_>,
    bank: &CodebookBank,
    rect: StripRect,
    chunk_id: u8,
    chunk_size: usize,
    converter: &C,
    sink: &mut S,
) -> CvidResult<VectorStats> {
    let flags = ChunkFlags::from_bits_truncate(chunk_id);
    let has_skip = flags.contains(ChunkFlags::SPARSE);
    let v1_only = flags.contains(ChunkFlags::V1_ONLY);
    let start = cursor.pos();
    let mut reg = FlagRegister { flag: 0, mask: 0 };
    let mut stats = VectorStats::default();
    let mut block = PixelBlock::default();

    for y in (rect.top..rect.bottom).step_by(4) {
        for x in (rect.left..rect.right).step_by(4) {
            if has_skip {
                match reg.next(cursor, start, chunk_size)? {
                    Some(true) => {}
                    Some(false) => {
                        stats.skipped_blocks += 1;
                        continue;
                    }
                    None => return Ok(truncated(stats, chunk_id)),
                }
            }

            let use_v4 = if v1_only {
                false
            } else {
                match reg.next(cursor, start, chunk_size)? {
                    Some(bit) => bit,
                    None => return Ok(truncated(stats, chunk_id)),
                }
            };

            if use_v4 {
                if cursor.pos() - start + 4 > chunk_size {
                    return Ok(truncated(stats, chunk_id));
                }
                let indices = cursor.read_array::<4>()?;
                converter.decode_block4(bank, indices, &mut block);
                stats.v4_blocks += 1;
            } else {
                if cursor.pos() - start + 1 > chunk_size {
                    return Ok(truncated(stats, chunk_id));
                }
                let index = cursor.read_u8()?;
                converter.decode_block1(bank, index, &mut block);
                stats.v1_blocks += 1;
            }
            sink.put_block(x, y, &block, C::BYTES_PER_PIXEL);
        }
        sink.end_row(y);
    }

    trace!(
        "向量块 0x{:02X}: V1={}, V4={}, 跳过={}",
        chunk_id, stats.v1_blocks, stats.v4_blocks, stats.skipped_blocks
    );
    Ok(stats)
}

fn truncated(mut stats: VectorStats, chunk_id: u8) -> VectorStats {
    trace!("向量块 0x{:02X} 数据不足, 提前结束", chunk_id);
    stats.truncated = true;
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoders::cinepak::codebook::CodebookEntry;
    use crate::decoders::cinepak::convert::IndexedConverter;

    /// 记录每个块左上像素与行结束事件
    #[derive(Default)]
    struct Recorder {
        blocks: Vec<(u16, u16, u8)>,
        rows: Vec<u16>,
    }

    impl BlockSink for Recorder {
        fn put_block(&mut self, x: u16, y: u16, block: &PixelBlock, _bpp: usize) {
            self.blocks.push((x, y, block.rows[0][0]));
        }

        fn end_row(&mut self, y: u16) {
            self.rows.push(y);
        }
    }

    fn bank() -> CodebookBank {
        let mut bank = CodebookBank::new(None);
        for i in 0..256 {
            bank.v1[i] = CodebookEntry {
                y: [i as u8; 4],
                u: 0,
                v: 0,
            };
            bank.v4[i] = CodebookEntry {
                y: [(i as u8).wrapping_add(100); 4],
                u: 0,
                v: 0,
            };
        }
        bank
    }

    fn rect(w: u16, h: u16) -> StripRect {
        StripRect {
            top: 0,
            left: 0,
            bottom: h,
            right: w,
        }
    }

    #[test]
    fn test_v1_only_chunk() {
        let data = [5u8, 6, 7, 8];
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats =
            decode_vectors(&mut cur, &bank(), rect(8, 8), 0x32, 4, &IndexedConverter, &mut rec)
                .unwrap();
        assert_eq!(stats.v1_blocks, 4);
        assert_eq!(rec.blocks, vec![(0, 0, 5), (4, 0, 6), (0, 4, 7), (4, 4, 8)]);
        assert_eq!(rec.rows, vec![0, 4]);
    }

    #[test]
    fn test_v1_v4_selection_bits() {
        // 标志 01...: 第一块 V1, 第二块 V4
        let data = [0x40, 0, 0, 0, 9, 1, 2, 3, 4];
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats =
            decode_vectors(&mut cur, &bank(), rect(8, 4), 0x30, 9, &IndexedConverter, &mut rec)
                .unwrap();
        assert_eq!((stats.v1_blocks, stats.v4_blocks), (1, 1));
        assert_eq!(rec.blocks, vec![(0, 0, 9), (4, 0, 101)]);
    }

    #[test]
    fn test_skip_and_type_share_one_register() {
        // 4 个块, 位流: 0 | 1 0 | 1 1 | 0  => 跳过, V1, V4, 跳过
        // 0b0101_1000 ...
        let data = [0x58, 0, 0, 0, 42, 7, 7, 7, 7];
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats =
            decode_vectors(&mut cur, &bank(), rect(16, 4), 0x31, 9, &IndexedConverter, &mut rec)
                .unwrap();
        assert_eq!(stats.skipped_blocks, 2);
        assert_eq!(rec.blocks, vec![(4, 0, 42), (8, 0, 107)]);
        assert_eq!(cur.pos(), 9);
    }

    #[test]
    fn test_flag_refill_after_32_bits() {
        // 0x31 下 32 个跳过块用完一个标志字, 第 33 块需要新字
        let mut data = vec![0, 0, 0, 0];
        data.extend_from_slice(&[0x80, 0, 0, 0, 3]);
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats = decode_vectors(
            &mut cur,
            &bank(),
            rect(33 * 4, 4),
            0x31,
            data.len(),
            &IndexedConverter,
            &mut rec,
        )
        .unwrap();
        assert_eq!(stats.skipped_blocks, 32);
        // 第 33 块: 跳过位 1, 类型位 0 => V1
        assert_eq!(rec.blocks, vec![(128, 0, 3)]);
        assert!(!stats.truncated);
    }

    #[test]
    fn test_truncated_vector_chunk_keeps_prior_blocks() {
        let data = [1u8, 2];
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats =
            decode_vectors(&mut cur, &bank(), rect(16, 4), 0x32, 2, &IndexedConverter, &mut rec)
                .unwrap();
        assert!(stats.truncated);
        assert_eq!(rec.blocks.len(), 2);
        // 未走完的行不报告结束
        assert!(rec.rows.is_empty());
    }

    #[test]
    fn test_v4_needs_four_bytes() {
        let data = [0x80, 0, 0, 0, 1, 2, 3];
        let mut cur = ByteCursor::new(&data);
        let mut rec = Recorder::default();
        let stats =
            decode_vectors(&mut cur, &bank(), rect(4, 4), 0x30, 7, &IndexedConverter, &mut rec)
                .unwrap();
        assert!(stats.truncated);
        assert!(rec.blocks.is_empty());
        assert_eq!(cur.pos(), 4);
    }
}
