//! 帧头与条带头解析.
//!
//! 帧头 10 字节: flags(u8), length(u24), width(u16), height(u16), strip_count(u16),
//! 全部大端. 条带头 12 字节: id, size, 以及四个坐标字段. 条带矩形不采用码流中的
//! 坐标, 而是由当前纵向游标与高度增量推导.

use bitflags::bitflags;
use cvid_core::{ByteCursor, CvidError, CvidResult};
use log::trace;

/// Sega FILM 变体在帧头后追加的标记
const SEGA_EXTRA_MARKER: u16 = 0xFE00;

/// 条带头长度
pub const STRIP_HEADER_SIZE: usize = 12;

bitflags! {
    /// 帧标志
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FrameFlags: u8 {
        /// 各条带使用独立码本 (不继承上一条带)
        const NO_CODEBOOK_CARRY = 0x01;
    }
}

/// 条带 ID: 关键帧条带
pub const STRIP_ID_KEYFRAME: u16 = 0x10;

/// 帧头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// 帧标志
    pub flags: FrameFlags,
    /// 声明的帧长度
    pub length: u32,
    /// 宽度 (像素)
    pub width: u16,
    /// 高度 (像素)
    pub height: u16,
    /// 条带数
    pub strip_count: u16,
}

impl FrameHeader {
    /// 读取帧头并跳过 Sega FILM 附加数据
    ///
    /// 声明长度与实际数据长度不一致时, 再读一个 u16: 若为 0xFE00 则再丢弃 4 字节;
    /// 否则若实际长度是声明长度的整数倍, 退回这 2 字节. 两个条件都不满足时这 2 字节
    /// 保持已消耗.
    pub fn parse(cursor: &mut ByteCursor<'_>) -> CvidResult<Self> {
        let flags = FrameFlags::from_bits_retain(cursor.read_u8()?);
        let length = cursor.read_u24_be()?;
        let width = cursor.read_u16_be()?;
        let height = cursor.read_u16_be()?;
        let strip_count = cursor.read_u16_be()?;

        let size = cursor.size();
        if length as usize != size {
            match cursor.read_u16_be() {
                Ok(SEGA_EXTRA_MARKER) => {
                    cursor.seek_delta(4);
                    trace!("跳过 Sega FILM 附加数据");
                }
                Ok(_) if length != 0 && size % length as usize == 0 => cursor.seek_delta(-2),
                // 帧头之后没有数据时保持原位
                _ => {}
            }
        }

        Ok(Self {
            flags,
            length,
            width,
            height,
            strip_count,
        })
    }

    /// 条带是否继承上一条带的码本
    pub fn carries_codebooks(&self) -> bool {
        !self.flags.contains(FrameFlags::NO_CODEBOOK_CARRY)
    }
}

/// 跳过帧头 (含 Sega FILM 附加数据) 后读取首个条带 ID, 数据不足时为 `None`
pub fn first_strip_id(data: &[u8]) -> Option<u16> {
    let mut cursor = ByteCursor::new(data);
    FrameHeader::parse(&mut cursor).ok()?;
    cursor.read_u16_be().ok()
}

/// 条带像素矩形 (右/下边界不含)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StripRect {
    pub top: u16,
    pub left: u16,
    pub bottom: u16,
    pub right: u16,
}

impl StripRect {
    pub fn width(&self) -> u16 {
        self.right.saturating_sub(self.left)
    }

    pub fn height(&self) -> u16 {
        self.bottom.saturating_sub(self.top)
    }
}

/// 条带头
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StripHeader {
    /// 条带 ID (0x10 关键帧, 0x11 帧间)
    pub id: u16,
    /// 条带负载长度 (已扣除 12 字节头)
    pub length: usize,
    /// 推导出的像素矩形
    pub rect: StripRect,
}

impl StripHeader {
    /// 读取条带头, 以纵向游标 `top` 与帧宽推导矩形并校验几何
    pub fn parse(
        cursor: &mut ByteCursor<'_>,
        top: u16,
        frame_width: u16,
        frame_height: u16,
    ) -> CvidResult<Self> {
        let id = cursor.read_u16_be()?;
        let length = (cursor.read_u16_be()? as usize).saturating_sub(STRIP_HEADER_SIZE);
        cursor.read_u16_be()?;
        cursor.read_u16_be()?;
        let height = cursor.read_u16_be()?;
        cursor.read_u16_be()?;

        let bottom = top.checked_add(height).ok_or_else(|| {
            CvidError::InvalidGeometry(format!("条带底边溢出: top={}, height={}", top, height))
        })?;
        let rect = StripRect {
            top,
            left: 0,
            bottom,
            right: frame_width,
        };
        validate_rect(&rect, frame_height)?;

        trace!(
            "条带 id=0x{:02X}, 长度={}, 矩形=({}, {})-({}, {})",
            id, length, rect.left, rect.top, rect.right, rect.bottom
        );
        Ok(Self { id, length, rect })
    }

    /// 是否为关键帧条带
    pub fn is_keyframe(&self) -> bool {
        self.id == STRIP_ID_KEYFRAME
    }
}

/// 条带宽高必须是 4 的倍数且不超出帧
fn validate_rect(rect: &StripRect, frame_height: u16) -> CvidResult<()> {
    if rect.width() % 4 != 0 || rect.height() % 4 != 0 {
        return Err(CvidError::InvalidGeometry(format!(
            "条带尺寸 {}x{} 不是 4 的倍数",
            rect.width(),
            rect.height()
        )));
    }
    if rect.bottom > frame_height {
        return Err(CvidError::InvalidGeometry(format!(
            "条带底边 {} 超出帧高 {}",
            rect.bottom, frame_height
        )));
    }
    Ok(())
}
