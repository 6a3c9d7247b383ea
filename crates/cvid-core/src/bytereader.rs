//! 字节流读取器.
//!
//! 在输入字节缓冲区上按字节顺序读取数据, 所有多字节读取均为大端序 (Cinepak 码流约定).
//!
//! 读取器本身只在物理缓冲区耗尽时返回 [`CvidError::Eof`]. 块 (chunk) 级别的截断判断
//! 由调用方在每次读取前显式比较 `pos() - start + needed > chunk_size` 完成,
//! 这些比较决定了截断是被容忍还是视为块结束, 不能用通用的越界检查代替.

use byteorder::{BigEndian, ByteOrder};

use crate::{CvidError, CvidResult};

/// 大端字节游标
///
/// # 示例
/// ```
/// use cvid_core::bytereader::ByteCursor;
///
/// let data = [0x12, 0x34, 0x56, 0x78, 0x9A];
/// let mut cur = ByteCursor::new(&data);
/// assert_eq!(cur.read_u16_be().unwrap(), 0x1234);
/// assert_eq!(cur.read_u24_be().unwrap(), 0x56789A);
/// assert!(cur.is_eof());
/// ```
pub struct ByteCursor<'a> {
    /// 源数据
    data: &'a [u8],
    /// 当前读取位置 (可以越过末尾, 此后读取返回 Eof)
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// 创建新的字节游标
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    /// 当前位置
    pub fn pos(&self) -> usize {
        self.pos
    }

    /// 缓冲区总字节数
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// 剩余可读字节数
    pub fn left(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// 是否已到达末尾
    pub fn is_eof(&self) -> bool {
        self.pos >= self.data.len()
    }

    /// 跳转到绝对位置
    pub fn seek(&mut self, pos: usize) {
        self.pos = pos;
    }

    /// 相对当前位置移动, 向前越过起点时停在 0
    pub fn seek_delta(&mut self, delta: isize) {
        self.pos = self.pos.saturating_add_signed(delta);
    }

    /// 读取 1 个字节
    pub fn read_u8(&mut self) -> CvidResult<u8> {
        let byte = *self.data.get(self.pos).ok_or(CvidError::Eof)?;
        self.pos += 1;
        Ok(byte)
    }

    /// 读取大端 16 位无符号整数
    pub fn read_u16_be(&mut self) -> CvidResult<u16> {
        let bytes = self.read(2)?;
        Ok(BigEndian::read_u16(bytes))
    }

    /// 读取大端 24 位无符号整数
    pub fn read_u24_be(&mut self) -> CvidResult<u32> {
        let bytes = self.read(3)?;
        Ok(BigEndian::read_u24(bytes))
    }

    /// 读取大端 32 位无符号整数
    pub fn read_u32_be(&mut self) -> CvidResult<u32> {
        let bytes = self.read(4)?;
        Ok(BigEndian::read_u32(bytes))
    }

    /// 读取 n 个字节, 返回借用自源缓冲区的切片
    ///
    /// 数据不足时不移动位置.
    pub fn read(&mut self, n: usize) -> CvidResult<&'a [u8]> {
        if n > self.left() {
            return Err(CvidError::Eof);
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// 读取固定长度数组
    pub fn read_array<const N: usize>(&mut self) -> CvidResult<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read(N)?);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_big_endian() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0A];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.read_u8().unwrap(), 0x01);
        assert_eq!(cur.read_u16_be().unwrap(), 0x0203);
        assert_eq!(cur.read_u24_be().unwrap(), 0x040506);
        assert_eq!(cur.read_u32_be().unwrap(), 0x0708090A);
        assert_eq!(cur.pos(), 10);
        assert!(cur.is_eof());
    }

    #[test]
    fn test_eof_does_not_advance() {
        let data = [0xAA, 0xBB, 0xCC];
        let mut cur = ByteCursor::new(&data);
        cur.read_u8().unwrap();
        assert!(matches!(cur.read_u32_be(), Err(CvidError::Eof)));
        assert_eq!(cur.pos(), 1);
        assert_eq!(cur.read_u16_be().unwrap(), 0xBBCC);
        assert!(matches!(cur.read_u8(), Err(CvidError::Eof)));
    }

    #[test]
    fn test_seek_and_delta() {
        let data = [0u8, 1, 2, 3, 4, 5];
        let mut cur = ByteCursor::new(&data);
        cur.seek(4);
        assert_eq!(cur.read_u8().unwrap(), 4);
        cur.seek_delta(-2);
        assert_eq!(cur.pos(), 3);
        cur.seek_delta(-10);
        assert_eq!(cur.pos(), 0);
        // 越过末尾的 seek 是允许的, 之后读取返回 Eof
        cur.seek(100);
        assert_eq!(cur.left(), 0);
        assert!(cur.is_eof());
        assert!(matches!(cur.read_u8(), Err(CvidError::Eof)));
    }

    #[test]
    fn test_read_slice_and_array() {
        let data = [9u8, 8, 7, 6, 5];
        let mut cur = ByteCursor::new(&data);
        assert_eq!(cur.read(2).unwrap(), &[9, 8]);
        let arr: [u8; 3] = cur.read_array().unwrap();
        assert_eq!(arr, [7, 6, 5]);
        assert_eq!(cur.size(), 5);
    }
}
