//! 解码器 trait 定义.
//!
//! 所有解码器实现必须实现 `Decoder` trait.

use cvid_core::CvidResult;

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::frame::VideoFrame;
use crate::packet::Packet;

/// 解码器 trait
///
/// 解码流程:
/// 1. 调用 `open()` 配置输出格式
/// 2. 调用 `send_packet()` 送入一帧压缩数据
/// 3. 调用 `receive_frame()` 取出解码后的帧
/// 4. 送入空包 (flush) 表示流结束, 之后 `receive_frame()` 返回 `Eof`
pub trait Decoder: Send {
    /// 获取解码器标识
    fn codec_id(&self) -> CodecId;

    /// 获取解码器名称
    fn name(&self) -> &str;

    /// 使用参数配置解码器
    fn open(&mut self, params: &CodecParameters) -> CvidResult<()>;

    /// 送入一个压缩数据包进行解码
    ///
    /// # 返回
    /// - `Ok(())`: 数据包已接受
    /// - `Err(CvidError::NeedMoreData)`: 上一帧尚未取出
    /// - `Err(CvidError::Codec)`: 解码器未打开
    fn send_packet(&mut self, packet: &Packet) -> CvidResult<()>;

    /// 从解码器取出一帧解码数据
    ///
    /// # 返回
    /// - `Ok(frame)`: 成功取出一帧
    /// - `Err(CvidError::NeedMoreData)`: 需要送入更多数据包
    /// - `Err(CvidError::Eof)`: 所有帧已取出
    fn receive_frame(&mut self) -> CvidResult<VideoFrame>;

    /// 清空待取出的帧与刷新状态
    ///
    /// 用于 seek 后重置. 码本与表面保留, 下一个关键帧会整体覆盖它们.
    fn flush(&mut self);
}
