//! # cvid-codec
//!
//! Cinepak 解码框架编解码器库, 提供解码器框架、Packet/Frame 抽象与 Cinepak 解码器.
//!
//! ## 支持的编解码器
//!
//! - **解码器**: Cinepak (CVID), 输出 RGB565 (小端/大端)、RGB24 或 8 位调色板 (VFW/QuickTime 抖动)
//!
//! ## 使用示例
//!
//! ```rust
//! use cvid_codec::{CodecRegistry, CodecId};
//!
//! let mut reg = CodecRegistry::new();
//! cvid_codec::register_all(&mut reg);
//!
//! // 按 CodecId 创建解码器实例
//! let decoder = reg.create_decoder(CodecId::Cinepak).unwrap();
//! assert_eq!(decoder.name(), "cinepak");
//! ```

pub mod codec_id;
pub mod codec_parameters;
pub mod decoder;
pub mod decoders;
pub mod frame;
pub mod packet;
pub mod registry;

// 重导出常用类型
pub use codec_id::CodecId;
pub use codec_parameters::{CodecParameters, CodecParamsType, VideoCodecParams};
pub use decoder::Decoder;
pub use decoders::cinepak::{CinepakDecoder, DrawRegion, FrameStats, Surface};
pub use frame::VideoFrame;
pub use packet::Packet;
pub use registry::CodecRegistry;

/// 注册所有内置编解码器
pub fn register_all(registry: &mut CodecRegistry) {
    decoders::register_all_decoders(registry);
}
