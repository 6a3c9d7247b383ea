//! # cvid
//!
//! 纯 Rust 实现的 Cinepak (CVID) 视频解码框架.
//!
//! - **解码**: Cinepak 帧/条带解析、V1/V4 码本与向量解码
//! - **输出**: RGB565 (小端/大端)、RGB24, 以及 VFW/QuickTime 抖动或调色板索引直通的 8 位输出
//! - **输出目标**: 整帧表面, 或按行/按块回调的流式输出
//!
//! # 快速开始
//!
//! ```rust
//! use cvid::codec::{CodecId, CodecParameters, VideoCodecParams};
//! use cvid::core::PixelFormat;
//!
//! let registry = cvid::default_codec_registry();
//! let mut decoder = registry.create_decoder(CodecId::Cinepak).unwrap();
//! let params = CodecParameters::video(CodecId::Cinepak, VideoCodecParams::new(PixelFormat::Rgb24));
//! decoder.open(&params).unwrap();
//! ```
//!
//! # Crate 结构
//!
//! | Crate | 功能 |
//! |-------|------|
//! | `cvid-core` | 错误类型、字节读取、像素格式与调色板 |
//! | `cvid-codec` | 解码器框架与 Cinepak 解码器 |

/// 核心类型与工具
pub use cvid_core as core;

/// 编解码器框架
pub use cvid_codec as codec;

/// 获取 cvid 版本号
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// 创建已注册所有内置编解码器的注册表
pub fn default_codec_registry() -> cvid_codec::CodecRegistry {
    let mut registry = cvid_codec::CodecRegistry::new();
    cvid_codec::register_all(&mut registry);
    registry
}
