//! # cvid-core
//!
//! Cinepak 解码框架核心库, 提供基础类型定义、错误处理和字节流读取工具.
//!
//! 本 crate 为 `cvid-codec` 与命令行工具提供底层基础设施.

pub mod bytereader;
pub mod error;
pub mod palette;
pub mod pixel_format;

// 重导出常用类型
pub use bytereader::ByteCursor;
pub use error::{CvidError, CvidResult};
pub use palette::{DitherType, Palette};
pub use pixel_format::PixelFormat;
