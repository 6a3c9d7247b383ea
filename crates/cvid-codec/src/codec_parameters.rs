//! 编解码器参数.
//!
//! 描述解码器的配置参数, 通常从容器格式 (AVI `strf`, QuickTime `stsd`) 中提取,
//! 再叠加调用方对输出格式的要求.

use cvid_core::{DitherType, Palette, PixelFormat};

use crate::codec_id::CodecId;

/// 编解码器参数
#[derive(Debug, Clone)]
pub struct CodecParameters {
    /// 编解码器标识
    pub codec_id: CodecId,
    /// 媒体类型特定参数
    pub params: CodecParamsType,
}

/// 媒体类型特定参数
#[derive(Debug, Clone)]
pub enum CodecParamsType {
    /// 视频参数
    Video(VideoCodecParams),
    /// 无特定参数
    None,
}

/// 视频编解码器参数
#[derive(Debug, Clone)]
pub struct VideoCodecParams {
    /// 宽度 (像素), 0 表示由码流决定
    pub width: u32,
    /// 高度 (像素), 0 表示由码流决定
    pub height: u32,
    /// 期望的输出像素格式
    pub pixel_format: PixelFormat,
    /// 源位深 (`biBitCount`), 0 按 24 处理. 只有 24 位源允许抖动
    pub bits_per_coded_sample: u16,
    /// 抖动类型 (仅 Pal8 输出有效)
    pub dither: Option<DitherType>,
    /// 调色板: 抖动时为目标调色板, 否则为流自带调色板
    pub palette: Option<Palette>,
}

impl VideoCodecParams {
    /// 以指定输出格式创建, 其余字段取默认值
    pub fn new(pixel_format: PixelFormat) -> Self {
        Self {
            width: 0,
            height: 0,
            pixel_format,
            bits_per_coded_sample: 24,
            dither: None,
            palette: None,
        }
    }
}

impl CodecParameters {
    /// 创建视频参数
    pub fn video(codec_id: CodecId, video: VideoCodecParams) -> Self {
        Self {
            codec_id,
            params: CodecParamsType::Video(video),
        }
    }

    /// 获取视频参数 (如果是视频流)
    pub fn video_params(&self) -> Option<&VideoCodecParams> {
        match &self.params {
            CodecParamsType::Video(v) => Some(v),
            CodecParamsType::None => None,
        }
    }
}
