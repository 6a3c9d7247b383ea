//! Cinepak (CVID) 视频解码器.
//!
//! 码流结构:
//! - 帧头 (10 字节) + 若干条带, 每个条带自上而下覆盖若干行
//! - 条带内为块序列: 0x20..=0x27 码本加载, 0x30..=0x32 向量数据
//! - 每个条带持有独立的 V1/V4 码本, 帧标志 bit0 清零时继承上一条带
//!
//! 输出策略在解码器层面选定一次 (RGB565/RGB24 直出、调色板索引直通、
//! VFW 或 QuickTime 抖动), 内层块循环按策略单态化.
//!
//! 两种输出目标:
//! - [`CinepakDecoder::decode_frame`]: 写入解码器持有的整帧 [`Surface`]
//! - [`CinepakDecoder::decode_frame_streaming`]: 不保留整帧, 经回调逐行/逐块输出

pub mod codebook;
pub mod convert;
pub mod dither;
pub mod header;
pub mod surface;
pub mod tables;
pub mod vectors;

use std::ops::ControlFlow;

use cvid_core::{ByteCursor, CvidError, CvidResult, DitherType, Palette, PixelFormat};
use log::{debug, trace, warn};

use crate::codec_id::CodecId;
use crate::codec_parameters::CodecParameters;
use crate::decoder::Decoder;
use crate::frame::VideoFrame;
use crate::packet::Packet;

use self::codebook::{CodebookBank, CodebookKind, load_codebook};
use self::convert::{
    IndexedConverter, QtConverter, RawConverter, Rgb24, Rgb565Be, Rgb565Le, VfwConverter,
};
use self::dither::{QtDitherTable, VfwDither};
use self::header::{FrameHeader, STRIP_ID_KEYFRAME, StripHeader, StripRect, first_strip_id};
use self::surface::{BlockSink, StreamingSink};
use self::vectors::{VectorStats, decode_vectors};

pub use self::surface::{DrawRegion, Surface};

/// 向量块 ID 范围
const VECTOR_CHUNK_FIRST: u8 = 0x30;
const VECTOR_CHUNK_LAST: u8 = 0x32;

/// 输出颜色策略
#[derive(Debug, Clone)]
enum ColorMode {
    Rgb565Le,
    Rgb565Be,
    Rgb24,
    /// 码本亮度字节即调色板索引
    Indexed,
    DitherVfw(VfwDither),
    DitherQt(QtDitherTable),
}

impl ColorMode {
    fn from_pixel_format(pixel_format: PixelFormat) -> CvidResult<Self> {
        match pixel_format {
            PixelFormat::Rgb565le => Ok(Self::Rgb565Le),
            PixelFormat::Rgb565be => Ok(Self::Rgb565Be),
            PixelFormat::Rgb24 => Ok(Self::Rgb24),
            PixelFormat::Pal8 => Ok(Self::Indexed),
            other => Err(CvidError::InvalidArgument(format!(
                "cinepak 不支持输出格式 {}",
                other
            ))),
        }
    }

    fn pixel_format(&self) -> PixelFormat {
        match self {
            Self::Rgb565Le => PixelFormat::Rgb565le,
            Self::Rgb565Be => PixelFormat::Rgb565be,
            Self::Rgb24 => PixelFormat::Rgb24,
            Self::Indexed | Self::DitherVfw(_) | Self::DitherQt(_) => PixelFormat::Pal8,
        }
    }

    fn qt_table(&self) -> Option<&QtDitherTable> {
        match self {
            Self::DitherQt(table) => Some(table),
            _ => None,
        }
    }

    fn is_dithered(&self) -> bool {
        matches!(self, Self::DitherVfw(_) | Self::DitherQt(_))
    }
}

/// 单个条带的持久状态
#[derive(Debug, Clone)]
struct Strip {
    id: u16,
    rect: StripRect,
    bank: CodebookBank,
}

impl Strip {
    fn new(qt: Option<&QtDitherTable>) -> Self {
        Self {
            id: 0,
            rect: StripRect::default(),
            bank: CodebookBank::new(qt),
        }
    }
}

/// 最近一帧的解码统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// 已处理的条带数
    pub strips: usize,
    /// 其中关键帧条带数
    pub key_strips: usize,
    /// 更新的码本条目总数
    pub codebook_entries: usize,
    pub v1_blocks: usize,
    pub v4_blocks: usize,
    pub skipped_blocks: usize,
    /// 帧或某个块的数据提前结束
    pub truncated: bool,
    /// 遇到未知块 ID 而提前结束本帧
    pub unknown_chunk: Option<u8>,
}

impl FrameStats {
    /// 全部条带均为关键帧条带
    pub fn is_keyframe(&self) -> bool {
        self.strips > 0 && self.key_strips == self.strips
    }

    fn add_vectors(&mut self, v: VectorStats) {
        self.v1_blocks += v.v1_blocks;
        self.v4_blocks += v.v4_blocks;
        self.skipped_blocks += v.skipped_blocks;
        self.truncated |= v.truncated;
    }
}

/// Cinepak 解码器
pub struct CinepakDecoder {
    /// 当前码流宽高, 首帧之前为 None
    dims: Option<(u16, u16)>,
    /// 条带状态, 只增不减
    strips: Vec<Strip>,
    /// 整帧输出表面
    surface: Option<Surface>,
    /// 流式输出的 4 行带状缓冲
    band: Vec<u8>,
    color: ColorMode,
    /// 源位深, 仅 24 位源允许抖动
    bits_per_pixel: u16,
    /// 抖动目标调色板
    dither_palette: Option<Palette>,
    /// 随流提供的调色板, Indexed 输出使用
    stream_palette: Palette,
    dirty_palette: bool,
    stats: FrameStats,
    /// 已解码帧缓冲
    output_frame: Option<VideoFrame>,
    /// 是否已打开 (配置参数)
    opened: bool,
    /// 是否已收到刷新信号 (空包)
    flushing: bool,
}

impl CinepakDecoder {
    /// 创建解码器, 默认输出 RGB565 小端
    pub fn new() -> Self {
        Self {
            dims: None,
            strips: Vec::new(),
            surface: None,
            band: Vec::new(),
            color: ColorMode::Rgb565Le,
            bits_per_pixel: 24,
            dither_palette: None,
            stream_palette: Palette::grayscale(),
            dirty_palette: false,
            stats: FrameStats::default(),
            output_frame: None,
            opened: false,
            flushing: false,
        }
    }

    /// 注册表工厂函数
    pub fn create() -> CvidResult<Box<dyn Decoder>> {
        Ok(Box::new(Self::new()))
    }

    /// 当前输出像素格式
    pub fn pixel_format(&self) -> PixelFormat {
        self.color.pixel_format()
    }

    /// 设置输出像素格式, 清除抖动设置
    ///
    /// `Pal8` 表示调色板索引直通 (不抖动). 抖动输出请使用 [`Self::set_dither`].
    pub fn set_pixel_format(&mut self, pixel_format: PixelFormat) -> CvidResult<()> {
        self.color = ColorMode::from_pixel_format(pixel_format)?;
        self.dither_palette = None;
        self.reallocate_surface()?;
        debug!("cinepak 输出格式: {}", pixel_format);
        Ok(())
    }

    /// 源位深
    pub fn bits_per_pixel(&self) -> u16 {
        self.bits_per_pixel
    }

    /// 设置源位深 (0 视为 24)
    pub fn set_bits_per_pixel(&mut self, bits: u16) {
        self.bits_per_pixel = if bits == 0 { 24 } else { bits };
    }

    /// 是否可以使用指定的抖动类型
    pub fn can_dither(&self, _dither: DitherType) -> bool {
        self.bits_per_pixel == 24
    }

    /// 启用抖动输出到指定调色板
    ///
    /// 重建抖动表, 输出切换为 `Pal8`, 所有条带的 QuickTime 缓存随之刷新,
    /// 表面按新格式重新分配. `can_dither` 不成立时返回 `InvalidArgument` 且状态不变.
    pub fn set_dither(&mut self, dither: DitherType, palette: &Palette) -> CvidResult<()> {
        if !self.can_dither(dither) {
            return Err(CvidError::InvalidArgument(format!(
                "{} 位源不支持 {} 抖动",
                self.bits_per_pixel, dither
            )));
        }

        self.color = match dither {
            DitherType::Vfw => ColorMode::DitherVfw(VfwDither::new(palette)),
            DitherType::QuickTime => {
                let table = QtDitherTable::new(palette);
                for strip in &mut self.strips {
                    strip.bank.refresh_qt_cache(&table);
                }
                ColorMode::DitherQt(table)
            }
        };
        self.dither_palette = Some(palette.clone());
        self.dirty_palette = true;
        self.reallocate_surface()?;
        debug!("cinepak 启用 {} 抖动", dither);
        Ok(())
    }

    /// 输出是否附带调色板
    pub fn contains_palette(&self) -> bool {
        self.color.pixel_format().is_paletted()
    }

    /// 调色板自上次读取后是否变化
    pub fn has_dirty_palette(&self) -> bool {
        self.dirty_palette
    }

    /// 读取输出调色板并清除变化标志
    ///
    /// 抖动时为目标调色板, Indexed 输出时为流调色板, 其余格式为 None.
    pub fn palette(&mut self) -> Option<&Palette> {
        self.dirty_palette = false;
        match &self.color {
            ColorMode::DitherVfw(_) | ColorMode::DitherQt(_) => self.dither_palette.as_ref(),
            ColorMode::Indexed => Some(&self.stream_palette),
            _ => None,
        }
    }

    /// 更新流调色板 (容器侧数据)
    pub fn set_stream_palette(&mut self, palette: Palette) {
        if palette != self.stream_palette {
            self.stream_palette = palette;
            self.dirty_palette = true;
            trace!("cinepak 流调色板已更新");
        }
    }

    /// 最近一帧的宽高
    pub fn dimensions(&self) -> Option<(u16, u16)> {
        self.dims
    }

    /// 最近一次整帧解码的表面
    pub fn surface(&self) -> Option<&Surface> {
        self.surface.as_ref()
    }

    /// 最近一帧的解码统计
    pub fn last_frame_stats(&self) -> &FrameStats {
        &self.stats
    }

    /// 最近一帧各条带的 ID 与矩形
    pub fn strip_layout(&self) -> impl Iterator<Item = (u16, StripRect)> + '_ {
        self.strips
            .iter()
            .take(self.stats.strips)
            .map(|s| (s.id, s.rect))
    }

    /// 丢弃全部码流状态 (尺寸、条带码本、表面), 输出配置保留
    pub fn reset(&mut self) {
        self.dims = None;
        self.strips.clear();
        self.surface = None;
        self.band.clear();
        self.stats = FrameStats::default();
        self.output_frame = None;
        self.flushing = false;
    }

    /// 由首个条带 ID 判断压缩帧是否为关键帧, 帧头不完整时为 `false`
    ///
    /// 用于流式输出前选择整行或逐块回调, 不改变解码器状态.
    pub fn peek_keyframe(data: &[u8]) -> bool {
        first_strip_id(data) == Some(STRIP_ID_KEYFRAME)
    }

    /// 解码一帧到整帧表面
    ///
    /// 数据截断不视为错误, 返回已解码部分. 帧头不完整时返回上一帧的表面,
    /// 尚无表面则返回 `InvalidData`. 条带几何违例返回 `InvalidGeometry`.
    pub fn decode_frame(&mut self, data: &[u8]) -> CvidResult<&Surface> {
        let mut cursor = ByteCursor::new(data);
        self.stats = FrameStats::default();
        let header = match FrameHeader::parse(&mut cursor) {
            Ok(header) => header,
            Err(CvidError::Eof) => {
                debug!("cinepak 帧头不完整 ({} 字节)", data.len());
                self.stats.truncated = true;
                return self
                    .surface
                    .as_ref()
                    .ok_or_else(|| CvidError::InvalidData("cinepak 帧头不完整".into()));
            }
            Err(e) => return Err(e),
        };
        self.prepare(&header)?;

        let mut surface = match self.surface.take() {
            Some(surface) => surface,
            None => Surface::new(header.width, header.height, self.color.pixel_format())?,
        };
        let result = decode_strips(
            &mut self.strips,
            &self.color,
            &header,
            &mut cursor,
            &mut surface,
            &mut self.stats,
        );
        let surface = self.surface.insert(surface);
        absorb_truncation(result, &mut self.stats)?;
        Ok(&*surface)
    }

    /// 解码一帧并通过回调输出像素
    ///
    /// 关键帧每完成一行块输出一次整行 (宽 x 4 行), 帧间帧每个编码块输出一次 4x4 区域.
    /// 像素格式与整帧输出相同. 不使用也不修改整帧表面.
    pub fn decode_frame_streaming<F>(
        &mut self,
        data: &[u8],
        is_keyframe: bool,
        draw: F,
    ) -> CvidResult<()>
    where
        F: FnMut(DrawRegion<'_>),
    {
        let mut cursor = ByteCursor::new(data);
        self.stats = FrameStats::default();
        let header = match FrameHeader::parse(&mut cursor) {
            Ok(header) => header,
            Err(CvidError::Eof) => {
                debug!("cinepak 帧头不完整 ({} 字节)", data.len());
                self.stats.truncated = true;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        self.prepare(&header)?;

        let bytes_per_pixel = self.color.pixel_format().bytes_per_pixel();
        let mut sink = StreamingSink::new(
            is_keyframe,
            header.width,
            bytes_per_pixel,
            &mut self.band,
            draw,
        );
        let result = decode_strips(
            &mut self.strips,
            &self.color,
            &header,
            &mut cursor,
            &mut sink,
            &mut self.stats,
        );
        absorb_truncation(result, &mut self.stats)
    }

    /// 按帧头准备条带与尺寸
    fn prepare(&mut self, header: &FrameHeader) -> CvidResult<()> {
        let dims = (header.width, header.height);
        if self.dims != Some(dims) {
            match self.dims {
                Some((w, h)) => warn!(
                    "cinepak 帧尺寸变化 {}x{} -> {}x{}, 重新初始化",
                    w, h, header.width, header.height
                ),
                None => debug!(
                    "cinepak 首帧: {}x{}, {} 个条带",
                    header.width, header.height, header.strip_count
                ),
            }
            self.dims = Some(dims);
            self.strips.clear();
            self.surface = None;
        }
        Ok(())
    }

    /// 已知尺寸时按当前输出格式重新分配表面
    fn reallocate_surface(&mut self) -> CvidResult<()> {
        self.surface = match self.dims {
            Some((w, h)) => Some(Surface::new(w, h, self.color.pixel_format())?),
            None => None,
        };
        Ok(())
    }
}

impl Default for CinepakDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// 物理数据耗尽视为截断, 其余错误继续传播
fn absorb_truncation(result: CvidResult<()>, stats: &mut FrameStats) -> CvidResult<()> {
    match result {
        Err(CvidError::Eof) => {
            debug!("cinepak 帧数据提前结束");
            stats.truncated = true;
            Ok(())
        }
        other => other,
    }
}

/// 依次解码帧内全部条带
///
/// 条带状态在其条带头成功解析后才分配, 此后跨帧复用.
fn decode_strips<S: BlockSink>(
    strips: &mut Vec<Strip>,
    color: &ColorMode,
    header: &FrameHeader,
    cursor: &mut ByteCursor<'_>,
    sink: &mut S,
    stats: &mut FrameStats,
) -> CvidResult<()> {
    let mut top = 0u16;
    for i in 0..header.strip_count as usize {
        if i < strips.len() {
            carry_over(strips, i, header);
        }
        let strip_header = StripHeader::parse(cursor, top, header.width, header.height)?;
        if i == strips.len() {
            strips.push(Strip::new(color.qt_table()));
            carry_over(strips, i, header);
        }

        let strip = &mut strips[i];
        strip.id = strip_header.id;
        strip.rect = strip_header.rect;
        stats.strips += 1;
        if strip_header.is_keyframe() {
            stats.key_strips += 1;
        }

        let strip_end = cursor.pos() + strip_header.length;
        if decode_chunks(cursor, strip, color, strip_end, sink, stats)?.is_break() {
            return Ok(());
        }
        top = strip.rect.bottom;
    }
    Ok(())
}

/// 帧标志允许时, 第 `i` 个条带沿用前一条带的码本
fn carry_over(strips: &mut [Strip], i: usize, header: &FrameHeader) {
    if i > 0 && header.carries_codebooks() {
        let (done, rest) = strips.split_at_mut(i);
        rest[0].bank.copy_from(&done[i - 1].bank);
    }
}

/// 解码一个条带内的块序列, 遇到未知块 ID 时结束整帧
fn decode_chunks<S: BlockSink>(
    cursor: &mut ByteCursor<'_>,
    strip: &mut Strip,
    color: &ColorMode,
    strip_end: usize,
    sink: &mut S,
    stats: &mut FrameStats,
) -> CvidResult<ControlFlow<()>> {
    while cursor.pos() < strip_end && cursor.left() > 1 {
        let chunk_id = cursor.read_u8()?;
        if cursor.left() <= 1 {
            break;
        }
        // 24 位块长度包含 4 字节块头
        let chunk_size = (cursor.read_u24_be()? as usize).saturating_sub(4);
        let start = cursor.pos();

        if let Some(kind) = CodebookKind::from_chunk_id(chunk_id) {
            stats.codebook_entries += load_codebook(
                cursor,
                &mut strip.bank,
                kind,
                chunk_id,
                chunk_size,
                color.qt_table(),
            )?;
        } else if (VECTOR_CHUNK_FIRST..=VECTOR_CHUNK_LAST).contains(&chunk_id) {
            let v = dispatch_vectors(cursor, strip, color, chunk_id, chunk_size, sink)?;
            stats.add_vectors(v);
        } else {
            warn!("未知的 cinepak 块 ID 0x{:02X}, 结束本帧", chunk_id);
            stats.unknown_chunk = Some(chunk_id);
            return Ok(ControlFlow::Break(()));
        }

        cursor.seek(start + chunk_size);
    }
    Ok(ControlFlow::Continue(()))
}

/// 按颜色策略选择单态化的向量解码
fn dispatch_vectors<S: BlockSink>(
    cursor: &mut ByteCursor<'_>,
    strip: &Strip,
    color: &ColorMode,
    chunk_id: u8,
    chunk_size: usize,
    sink: &mut S,
) -> CvidResult<VectorStats> {
    let (bank, rect) = (&strip.bank, strip.rect);
    match color {
        ColorMode::Rgb565Le => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &RawConverter::<Rgb565Le>::new(),
            sink,
        ),
        ColorMode::Rgb565Be => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &RawConverter::<Rgb565Be>::new(),
            sink,
        ),
        ColorMode::Rgb24 => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &RawConverter::<Rgb24>::new(),
            sink,
        ),
        ColorMode::Indexed => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &IndexedConverter,
            sink,
        ),
        ColorMode::DitherVfw(dither) => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &VfwConverter { dither },
            sink,
        ),
        ColorMode::DitherQt(_) => decode_vectors(
            cursor,
            bank,
            rect,
            chunk_id,
            chunk_size,
            &QtConverter,
            sink,
        ),
    }
}

impl Decoder for CinepakDecoder {
    fn codec_id(&self) -> CodecId {
        CodecId::Cinepak
    }

    fn name(&self) -> &str {
        "cinepak"
    }

    fn open(&mut self, params: &CodecParameters) -> CvidResult<()> {
        let video = params
            .video_params()
            .ok_or_else(|| CvidError::InvalidArgument("cinepak 解码器需要视频参数".into()))?;

        self.reset();
        self.set_bits_per_pixel(video.bits_per_coded_sample);
        if let Some(palette) = &video.palette {
            self.set_stream_palette(palette.clone());
        }

        match (video.pixel_format, video.dither) {
            (PixelFormat::Pal8, Some(dither)) => {
                let palette = video.palette.as_ref().ok_or_else(|| {
                    CvidError::InvalidArgument(format!("{} 抖动需要目标调色板", dither))
                })?;
                self.set_dither(dither, palette)?;
            }
            (pixel_format, Some(dither)) => {
                return Err(CvidError::InvalidArgument(format!(
                    "{} 抖动只能输出 pal8, 请求的是 {}",
                    dither, pixel_format
                )));
            }
            (pixel_format, None) => self.set_pixel_format(pixel_format)?,
        }

        self.opened = true;
        debug!(
            "打开 cinepak 解码器: 输出={}, 源位深={}, 抖动={}",
            self.pixel_format(),
            self.bits_per_pixel,
            self.color.is_dithered(),
        );
        Ok(())
    }

    fn send_packet(&mut self, packet: &Packet) -> CvidResult<()> {
        if !self.opened {
            return Err(CvidError::Codec("解码器未打开, 请先调用 open()".into()));
        }
        if self.output_frame.is_some() {
            return Err(CvidError::NeedMoreData);
        }

        // 空包 = flush
        if packet.is_empty() {
            self.flushing = true;
            return Ok(());
        }

        if let Some(palette) = &packet.palette {
            self.set_stream_palette(palette.clone());
        }

        let surface = self.decode_frame(&packet.data)?;
        let mut frame = VideoFrame::new(
            u32::from(surface.width()),
            u32::from(surface.height()),
            surface.pixel_format(),
        );
        frame.data = surface.data().to_vec();
        frame.linesize = surface.linesize();

        if frame.pixel_format.is_paletted() {
            frame.palette_changed = self.dirty_palette;
            frame.palette = self.palette().cloned();
        }
        frame.pts = packet.pts;
        frame.is_keyframe = packet.is_keyframe || self.stats.is_keyframe();

        self.output_frame = Some(frame);
        Ok(())
    }

    fn receive_frame(&mut self) -> CvidResult<VideoFrame> {
        if let Some(frame) = self.output_frame.take() {
            return Ok(frame);
        }
        if self.flushing {
            return Err(CvidError::Eof);
        }
        Err(CvidError::NeedMoreData)
    }

    fn flush(&mut self) {
        self.output_frame = None;
        self.flushing = false;
    }
}
