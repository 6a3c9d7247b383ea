//! cvid-cli - Cinepak 帧解码命令行工具
//!
//! 每个输入文件为一帧 Cinepak 压缩数据 (由容器解复用得到), 按顺序送入同一个解码器,
//! 可写出 PPM 或原始像素, 并输出逐帧统计.

mod logging;
mod output;

use std::fs;
use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, bail};
use clap::Parser;
use log::{debug, info};
use serde::Serialize;

use cvid_codec::{
    CinepakDecoder, CodecId, CodecParameters, Decoder, FrameStats, Packet, VideoCodecParams,
    VideoFrame,
};
use cvid_core::{DitherType, Palette, PixelFormat};

use output::{OutputKind, frame_path, write_frame};

/// Cinepak 帧解码工具
#[derive(Parser, Debug)]
#[command(name = "cvid-cli", version, about = "Cinepak 帧解码工具")]
struct Cli {
    /// 输入帧文件 (每个文件一帧, 按顺序解码)
    #[arg(required = true)]
    frames: Vec<PathBuf>,

    /// 输出像素格式 (rgb565le, rgb565be, rgb24, pal8)
    #[arg(long = "pixel-format", default_value = "rgb24")]
    pixel_format: String,

    /// 抖动到调色板 (vfw, quicktime), 隐含 pal8 输出
    #[arg(long)]
    dither: Option<String>,

    /// 调色板文件 (768 字节 RGB 或 1024 字节 RGBQUAD)
    #[arg(long)]
    palette: Option<PathBuf>,

    /// 源位深
    #[arg(long, default_value_t = 24)]
    bits: u16,

    /// 输出目录 (写出 frame_NNNN.ppm)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// 写出原始像素而不是 PPM
    #[arg(long)]
    raw: bool,

    /// 使用流式回调输出并统计绘制调用
    #[arg(long)]
    streaming: bool,

    /// 输出 JSON 格式的逐帧报告
    #[arg(long)]
    json: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

// ============================================================
// 报告结构体
// ============================================================

/// 单帧解码报告
#[derive(Serialize, Debug)]
struct FrameReport {
    index: usize,
    file: String,
    bytes: usize,
    width: u16,
    height: u16,
    pixel_format: String,
    keyframe: bool,
    strips: usize,
    codebook_entries: usize,
    v1_blocks: usize,
    v4_blocks: usize,
    skipped_blocks: usize,
    truncated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    unknown_chunk: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    draw_calls: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

impl FrameReport {
    fn new(
        index: usize,
        path: &Path,
        bytes: usize,
        frame: &VideoFrame,
        stats: &FrameStats,
    ) -> Self {
        Self {
            index,
            file: path.display().to_string(),
            bytes,
            width: frame.width as u16,
            height: frame.height as u16,
            pixel_format: frame.pixel_format.to_string(),
            keyframe: frame.is_keyframe,
            strips: stats.strips,
            codebook_entries: stats.codebook_entries,
            v1_blocks: stats.v1_blocks,
            v4_blocks: stats.v4_blocks,
            skipped_blocks: stats.skipped_blocks,
            truncated: stats.truncated,
            unknown_chunk: stats.unknown_chunk.map(|id| format!("0x{:02X}", id)),
            draw_calls: None,
            output: None,
        }
    }
}

// ============================================================
// 主逻辑
// ============================================================

fn main() {
    let cli = Cli::parse();
    if let Err(e) = logging::init("cvid-cli", cli.verbose) {
        eprintln!("警告: 日志初始化失败: {e:#}");
    }

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut decoder = CinepakDecoder::new();
    decoder
        .open(&build_params(cli)?)
        .context("配置解码器失败")?;

    let kind = if cli.raw {
        OutputKind::Raw
    } else {
        OutputKind::Ppm
    };
    if let Some(dir) = &cli.output {
        fs::create_dir_all(dir).with_context(|| format!("创建目录 {} 失败", dir.display()))?;
    }

    let mut canvas = Canvas::default();
    let mut reports = Vec::with_capacity(cli.frames.len());
    for (index, path) in cli.frames.iter().enumerate() {
        let data = fs::read(path).with_context(|| format!("读取 {} 失败", path.display()))?;
        debug!("帧 {}: {} ({} 字节)", index, path.display(), data.len());

        let (frame, draw_calls) = if cli.streaming {
            let (frame, calls) = decode_streaming(&mut decoder, &mut canvas, &data)
                .with_context(|| format!("解码 {} 失败", path.display()))?;
            (frame, Some(calls))
        } else {
            let frame = decode_packet(&mut decoder, index, &data)
                .with_context(|| format!("解码 {} 失败", path.display()))?;
            (frame, None)
        };

        let mut report =
            FrameReport::new(index, path, data.len(), &frame, decoder.last_frame_stats());
        report.draw_calls = draw_calls;
        if let Some(dir) = &cli.output {
            let out = frame_path(dir, index, kind);
            write_frame(&out, &frame, kind)?;
            report.output = Some(out.display().to_string());
        }

        if !cli.json {
            print_report_text(&report);
        }
        reports.push(report);
    }

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    }
    info!("共解码 {} 帧", reports.len());
    Ok(())
}

/// 由命令行选项构造解码参数
fn build_params(cli: &Cli) -> anyhow::Result<CodecParameters> {
    let dither = cli
        .dither
        .as_deref()
        .map(|name| DitherType::from_name(name).with_context(|| format!("未知的抖动类型: {name}")))
        .transpose()?;

    let pixel_format = if dither.is_some() {
        PixelFormat::Pal8
    } else {
        PixelFormat::from_name(&cli.pixel_format)
            .with_context(|| format!("未知的像素格式: {}", cli.pixel_format))?
    };

    let mut video = VideoCodecParams::new(pixel_format);
    video.bits_per_coded_sample = cli.bits;
    video.dither = dither;
    if let Some(path) = &cli.palette {
        video.palette = Some(load_palette(path)?);
    } else if dither.is_some() {
        bail!("抖动输出需要 --palette");
    }
    Ok(CodecParameters::video(CodecId::Cinepak, video))
}

/// 读取调色板文件
fn load_palette(path: &Path) -> anyhow::Result<Palette> {
    let data = fs::read(path).with_context(|| format!("读取调色板 {} 失败", path.display()))?;
    let palette = if data.len() == 1024 {
        Palette::from_bgr_quads(&data)?
    } else {
        Palette::from_rgb(&data)?
    };
    Ok(palette)
}

/// 经 Decoder trait 解码一帧
fn decode_packet(
    decoder: &mut CinepakDecoder,
    index: usize,
    data: &[u8],
) -> anyhow::Result<VideoFrame> {
    let mut packet = Packet::from_data(data.to_vec());
    packet.pts = index as i64;
    decoder.send_packet(&packet)?;
    Ok(decoder.receive_frame()?)
}

/// 流式回调的拼接画布
#[derive(Default)]
struct Canvas {
    width: u16,
    height: u16,
    bytes_per_pixel: usize,
    data: Vec<u8>,
}

impl Canvas {
    fn ensure(&mut self, width: u16, height: u16, bytes_per_pixel: usize) {
        if (self.width, self.height, self.bytes_per_pixel) != (width, height, bytes_per_pixel) {
            self.width = width;
            self.height = height;
            self.bytes_per_pixel = bytes_per_pixel;
            self.data = vec![0; width as usize * height as usize * bytes_per_pixel];
        }
    }

    /// 复制一个区域, 超出画布的部分丢弃
    fn blit(&mut self, x: u16, y: u16, width: u16, height: u16, pixels: &[u8]) {
        let bpp = self.bytes_per_pixel;
        let stride = self.width as usize * bpp;
        let src_stride = width as usize * bpp;
        let cols = (width.min(self.width.saturating_sub(x))) as usize * bpp;
        for row in 0..height as usize {
            let dy = y as usize + row;
            if dy >= self.height as usize {
                break;
            }
            let dst = dy * stride + x as usize * bpp;
            let src = row * src_stride;
            if let (Some(d), Some(s)) = (
                self.data.get_mut(dst..dst + cols),
                pixels.get(src..src + cols),
            ) {
                d.copy_from_slice(s);
            }
        }
    }
}

/// 流式解码一帧, 将回调区域拼接到画布
///
/// 首个条带 ID 为 0x10 时按关键帧处理.
fn decode_streaming(
    decoder: &mut CinepakDecoder,
    canvas: &mut Canvas,
    data: &[u8],
) -> anyhow::Result<(VideoFrame, usize)> {
    let is_keyframe = CinepakDecoder::peek_keyframe(data);
    let mut regions = Vec::new();
    decoder.decode_frame_streaming(data, is_keyframe, |r| {
        regions.push((r.x, r.y, r.width, r.height, r.pixels.to_vec()));
    })?;

    let (width, height) = decoder
        .dimensions()
        .context("流式解码未得到帧尺寸")?;
    let pixel_format = decoder.pixel_format();
    canvas.ensure(width, height, pixel_format.bytes_per_pixel());
    for (x, y, w, h, pixels) in &regions {
        canvas.blit(*x, *y, *w, *h, pixels);
    }

    let mut frame = VideoFrame::new(u32::from(width), u32::from(height), pixel_format);
    frame.data = canvas.data.clone();
    frame.is_keyframe = is_keyframe;
    if pixel_format.is_paletted() {
        frame.palette_changed = decoder.has_dirty_palette();
        frame.palette = decoder.palette().cloned();
    }
    Ok((frame, regions.len()))
}

fn print_report_text(r: &FrameReport) {
    println!(
        "帧 {:4}: {}x{} {} {} 条带={} 码本条目={} V1={} V4={} 跳过={}{}{}",
        r.index,
        r.width,
        r.height,
        r.pixel_format,
        if r.keyframe { "关键帧" } else { "帧间" },
        r.strips,
        r.codebook_entries,
        r.v1_blocks,
        r.v4_blocks,
        r.skipped_blocks,
        if r.truncated { " [截断]" } else { "" },
        r.draw_calls
            .map(|n| format!(" 绘制={n}"))
            .unwrap_or_default(),
    );
    if let Some(id) = &r.unknown_chunk {
        println!("        未知块 {id}, 本帧提前结束");
    }
    if let Some(out) = &r.output {
        println!("        -> {out}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_blit_clips() {
        let mut canvas = Canvas::default();
        canvas.ensure(4, 4, 1);
        canvas.blit(2, 2, 4, 4, &[9; 16]);
        assert_eq!(&canvas.data[..8], &[0; 8]);
        assert_eq!(&canvas.data[8..12], &[0, 0, 9, 9]);
        assert_eq!(&canvas.data[12..16], &[0, 0, 9, 9]);
    }

    #[test]
    fn test_streaming_keyframe_after_sega_extra_data() {
        // 帧头 + 0xFE00 附加数据 + 一个 4x4 关键帧条带 (单个 V1 块)
        let mut data = vec![1, 0, 0, 37, 0, 4, 0, 4, 0, 1];
        data.extend_from_slice(&[0xFE, 0x00, 1, 2, 3, 4]);
        data.extend_from_slice(&[0, 0x10, 0, 27, 0, 0, 0, 0, 0, 4, 0, 4]);
        data.extend_from_slice(&[0x22, 0, 0, 10, 100, 100, 100, 100, 0, 0]);
        data.extend_from_slice(&[0x32, 0, 0, 5, 0]);

        let mut decoder = CinepakDecoder::new();
        let mut canvas = Canvas::default();
        let (frame, calls) = decode_streaming(&mut decoder, &mut canvas, &data).unwrap();
        assert!(frame.is_keyframe);
        // 关键帧按整行输出: 一行块只回调一次
        assert_eq!(calls, 1);
        assert_eq!((frame.width, frame.height), (4, 4));
        assert!(frame.data.iter().any(|&b| b != 0));
    }

    #[test]
    fn test_build_params_dither_needs_palette() {
        let cli = Cli::parse_from(["cvid-cli", "--dither", "vfw", "a.bin"]);
        assert!(build_params(&cli).is_err());

        let cli = Cli::parse_from(["cvid-cli", "--pixel-format", "rgb565be", "a.bin"]);
        let params = build_params(&cli).unwrap();
        let video = params.video_params().unwrap();
        assert_eq!(video.pixel_format, PixelFormat::Rgb565be);
        assert_eq!(video.bits_per_coded_sample, 24);
    }

    #[test]
    fn test_build_params_rejects_unknown_names() {
        let cli = Cli::parse_from(["cvid-cli", "--pixel-format", "yuv420p", "a.bin"]);
        assert!(build_params(&cli).is_err());
        let cli = Cli::parse_from(["cvid-cli", "--dither", "floyd", "a.bin"]);
        assert!(build_params(&cli).is_err());
    }

    #[test]
    fn test_load_palette_formats() {
        let dir = tempfile::tempdir().unwrap();
        let rgb = dir.path().join("p.rgb");
        let mut data = vec![0u8; 768];
        data[3..6].copy_from_slice(&[1, 2, 3]);
        fs::write(&rgb, &data).unwrap();
        assert_eq!(load_palette(&rgb).unwrap().entry(1), [1, 2, 3]);

        let quads = dir.path().join("p.pal");
        let mut data = vec![0u8; 1024];
        data[4..8].copy_from_slice(&[3, 2, 1, 0]);
        fs::write(&quads, &data).unwrap();
        assert_eq!(load_palette(&quads).unwrap().entry(1), [1, 2, 3]);

        let bad = dir.path().join("bad");
        fs::write(&bad, [0u8; 10]).unwrap();
        assert!(load_palette(&bad).is_err());
    }
}
