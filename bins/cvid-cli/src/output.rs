//! 解码结果写出: PPM (P6) 或原始像素.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use cvid_codec::VideoFrame;

/// 输出文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    /// 二进制 PPM, RGB24
    Ppm,
    /// 解码器输出格式的原始像素, 逐行紧密排列
    Raw,
}

impl OutputKind {
    fn extension(self) -> &'static str {
        match self {
            Self::Ppm => "ppm",
            Self::Raw => "raw",
        }
    }
}

/// 第 `index` 帧的输出路径 (`frame_0000.ppm`)
pub fn frame_path(dir: &Path, index: usize, kind: OutputKind) -> PathBuf {
    dir.join(format!("frame_{:04}.{}", index, kind.extension()))
}

/// 按格式写出一帧
pub fn write_frame(path: &Path, frame: &VideoFrame, kind: OutputKind) -> anyhow::Result<()> {
    match kind {
        OutputKind::Ppm => {
            let rgb = frame.to_rgb24().context("转换为 RGB24 失败")?;
            write_ppm(path, frame.width, frame.height, &rgb)
        }
        OutputKind::Raw => fs::write(path, &frame.data)
            .with_context(|| format!("写入 {} 失败", path.display())),
    }
}

/// 写出二进制 PPM
pub fn write_ppm(path: &Path, width: u32, height: u32, rgb: &[u8]) -> anyhow::Result<()> {
    let expected = width as usize * height as usize * 3;
    if rgb.len() != expected {
        bail!("RGB 数据长度 {} 与 {}x{} 不符", rgb.len(), width, height);
    }
    let mut out = format!("P6\n{} {}\n255\n", width, height).into_bytes();
    out.extend_from_slice(rgb);
    fs::write(path, out).with_context(|| format!("写入 {} 失败", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cvid_core::{Palette, PixelFormat};

    #[test]
    fn test_frame_path() {
        let p = frame_path(Path::new("out"), 7, OutputKind::Ppm);
        assert_eq!(p, Path::new("out").join("frame_0007.ppm"));
        let p = frame_path(Path::new("out"), 12345, OutputKind::Raw);
        assert!(p.ends_with("frame_12345.raw"));
    }

    #[test]
    fn test_write_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.ppm");
        write_ppm(&path, 2, 1, &[1, 2, 3, 4, 5, 6]).unwrap();
        let bytes = fs::read(&path).unwrap();
        assert_eq!(&bytes[..11], b"P6\n2 1\n255\n");
        assert_eq!(&bytes[11..], &[1, 2, 3, 4, 5, 6]);
    }

    #[test]
    fn test_write_ppm_rejects_short_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.ppm");
        assert!(write_ppm(&path, 2, 2, &[0; 6]).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_write_pal8_frame() {
        let dir = tempfile::tempdir().unwrap();
        let mut frame = VideoFrame::new(2, 2, PixelFormat::Pal8);
        frame.data = vec![0, 255, 128, 0];
        frame.palette = Some(Palette::grayscale());

        let ppm = dir.path().join("f.ppm");
        write_frame(&ppm, &frame, OutputKind::Ppm).unwrap();
        let bytes = fs::read(&ppm).unwrap();
        assert_eq!(&bytes[11..17], &[0, 0, 0, 255, 255, 255]);

        let raw = dir.path().join("f.raw");
        write_frame(&raw, &frame, OutputKind::Raw).unwrap();
        assert_eq!(fs::read(&raw).unwrap(), vec![0, 255, 128, 0]);
    }
}
