//! # 光栅化与编码模块
//!
//! ## 设计思路
//!
//! `Surface` 是与源图同尺寸的可绘制 RGBA 画布；`SurfaceEncoder` 负责把画布编码为目标格式。
//! 编码后端可替换（测试中可注入“无输出”的编码器验证 `EncodeFailed` 分支）。
//!
//! ## 实现思路
//!
//! - 默认实现 `ImageSurfaceEncoder` 基于 `image` crate。
//! - JPEG 不含 alpha 通道：先按 alpha 合成到背景色再编码。

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::pixel::CanonicalRgba;
use crate::source::FormatDescriptor;

/// 输出格式。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Jpeg,
    Png,
}

impl OutputFormat {
    pub fn descriptor(self) -> FormatDescriptor {
        match self {
            Self::Jpeg => FormatDescriptor::jpeg(),
            Self::Png => FormatDescriptor::png(),
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }
}

/// 可绘制画布。
#[derive(Debug, Clone)]
pub struct Surface {
    canvas: RgbaImage,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
        }
    }

    /// 直接接管规范化像素作为画布，不再分配第二份 RGBA 缓冲区。
    pub fn from_rgba(pixels: CanonicalRgba) -> Result<Self> {
        let (width, height) = (pixels.width(), pixels.height());
        let canvas = RgbaImage::from_raw(width, height, pixels.into_raw()).ok_or_else(|| {
            ConvertError::UnsupportedSampleLayout(format!("像素长度与画布 {}x{} 不一致", width, height))
        })?;
        Ok(Self { canvas })
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    /// 将规范化像素写入画布，尺寸必须一致。
    pub fn write_pixels(&mut self, pixels: &CanonicalRgba) -> Result<()> {
        if pixels.width() != self.width() || pixels.height() != self.height() {
            return Err(ConvertError::UnsupportedSampleLayout(format!(
                "像素尺寸 {}x{} 与画布 {}x{} 不一致",
                pixels.width(),
                pixels.height(),
                self.width(),
                self.height()
            )));
        }

        let target: &mut [u8] = &mut self.canvas;
        target.copy_from_slice(pixels.as_bytes());
        Ok(())
    }

    pub fn canvas(&self) -> &RgbaImage {
        &self.canvas
    }

    /// 按 alpha 合成到背景色，得到不含透明通道的 RGB。
    pub fn flatten_onto(&self, background: [u8; 3]) -> RgbImage {
        RgbImage::from_fn(self.width(), self.height(), |x, y| {
            let [r, g, b, a] = self.canvas.get_pixel(x, y).0;
            let blend = |fg: u8, bg: u8| -> u8 {
                let a = a as u32;
                ((fg as u32 * a + bg as u32 * (255 - a) + 127) / 255) as u8
            };
            image::Rgb([
                blend(r, background[0]),
                blend(g, background[1]),
                blend(b, background[2]),
            ])
        })
    }
}

/// 画布编码后端。
pub trait SurfaceEncoder: Send + Sync {
    /// 编码画布；返回空字节视为“后端无输出”。
    fn encode(&self, surface: &Surface, format: OutputFormat, quality: u8) -> Result<Vec<u8>>;
}

/// 基于 `image` crate 的默认编码器。
#[derive(Debug, Clone, Copy)]
pub struct ImageSurfaceEncoder {
    background: [u8; 3],
}

impl ImageSurfaceEncoder {
    pub fn new(background: [u8; 3]) -> Self {
        Self { background }
    }
}

impl Default for ImageSurfaceEncoder {
    fn default() -> Self {
        Self::new([0, 0, 0])
    }
}

impl SurfaceEncoder for ImageSurfaceEncoder {
    fn encode(&self, surface: &Surface, format: OutputFormat, quality: u8) -> Result<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());

        match format {
            OutputFormat::Jpeg => {
                let rgb = surface.flatten_onto(self.background);
                JpegEncoder::new_with_quality(&mut cursor, quality.clamp(1, 100))
                    .write_image(rgb.as_raw(), rgb.width(), rgb.height(), ExtendedColorType::Rgb8)
                    .map_err(|e| ConvertError::EncodeFailed {
                        format: "JPEG",
                        cause: e.to_string(),
                    })?;
            }
            OutputFormat::Png => {
                let canvas = surface.canvas();
                PngEncoder::new(&mut cursor)
                    .write_image(
                        canvas.as_raw(),
                        canvas.width(),
                        canvas.height(),
                        ExtendedColorType::Rgba8,
                    )
                    .map_err(|e| ConvertError::EncodeFailed {
                        format: "PNG",
                        cause: e.to_string(),
                    })?;
            }
        }

        Ok(cursor.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pixel::{self, ChannelLayout, SampleBuffer, SampleData};

    fn surface_from(samples: Vec<u8>, width: u32, height: u32) -> Surface {
        let buffer = SampleBuffer::new(width, height, ChannelLayout::Rgba, SampleData::U8(samples))
            .expect("valid buffer");
        let mut surface = Surface::new(width, height);
        surface
            .write_pixels(&pixel::decode(&buffer))
            .expect("matching size");
        surface
    }

    #[test]
    fn write_pixels_rejects_size_mismatch() {
        let buffer = SampleBuffer::new(2, 1, ChannelLayout::Gray, SampleData::U8(vec![1, 2]))
            .expect("valid buffer");
        let mut surface = Surface::new(1, 1);
        let result = surface.write_pixels(&pixel::decode(&buffer));
        assert!(matches!(result, Err(ConvertError::UnsupportedSampleLayout(_))));
    }

    #[test]
    fn from_rgba_reuses_pixel_buffer() {
        let buffer = SampleBuffer::new(2, 1, ChannelLayout::Rgba, SampleData::U8(vec![1, 2, 3, 4, 5, 6, 7, 8]))
            .expect("valid buffer");
        let rgba = pixel::decode(&buffer);
        let ptr = rgba.as_bytes().as_ptr();

        let surface = Surface::from_rgba(rgba).expect("matching size");
        assert_eq!(surface.canvas().as_raw().as_ptr(), ptr);
        assert_eq!((surface.width(), surface.height()), (2, 1));
        assert_eq!(surface.canvas().get_pixel(1, 0).0, [5, 6, 7, 8]);
    }

    #[test]
    fn flatten_composites_alpha() {
        let surface = surface_from(vec![255, 255, 255, 0, 200, 100, 50, 255], 2, 1);
        let rgb = surface.flatten_onto([0, 0, 0]);
        assert_eq!(rgb.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(rgb.get_pixel(1, 0).0, [200, 100, 50]);

        let white = surface.flatten_onto([255, 255, 255]);
        assert_eq!(white.get_pixel(0, 0).0, [255, 255, 255]);
    }

    #[test]
    fn encodes_jpeg_and_png() {
        let surface = surface_from(vec![128; 4 * 4 * 4], 4, 4);
        let encoder = ImageSurfaceEncoder::default();

        let jpeg = encoder.encode(&surface, OutputFormat::Jpeg, 100).expect("jpeg");
        assert_eq!(&jpeg[..3], &[0xFF, 0xD8, 0xFF]);

        let png = encoder.encode(&surface, OutputFormat::Png, 100).expect("png");
        assert_eq!(&png[1..4], b"PNG");
    }
}
