//! # 像素采样解码模块
//!
//! ## 设计思路
//!
//! 将各种位深（8 / 16 / 32 位整数 / 32 位浮点）与通道布局（灰度、灰度+透明、RGB、RGBA）
//! 的原始采样统一映射到 8 位 RGBA（`CanonicalRgba`），作为后续光栅化与编码的唯一输入。
//!
//! ## 实现思路
//!
//! - `SampleBuffer::new` 负责全部前置校验（长度、尺寸溢出），字段私有，
//!   因此 `decode` 对合法缓冲区是全函数，不存在失败分支。
//! - 每种采样类型通过 `Sample` trait 提供“缩放到 8 位”和“默认不透明值”。
//! - 取整统一采用四舍五入（半数向上）：`0.5 * 255 = 127.5 → 128`。
//! - 所有输出先钳制到 `[0, 255]` 再转换，异常输入不会回绕。

use crate::error::{ConvertError, Result};

/// 单个采样的位深。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleDepth {
    U8,
    U16,
    /// 32 位无符号整数，按 `u32::MAX` 归一化后按浮点语义处理。
    U32,
    /// 32 位浮点，取值约定为 `[0, 1]`。
    F32,
}

impl SampleDepth {
    pub fn bits(self) -> u8 {
        match self {
            Self::U8 => 8,
            Self::U16 => 16,
            Self::U32 | Self::F32 => 32,
        }
    }
}

/// 通道布局。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    Gray,
    GrayAlpha,
    Rgb,
    Rgba,
}

impl ChannelLayout {
    pub fn channel_count(self) -> usize {
        match self {
            Self::Gray => 1,
            Self::GrayAlpha => 2,
            Self::Rgb => 3,
            Self::Rgba => 4,
        }
    }

    pub fn has_alpha(self) -> bool {
        matches!(self, Self::GrayAlpha | Self::Rgba)
    }
}

/// 原始采样数据，按位深区分存储类型。
#[derive(Debug, Clone, PartialEq)]
pub enum SampleData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
}

impl SampleData {
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn depth(&self) -> SampleDepth {
        match self {
            Self::U8(_) => SampleDepth::U8,
            Self::U16(_) => SampleDepth::U16,
            Self::U32(_) => SampleDepth::U32,
            Self::F32(_) => SampleDepth::F32,
        }
    }
}

/// 经过校验的采样缓冲区。
///
/// 不变量：`data.len() == width * height * layout.channel_count()`。
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    width: u32,
    height: u32,
    layout: ChannelLayout,
    data: SampleData,
}

impl SampleBuffer {
    /// 构建采样缓冲区，长度不匹配时直接拒绝而不是截断。
    ///
    /// # 示例
    /// ```rust
    /// use image_converter::pixel::{ChannelLayout, SampleBuffer, SampleData};
    ///
    /// let buffer = SampleBuffer::new(1, 1, ChannelLayout::Rgb, SampleData::U8(vec![1, 2, 3]))?;
    /// assert_eq!(buffer.width(), 1);
    /// # Ok::<(), image_converter::ConvertError>(())
    /// ```
    pub fn new(width: u32, height: u32, layout: ChannelLayout, data: SampleData) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(ConvertError::UnsupportedSampleLayout(format!(
                "图像尺寸为空：{}x{}",
                width, height
            )));
        }

        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|pixels| pixels.checked_mul(layout.channel_count()))
            .ok_or_else(|| ConvertError::ResourceLimit("采样数量溢出".to_string()))?;

        if data.len() != expected {
            return Err(ConvertError::UnsupportedSampleLayout(format!(
                "采样长度不匹配：期望 {}（{}x{}x{}），实际 {}",
                expected,
                width,
                height,
                layout.channel_count(),
                data.len()
            )));
        }

        Ok(Self {
            width,
            height,
            layout,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn layout(&self) -> ChannelLayout {
        self.layout
    }

    pub fn depth(&self) -> SampleDepth {
        self.data.depth()
    }

    pub fn data(&self) -> &SampleData {
        &self.data
    }
}

/// 规范化的 8 位 RGBA 缓冲区，长度恒为 `width * height * 4`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRgba {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl CanonicalRgba {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.data
    }

    /// 读取单个像素，越界返回 `None`。
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

trait Sample: Copy {
    /// 缺省 alpha（缩放前的满值）。
    const OPAQUE: Self;

    fn to_u8(self) -> u8;
}

impl Sample for u8 {
    const OPAQUE: Self = u8::MAX;

    fn to_u8(self) -> u8 {
        self
    }
}

impl Sample for u16 {
    const OPAQUE: Self = u16::MAX;

    fn to_u8(self) -> u8 {
        // round(v / 257)，整数形式：floor((2v + 257) / 514)
        let scaled = (self as u32 * 2 + 257) / 514;
        scaled.min(255) as u8
    }
}

impl Sample for u32 {
    const OPAQUE: Self = u32::MAX;

    fn to_u8(self) -> u8 {
        unit_to_u8(self as f64 / u32::MAX as f64)
    }
}

impl Sample for f32 {
    const OPAQUE: Self = 1.0;

    fn to_u8(self) -> u8 {
        unit_to_u8(self as f64)
    }
}

/// `round(v * 255)` 并钳制到 `[0, 255]`，NaN 映射为 0。
fn unit_to_u8(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

/// 将采样缓冲区解码为 8 位 RGBA。
///
/// - 灰度布局：G、B 复制第一个采样
/// - 无 alpha 布局：alpha 取满值（缩放后为 255）
pub fn decode(buffer: &SampleBuffer) -> CanonicalRgba {
    let data = match &buffer.data {
        SampleData::U8(samples) => expand(samples, buffer.layout),
        SampleData::U16(samples) => expand(samples, buffer.layout),
        SampleData::U32(samples) => expand(samples, buffer.layout),
        SampleData::F32(samples) => expand(samples, buffer.layout),
    };

    CanonicalRgba {
        width: buffer.width,
        height: buffer.height,
        data,
    }
}

fn expand<S: Sample>(samples: &[S], layout: ChannelLayout) -> Vec<u8> {
    let channels = layout.channel_count();
    let mut out = Vec::with_capacity(samples.len() / channels * 4);

    for px in samples.chunks_exact(channels) {
        let (r, g, b, a) = match layout {
            ChannelLayout::Gray => (px[0], px[0], px[0], S::OPAQUE),
            ChannelLayout::GrayAlpha => (px[0], px[0], px[0], px[1]),
            ChannelLayout::Rgb => (px[0], px[1], px[2], S::OPAQUE),
            ChannelLayout::Rgba => (px[0], px[1], px[2], px[3]),
        };
        out.extend_from_slice(&[r.to_u8(), g.to_u8(), b.to_u8(), a.to_u8()]);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_pixel(layout: ChannelLayout, data: SampleData) -> [u8; 4] {
        let buffer = SampleBuffer::new(1, 1, layout, data).expect("valid buffer");
        decode(&buffer).pixel(0, 0).expect("pixel in range")
    }

    #[test]
    fn sixteen_bit_reference_values() {
        assert_eq!(0u16.to_u8(), 0);
        assert_eq!(65535u16.to_u8(), 255);
        assert_eq!(32896u16.to_u8(), 128);
        // 33024 / 257 ≈ 128.498，33025 / 257 ≈ 128.502
        assert_eq!(33024u16.to_u8(), 128);
        assert_eq!(33025u16.to_u8(), 129);
    }

    #[test]
    fn float_reference_values() {
        assert_eq!(0.0f32.to_u8(), 0);
        assert_eq!(1.0f32.to_u8(), 255);
        assert_eq!(0.5f32.to_u8(), 128);
        assert_eq!(f32::NAN.to_u8(), 0);
        assert_eq!((-0.3f32).to_u8(), 0);
        assert_eq!(7.5f32.to_u8(), 255);
    }

    #[test]
    fn u32_samples_use_normalized_scale() {
        assert_eq!(0u32.to_u8(), 0);
        assert_eq!(u32::MAX.to_u8(), 255);
        assert_eq!((u32::MAX / 2).to_u8(), 127);
    }

    #[test]
    fn gray_expands_to_equal_channels() {
        assert_eq!(single_pixel(ChannelLayout::Gray, SampleData::U8(vec![42])), [42, 42, 42, 255]);
        assert_eq!(
            single_pixel(ChannelLayout::GrayAlpha, SampleData::U16(vec![65535, 0])),
            [255, 255, 255, 0]
        );
    }

    #[test]
    fn rgba_float_keeps_alpha() {
        assert_eq!(
            single_pixel(ChannelLayout::Rgba, SampleData::F32(vec![1.0, 0.0, 0.5, 0.0])),
            [255, 0, 128, 0]
        );
        assert_eq!(
            single_pixel(ChannelLayout::Rgb, SampleData::F32(vec![0.0, 0.0, 0.0])),
            [0, 0, 0, 255]
        );
    }

    #[test]
    fn eight_bit_alpha_zero_is_preserved() {
        assert_eq!(
            single_pixel(ChannelLayout::Rgba, SampleData::U8(vec![10, 20, 30, 0])),
            [10, 20, 30, 0]
        );
    }

    #[test]
    fn rejects_mismatched_length() {
        let result = SampleBuffer::new(2, 2, ChannelLayout::Rgb, SampleData::U8(vec![0; 11]));
        assert!(matches!(result, Err(ConvertError::UnsupportedSampleLayout(_))));

        let padded = SampleBuffer::new(2, 2, ChannelLayout::Rgb, SampleData::U8(vec![0; 13]));
        assert!(matches!(padded, Err(ConvertError::UnsupportedSampleLayout(_))));
    }

    #[test]
    fn rejects_empty_dimensions() {
        let result = SampleBuffer::new(0, 4, ChannelLayout::Gray, SampleData::U8(Vec::new()));
        assert!(matches!(result, Err(ConvertError::UnsupportedSampleLayout(_))));
    }

    #[test]
    fn output_length_is_four_bytes_per_pixel() {
        let buffer = SampleBuffer::new(3, 2, ChannelLayout::GrayAlpha, SampleData::U8(vec![7; 12]))
            .expect("valid buffer");
        let rgba = decode(&buffer);
        assert_eq!(rgba.as_bytes().len(), 3 * 2 * 4);
        assert_eq!(rgba.pixel(3, 0), None);
    }

    proptest! {
        #[test]
        fn eight_bit_rgb_is_always_opaque(samples in proptest::collection::vec(any::<u8>(), 3..=300)) {
            let pixels = samples.len() / 3;
            let buffer = SampleBuffer::new(
                pixels as u32,
                1,
                ChannelLayout::Rgb,
                SampleData::U8(samples[..pixels * 3].to_vec()),
            ).unwrap();
            let rgba = decode(&buffer);
            for (px, src) in rgba.as_bytes().chunks_exact(4).zip(samples.chunks_exact(3)) {
                prop_assert_eq!(&px[..3], src);
                prop_assert_eq!(px[3], 255);
            }
        }

        #[test]
        fn sixteen_bit_matches_rounded_division(v in any::<u16>()) {
            let expected = (v as f64 / 257.0).round().clamp(0.0, 255.0) as u8;
            prop_assert_eq!(v.to_u8(), expected);
        }

        #[test]
        fn unit_float_matches_rounded_product(v in 0.0f32..=1.0f32) {
            let expected = (v as f64 * 255.0).round() as u8;
            prop_assert_eq!(v.to_u8(), expected);
        }

        #[test]
        fn gray_sixteen_bit_has_equal_rgb(v in any::<u16>()) {
            let [r, g, b, a] = single_pixel(ChannelLayout::Gray, SampleData::U16(vec![v]));
            prop_assert_eq!(r, g);
            prop_assert_eq!(g, b);
            prop_assert_eq!(a, 255);
        }
    }
}
