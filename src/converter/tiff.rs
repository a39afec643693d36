//! # TIFF 转换器
//!
//! ## 设计思路
//!
//! 多数宿主不能原生渲染 TIFF（Safari 系除外，按固定白名单判断）。
//! 转换链路：解析容器 → 取第一个 IFD → 采样解码为 RGBA → 光栅化 → 编码为 JPEG。
//!
//! ## 实现思路
//!
//! 1. 读取 IFD 尺寸、通道与位深，先做像素/内存上限检查（按实际位深估算），再读取完整采样
//! 2. 仅支持 8 / 16 / 32 位采样与灰度、灰度+透明、RGB、RGBA 布局，其余直接报错
//! 3. 解码与编码都是 CPU 密集操作，放到 `spawn_blocking` 中执行
//! 4. 阶段之间检查取消标志，并上报粗粒度进度（开始 / 解码完成 / 开始编码）

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use ::tiff::ColorType;
use ::tiff::decoder::{Decoder, DecodingResult};
use async_trait::async_trait;

use super::{ConversionRequest, FormatConverter};
use crate::config::ConverterConfig;
use crate::error::{ConvertError, Result};
use crate::pixel::{self, CanonicalRgba, ChannelLayout, SampleBuffer, SampleData};
use crate::platform::{PlatformCapabilities, StaticCapabilities};
use crate::progress::{
    DefaultMessages, MSG_TIFF_CONVERTING, MSG_TIFF_DECODED, MSG_TIFF_ENCODING, MessageProvider,
    ProgressEvent,
};
use crate::source::{ConversionResult, FormatDescriptor, OutputHandle, RawImageBlob};
use crate::surface::{ImageSurfaceEncoder, Surface, SurfaceEncoder};

const FORMAT: &str = "TIFF";

pub struct TiffConverter {
    capabilities: Arc<dyn PlatformCapabilities>,
    messages: Arc<dyn MessageProvider>,
    encoder: Arc<dyn SurfaceEncoder>,
    config: ConverterConfig,
}

impl TiffConverter {
    pub fn new(
        capabilities: Arc<dyn PlatformCapabilities>,
        messages: Arc<dyn MessageProvider>,
        encoder: Arc<dyn SurfaceEncoder>,
        config: ConverterConfig,
    ) -> Self {
        Self {
            capabilities,
            messages,
            encoder,
            config,
        }
    }

    /// 按配置中的宿主环境与背景色构建默认转换器。
    pub fn from_config(config: ConverterConfig) -> Self {
        Self::new(
            Arc::new(StaticCapabilities::for_host(config.host)),
            Arc::new(DefaultMessages::default()),
            Arc::new(ImageSurfaceEncoder::new(config.jpeg_background)),
            config,
        )
    }

    fn progress(&self, key: &str, percent: u8) -> ProgressEvent {
        ProgressEvent::converting(self.messages.message(key))
            .with_format_hint("tiff")
            .with_percent(percent)
    }
}

fn decode_failed(cause: impl ToString) -> ConvertError {
    ConvertError::DecodeFailed {
        format: FORMAT,
        cause: cause.to_string(),
    }
}

/// 解析 TIFF 容器并提取第一个 IFD 的采样。
///
/// 没有任何 IFD 或容器损坏时返回 `DecodeFailed`。
pub fn decode_first_ifd(bytes: &[u8], config: &ConverterConfig) -> Result<SampleBuffer> {
    let mut decoder = Decoder::new(Cursor::new(bytes)).map_err(decode_failed)?;

    let (width, height) = decoder.dimensions().map_err(decode_failed)?;
    let color = decoder.colortype().map_err(decode_failed)?;
    let (layout, bits) = match color {
        ColorType::Gray(bits) => (ChannelLayout::Gray, bits),
        ColorType::GrayA(bits) => (ChannelLayout::GrayAlpha, bits),
        ColorType::RGB(bits) => (ChannelLayout::Rgb, bits),
        ColorType::RGBA(bits) => (ChannelLayout::Rgba, bits),
        other => {
            return Err(ConvertError::UnsupportedSampleLayout(format!(
                "不支持的 TIFF 颜色类型：{:?}",
                other
            )));
        }
    };

    if !matches!(bits, 8 | 16 | 32) {
        return Err(ConvertError::UnsupportedSampleLayout(format!(
            "不支持的位深：{} bit",
            bits
        )));
    }

    config.check_decode_limits(width, height, layout, bits)?;

    let data = match decoder.read_image().map_err(decode_failed)? {
        DecodingResult::U8(samples) => SampleData::U8(samples),
        DecodingResult::U16(samples) => SampleData::U16(samples),
        DecodingResult::U32(samples) => SampleData::U32(samples),
        DecodingResult::F32(samples) => SampleData::F32(samples),
        _ => {
            return Err(ConvertError::UnsupportedSampleLayout(format!(
                "不支持的采样格式（{} bit，{:?}）",
                bits, layout
            )));
        }
    };

    log::debug!(
        "TIFF 第一个 IFD：{}x{} {:?} {} bit alpha={}",
        width,
        height,
        layout,
        data.depth().bits(),
        layout.has_alpha()
    );

    SampleBuffer::new(width, height, layout, data)
}

#[async_trait]
impl FormatConverter for TiffConverter {
    fn name(&self) -> &str {
        FORMAT
    }

    fn supported_formats(&self) -> Vec<FormatDescriptor> {
        vec![
            FormatDescriptor::new("image/tiff", "tiff"),
            FormatDescriptor::new("image/tif", "tif"),
        ]
    }

    async fn should_convert(&self, _blob: &RawImageBlob) -> bool {
        !self.capabilities.renders_tiff_natively()
    }

    async fn convert(&self, request: ConversionRequest<'_>) -> Result<ConversionResult> {
        let total_start = Instant::now();
        request.report(self.progress(MSG_TIFF_CONVERTING, 0));
        request.cancel.check("TIFF 解码")?;

        let decode_start = Instant::now();
        let bytes = request.blob.shared_bytes();
        let config = self.config.clone();
        let rgba: CanonicalRgba = tokio::task::spawn_blocking(move || {
            let buffer = decode_first_ifd(&bytes, &config)?;
            Ok::<_, ConvertError>(pixel::decode(&buffer))
        })
        .await
        .map_err(|e| decode_failed(format!("解码任务执行失败：{}", e)))??;
        let decode_elapsed = decode_start.elapsed();

        request.report(self.progress(MSG_TIFF_DECODED, 50));
        request.cancel.check("TIFF 编码")?;
        request.report(self.progress(MSG_TIFF_ENCODING, 75));

        let encode_start = Instant::now();
        let encoder = Arc::clone(&self.encoder);
        let output_format = self.config.output_format;
        let quality = self.config.jpeg_quality;
        let encoded = tokio::task::spawn_blocking(move || {
            let surface = Surface::from_rgba(rgba)?;
            encoder.encode(&surface, output_format, quality)
        })
        .await
        .map_err(|e| ConvertError::EncodeFailed {
            format: FORMAT,
            cause: format!("编码任务执行失败：{}", e),
        })?
        .map_err(|e| match e {
            ConvertError::EncodeFailed { .. } => e,
            other => ConvertError::EncodeFailed {
                format: FORMAT,
                cause: other.to_string(),
            },
        })?;

        if encoded.is_empty() {
            return Err(ConvertError::EncodeFailed {
                format: FORMAT,
                cause: "编码后端无输出".to_string(),
            });
        }
        let encode_elapsed = encode_start.elapsed();

        let converted_size_bytes = encoded.len() as u64;
        let original_size_bytes = request.blob.size_bytes();

        log::info!(
            "✅ TIFF 转换完成 - {} bytes -> {} bytes ({}) decode={}ms encode={}ms total={}ms",
            original_size_bytes,
            converted_size_bytes,
            output_format.mime_type(),
            decode_elapsed.as_millis(),
            encode_elapsed.as_millis(),
            total_start.elapsed().as_millis()
        );

        Ok(ConversionResult {
            output: OutputHandle::new(encoded, output_format.mime_type()),
            converted_size_bytes,
            original_size_bytes,
            output_format: output_format.descriptor(),
        })
    }
}
