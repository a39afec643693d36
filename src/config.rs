//! # 配置模块
//!
//! ## 设计思路
//!
//! 将所有“可调策略”集中到 `ConverterConfig`，保证运行时行为可观测、可调整、可测试。
//!
//! ## 实现思路
//!
//! - `Default` 提供生产可用的配置（JPEG 最高质量、与原应用一致的体积/像素上限）。
//! - 通过 serde 从 JSON 文件加载，缺失字段回退默认值；文件不存在时整体使用默认配置。
//! - `validate` 在加载后统一校验取值范围。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ConvertError, Result};
use crate::pixel::ChannelLayout;
use crate::platform::HostEnvironment;
use crate::surface::OutputFormat;

/// 转换配置。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    /// JPEG 质量（1~100）。
    pub jpeg_quality: u8,
    /// 转换输出格式。
    pub output_format: OutputFormat,
    /// JPEG 输出时透明像素合成的背景色。
    pub jpeg_background: [u8; 3],
    /// 读取原始字节时允许的最大文件体积（字节）。
    pub max_file_size: u64,
    /// 解码像素上限（`width * height`）。
    pub max_decoded_pixels: u64,
    /// 解码阶段允许的预计内存上限（按 RGBA 估算，字节）。
    pub max_decoded_bytes: u64,
    /// 宿主环境，决定哪些格式需要转换。
    pub host: HostEnvironment,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: 100,
            output_format: OutputFormat::Jpeg,
            jpeg_background: [0, 0, 0],
            max_file_size: 50 * 1024 * 1024,
            max_decoded_pixels: 40_000_000,
            max_decoded_bytes: 160 * 1024 * 1024,
            host: HostEnvironment::Generic,
        }
    }
}

impl ConverterConfig {
    /// 从 JSON 文件加载配置。
    ///
    /// # 示例
    /// ```rust,no_run
    /// use image_converter::ConverterConfig;
    ///
    /// let config = ConverterConfig::load_from_path("converter.json")?;
    /// assert!(config.jpeg_quality <= 100);
    /// # Ok::<(), image_converter::ConvertError>(())
    /// ```
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::debug!("配置文件不存在，使用默认配置：{}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| ConvertError::Config(format!("解析配置文件失败：{}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        let content = serde_json::to_string_pretty(self)
            .map_err(|e| ConvertError::Config(format!("序列化配置失败：{}", e)))?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(ConvertError::Config(format!(
                "jpeg_quality 必须在 1~100 之间：{}",
                self.jpeg_quality
            )));
        }
        if self.max_file_size == 0 {
            return Err(ConvertError::Config("max_file_size 不能为 0".to_string()));
        }
        if self.max_decoded_pixels == 0 {
            return Err(ConvertError::Config("max_decoded_pixels 不能为 0".to_string()));
        }
        if self.max_decoded_bytes < 4 {
            return Err(ConvertError::Config("max_decoded_bytes 过小".to_string()));
        }
        Ok(())
    }

    /// 校验像素数量与解码阶段预计内存是否超过上限。
    ///
    /// 预计内存 = 原始采样（每像素 `channels * bits / 8` 字节）+ RGBA 输出（每像素 4 字节），
    /// 需在读取采样之前调用。
    pub fn check_decode_limits(
        &self,
        width: u32,
        height: u32,
        layout: ChannelLayout,
        bits_per_sample: u8,
    ) -> Result<()> {
        let pixels = (width as u64)
            .checked_mul(height as u64)
            .ok_or_else(|| ConvertError::ResourceLimit("图片像素数溢出".to_string()))?;

        if pixels > self.max_decoded_pixels {
            return Err(ConvertError::ResourceLimit(format!(
                "图片像素过大：{} 像素（限制：{} 像素）",
                pixels, self.max_decoded_pixels
            )));
        }

        let sample_bytes = (bits_per_sample as u64).div_ceil(8);
        let raw_per_pixel = layout.channel_count() as u64 * sample_bytes;
        let estimated = pixels
            .checked_mul(raw_per_pixel + 4)
            .ok_or_else(|| ConvertError::ResourceLimit("图片解码内存估算溢出".to_string()))?;

        if estimated > self.max_decoded_bytes {
            return Err(ConvertError::ResourceLimit(format!(
                "图片解码预计内存过大：{:.2} MB（限制：{:.2} MB）",
                estimated as f64 / 1024.0 / 1024.0,
                self.max_decoded_bytes as f64 / 1024.0 / 1024.0
            )));
        }

        Ok(())
    }
}
