//! # 转换编排模块
//!
//! ## 设计思路
//!
//! `ImageConverterManager` 只负责流程编排，不关心具体格式：
//! 1. 基于字节签名探测真实格式（不信任调用方声明的 MIME）
//! 2. 按探测到的 MIME 查询注册表
//! 3. 询问转换器是否需要转换
//! 4. 调用转换器并原样透传结果或错误（不重试、不降级）
//!
//! ## 实现思路
//!
//! - 探测阶段的三种“无需转换”结果通过 `Detection` 区分，
//!   `convert_image` 将它们折叠为 `Ok(None)`，调用方直接展示原图。
//! - 注册表以 `Arc` 共享，测试可以创建独立实例；同时提供进程级默认实例。

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Instant;

use once_cell::sync::Lazy;

use crate::config::ConverterConfig;
use crate::converter::{CancelFlag, ConversionRequest, FormatConverter};
use crate::error::{ConvertError, Result};
use crate::progress::{NoopProgress, ProgressSink};
use crate::registry::ConverterRegistry;
use crate::sniff::{FormatSniffer, InferSniffer, SniffedFormat};
use crate::source::{ConversionResult, RawImageBlob};

/// 格式检测结果。
pub enum Detection {
    /// 无法从字节识别格式。
    Unrecognized,
    /// 识别成功但没有注册转换器。
    NoConverter(SniffedFormat),
    /// 有转换器，但宿主已原生支持。
    NotNeeded {
        format: SniffedFormat,
        converter: Arc<dyn FormatConverter>,
    },
    /// 需要转换。
    Convert {
        format: SniffedFormat,
        converter: Arc<dyn FormatConverter>,
    },
}

impl Detection {
    /// 将“无需转换”的结果表示为对应的探测阶段错误（用于日志/诊断）。
    pub fn skip_reason(&self) -> Option<ConvertError> {
        match self {
            Self::Unrecognized => Some(ConvertError::SniffFailed),
            Self::NoConverter(format) => {
                Some(ConvertError::NoConverterRegistered(format.mime_type.clone()))
            }
            Self::NotNeeded { converter, .. } => {
                Some(ConvertError::ConversionNotNeeded(converter.name().to_string()))
            }
            Self::Convert { .. } => None,
        }
    }

    pub fn into_converter(self) -> Option<Arc<dyn FormatConverter>> {
        match self {
            Self::Convert { converter, .. } => Some(converter),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Detection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unrecognized => f.write_str("Unrecognized"),
            Self::NoConverter(format) => f.debug_tuple("NoConverter").field(format).finish(),
            Self::NotNeeded { format, converter } => f
                .debug_struct("NotNeeded")
                .field("format", format)
                .field("converter", &converter.name())
                .finish(),
            Self::Convert { format, converter } => f
                .debug_struct("Convert")
                .field("format", format)
                .field("converter", &converter.name())
                .finish(),
        }
    }
}

/// 转换编排器。
pub struct ImageConverterManager {
    registry: Arc<ConverterRegistry>,
    sniffer: Arc<dyn FormatSniffer>,
}

impl ImageConverterManager {
    /// 使用指定注册表与探测器创建编排器。
    pub fn new(registry: Arc<ConverterRegistry>, sniffer: Arc<dyn FormatSniffer>) -> Self {
        Self { registry, sniffer }
    }

    /// 按配置注册内置转换器，使用 `infer` 探测格式。
    ///
    /// # 示例
    /// ```rust
    /// use image_converter::{ConverterConfig, ImageConverterManager};
    ///
    /// let manager = ImageConverterManager::with_config(&ConverterConfig::default());
    /// assert!(manager.list_supported_formats().contains("image/tiff"));
    /// ```
    pub fn with_config(config: &ConverterConfig) -> Self {
        Self::new(
            Arc::new(ConverterRegistry::with_builtin_converters(config)),
            Arc::new(InferSniffer),
        )
    }

    pub fn register_converter(&self, converter: Arc<dyn FormatConverter>) {
        self.registry.register(converter);
    }

    pub fn remove_converter(&self, name: &str) -> bool {
        self.registry.remove(name)
    }

    pub fn list_converters(&self) -> Vec<Arc<dyn FormatConverter>> {
        self.registry.list()
    }

    pub fn list_supported_formats(&self) -> BTreeSet<String> {
        self.registry.supported_formats()
    }

    /// 执行完整检测，返回可区分的结果。
    pub async fn detect(&self, blob: &RawImageBlob) -> Detection {
        let Some(format) = self.sniffer.sniff(blob.as_bytes()) else {
            log::info!("无法从文件内容识别格式");
            return Detection::Unrecognized;
        };

        log::info!("检测到文件类型：{} ({})", format.extension, format.mime_type);
        if let Some(declared) = blob.declared_mime() {
            if declared != format.mime_type {
                log::debug!("声明类型 {} 与实际类型 {} 不一致", declared, format.mime_type);
            }
        }

        let Some(converter) = self.registry.lookup(&format.mime_type) else {
            log::info!("未找到 MIME 类型 {} 的转换器", format.mime_type);
            return Detection::NoConverter(format);
        };

        if converter.should_convert(blob).await {
            log::info!("找到合适的转换器：{}", converter.name());
            Detection::Convert { format, converter }
        } else {
            log::info!("转换器 {} 匹配，但宿主已原生支持", converter.name());
            Detection::NotNeeded { format, converter }
        }
    }

    /// 查找需要执行的转换器；无需转换时返回 `None`。
    pub async fn find_suitable_strategy(&self, blob: &RawImageBlob) -> Option<Arc<dyn FormatConverter>> {
        self.detect(blob).await.into_converter()
    }

    /// 转换图片；无需转换时返回 `Ok(None)`，调用方应直接展示原图。
    ///
    /// 返回的 `ConversionResult` 归调用方所有，子系统不会保留或回收。
    pub async fn convert_image(
        &self,
        blob: &RawImageBlob,
        source_locator: &str,
        progress: &dyn ProgressSink,
    ) -> Result<Option<ConversionResult>> {
        self.convert_image_with_cancel(blob, source_locator, progress, CancelFlag::default())
            .await
    }

    pub async fn convert_image_with_cancel(
        &self,
        blob: &RawImageBlob,
        source_locator: &str,
        progress: &dyn ProgressSink,
        cancel: CancelFlag,
    ) -> Result<Option<ConversionResult>> {
        let Some(converter) = self.find_suitable_strategy(blob).await else {
            log::info!("该图片无需转换");
            return Ok(None);
        };

        log::info!("使用 {} 转换器转换图片", converter.name());
        let start = Instant::now();
        let request = ConversionRequest::new(blob, source_locator)
            .with_progress(progress)
            .with_cancel(cancel);

        match converter.convert(request).await {
            Ok(result) => {
                log::debug!(
                    "{} 转换耗时 {}ms",
                    converter.name(),
                    start.elapsed().as_millis()
                );
                Ok(Some(result))
            }
            Err(err) => {
                log::warn!("❌ {} 转换失败 [{}]：{}", converter.name(), err.code(), err);
                Err(err)
            }
        }
    }

    /// 不关心进度时的便捷入口。
    pub async fn convert(&self, blob: &RawImageBlob, source_locator: &str) -> Result<Option<ConversionResult>> {
        self.convert_image(blob, source_locator, &NoopProgress).await
    }
}

static DEFAULT_MANAGER: Lazy<ImageConverterManager> =
    Lazy::new(|| ImageConverterManager::with_config(&ConverterConfig::default()));

/// 进程级默认实例（默认配置 + 内置转换器）。
pub fn default_manager() -> &'static ImageConverterManager {
    &DEFAULT_MANAGER
}
