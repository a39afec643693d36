//! # HEIC/HEIF 转换器
//!
//! ## 设计思路
//!
//! HEIC 解码能力由外部后端提供（体积大、依赖平台库），这里只负责：
//! 判断是否需要转换、按需加载后端、上报进度、把失败统一映射为类型化错误。
//!
//! ## 实现思路
//!
//! - 后端通过注入的工厂函数创建，首次转换时才初始化（`OnceCell`），之后复用。
//! - 工厂失败映射为 `DecodeFailed`，后端解码失败映射为 `ConversionFailed`。
//! - 控制流不依赖后端何时加载，只依赖“最终可用”或“加载失败”。

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use once_cell::sync::OnceCell;

use super::{ConversionRequest, FormatConverter};
use crate::error::{ConvertError, Result};
use crate::platform::PlatformCapabilities;
use crate::progress::{MSG_HEIC_CONVERTING, MessageProvider, ProgressEvent};
use crate::source::{ConversionResult, FormatDescriptor, OutputHandle, RawImageBlob};

const FORMAT: &str = "HEIC";

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 后端工厂：返回可复用的解码后端。
pub type HeicBackendFactory =
    Arc<dyn Fn() -> std::result::Result<Arc<dyn HeicBackend>, BoxError> + Send + Sync>;

/// 后端解码产物。
#[derive(Debug, Clone)]
pub struct HeicOutput {
    pub bytes: Bytes,
    pub converted_size_bytes: u64,
    pub output_format: FormatDescriptor,
    pub original_size_bytes: u64,
}

/// 外部 HEIC 解码能力。
#[async_trait]
pub trait HeicBackend: Send + Sync {
    async fn decode(
        &self,
        blob: &RawImageBlob,
        source_locator: &str,
    ) -> std::result::Result<HeicOutput, BoxError>;
}

pub struct HeicConverter {
    capabilities: Arc<dyn PlatformCapabilities>,
    messages: Arc<dyn MessageProvider>,
    factory: HeicBackendFactory,
    backend: OnceCell<Arc<dyn HeicBackend>>,
}

impl HeicConverter {
    pub fn new(
        capabilities: Arc<dyn PlatformCapabilities>,
        messages: Arc<dyn MessageProvider>,
        factory: HeicBackendFactory,
    ) -> Self {
        Self {
            capabilities,
            messages,
            factory,
            backend: OnceCell::new(),
        }
    }

    /// 未配置解码后端：检测照常进行，转换时返回 `DecodeFailed`。
    pub fn without_backend(
        capabilities: Arc<dyn PlatformCapabilities>,
        messages: Arc<dyn MessageProvider>,
    ) -> Self {
        let factory: HeicBackendFactory =
            Arc::new(|| Err::<Arc<dyn HeicBackend>, BoxError>("未配置 HEIC 解码后端".into()));
        Self::new(capabilities, messages, factory)
    }

    fn backend(&self) -> Result<&Arc<dyn HeicBackend>> {
        self.backend
            .get_or_try_init(|| {
                log::debug!("加载 HEIC 解码后端");
                (self.factory)()
            })
            .map_err(|e| ConvertError::DecodeFailed {
                format: FORMAT,
                cause: format!("HEIC 解码后端加载失败：{}", e),
            })
    }
}

#[async_trait]
impl FormatConverter for HeicConverter {
    fn name(&self) -> &str {
        FORMAT
    }

    fn supported_formats(&self) -> Vec<FormatDescriptor> {
        vec![
            FormatDescriptor::new("image/heic", "heic"),
            FormatDescriptor::new("image/heif", "heif"),
        ]
    }

    async fn should_convert(&self, _blob: &RawImageBlob) -> bool {
        !self.capabilities.decodes_heic_natively()
    }

    async fn convert(&self, request: ConversionRequest<'_>) -> Result<ConversionResult> {
        request.cancel.check("HEIC 加载")?;
        let backend = Arc::clone(self.backend()?);

        let size = request.blob.size_bytes();
        request.report(
            ProgressEvent::converting(self.messages.message(MSG_HEIC_CONVERTING))
                .with_format_hint("heic")
                .with_bytes(size, size)
                .with_percent(100),
        );

        let output = backend
            .decode(request.blob, request.source_locator)
            .await
            .map_err(|e| {
                log::warn!("❌ HEIC 转换失败：{}", e);
                ConvertError::ConversionFailed {
                    format: FORMAT,
                    cause: e.to_string(),
                }
            })?;

        request.cancel.check("HEIC 解码")?;

        log::info!(
            "✅ HEIC 转换完成 - {} bytes -> {} bytes ({})",
            output.original_size_bytes,
            output.converted_size_bytes,
            output.output_format.mime_type
        );

        Ok(ConversionResult {
            output: OutputHandle::new(output.bytes, output.output_format.mime_type.clone()),
            converted_size_bytes: output.converted_size_bytes,
            original_size_bytes: output.original_size_bytes,
            output_format: output.output_format,
        })
    }
}
