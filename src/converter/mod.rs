//! # 转换器能力接口
//!
//! ## 设计思路
//!
//! 每种“宿主无法原生显示”的格式对应一个 `FormatConverter` 实现：
//! - `name`：稳定标识，用于日志与移除
//! - `supported_formats`：注册表中占用的 MIME 键
//! - `should_convert`：是否需要转换（幂等、无副作用，可查询宿主能力）
//! - `convert`：执行一次转换
//!
//! ## 实现思路
//!
//! 使用 `async_trait` 以便以 `Arc<dyn FormatConverter>` 形式存入注册表。
//! 一次转换所需的输入打包为 `ConversionRequest`，其中包含可选的取消标志。

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::{ConvertError, Result};
use crate::progress::{NoopProgress, ProgressEvent, ProgressSink};
use crate::source::{ConversionResult, FormatDescriptor, RawImageBlob};

pub mod heic;
pub mod tiff;

pub use self::heic::{BoxError, HeicBackend, HeicBackendFactory, HeicConverter, HeicOutput};
pub use self::tiff::{TiffConverter, decode_first_ifd};

/// 调用方持有的取消标志。
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// 已取消时返回 `Cancelled`，`stage` 用于错误信息。
    pub fn check(&self, stage: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(ConvertError::Cancelled(format!("转换在{}阶段被取消", stage)));
        }
        Ok(())
    }
}

/// 单次转换的输入。
pub struct ConversionRequest<'a> {
    pub blob: &'a RawImageBlob,
    pub source_locator: &'a str,
    pub progress: &'a dyn ProgressSink,
    pub cancel: CancelFlag,
}

impl<'a> ConversionRequest<'a> {
    pub fn new(blob: &'a RawImageBlob, source_locator: &'a str) -> Self {
        Self {
            blob,
            source_locator,
            progress: &NoopProgress,
            cancel: CancelFlag::default(),
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub(crate) fn report(&self, event: ProgressEvent) {
        self.progress.on_progress(event);
    }
}

/// 格式转换器。
#[async_trait]
pub trait FormatConverter: Send + Sync {
    fn name(&self) -> &str;

    fn supported_formats(&self) -> Vec<FormatDescriptor>;

    async fn should_convert(&self, blob: &RawImageBlob) -> bool;

    async fn convert(&self, request: ConversionRequest<'_>) -> Result<ConversionResult>;
}
