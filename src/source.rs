//! # 数据源与结果模型
//!
//! ## 设计思路
//!
//! 将“外部输入”和“转换产物”解耦：
//! - `RawImageBlob` 表示调用方持有的原始字节（不可变，转换过程中只借用）
//! - `FormatDescriptor` 表示注册表使用的格式标识
//! - `ConversionResult` / `OutputHandle` 表示转换产物，所有权移交调用方
//!
//! ## 调用方义务
//!
//! 子系统不保留也不回收转换产物。调用方在不再展示时负责释放
//! （丢弃 `OutputHandle`，并撤销由它派生出的任何 URL）。

use std::path::Path;

use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;

use crate::error::{ConvertError, Result};

/// 调用方持有的原始图片字节。
///
/// 内部使用 `Bytes`，克隆只增加引用计数，转换失败不会影响原始数据。
#[derive(Debug, Clone)]
pub struct RawImageBlob {
    bytes: Bytes,
    declared_mime: Option<String>,
}

impl RawImageBlob {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
            declared_mime: None,
        }
    }

    /// 附带调用方声明的 MIME（仅作参考，检测时以字节签名为准）。
    pub fn with_declared_mime(mut self, mime: impl Into<String>) -> Self {
        self.declared_mime = Some(mime.into());
        self
    }

    /// 从 `data:image/...;base64,` 形式的 Data URL 加载。
    pub fn from_data_url(data: &str, max_file_size: u64) -> Result<Self> {
        if !data.starts_with("data:image/") {
            return Err(ConvertError::Config("无效的 Data URL 格式".to_string()));
        }

        let marker = ";base64,";
        let base64_start = data
            .find(marker)
            .ok_or_else(|| ConvertError::Config("缺少 base64 标记".to_string()))?;

        let mime = &data["data:".len()..base64_start];
        let payload = &data[base64_start + marker.len()..];

        // base64 解码后约为 3/4 长度，提前拒绝明显超限的输入
        let estimated = (payload.len() as u64).saturating_mul(3) / 4;
        if estimated > max_file_size {
            return Err(Self::too_large(estimated, max_file_size));
        }

        let bytes = general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| ConvertError::Config(format!("Base64 解码失败：{}", e)))?;

        if bytes.len() as u64 > max_file_size {
            return Err(Self::too_large(bytes.len() as u64, max_file_size));
        }

        Ok(Self::new(bytes).with_declared_mime(mime))
    }

    /// 从本地文件加载。
    pub fn from_path(path: impl AsRef<Path>, max_file_size: u64) -> Result<Self> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)?;

        if metadata.len() > max_file_size {
            return Err(Self::too_large(metadata.len(), max_file_size));
        }

        let bytes = std::fs::read(path)?;
        Ok(Self::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// 共享底层字节（用于移入阻塞任务）。
    pub fn shared_bytes(&self) -> Bytes {
        self.bytes.clone()
    }

    pub fn declared_mime(&self) -> Option<&str> {
        self.declared_mime.as_deref()
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }

    fn too_large(size: u64, limit: u64) -> ConvertError {
        ConvertError::ResourceLimit(format!(
            "文件过大：{:.2} MB（限制：{:.2} MB）",
            size as f64 / 1024.0 / 1024.0,
            limit as f64 / 1024.0 / 1024.0
        ))
    }
}

/// 格式标识：注册表以 `mime_type` 为键。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FormatDescriptor {
    pub mime_type: String,
    pub file_extension_hint: String,
}

impl FormatDescriptor {
    pub fn new(mime_type: impl Into<String>, file_extension_hint: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            file_extension_hint: file_extension_hint.into(),
        }
    }

    pub fn jpeg() -> Self {
        Self::new("image/jpeg", "jpg")
    }

    pub fn png() -> Self {
        Self::new("image/png", "png")
    }
}

/// 转换产物句柄（已编码字节）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHandle {
    bytes: Bytes,
    mime_type: String,
}

impl OutputHandle {
    pub fn new(bytes: impl Into<Bytes>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            mime_type: mime_type.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// 生成可直接展示的 Data URL。
    pub fn to_data_url(&self) -> String {
        format!(
            "data:{};base64,{}",
            self.mime_type,
            general_purpose::STANDARD.encode(&self.bytes)
        )
    }

    pub fn write_to_path(&self, path: impl AsRef<Path>) -> Result<()> {
        std::fs::write(path, &self.bytes)?;
        Ok(())
    }
}

/// 一次成功转换的结果，创建后不可变。
#[derive(Debug, Clone)]
pub struct ConversionResult {
    pub output: OutputHandle,
    pub converted_size_bytes: u64,
    pub original_size_bytes: u64,
    pub output_format: FormatDescriptor,
}
