//! # 错误模型模块
//!
//! ## 设计思路
//!
//! 使用单一错误枚举承载转换链路中的所有错误来源，避免字符串拼接式错误处理。
//! 通过 `thiserror` 保持人类可读错误，同时让调用侧可按分支匹配。
//!
//! ## 实现思路
//!
//! - 探测阶段的结果（`SniffFailed` / `NoConverterRegistered` / `ConversionNotNeeded`）
//!   在编排器内部折叠为“无需转换”，不会从 `convert_image` 抛出。
//! - 解码/编码失败总是携带底层原因透传给调用方，编排器不做重试。

/// 转换链路统一错误类型。
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("无法识别文件类型")]
    SniffFailed,

    #[error("未注册转换器：{0}")]
    NoConverterRegistered(String),

    #[error("宿主环境已原生支持：{0}")]
    ConversionNotNeeded(String),

    #[error("{format} 解码失败：{cause}")]
    DecodeFailed { format: &'static str, cause: String },

    #[error("{format} 编码失败：{cause}")]
    EncodeFailed { format: &'static str, cause: String },

    #[error("不支持的采样布局：{0}")]
    UnsupportedSampleLayout(String),

    #[error("{format} 转换失败：{cause}")]
    ConversionFailed { format: &'static str, cause: String },

    #[error("资源限制：{0}")]
    ResourceLimit(String),

    #[error("已取消：{0}")]
    Cancelled(String),

    #[error("配置错误：{0}")]
    Config(String),

    #[error("文件错误：{0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// 稳定错误码，供调用侧（前端/日志检索）匹配。
    pub fn code(&self) -> &'static str {
        match self {
            Self::SniffFailed => "E_SNIFF",
            Self::NoConverterRegistered(_) => "E_NO_CONVERTER",
            Self::ConversionNotNeeded(_) => "E_NOT_NEEDED",
            Self::DecodeFailed { .. } => "E_DECODE",
            Self::EncodeFailed { .. } => "E_ENCODE",
            Self::UnsupportedSampleLayout(_) => "E_SAMPLE_LAYOUT",
            Self::ConversionFailed { .. } => "E_CONVERT",
            Self::ResourceLimit(_) => "E_RESOURCE_LIMIT",
            Self::Cancelled(_) => "E_CANCELLED",
            Self::Config(_) => "E_CONFIG",
            Self::Io(_) => "E_IO",
        }
    }

    /// 错误所处阶段。
    pub fn stage(&self) -> &'static str {
        match self {
            Self::SniffFailed | Self::NoConverterRegistered(_) | Self::ConversionNotNeeded(_) => {
                "detect"
            }
            Self::DecodeFailed { .. }
            | Self::UnsupportedSampleLayout(_)
            | Self::ConversionFailed { .. }
            | Self::ResourceLimit(_) => "decode",
            Self::EncodeFailed { .. } => "encode",
            Self::Cancelled(_) => "cancel",
            Self::Config(_) | Self::Io(_) => "load",
        }
    }

    /// 是否属于“探测阶段”的稳态结果（不应作为失败展示给用户）。
    pub fn is_detection_outcome(&self) -> bool {
        matches!(
            self,
            Self::SniffFailed | Self::NoConverterRegistered(_) | Self::ConversionNotNeeded(_)
        )
    }
}

impl From<ConvertError> for String {
    /// 兼容部分仍使用字符串错误的调用点。
    fn from(error: ConvertError) -> Self {
        error.to_string()
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_outcomes_are_classified() {
        assert!(ConvertError::SniffFailed.is_detection_outcome());
        assert!(ConvertError::NoConverterRegistered("image/png".into()).is_detection_outcome());
        assert!(ConvertError::ConversionNotNeeded("TIFF".into()).is_detection_outcome());
        assert!(
            !ConvertError::DecodeFailed {
                format: "TIFF",
                cause: "bad header".into(),
            }
            .is_detection_outcome()
        );
    }

    #[test]
    fn display_carries_format_and_cause() {
        let err = ConvertError::EncodeFailed {
            format: "TIFF",
            cause: "empty output".into(),
        };
        let text: String = err.into();
        assert!(text.contains("TIFF"));
        assert!(text.contains("empty output"));
    }
}
