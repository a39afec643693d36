//! # 格式探测模块
//!
//! 基于文件头签名（magic number）识别真实格式，不信任调用方声明的 MIME，
//! 防止扩展名或 Content-Type 标错的文件绕过转换。

/// 探测结果。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SniffedFormat {
    pub extension: String,
    pub mime_type: String,
}

/// 格式探测器，无副作用。
pub trait FormatSniffer: Send + Sync {
    fn sniff(&self, bytes: &[u8]) -> Option<SniffedFormat>;
}

/// 使用 `infer` 的签名探测实现。
#[derive(Debug, Default, Clone, Copy)]
pub struct InferSniffer;

impl FormatSniffer for InferSniffer {
    fn sniff(&self, bytes: &[u8]) -> Option<SniffedFormat> {
        if bytes.is_empty() {
            return None;
        }

        let kind = infer::get(bytes)?;
        Some(SniffedFormat {
            extension: kind.extension().to_string(),
            mime_type: kind.mime_type().to_string(),
        })
    }
}
