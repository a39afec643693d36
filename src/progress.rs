//! # 进度事件与文案模块
//!
//! ## 设计思路
//!
//! 进度事件是“发出即忘”的回调：转换流程不等待消费者，也不因消费者已销毁而失败。
//! 文案通过 `MessageProvider` 注入，核心流程在恒等（返回 key 本身）的实现下同样可用。
//!
//! ## 实现思路
//!
//! - `ProgressSink` 为所有 `Fn(ProgressEvent)` 闭包提供默认实现。
//! - `ChannelProgressSink` 基于 `tokio::sync::mpsc` 无界通道，接收端关闭后静默丢弃事件。
//! - `ProgressEvent` 可序列化（camelCase），便于直接透传给前端。

use std::collections::HashMap;

use serde::Serialize;
use tokio::sync::mpsc;

pub const MSG_HEIC_CONVERTING: &str = "loading.heic.converting";
pub const MSG_TIFF_CONVERTING: &str = "loading.tiff.converting";
pub const MSG_TIFF_DECODED: &str = "loading.tiff.decoded";
pub const MSG_TIFF_ENCODING: &str = "loading.tiff.encoding";

/// 转换进度事件。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub is_converting: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_hint: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loaded_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_bytes: Option<u64>,
    /// 取值范围 `0..=100`。
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_percent: Option<u8>,
}

impl ProgressEvent {
    pub fn converting(message: impl Into<String>) -> Self {
        Self {
            is_converting: true,
            message: message.into(),
            format_hint: None,
            loaded_bytes: None,
            total_bytes: None,
            progress_percent: None,
        }
    }

    pub fn with_format_hint(mut self, hint: impl Into<String>) -> Self {
        self.format_hint = Some(hint.into());
        self
    }

    pub fn with_bytes(mut self, loaded: u64, total: u64) -> Self {
        self.loaded_bytes = Some(loaded);
        self.total_bytes = Some(total);
        self
    }

    pub fn with_percent(mut self, percent: u8) -> Self {
        self.progress_percent = Some(percent.min(100));
        self
    }
}

/// 进度事件接收端。实现必须快速返回，不能阻塞转换流程。
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, event: ProgressEvent);
}

impl<F> ProgressSink for F
where
    F: Fn(ProgressEvent) + Send + Sync,
{
    fn on_progress(&self, event: ProgressEvent) {
        self(event)
    }
}

/// 丢弃所有事件。
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}

/// 通过 tokio 通道转发事件。
#[derive(Debug, Clone)]
pub struct ChannelProgressSink {
    sender: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgressSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl ProgressSink for ChannelProgressSink {
    fn on_progress(&self, event: ProgressEvent) {
        if self.sender.send(event).is_err() {
            log::debug!("进度接收端已关闭，丢弃事件");
        }
    }
}

/// 进度文案提供者。
pub trait MessageProvider: Send + Sync {
    fn message(&self, key: &str) -> String;
}

/// 直接返回 key。
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityMessages;

impl MessageProvider for IdentityMessages {
    fn message(&self, key: &str) -> String {
        key.to_string()
    }
}

/// 内置英文文案，未知 key 回退为 key 本身。
#[derive(Debug, Clone)]
pub struct DefaultMessages {
    table: HashMap<&'static str, &'static str>,
}

impl Default for DefaultMessages {
    fn default() -> Self {
        let table = HashMap::from([
            (MSG_HEIC_CONVERTING, "Converting HEIC image..."),
            (MSG_TIFF_CONVERTING, "Converting TIFF image..."),
            (MSG_TIFF_DECODED, "TIFF image decoded"),
            (MSG_TIFF_ENCODING, "Encoding converted image..."),
        ]);
        Self { table }
    }
}

impl MessageProvider for DefaultMessages {
    fn message(&self, key: &str) -> String {
        self.table
            .get(key)
            .map(|text| text.to_string())
            .unwrap_or_else(|| key.to_string())
    }
}
