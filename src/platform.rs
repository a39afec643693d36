//! # 宿主能力模块
//!
//! ## 设计思路
//!
//! 各转换器的 `should_convert` 只询问注入的 `PlatformCapabilities`，
//! 不在转换器内部硬编码环境探测，测试时可注入固定能力。
//!
//! ## 实现思路
//!
//! - `HostEnvironment` 为已知宿主的固定白名单（TIFF 原生渲染仅限 Safari 系）。
//! - `StaticCapabilities` 既可以由宿主推导，也可以直接指定布尔值。

use serde::{Deserialize, Serialize};

/// 宿主原生渲染能力查询。
pub trait PlatformCapabilities: Send + Sync {
    fn decodes_heic_natively(&self) -> bool;

    fn renders_tiff_natively(&self) -> bool;
}

/// 已知宿主环境。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostEnvironment {
    #[default]
    Generic,
    Chromium,
    Firefox,
    Safari,
    SafariMobile,
}

impl HostEnvironment {
    /// TIFF 原生渲染白名单。
    pub fn renders_tiff_natively(self) -> bool {
        matches!(self, Self::Safari | Self::SafariMobile)
    }

    pub fn decodes_heic_natively(self) -> bool {
        matches!(self, Self::Safari | Self::SafariMobile)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Generic => "generic",
            Self::Chromium => "chromium",
            Self::Firefox => "firefox",
            Self::Safari => "safari",
            Self::SafariMobile => "safari_mobile",
        }
    }
}

/// 固定能力表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StaticCapabilities {
    pub heic_native: bool,
    pub tiff_native: bool,
}

impl StaticCapabilities {
    pub fn new(heic_native: bool, tiff_native: bool) -> Self {
        Self {
            heic_native,
            tiff_native,
        }
    }

    /// 宿主不支持任何需要转换的格式。
    pub fn none() -> Self {
        Self::new(false, false)
    }

    pub fn for_host(host: HostEnvironment) -> Self {
        Self::new(host.decodes_heic_natively(), host.renders_tiff_natively())
    }
}

impl Default for StaticCapabilities {
    fn default() -> Self {
        Self::for_host(HostEnvironment::default())
    }
}

impl PlatformCapabilities for StaticCapabilities {
    fn decodes_heic_natively(&self) -> bool {
        self.heic_native
    }

    fn renders_tiff_natively(&self) -> bool {
        self.tiff_native
    }
}
