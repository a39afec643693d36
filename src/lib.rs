//! # 图片格式转换 — 库入口
//!
//! 检测宿主无法原生显示的图片编码（HEIC/HEIF、TIFF），并转码为通用格式（JPEG / PNG）。
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │  调用方：convert_image(blob, locator, progress)           │
//! └───────┬──────────────────────────────────────────────────┘
//!         ↓
//! ┌───────┴──────────────────────────────────────────────────┐
//! │  manager ──── ImageConverterManager（探测 → 查表 → 转换）   │
//! │   ├─ sniff       字节签名探测（infer）                     │
//! │   ├─ registry    MIME → 转换器（后注册覆盖）                │
//! │   └─ converter   FormatConverter                          │
//! │        ├─ heic   外部解码后端（按需加载）                   │
//! │        └─ tiff   IFD 解码 → pixel → surface → JPEG        │
//! │                                                           │
//! │  pixel     采样（8/16/32 位）→ 8 位 RGBA                   │
//! │  surface   画布 + 编码后端（image crate）                  │
//! │  platform  宿主原生能力（注入）                              │
//! │  progress  进度事件 / 文案                                  │
//! │  config    配置（serde JSON）                               │
//! │  error     ConvertError                                    │
//! └───────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 结果语义
//!
//! `convert_image` 返回 `Ok(None)` 表示无需转换（无法识别、未注册转换器、宿主已原生支持），
//! 调用方应直接展示原图；解码/编码失败以 `Err(ConvertError)` 返回，原图始终保持可用。
//! 转换产物归调用方所有，不再展示时由调用方负责释放。
//!
//! ## 示例
//!
//! ```rust,no_run
//! use image_converter::{ImageConverterManager, ConverterConfig, RawImageBlob, NoopProgress};
//!
//! # async fn demo() -> Result<(), image_converter::ConvertError> {
//! let manager = ImageConverterManager::with_config(&ConverterConfig::default());
//! let blob = RawImageBlob::from_path("scan.tif", 50 * 1024 * 1024)?;
//! if let Some(result) = manager.convert_image(&blob, "scan.tif", &NoopProgress).await? {
//!     result.output.write_to_path("scan.jpg")?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod converter;
pub mod error;
pub mod manager;
pub mod pixel;
pub mod platform;
pub mod progress;
pub mod registry;
pub mod sniff;
pub mod source;
pub mod surface;

pub use config::ConverterConfig;
pub use converter::{CancelFlag, ConversionRequest, FormatConverter, HeicConverter, TiffConverter};
pub use error::ConvertError;
pub use manager::{Detection, ImageConverterManager, default_manager};
pub use platform::{HostEnvironment, PlatformCapabilities, StaticCapabilities};
pub use progress::{ChannelProgressSink, NoopProgress, ProgressEvent, ProgressSink};
pub use registry::ConverterRegistry;
pub use source::{ConversionResult, FormatDescriptor, OutputHandle, RawImageBlob};
pub use surface::OutputFormat;
