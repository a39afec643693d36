//! # 转换器注册表
//!
//! ## 设计思路
//!
//! 以 MIME 字符串为键映射到转换器实例；同一个转换器可以占用多个键
//! （如 `image/heic` 与 `image/heif` 都指向 HEIC 转换器）。
//!
//! ## 实现思路
//!
//! - 同一 MIME 后注册覆盖先注册（允许运行时替换内置转换器）。
//! - 按名称移除时，删除“当前”指向同名转换器的所有键。
//! - `list` 按实例指针去重，多格式转换器只出现一次。
//! - 写操作持写锁，查询持读锁；锁中毒时沿用内部数据（注册表只含不可变的 `Arc`）。

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::config::ConverterConfig;
use crate::converter::{FormatConverter, HeicConverter, TiffConverter};
use crate::platform::StaticCapabilities;
use crate::progress::DefaultMessages;

type ConverterMap = HashMap<String, Arc<dyn FormatConverter>>;

#[derive(Default)]
pub struct ConverterRegistry {
    converters: RwLock<ConverterMap>,
}

impl ConverterRegistry {
    /// 创建空注册表。
    pub fn new() -> Self {
        Self::default()
    }

    /// 创建并注册内置转换器（HEIC、TIFF）。
    ///
    /// HEIC 默认未配置解码后端，可通过 `register` 覆盖为带后端的实例。
    pub fn with_builtin_converters(config: &ConverterConfig) -> Self {
        let registry = Self::new();
        registry.register(Arc::new(HeicConverter::without_backend(
            Arc::new(StaticCapabilities::for_host(config.host)),
            Arc::new(DefaultMessages::default()),
        )));
        registry.register(Arc::new(TiffConverter::from_config(config.clone())));
        registry
    }

    fn read(&self) -> RwLockReadGuard<'_, ConverterMap> {
        self.converters.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ConverterMap> {
        self.converters.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// 为转换器声明的每个格式写入一条映射。
    pub fn register(&self, converter: Arc<dyn FormatConverter>) {
        let formats = converter.supported_formats();
        {
            let mut map = self.write();
            for format in &formats {
                if let Some(previous) = map.insert(format.mime_type.clone(), Arc::clone(&converter)) {
                    log::debug!(
                        "格式 {} 的转换器由 {} 覆盖为 {}",
                        format.mime_type,
                        previous.name(),
                        converter.name()
                    );
                }
            }
        }
        log::info!("已注册图片转换器：{}", converter.name());
    }

    /// 移除当前名称为 `name` 的转换器占用的所有映射。
    pub fn remove(&self, name: &str) -> bool {
        let removed = {
            let mut map = self.write();
            let before = map.len();
            map.retain(|_, converter| converter.name() != name);
            before != map.len()
        };

        if removed {
            log::info!("已移除图片转换器：{}", name);
        }
        removed
    }

    /// 返回去重后的转换器实例。
    pub fn list(&self) -> Vec<Arc<dyn FormatConverter>> {
        let map = self.read();
        let mut unique: Vec<Arc<dyn FormatConverter>> = Vec::new();
        for converter in map.values() {
            if !unique.iter().any(|seen| Arc::ptr_eq(seen, converter)) {
                unique.push(Arc::clone(converter));
            }
        }
        unique
    }

    pub fn lookup(&self, mime_type: &str) -> Option<Arc<dyn FormatConverter>> {
        self.read().get(mime_type).cloned()
    }

    /// 已注册的 MIME 键（有序）。
    pub fn supported_formats(&self) -> BTreeSet<String> {
        self.read().keys().cloned().collect()
    }
}
