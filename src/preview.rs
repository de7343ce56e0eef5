//! # 预览句柄（RAII）
//!
//! ## 设计思路
//!
//! 每次选图都会为展示层生成一个预览句柄（相当于浏览器里的对象 URL）。
//! 句柄被替换或模式重置时必须释放，否则会持续占用资源。
//!
//! ## 实现思路
//!
//! - `PreviewHandle` 采用 RAII：`PreviewRegistry::acquire` 登记，`Drop` 时自动注销，
//!   持有者只需丢弃旧句柄即可完成释放。
//! - `PreviewRegistry` 记录存活句柄，`live_count()` 让泄漏可被观测与测试。
//! - 注册表锁中毒时不 panic，只记录告警（`Drop` 中无法返回错误）。

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use base64::{Engine as _, engine::general_purpose};

use crate::asset::ImageAsset;

#[derive(Debug, Default)]
struct RegistryInner {
    next_id: AtomicU64,
    live: Mutex<HashSet<u64>>,
}

/// 预览句柄注册表。克隆后共享同一份登记表。
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    inner: Arc<RegistryInner>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为已选图片创建预览句柄。`scope` 用于区分句柄归属（如 `embed`、`extract/original`）。
    pub fn acquire(&self, scope: &str, asset: &ImageAsset) -> PreviewHandle {
        let id = self.inner.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        match self.inner.live.lock() {
            Ok(mut live) => {
                live.insert(id);
            }
            Err(_) => log::warn!("⚠️ 预览注册表锁已中毒，句柄 {} 未登记", id),
        }

        log::debug!("🖼️ 创建预览句柄 - {} #{} 文件: {}", scope, id, asset.file_name());

        PreviewHandle {
            id,
            uri: format!("preview://{}/{}", scope, id),
            asset: asset.clone(),
            registry: Arc::clone(&self.inner),
        }
    }

    /// 当前仍未释放的句柄数量。
    pub fn live_count(&self) -> usize {
        self.inner.live.lock().map(|live| live.len()).unwrap_or(0)
    }
}

/// 预览句柄，`Drop` 时自动释放。
#[derive(Debug)]
pub struct PreviewHandle {
    id: u64,
    uri: String,
    asset: ImageAsset,
    registry: Arc<RegistryInner>,
}

impl PreviewHandle {
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// 供 webview 类展示层直接使用的 Data URL。
    pub fn to_data_url(&self) -> String {
        let mime = self
            .asset
            .media_type()
            .map(|media| media.as_mime())
            .unwrap_or("application/octet-stream");
        format!(
            "data:{};base64,{}",
            mime,
            general_purpose::STANDARD.encode(self.asset.bytes())
        )
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        match self.registry.live.lock() {
            Ok(mut live) => {
                live.remove(&self.id);
                log::debug!("🧹 释放预览句柄 - {}", self.uri);
            }
            Err(_) => log::warn!("⚠️ 预览注册表锁已中毒，句柄 {} 未能注销", self.uri),
        }
    }
}
