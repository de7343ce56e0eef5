//! # 后端健康状态
//!
//! ## 设计思路
//!
//! 健康状态只在启动时探测一次，探测失败只影响状态指示，从不作为用户可见错误。
//! 状态是一个明确归属的“单写多读”单元：
//! - `HealthWriter` 不可克隆，移交给唯一的探测任务，发布后即被消耗；
//! - `HealthView` 可任意克隆，只读。
//!
//! ## 实现思路
//!
//! 基于 `tokio::sync::watch`：发送端天然唯一，接收端读取最新值且可等待变化。

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::BackendGateway;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum HealthStatus {
    /// 尚未完成探测。
    Unknown,
    Online {
        status: String,
        service: String,
        checked_at: DateTime<Utc>,
    },
    Offline {
        reason: String,
        checked_at: DateTime<Utc>,
    },
}

/// 唯一写端。
#[derive(Debug)]
pub struct HealthWriter {
    tx: watch::Sender<HealthStatus>,
}

impl HealthWriter {
    pub fn publish(self, status: HealthStatus) {
        // 所有读端都已丢弃时发布失败，无需处理
        let _ = self.tx.send(status);
    }
}

/// 只读视图。
#[derive(Debug, Clone)]
pub struct HealthView {
    rx: watch::Receiver<HealthStatus>,
}

impl HealthView {
    pub fn current(&self) -> HealthStatus {
        self.rx.borrow().clone()
    }

    pub fn is_online(&self) -> bool {
        matches!(*self.rx.borrow(), HealthStatus::Online { .. })
    }

    /// 等待探测结果落定（写端发布或被丢弃）后返回当前状态。
    pub async fn settled(&self) -> HealthStatus {
        let mut rx = self.rx.clone();
        let _ = rx.wait_for(|status| !matches!(status, HealthStatus::Unknown)).await;
        rx.borrow().clone()
    }
}

pub fn health_cell() -> (HealthWriter, HealthView) {
    let (tx, rx) = watch::channel(HealthStatus::Unknown);
    (HealthWriter { tx }, HealthView { rx })
}

/// 探测一次后端并把结果写入状态单元。失败只记录日志。
pub async fn probe_once<G>(gateway: &G, writer: HealthWriter)
where
    G: BackendGateway,
{
    let status = match gateway.health().await {
        Ok(report) => {
            log::info!("✅ 后端在线 - {} ({})", report.service, report.status);
            HealthStatus::Online {
                status: report.status,
                service: report.service,
                checked_at: Utc::now(),
            }
        }
        Err(err) => {
            log::warn!("⚠️ 后端不可用 [{}] - {}", err.code(), err);
            HealthStatus::Offline {
                reason: err.to_string(),
                checked_at: Utc::now(),
            }
        }
    };

    writer.publish(status);
}

/// 在后台启动一次性探测，立即返回只读视图。
pub fn spawn_startup_probe<G>(gateway: Arc<G>) -> (HealthView, JoinHandle<()>)
where
    G: BackendGateway + 'static,
{
    let (writer, view) = health_cell();
    let handle = tokio::spawn(async move {
        probe_once(gateway.as_ref(), writer).await;
    });
    (view, handle)
}
