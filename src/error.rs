//! 统一错误类型模块
//!
//! # 设计思路
//!
//! 各层各自定义 `thiserror` 枚举（校验、配置、网关、工作流），
//! 顶层以 `AppError` 汇总，调用方只需处理一种错误类型。
//!
//! # 实现思路
//!
//! - 为各层错误提供 `From` 转换，`?` 即可向上传播。
//! - 实现 `Serialize` 将错误序列化为字符串，便于展示层 / IPC 直接呈现。
//! - `code()` 提供稳定的机器可读错误码。

use serde::Serialize;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::validation::ValidationReport;
use crate::workflow::{SubmitError, WorkflowError};

/// 应用级统一错误类型
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 配置加载或校验失败
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),

    /// 提交前校验未通过
    #[error("{0}")]
    Validation(ValidationReport),

    /// 后端网关错误（业务 / 传输）
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    /// 工作流提交失败
    #[error("{0}")]
    Submit(#[from] SubmitError),

    /// 工作流状态不可用
    #[error("{0}")]
    Workflow(#[from] WorkflowError),

    /// 文件系统 I/O 错误
    #[error("文件系统错误: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "E_CONFIG",
            Self::Validation(_) | Self::Submit(SubmitError::Rejected(_)) => "E_VALIDATION",
            Self::Gateway(err) => err.code(),
            Self::Submit(SubmitError::InFlight(_)) => "E_BUSY",
            Self::Submit(_) | Self::Workflow(_) => "E_INTERNAL",
            Self::Io(_) => "E_IO",
        }
    }
}

/// 展示层 / IPC 需要可序列化的错误，序列化为人类可读的字符串。
impl Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
