//! # 网关错误模型
//!
//! ## 设计思路
//!
//! 展示层只需要区分两类失败：
//! - 业务错误：后端理解了请求但无法满足（如未检测到水印）→ 提示换一张图
//! - 传输错误：没有拿到可用响应（断网、超时、不可达）→ 提示检查网络后重试
//!
//! 具体分支保留更多细节，`category()` 负责归类。

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Business,
    Transport,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GatewayError {
    /// 后端返回了结构化错误体。
    #[error("{message}")]
    Business {
        status: u16,
        code: Option<String>,
        message: String,
        suggestion: Option<String>,
    },

    #[error("Cannot reach the watermark service: {0}")]
    Transport(String),

    #[error("The watermark service did not answer within {0} seconds")]
    Timeout(u64),

    /// 2xx 响应但内容不符合约定。
    #[error("Unexpected response from the watermark service: {0}")]
    Protocol(String),
}

impl GatewayError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Business { .. } => ErrorCategory::Business,
            Self::Transport(_) | Self::Timeout(_) | Self::Protocol(_) => ErrorCategory::Transport,
        }
    }

    /// 稳定的机器可读错误码，供日志与前端分支使用。
    pub fn code(&self) -> &'static str {
        match self {
            Self::Business { .. } => "E_BUSINESS",
            Self::Transport(_) => "E_NETWORK",
            Self::Timeout(_) => "E_TIMEOUT",
            Self::Protocol(_) => "E_PROTOCOL",
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Business { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }
}
