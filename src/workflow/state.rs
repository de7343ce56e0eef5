//! 工作流的对外状态模型：模式、阶段、结果与只读快照。

use std::fmt;

use serde::Serialize;

use crate::gateway::{EmbedOutcome, ErrorCategory, ExtractOutcome, GatewayError, VerifyOutcome};
use crate::validation::ValidationReport;

/// 滑块初始强度，与后端表单默认值一致。
pub const DEFAULT_ALPHA: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Embed,
    Extract,
    Verify,
}

impl Mode {
    pub const ALL: [Mode; 3] = [Mode::Embed, Mode::Extract, Mode::Verify];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Embed => "embed",
            Self::Extract => "extract",
            Self::Verify => "verify",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `Idle → FilesSelected → Validating → Submitting → Succeeded | Failed`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    FilesSelected,
    Validating,
    Submitting,
    Succeeded,
    Failed,
}

/// 展示层据此选择提示语。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Failure {
    /// 后端拒绝：换一张图或调整参数。
    Business {
        message: String,
        suggestion: Option<String>,
    },
    /// 未拿到可用响应：检查网络后重试。
    Transport { message: String },
}

impl Failure {
    pub fn message(&self) -> &str {
        match self {
            Self::Business { message, .. } | Self::Transport { message } => message.as_str(),
        }
    }

    pub fn hint(&self) -> &str {
        match self {
            Self::Business {
                suggestion: Some(suggestion),
                ..
            } => suggestion.as_str(),
            Self::Business { .. } => "Try a different image or adjust the parameters",
            Self::Transport { .. } => "Check your connection and try again",
        }
    }
}

impl From<GatewayError> for Failure {
    fn from(err: GatewayError) -> Self {
        match err.category() {
            ErrorCategory::Business => Self::Business {
                message: err.to_string(),
                suggestion: err.suggestion().map(str::to_string),
            },
            ErrorCategory::Transport => Self::Transport {
                message: err.to_string(),
            },
        }
    }
}

/// 一次网关调用的最终结果。
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "lowercase")]
pub enum WorkflowResult {
    Embedded(EmbedOutcome),
    Extracted(ExtractOutcome),
    Verified(VerifyOutcome),
    Failure(Failure),
}

impl WorkflowResult {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }
}

/// 已选文件的展示摘要。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SelectedFileSummary {
    /// `image` / `original` / `suspect`
    pub slot: &'static str,
    pub file_name: String,
    pub declared_type: String,
    pub size: u64,
    pub size_label: String,
    pub preview_uri: String,
}

/// 单个模式的只读快照。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModeSnapshot {
    pub mode: Mode,
    pub phase: Phase,
    pub busy: bool,
    pub files: Vec<SelectedFileSummary>,
    /// 仅嵌入模式有值。
    pub text: Option<String>,
    pub rejection: Option<ValidationReport>,
    pub result: Option<WorkflowResult>,
}
