//! # 工作流模块（workflow）
//!
//! ## 设计思路
//!
//! 嵌入 / 提取 / 盲检三个模式各自独立的状态机：
//! `Idle → FilesSelected → Validating → Submitting → Succeeded | Failed`。
//!
//! - `state`：对外可序列化的模式、阶段、结果与快照
//! - `slot`：每个模式独占的内部状态槽
//! - `controller`：驱动状态迁移、校验与网关调用

mod controller;
mod slot;
mod state;

pub use controller::{SubmitError, SubmitOutcome, WorkflowController, WorkflowError};
pub use state::{
    Failure, Mode, ModeSnapshot, Phase, SelectedFileSummary, WorkflowResult, DEFAULT_ALPHA,
};
