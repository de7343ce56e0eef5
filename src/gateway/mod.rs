//! # 后端网关模块（gateway）
//!
//! ## 设计思路
//!
//! `BackendGateway` 是客户端与远端水印服务之间唯一的边界。
//! 工作流控制器只依赖这个 trait，测试时可替换为内存实现。
//!
//! - `request`：已校验的请求类型
//! - `outcome`：完整的成功结果
//! - `error`：业务 / 传输两类失败
//! - `wire`：响应体与错误体的线上格式
//! - `http`：基于 `reqwest` 的实现与产物下载
//! - `health`：启动探活与单写多读状态单元

mod error;
mod outcome;
mod request;
mod wire;

pub mod health;
pub mod http;

use std::future::Future;

pub use error::{ErrorCategory, GatewayError};
pub use health::{HealthStatus, HealthView, HealthWriter};
pub use http::HttpGateway;
pub use outcome::{
    AlignmentStatus, EmbedOutcome, ExtractOutcome, GeometryCorrection, HealthReport, VerifyOutcome,
};
pub use request::{EmbedRequest, ExtractRequest, VerifyRequest};

/// 远端水印服务。每个模式一个异步操作，外加探活。
pub trait BackendGateway: Send + Sync {
    fn health(&self) -> impl Future<Output = Result<HealthReport, GatewayError>> + Send;

    fn embed(&self, request: &EmbedRequest) -> impl Future<Output = Result<EmbedOutcome, GatewayError>> + Send;

    fn extract(
        &self,
        request: &ExtractRequest,
    ) -> impl Future<Output = Result<ExtractOutcome, GatewayError>> + Send;

    fn verify(&self, request: &VerifyRequest) -> impl Future<Output = Result<VerifyOutcome, GatewayError>> + Send;
}
